use httpipe::error::Error;
use httpipe::http::headers::HeaderList;
use httpipe::http::line_reader::LineReader;
use httpipe::http::parser::read_request_head;
use httpipe::http::request::Method;
use httpipe::http::response::StatusLine;
use httpipe::http::writer::HeaderWriter;

async fn write_request(capacity: usize, headers: &HeaderList) -> Vec<u8> {
    let mut writer = HeaderWriter::with_capacity(Vec::new(), capacity);
    writer
        .write_request_head(&Method::GET, "/a%20b?x=1", headers)
        .await
        .unwrap();
    writer.flush().await.unwrap();
    writer.into_inner()
}

#[tokio::test]
async fn test_writer_request_head() {
    let headers: HeaderList = [("Host", "localhost")].into_iter().collect();

    let out = write_request(4096, &headers).await;

    assert_eq!(out, b"GET /a%20b?x=1 HTTP/1.0\nHost: localhost\n\n");
}

#[tokio::test]
async fn test_writer_output_independent_of_buffer_size() {
    let mut headers = HeaderList::new();
    headers.append("Accept", ["text/html", "text/plain"]);
    headers.push("X-Long", "v".repeat(300));

    let expected = write_request(4096, &headers).await;
    for capacity in 1..=40 {
        assert_eq!(write_request(capacity, &headers).await, expected, "capacity {capacity}");
    }
}

#[tokio::test]
async fn test_writer_joins_values_with_comma() {
    let mut headers = HeaderList::new();
    headers.append("Accept", ["a", "b", "c"]);
    let mut writer = HeaderWriter::new(Vec::new());

    writer
        .write_status_head(&StatusLine::new(200, "OK"), &headers)
        .await
        .unwrap();
    writer.flush().await.unwrap();

    assert_eq!(writer.into_inner(), b"HTTP/1.0 200 OK\nAccept: a, b, c\n\n");
}

#[tokio::test]
async fn test_writer_joins_server_values_with_space() {
    let mut headers = HeaderList::new();
    headers.append("Server", ["httpipe/1.0", "(unix)"]);
    let mut writer = HeaderWriter::new(Vec::new());

    writer
        .write_status_head(&StatusLine::new(404, "Not Found"), &headers)
        .await
        .unwrap();
    writer.flush().await.unwrap();

    assert_eq!(
        writer.into_inner(),
        b"HTTP/1.0 404 Not Found\nServer: httpipe/1.0 (unix)\n\n"
    );
}

#[tokio::test]
async fn test_writer_pads_status_code() {
    let mut writer = HeaderWriter::new(Vec::new());

    writer
        .write_status_head(&StatusLine::new(99, ""), &HeaderList::new())
        .await
        .unwrap();
    writer.flush().await.unwrap();

    assert_eq!(writer.into_inner(), b"HTTP/1.0 099 \n\n");
}

#[tokio::test]
async fn test_writer_rejects_four_digit_status_code() {
    let mut writer = HeaderWriter::new(Vec::new());

    let result = writer
        .write_status_head(&StatusLine::new(1000, "X"), &HeaderList::new())
        .await;
    writer.flush().await.unwrap();

    assert!(matches!(result, Err(Error::InvalidStatusCode(1000))));
    assert!(writer.into_inner().is_empty());
}

#[tokio::test]
async fn test_written_request_head_parses_back() {
    let mut headers = HeaderList::new();
    headers.push("Host", "localhost");
    headers.append("Accept", ["text/html", "text/plain"]);
    headers.push("X-Tag", "a");
    headers.push("X-Tag", "b");

    let method = Method::Extension("PURGE".to_string());
    let mut writer = HeaderWriter::with_capacity(Vec::new(), 8);
    writer
        .write_request_head(&method, "/cache?key=1", &headers)
        .await
        .unwrap();
    writer.flush().await.unwrap();
    let wire = writer.into_inner();

    let mut reader = LineReader::new(&wire[..]);
    let head = read_request_head(&mut reader).await.unwrap();

    assert_eq!(head.method, method);
    assert_eq!(head.target, "/cache?key=1");
    assert_eq!(head.version, "HTTP/1.0");
    assert_eq!(head.headers, headers);
    assert_eq!(head.headers.get_all("X-Tag").collect::<Vec<_>>(), ["a", "b"]);
}

#[tokio::test]
async fn test_writer_buffers_until_flush() {
    let mut writer = HeaderWriter::with_capacity(Vec::new(), 16);

    writer.write_str("0123456789").await.unwrap();
    assert_eq!(writer.buffered(), 10);
    assert!(writer.get_mut().is_empty());

    writer.write_str("abcdefghij").await.unwrap();
    assert_eq!(writer.get_mut().as_slice(), b"0123456789abcdef");
    assert_eq!(writer.buffered(), 4);

    writer.flush().await.unwrap();
    assert_eq!(writer.buffered(), 0);
    assert_eq!(writer.into_inner(), b"0123456789abcdefghij");
}

#[tokio::test]
async fn test_writer_rejects_non_ascii() {
    let mut writer = HeaderWriter::new(Vec::new());

    let result = writer.write_str("caf\u{e9}").await;

    assert!(matches!(result, Err(Error::NonAsciiHeader(_))));
    assert_eq!(writer.buffered(), 0);
}

#[tokio::test]
async fn test_writer_rejects_non_ascii_header_value() {
    let headers: HeaderList = [("X-Name", "\u{fc}ber")].into_iter().collect();
    let mut writer = HeaderWriter::new(Vec::new());

    let result = writer
        .write_request_head(&Method::GET, "/", &headers)
        .await;

    assert!(matches!(result, Err(Error::NonAsciiHeader(_))));
}
