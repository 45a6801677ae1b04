use httpipe::error::Error;
use httpipe::http::line_reader::LineReader;
use httpipe::http::parser::{
    parse_header_line, parse_request_line, parse_status_line, read_request_head,
    read_response_head,
};
use httpipe::http::request::Method;

#[test]
fn test_parse_simple_request_line() {
    let (method, target, version) = parse_request_line(b"GET /x HTTP/1.0").unwrap();

    assert_eq!(method, Method::GET);
    assert_eq!(target, "/x");
    assert_eq!(version, "HTTP/1.0");
}

#[test]
fn test_parse_request_line_rejects_http_11() {
    let result = parse_request_line(b"GET / HTTP/1.1");

    assert!(matches!(result, Err(Error::UnsupportedVersion(v)) if v == "HTTP/1.1"));
}

#[test]
fn test_parse_request_line_missing_parts() {
    for line in [&b"GET /"[..], b"GET", b"", b"GET  HTTP/1.0", b" / HTTP/1.0"] {
        let result = parse_request_line(line);
        assert!(
            matches!(result, Err(Error::InvalidRequestLine(_))),
            "{:?}",
            String::from_utf8_lossy(line)
        );
    }
}

#[test]
fn test_parse_request_line_extra_tokens() {
    for line in [&b"GET / HTTP/1.0 x"[..], b"GET / HTTP/1.0 ", b"GET /a b HTTP/1.0"] {
        let result = parse_request_line(line);
        assert!(
            matches!(result, Err(Error::InvalidRequestLine(_))),
            "{:?}",
            String::from_utf8_lossy(line)
        );
    }
}

#[test]
fn test_parse_request_line_extension_method() {
    let (method, _, _) = parse_request_line(b"PURGE /cache HTTP/1.0").unwrap();

    assert_eq!(method, Method::Extension("PURGE".to_string()));
}

#[test]
fn test_parse_various_http_methods() {
    let methods = vec![
        ("GET", Method::GET),
        ("POST", Method::POST),
        ("PUT", Method::PUT),
        ("DELETE", Method::DELETE),
        ("HEAD", Method::HEAD),
        ("OPTIONS", Method::OPTIONS),
        ("PATCH", Method::PATCH),
    ];

    for (method_str, expected_method) in methods {
        let line = format!("{} / HTTP/1.0", method_str);
        let (parsed, _, _) = parse_request_line(line.as_bytes()).unwrap();
        assert_eq!(parsed, expected_method);
    }
}

#[test]
fn test_parse_status_line_with_reason() {
    let status = parse_status_line(b"HTTP/1.0 404 Not Found").unwrap();

    assert_eq!(status.version, "HTTP/1.0");
    assert_eq!(status.code, 404);
    assert_eq!(status.reason, "Not Found");
}

#[test]
fn test_parse_status_line_without_reason() {
    let status = parse_status_line(b"HTTP/1.0 204").unwrap();

    assert_eq!(status.code, 204);
    assert_eq!(status.reason, "");
}

#[test]
fn test_parse_status_line_too_short() {
    let result = parse_status_line(b"HTTP/1.0 20");

    assert!(matches!(result, Err(Error::InvalidStatusLine(_))));
}

#[test]
fn test_parse_status_line_bad_version() {
    let result = parse_status_line(b"HTTP/1.1 200 OK");

    assert!(matches!(result, Err(Error::UnsupportedVersion(_))));
}

#[test]
fn test_parse_status_line_bad_code() {
    assert!(matches!(
        parse_status_line(b"HTTP/1.0 2x0 OK"),
        Err(Error::InvalidStatusLine(_))
    ));
    assert!(matches!(
        parse_status_line(b"HTTP/1.0 2000 OK"),
        Err(Error::InvalidStatusLine(_))
    ));
    assert!(matches!(
        parse_status_line(b"HTTP/1.0_200 OK"),
        Err(Error::InvalidStatusLine(_))
    ));
}

#[test]
fn test_parse_header_splits_values() {
    let (name, values) = parse_header_line(b"Accept:  text/html , text/plain,*/*").unwrap();

    assert_eq!(name, "Accept");
    assert_eq!(values, vec!["text/html", "text/plain", "*/*"]);
}

#[test]
fn test_parse_header_empty_value() {
    let (name, values) = parse_header_line(b"X-Empty:").unwrap();

    assert_eq!(name, "X-Empty");
    assert_eq!(values, vec![""]);
}

#[test]
fn test_parse_header_value_with_colon() {
    let (name, values) = parse_header_line(b"Host: localhost:8080").unwrap();

    assert_eq!(name, "Host");
    assert_eq!(values, vec!["localhost:8080"]);
}

#[test]
fn test_parse_malformed_header() {
    assert!(matches!(
        parse_header_line(b"BrokenHeader"),
        Err(Error::InvalidHeader(_))
    ));
    assert!(matches!(
        parse_header_line(b": value"),
        Err(Error::InvalidHeader(_))
    ));
}

#[test]
fn test_parse_non_ascii_header() {
    let result = parse_header_line("X-Name: caf\u{e9}".as_bytes());

    assert!(matches!(result, Err(Error::NonAsciiHeader(_))));
}

#[tokio::test]
async fn test_read_request_head_mixed_line_endings() {
    let data: &[u8] = b"POST /api?q=1 HTTP/1.0\nHost: example.com\r\nContent-Length: 5\n\r\nhello";
    let mut reader = LineReader::new(data);

    let head = read_request_head(&mut reader).await.unwrap();

    assert_eq!(head.method, Method::POST);
    assert_eq!(head.path(), "/api");
    assert_eq!(head.query(), Some("q=1"));
    assert_eq!(head.header("Host"), Some("example.com"));
    assert_eq!(head.content_length().unwrap(), Some(5));
    assert_eq!(reader.remaining(), b"hello");
}

#[tokio::test]
async fn test_read_request_head_repeated_header() {
    let data: &[u8] = b"GET / HTTP/1.0\r\nAccept: a\r\nAccept: b, c\r\n\r\n";
    let mut reader = LineReader::new(data);

    let head = read_request_head(&mut reader).await.unwrap();
    let accept: Vec<&str> = head.headers.get_all("Accept").collect();

    assert_eq!(accept, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_read_request_head_truncated() {
    let data: &[u8] = b"GET /x HTTP/1.0\n";
    let mut reader = LineReader::new(data);

    let result = read_request_head(&mut reader).await;

    assert!(matches!(result, Err(Error::UnexpectedEndOfStream)));
}

#[tokio::test]
async fn test_read_response_head() {
    let data: &[u8] = b"HTTP/1.0 200 OK\r\nContent-Length: 2\r\nServer: a b\r\n\r\nhi";
    let mut reader = LineReader::new(data);

    let head = read_response_head(&mut reader).await.unwrap();

    assert_eq!(head.status.code, 200);
    assert_eq!(head.status.reason, "OK");
    assert_eq!(head.content_length().unwrap(), Some(2));
    assert_eq!(head.headers.first("Server"), Some("a b"));
    assert_eq!(reader.remaining(), b"hi");
}

#[tokio::test]
async fn test_read_response_head_invalid_content_length() {
    let data: &[u8] = b"HTTP/1.0 200 OK\nContent-Length: lots\n\n";
    let mut reader = LineReader::new(data);

    let head = read_response_head(&mut reader).await.unwrap();

    assert!(matches!(
        head.content_length(),
        Err(Error::InvalidContentLength(_))
    ));
}
