use tokio::io::{AsyncWrite, AsyncWriteExt, WriteHalf};

use crate::config::CodecConfig;
use crate::error::{Error, Result};
use crate::http::body::PrefixedBodyStream;
use crate::http::line_reader::LineReader;
use crate::http::parser::read_request_head;
use crate::http::response::{BeforeHeadersHook, Response, ResponseBody, ResponseHead};
use crate::http::writer::HeaderWriter;
use crate::once::Once;
use crate::server::{Handler, IncomingRequest};
use crate::transport::BoxConnection;

type HeadAction = Box<dyn FnOnce() -> ResponseHead + Send>;

/// Writes a response head once, running the before-headers hooks first.
struct ResponseWriter<W> {
    writer: HeaderWriter<W>,
    head: Once<ResponseHead, HeadAction>,
}

impl<W> ResponseWriter<W>
where
    W: AsyncWrite + Unpin,
{
    fn new(writer: HeaderWriter<W>, head: ResponseHead, hooks: Vec<BeforeHeadersHook>) -> Self {
        let action: HeadAction = Box::new(move || {
            let mut head = head;
            for hook in hooks {
                hook(&mut head);
            }
            head
        });
        Self {
            writer,
            head: Once::new(action),
        }
    }

    async fn send_head(&mut self) -> Result<()> {
        let head = self.head.ensure_done();
        self.writer
            .write_status_head(&head.status, &head.headers)
            .await?;
        self.writer.flush().await
    }

    async fn send(mut self, body: ResponseBody) -> Result<W> {
        self.send_head().await?;
        let mut out = self.writer.into_inner();
        match body {
            ResponseBody::Empty => {}
            ResponseBody::Full(bytes) => out.write_all(&bytes).await?,
            ResponseBody::Stream(mut reader) => {
                tokio::io::copy(&mut reader, &mut out).await?;
            }
        }
        out.flush().await?;
        Ok(out)
    }
}

fn response_writer(
    write: WriteHalf<BoxConnection>,
    response: Response,
    codec: &CodecConfig,
) -> (ResponseWriter<WriteHalf<BoxConnection>>, ResponseBody) {
    let (head, hooks, body) = response.into_parts();
    let writer = HeaderWriter::from_config(write, codec);
    (ResponseWriter::new(writer, head, hooks), body)
}

/// Runs one request/response exchange on an accepted connection.
///
/// Parsing the head strictly precedes the handler call, which strictly
/// precedes writing the response. When the handler fails a
/// `500 Internal Server Error` is written before the error is returned.
/// After the response the write side is half-closed if supported.
pub async fn serve_connection<H>(conn: BoxConnection, handler: &H, codec: &CodecConfig) -> Result<()>
where
    H: Handler,
{
    let half_close = conn.supports_half_close();
    let (read, write) = tokio::io::split(conn);

    let mut reader = LineReader::from_config(read, codec);
    let head = read_request_head(&mut reader).await?;
    let length = head.content_length()?;
    let (prefix, read) = reader.into_parts();

    tracing::debug!(method = %head.method, target = %head.target, "Request received");

    let request = IncomingRequest {
        head,
        body: PrefixedBodyStream::new(prefix, read, length),
    };

    let (response, failure) = match handler.handle(request).await {
        Ok(response) => (response, None),
        Err(e) => (Response::internal_error(), Some(e)),
    };
    let status = response.status();

    let (writer, body) = response_writer(write, response, codec);
    let mut out = writer.send(body).await?;
    if half_close {
        out.shutdown().await?;
    }

    match failure {
        Some(e) => Err(Error::Handler(e)),
        None => {
            tracing::debug!(status, "Response sent");
            Ok(())
        }
    }
}
