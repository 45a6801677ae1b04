//! Client side: one request per dialed connection.
//!
//! The request head is written first. The body is then sent on its own task
//! while the response head is read, so a server that answers before reading
//! the whole body cannot deadlock the exchange.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::{Position, Url};

use crate::config::{ClientConfig, CodecConfig};
use crate::error::{Error, Result};
use crate::http::HTTP_10;
use crate::http::body::PrefixedBodyStream;
use crate::http::headers::{CONTENT_LENGTH, EXPECT, HeaderList};
use crate::http::line_reader::LineReader;
use crate::http::parser::read_response_head;
use crate::http::request::{Request, RequestBody};
use crate::http::response::StatusLine;
use crate::http::writer::HeaderWriter;
use crate::transport::{Connection, Dial};

const BASE_URL: &str = "http://localhost/";

pub struct Client<D> {
    dialer: D,
    codec: CodecConfig,
    config: ClientConfig,
}

impl<D: Dial> Client<D> {
    pub fn new(dialer: D, codec: CodecConfig, config: ClientConfig) -> Self {
        Self {
            dialer,
            codec,
            config,
        }
    }

    pub fn with_dialer(dialer: D) -> Self {
        Self::new(dialer, CodecConfig::default(), ClientConfig::default())
    }

    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    pub async fn send(&self, request: Request) -> Result<ClientResponse<D::Connection>> {
        self.send_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Sends `request` and returns once the response head has been read.
    ///
    /// The configured request timeout covers dialing and the response head,
    /// not the response body.
    pub async fn send_with_cancel(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<ClientResponse<D::Connection>> {
        let exchange = self.exchange(request, cancel);
        match self.config.request_timeout() {
            Some(limit) => timeout(limit, exchange)
                .await
                .map_err(|_| Error::RequestTimeout)?,
            None => exchange.await,
        }
    }

    async fn exchange(
        &self,
        mut request: Request,
        cancel: &CancellationToken,
    ) -> Result<ClientResponse<D::Connection>> {
        normalize(&mut request)?;
        let target = escape_target(&request.target)?;

        let conn = self.dialer.dial(cancel).await?;
        let half_close = conn.supports_half_close();
        // without half-close the server cannot see the end of an empty body
        if !half_close && request.body.is_empty() && !request.headers.contains(CONTENT_LENGTH) {
            request.headers.push(CONTENT_LENGTH, "0");
        }
        let (read, write) = tokio::io::split(conn);

        let mut writer = HeaderWriter::from_config(write, &self.codec);
        writer
            .write_request_head(&request.method, &target, &request.headers)
            .await?;
        writer.flush().await?;
        trace!(method = %request.method, target = %target, "request head sent");

        let sender = BodySender(tokio::spawn(send_body(
            writer.into_inner(),
            request.body,
            half_close,
        )));

        let mut reader = LineReader::from_config(read, &self.codec);
        let head = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            head = read_response_head(&mut reader) => head?,
        };
        let length = head.content_length()?;
        let (prefix, read) = reader.into_parts();

        debug!(status = head.status.code, "Response received");
        Ok(ClientResponse {
            status: head.status,
            headers: head.headers,
            body: ResponseBody {
                stream: PrefixedBodyStream::closing(prefix, read, length),
                _sender: sender,
            },
        })
    }
}

fn normalize(request: &mut Request) -> Result<()> {
    request.version = HTTP_10.to_string();
    if request.headers.is_chunked() {
        return Err(Error::UnsupportedTransferEncoding);
    }
    if request.headers.expects_continue() {
        request.headers.remove(EXPECT);
    }
    if !request.headers.contains(CONTENT_LENGTH) {
        if let Some(len @ 1..) = request.body.len() {
            request.headers.push(CONTENT_LENGTH, len.to_string());
        }
    }
    Ok(())
}

/// Resolves `target` against `http://localhost/` and returns its escaped
/// path, query and fragment.
pub fn escape_target(target: &str) -> Result<String> {
    let invalid = |e: url::ParseError| Error::InvalidTarget {
        target: target.to_string(),
        reason: e.to_string(),
    };
    let url = Url::parse(BASE_URL).and_then(|base| base.join(target)).map_err(invalid)?;
    Ok(url[Position::BeforePath..].to_string())
}

async fn send_body<C: Connection>(
    mut out: WriteHalf<C>,
    body: RequestBody,
    half_close: bool,
) {
    let res: io::Result<()> = async {
        match body {
            RequestBody::Empty => {}
            RequestBody::Full(bytes) => out.write_all(&bytes).await?,
            RequestBody::Stream {
                reader,
                length: Some(len),
            } => {
                tokio::io::copy(&mut reader.take(len), &mut out).await?;
            }
            RequestBody::Stream {
                mut reader,
                length: None,
            } => {
                tokio::io::copy(&mut reader, &mut out).await?;
            }
        }
        out.flush().await?;
        if half_close {
            out.shutdown().await?;
        }
        Ok(())
    }
    .await;

    // the server may answer and close before taking the whole body
    if let Err(e) = res {
        debug!(error = %e, "request body not fully sent");
    }
}

/// Aborts the body sender when the response is dropped.
#[derive(Debug)]
struct BodySender(JoinHandle<()>);

impl Drop for BodySender {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Response body bounded by `Content-Length`, or read until the server
/// closes. The connection is released once the body is fully read.
#[derive(Debug)]
pub struct ResponseBody<C> {
    stream: PrefixedBodyStream<ReadHalf<C>>,
    _sender: BodySender,
}

impl<C> ResponseBody<C> {
    pub fn remaining(&self) -> Option<u64> {
        self.stream.remaining()
    }

    pub fn is_released(&self) -> bool {
        self.stream.is_released()
    }
}

impl<C: Connection> AsyncRead for ResponseBody<C> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_read(cx, buf)
    }
}

#[derive(Debug)]
pub struct ClientResponse<C> {
    pub status: StatusLine,
    pub headers: HeaderList,
    body: ResponseBody<C>,
}

impl<C: Connection> ClientResponse<C> {
    pub fn status(&self) -> u16 {
        self.status.code
    }

    pub fn reason(&self) -> &str {
        &self.status.reason
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.first(name)
    }

    pub fn body_mut(&mut self) -> &mut ResponseBody<C> {
        &mut self.body
    }

    pub fn into_body(self) -> ResponseBody<C> {
        self.body
    }

    /// Reads the whole body.
    pub async fn bytes(self) -> Result<Bytes> {
        let mut body = self.body;
        let mut buf = Vec::new();
        body.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }

    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}
