use std::fmt;

use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::http::HTTP_10;
use crate::http::headers::{CONTENT_LENGTH, HeaderList};

/// Named HTTP status codes.
///
/// Any three-digit code can travel on the wire; these are the ones the crate
/// produces itself or that callers commonly match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 204 No Content
    NoContent,
    /// 400 Bad Request
    BadRequest,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 500 Internal Server Error
    InternalServerError,
    /// 503 Service Unavailable
    ServiceUnavailable,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// ```
    /// # use httpipe::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::NoContent => 204,
            StatusCode::BadRequest => 400,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::InternalServerError => 500,
            StatusCode::ServiceUnavailable => 503,
        }
    }

    pub fn reason_phrase(&self) -> &'static str {
        canonical_reason(self.as_u16())
    }
}

impl From<StatusCode> for u16 {
    fn from(status: StatusCode) -> u16 {
        status.as_u16()
    }
}

/// Standard reason phrase for a status code, empty when unknown.
pub fn canonical_reason(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}

/// Protocol, code and reason of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub version: String,
    pub code: u16,
    pub reason: String,
}

impl StatusLine {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            version: HTTP_10.to_string(),
            code,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: StatusLine,
    pub headers: HeaderList,
}

impl ResponseHead {
    pub fn content_length(&self) -> Result<Option<u64>> {
        self.headers.content_length()
    }
}

/// Callback that may rewrite the head right before it is written.
pub type BeforeHeadersHook = Box<dyn FnOnce(&mut ResponseHead) + Send>;

/// Body bytes of a server response.
pub enum ResponseBody {
    Empty,
    Full(Bytes),
    Stream(Box<dyn AsyncRead + Send + Unpin>),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Empty => f.write_str("Empty"),
            ResponseBody::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            ResponseBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// A response produced by a request handler.
pub struct Response {
    pub head: ResponseHead,
    pub body: ResponseBody,
    hooks: Vec<BeforeHeadersHook>,
}

impl Response {
    pub fn builder(status: impl Into<u16>) -> ResponseBuilder {
        ResponseBuilder::new(status)
    }

    /// Creates a simple 200 OK response with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        ResponseBuilder::new(StatusCode::Ok).body(body).build()
    }

    pub fn not_found() -> Self {
        ResponseBuilder::new(StatusCode::NotFound)
            .body("404 Not Found")
            .build()
    }

    pub fn internal_error() -> Self {
        ResponseBuilder::new(StatusCode::InternalServerError)
            .body("500 Internal Server Error")
            .build()
    }

    pub fn status(&self) -> u16 {
        self.head.status.code
    }

    pub fn headers(&self) -> &HeaderList {
        &self.head.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderList {
        &mut self.head.headers
    }

    /// Registers a hook run once, in registration order, just before the
    /// head is written to the connection.
    pub fn on_before_headers<F>(&mut self, hook: F)
    where
        F: FnOnce(&mut ResponseHead) + Send + 'static,
    {
        self.hooks.push(Box::new(hook));
    }

    pub fn into_parts(self) -> (ResponseHead, Vec<BeforeHeadersHook>, ResponseBody) {
        (self.head, self.hooks, self.body)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("head", &self.head)
            .field("body", &self.body)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Builder for constructing responses in a fluent style.
///
/// ```ignore
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body("{}")
///     .build();
/// ```
pub struct ResponseBuilder {
    status: StatusLine,
    headers: HeaderList,
    body: ResponseBody,
}

impl ResponseBuilder {
    /// Creates a builder with the standard reason phrase for `status`.
    pub fn new(status: impl Into<u16>) -> Self {
        let code = status.into();
        Self {
            status: StatusLine::new(code, canonical_reason(code)),
            headers: HeaderList::new(),
            body: ResponseBody::Empty,
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.status.reason = reason.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = ResponseBody::Full(body.into());
        self
    }

    /// Streams the body from `reader`; the caller sets `Content-Length` if known.
    pub fn stream<R>(mut self, reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.body = ResponseBody::Stream(Box::new(reader));
        self
    }

    /// Builds the final Response.
    ///
    /// Adds `Content-Length` for in-memory bodies if not already present.
    pub fn build(mut self) -> Response {
        let length = match &self.body {
            ResponseBody::Empty => Some(0),
            ResponseBody::Full(bytes) => Some(bytes.len()),
            ResponseBody::Stream(_) => None,
        };
        if let Some(length) = length {
            if !self.headers.contains(CONTENT_LENGTH) {
                self.headers.push(CONTENT_LENGTH, length.to_string());
            }
        }

        Response {
            head: ResponseHead {
                status: self.status,
                headers: self.headers,
            },
            body: self.body,
            hooks: Vec::new(),
        }
    }
}
