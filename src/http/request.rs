use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::http::HTTP_10;
use crate::http::headers::{CONTENT_LENGTH, HeaderList};

/// HTTP request methods.
///
/// The common verbs get their own variant; any other valid token is carried
/// as [`Method::Extension`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET - Retrieve a resource
    GET,
    /// POST - Create or submit data
    POST,
    /// PUT - Replace a resource
    PUT,
    /// DELETE - Delete a resource
    DELETE,
    /// HEAD - Like GET but without the response body
    HEAD,
    /// OPTIONS - Describe communication options
    OPTIONS,
    /// PATCH - Partial modification of a resource
    PATCH,
    /// Any other method token
    Extension(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidMethod;

impl fmt::Display for InvalidMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid method token")
    }
}

impl std::error::Error for InvalidMethod {}

fn is_token_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

impl FromStr for Method {
    type Err = InvalidMethod;

    /// Parses a method token. Matching of the known verbs is case-sensitive.
    ///
    /// ```
    /// # use httpipe::http::request::Method;
    /// assert_eq!("GET".parse::<Method>(), Ok(Method::GET));
    /// assert_eq!("get".parse::<Method>(), Ok(Method::Extension("get".into())));
    /// ```
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "HEAD" => Method::HEAD,
            "OPTIONS" => Method::OPTIONS,
            "PATCH" => Method::PATCH,
            _ if !s.is_empty() && s.bytes().all(is_token_char) => Method::Extension(s.to_string()),
            _ => return Err(InvalidMethod),
        })
    }
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::HEAD => "HEAD",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::Extension(token) => token,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request line and headers as parsed off an incoming connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,
    /// Raw, still escaped, path and query
    pub target: String,
    pub version: String,
    pub headers: HeaderList,
}

impl RequestHead {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.first(name)
    }

    pub fn content_length(&self) -> Result<Option<u64>> {
        self.headers.content_length()
    }

    pub fn path(&self) -> &str {
        let end = self.target.find(['?', '#']).unwrap_or(self.target.len());
        &self.target[..end]
    }

    pub fn query(&self) -> Option<&str> {
        let (_, rest) = self.target.split_once('?')?;
        Some(rest.split('#').next().unwrap_or(rest))
    }
}

/// Body sent by the client after the request head.
pub enum RequestBody {
    Empty,
    Full(Bytes),
    /// Streamed body; without a length it is delimited by half-closing the
    /// connection.
    Stream {
        reader: Box<dyn AsyncRead + Send + Unpin>,
        length: Option<u64>,
    },
}

impl RequestBody {
    pub fn len(&self) -> Option<u64> {
        match self {
            RequestBody::Empty => Some(0),
            RequestBody::Full(bytes) => Some(bytes.len() as u64),
            RequestBody::Stream { length, .. } => *length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            RequestBody::Stream { length, .. } => {
                f.debug_struct("Stream").field("length", length).finish()
            }
        }
    }
}

/// An outgoing request as handed to the client pipeline.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    /// Path and query, or an absolute URL whose path is used
    pub target: String,
    /// Overwritten with `HTTP/1.0` when sent
    pub version: String,
    pub headers: HeaderList,
    pub body: RequestBody,
}

impl Request {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::new()
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            target: target.into(),
            version: HTTP_10.to_string(),
            headers: HeaderList::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.first(name)
    }
}

/// Builder for constructing Request objects.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<Method>,
    target: Option<String>,
    headers: HeaderList,
    body: Option<RequestBody>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(RequestBody::Full(body.into()));
        self
    }

    pub fn body_stream<R>(mut self, reader: R, length: Option<u64>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.body = Some(RequestBody::Stream {
            reader: Box::new(reader),
            length,
        });
        self
    }

    /// Builds the request, adding `Content-Length` for bodies of known size.
    pub fn build(mut self) -> std::result::Result<Request, &'static str> {
        let body = self.body.unwrap_or(RequestBody::Empty);
        if !self.headers.contains(CONTENT_LENGTH) {
            match body.len() {
                Some(0) | None => {}
                Some(len) => self.headers.push(CONTENT_LENGTH, len.to_string()),
            }
        }

        Ok(Request {
            method: self.method.unwrap_or(Method::GET),
            target: self.target.ok_or("target missing")?,
            version: HTTP_10.to_string(),
            headers: self.headers,
            body,
        })
    }
}
