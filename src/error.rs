//! Error types shared by the codec, transports, client and server.

use std::io;

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("reached end of stream before finding a line separator")]
    UnexpectedEndOfStream,

    #[error("line exceeds the maximum length of {0} bytes")]
    LineTooLong(usize),

    #[error("invalid request line: {0:?}")]
    InvalidRequestLine(String),

    #[error("invalid status line: {0:?}")]
    InvalidStatusLine(String),

    #[error("unsupported protocol version: {0:?}")]
    UnsupportedVersion(String),

    #[error("status code {0} does not fit in three digits")]
    InvalidStatusCode(u16),

    #[error("invalid header line: {0:?}")]
    InvalidHeader(String),

    #[error("header contains non-ASCII characters: {0:?}")]
    NonAsciiHeader(String),

    #[error("invalid Content-Length: {0:?}")]
    InvalidContentLength(String),

    #[error("invalid request target {target:?}: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("chunked transfer encoding is not supported")]
    UnsupportedTransferEncoding,

    #[error(
        "could not start listener: self-connect failed after {attempts} attempts; \
         too many clients may be connecting before the server is ready"
    )]
    ListenerStartFailed { attempts: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("listener is already started")]
    AlreadyListening,

    #[error("timed out connecting to {0}")]
    ConnectTimeout(String),

    #[error("request timed out")]
    RequestTimeout,

    #[error("operation cancelled")]
    Cancelled,

    #[error("request handler failed: {0:#}")]
    Handler(anyhow::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether this error comes from malformed bytes on the wire.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Error::UnexpectedEndOfStream
                | Error::LineTooLong(_)
                | Error::InvalidRequestLine(_)
                | Error::InvalidStatusLine(_)
                | Error::UnsupportedVersion(_)
                | Error::InvalidHeader(_)
                | Error::NonAsciiHeader(_)
                | Error::InvalidContentLength(_)
        )
    }
}
