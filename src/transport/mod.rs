//! Pluggable transports.
//!
//! A transport provides two capabilities: [`Dial`] connects a client and
//! returns a [`Connection`], [`Listen`] accepts connections and hands each
//! one to a callback. Every connection carries exactly one request/response
//! exchange.

pub mod pipe;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub use pipe::{PipeConnection, PipeDialer, PipeListener};

/// A duplex byte stream owned by one exchange.
///
/// Half-close is optional: when [`Connection::supports_half_close`] is true,
/// `AsyncWrite::poll_shutdown` signals end of writes while reads stay open.
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    fn supports_half_close(&self) -> bool {
        false
    }
}

pub type BoxConnection = Box<dyn Connection>;

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn supports_half_close(&self) -> bool {
        (**self).supports_half_close()
    }
}

impl Connection for DuplexStream {
    fn supports_half_close(&self) -> bool {
        true
    }
}

#[cfg(unix)]
impl Connection for tokio::net::UnixStream {
    fn supports_half_close(&self) -> bool {
        true
    }
}

/// Client side: connect and return a stream.
pub trait Dial: Send + Sync + 'static {
    type Connection: Connection;

    fn dial(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Self::Connection>> + Send;
}

impl<D: Dial> Dial for Arc<D> {
    type Connection = D::Connection;

    fn dial(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Self::Connection>> + Send {
        (**self).dial(cancel)
    }
}

pub type ConnectionFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Callback invoked once per accepted connection.
///
/// The returned future runs detached from the accept loop and must deal with
/// its own errors.
pub type OnConnection = Arc<dyn Fn(BoxConnection) -> ConnectionFuture + Send + Sync>;

/// Wraps an async closure as an [`OnConnection`] callback.
pub fn on_connection<F, Fut>(f: F) -> OnConnection
where
    F: Fn(BoxConnection) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |conn| -> ConnectionFuture { Box::pin(f(conn)) })
}

/// Server side: accept connections until stopped.
pub trait Listen: Send + 'static {
    /// Starts accepting. When this returns `Ok`, an acceptor is available to
    /// clients until [`Listen::stop`] completes. Cancelling `cancel` stops
    /// the accept loops as well.
    fn listen(
        &mut self,
        on_connection: OnConnection,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Stops accepting and waits for the accept loops to finish.
    fn stop(&mut self) -> impl Future<Output = Result<()>> + Send;
}
