//! Server side: request handlers and the listener host.

pub mod listener;

use std::fmt;
use std::future::Future;

use tokio::io::ReadHalf;

use crate::http::body::PrefixedBodyStream;
use crate::http::request::RequestHead;
use crate::http::response::Response;
use crate::transport::BoxConnection;

pub use listener::Server;

/// Request body as seen by a handler.
///
/// Replays the bytes buffered while parsing the head, then reads from the
/// connection up to `Content-Length`. Without a `Content-Length` it reads
/// until the client half-closes.
pub type IncomingBody = PrefixedBodyStream<ReadHalf<BoxConnection>>;

/// A parsed request handed to a [`Handler`].
pub struct IncomingRequest {
    pub head: RequestHead,
    pub body: IncomingBody,
}

impl fmt::Debug for IncomingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingRequest")
            .field("head", &self.head)
            .field("remaining", &self.body.remaining())
            .finish()
    }
}

pub trait Handler: Send + Sync + 'static {
    /// Produces the response for one request. An error is answered with
    /// `500 Internal Server Error` and ends the connection.
    fn handle(
        &self,
        request: IncomingRequest,
    ) -> impl Future<Output = anyhow::Result<Response>> + Send;
}

impl<F, Fut> Handler for F
where
    F: Fn(IncomingRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Response>> + Send,
{
    fn handle(
        &self,
        request: IncomingRequest,
    ) -> impl Future<Output = anyhow::Result<Response>> + Send {
        self(request)
    }
}
