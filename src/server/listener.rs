use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::CodecConfig;
use crate::error::{Error, Result};
use crate::http::connection::serve_connection;
use crate::server::Handler;
use crate::transport::{Listen, on_connection};

/// Hosts a [`Handler`] on a [`Listen`] transport.
pub struct Server<L, H> {
    listener: L,
    handler: Arc<H>,
    codec: CodecConfig,
    cancel: CancellationToken,
}

impl<L, H> Server<L, H>
where
    L: Listen,
    H: Handler,
{
    pub fn new(listener: L, handler: H, codec: CodecConfig) -> Self {
        Self {
            listener,
            handler: Arc::new(handler),
            codec,
            cancel: CancellationToken::new(),
        }
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    /// Starts the listener. Once this returns clients can connect.
    pub async fn start(&mut self) -> Result<()> {
        let handler = Arc::clone(&self.handler);
        let codec = self.codec.clone();

        let callback = on_connection(move |conn| {
            let handler = Arc::clone(&handler);
            let codec = codec.clone();
            async move {
                match serve_connection(conn, &*handler, &codec).await {
                    Ok(()) => {}
                    Err(e @ Error::Handler(_)) => error!(error = %e, "Request failed"),
                    Err(e) if e.is_framing() => warn!(error = %e, "Malformed request"),
                    Err(e) => debug!(error = %e, "Connection error"),
                }
            }
        });

        self.listener.listen(callback, &self.cancel).await
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.cancel.cancel();
        let res = self.listener.stop().await;
        self.cancel = CancellationToken::new();
        res
    }

    /// Serves until `shutdown` resolves, then stops the listener.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        info!("Shutdown signal received");
        self.stop().await
    }
}
