//! Named-pipe transport.
//!
//! [`PipeListener`] runs a small fixed pool of accept loops, each owning at
//! most one pending server instance. An accepted connection is dispatched on
//! its own detached task so the loop can go straight back to waiting;
//! throughput is bounded by the number of loops, not by handler latency.
//!
//! On Windows this is a real named pipe. On Unix the pipe name maps to a Unix
//! domain socket, see [`socket_path`].

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
use unix as sys;
#[cfg(windows)]
use windows as sys;

#[cfg(unix)]
pub use unix::socket_path;
#[cfg(windows)]
pub use windows::pipe_address;

pub use sys::PipeConnection;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::PipeConfig;
use crate::error::{Error, Result};
use crate::transport::{Dial, Listen, OnConnection};

/// Pause before retrying after an instance could not be created.
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Client side of the pipe transport.
#[derive(Debug, Clone)]
pub struct PipeDialer {
    config: PipeConfig,
}

impl PipeDialer {
    pub fn new(config: PipeConfig) -> Self {
        Self { config }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(PipeConfig::named(name))
    }

    pub fn config(&self) -> &PipeConfig {
        &self.config
    }
}

impl Dial for PipeDialer {
    type Connection = PipeConnection;

    async fn dial(&self, cancel: &CancellationToken) -> Result<PipeConnection> {
        sys::connect(&self.config, cancel).await
    }
}

struct Running {
    cancel: CancellationToken,
    workers: JoinSet<()>,
    acceptor: Arc<sys::Acceptor>,
    bootstrap: sys::Bootstrap,
}

/// Server side of the pipe transport.
pub struct PipeListener {
    config: PipeConfig,
    running: Option<Running>,
}

impl PipeListener {
    pub fn new(config: PipeConfig) -> Self {
        Self {
            config,
            running: None,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(PipeConfig::named(name))
    }

    pub fn config(&self) -> &PipeConfig {
        &self.config
    }

    pub fn is_listening(&self) -> bool {
        self.running.is_some()
    }
}

impl Listen for PipeListener {
    async fn listen(&mut self, on_connection: OnConnection, cancel: &CancellationToken) -> Result<()> {
        if self.running.is_some() {
            return Err(Error::AlreadyListening);
        }
        self.config
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;

        // An instance exists and accepts clients before this returns.
        let (acceptor, bootstrap, first) = sys::Acceptor::bind(&self.config).await?;
        let acceptor = Arc::new(acceptor);
        let cancel = cancel.child_token();

        let mut workers = JoinSet::new();
        let mut first = Some(first);
        for worker in 0..self.config.workers {
            workers.spawn(accept_loop(
                worker,
                Arc::clone(&acceptor),
                first.take(),
                Arc::clone(&on_connection),
                cancel.clone(),
            ));
        }

        info!(pipe = %self.config.name, workers = self.config.workers, "Listening");
        self.running = Some(Running {
            cancel,
            workers,
            acceptor,
            bootstrap,
        });
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        let Some(mut running) = self.running.take() else {
            return Ok(());
        };
        running.cancel.cancel();

        let joined = timeout(self.config.stop_timeout(), async {
            while let Some(res) = running.workers.join_next().await {
                if let Err(e) = res {
                    if e.is_panic() {
                        error!(error = %e, "accept loop panicked");
                    }
                }
            }
        })
        .await;
        if joined.is_err() {
            warn!(
                pipe = %self.config.name,
                remaining = running.workers.len(),
                "accept loops did not stop in time, aborting"
            );
            running.workers.shutdown().await;
        }

        running.acceptor.cleanup();
        drop(running.bootstrap);
        info!(pipe = %self.config.name, "Stopped listening");
        Ok(())
    }
}

impl Drop for PipeListener {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
            running.acceptor.cleanup();
        }
    }
}

async fn accept_loop(
    worker: usize,
    acceptor: Arc<sys::Acceptor>,
    mut pending: Option<sys::Pending>,
    on_connection: OnConnection,
    cancel: CancellationToken,
) {
    while !cancel.is_cancelled() {
        let instance = match pending.take() {
            Some(instance) => instance,
            None => match acceptor.create_instance() {
                Ok(instance) => instance,
                Err(e) => {
                    error!(worker, error = %e, "failed to create server instance");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = sleep(RETRY_DELAY) => continue,
                    }
                }
            },
        };

        trace!(worker, "waiting for connection");
        let accepted = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(worker, "cancelling server wait");
                break;
            }
            accepted = instance.accept() => accepted,
        };

        match accepted {
            Ok(conn) => {
                trace!(worker, "accepted connection");
                // keep an instance pending before handing this one off
                match acceptor.create_instance() {
                    Ok(next) => pending = Some(next),
                    Err(e) => error!(worker, error = %e, "failed to create server instance"),
                }
                tokio::spawn((*on_connection)(Box::new(conn)));
            }
            Err(e) if sys::is_early_disconnect(&e) => {
                debug!(worker, error = %e, "client disconnected before the connection was established");
            }
            Err(e) => {
                warn!(worker, error = %e, "error waiting for connection, recreating instance");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(RETRY_DELAY) => {}
                }
            }
        }
    }
    debug!(worker, "accept loop stopped");
}
