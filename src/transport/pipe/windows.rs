//! Windows named pipes.
//!
//! A named pipe has no listen backlog: a client can only connect while some
//! server instance exists, and the name disappears when the last instance is
//! closed. The listener therefore self-connects a throwaway client to a first
//! instance before returning, keeping the name alive until `stop`, and every
//! accept loop creates its next instance before dispatching a connection.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::windows::named_pipe::{
    ClientOptions, NamedPipeClient, NamedPipeServer, PipeMode, ServerOptions,
};
use tokio::time::{Instant, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::config::{PipeConfig, TransmissionMode};
use crate::error::{Error, Result};
use crate::transport::Connection;

const ERROR_BROKEN_PIPE: i32 = 109;
const ERROR_PIPE_BUSY: i32 = 231;
const ERROR_NO_DATA: i32 = 232;
const ERROR_PIPE_NOT_CONNECTED: i32 = 233;

const MAX_BUSY_POLL: Duration = Duration::from_millis(50);

/// Full path of a pipe, `\\<server>\pipe\<name>`.
pub fn pipe_address(server_name: &str, name: &str) -> String {
    format!(r"\\{server_name}\pipe\{name}")
}

fn pipe_mode(mode: TransmissionMode) -> PipeMode {
    match mode {
        TransmissionMode::Byte => PipeMode::Byte,
        TransmissionMode::Message => PipeMode::Message,
    }
}

pub(super) struct Acceptor {
    address: String,
    options: ServerOptions,
}

/// Throwaway client and the instance it is connected to.
pub(super) struct Bootstrap {
    _client: NamedPipeClient,
    _server: NamedPipeServer,
}

pub(super) struct Pending {
    server: NamedPipeServer,
}

impl Acceptor {
    pub(super) async fn bind(cfg: &PipeConfig) -> Result<(Self, Bootstrap, Pending)> {
        let mut options = ServerOptions::new();
        options
            .pipe_mode(pipe_mode(cfg.transmission_mode))
            .in_buffer_size(cfg.in_buffer_size)
            .out_buffer_size(cfg.out_buffer_size);
        if let Some(max) = cfg.max_instances {
            options.max_instances(max);
        }

        let acceptor = Self {
            address: pipe_address(".", &cfg.name),
            options,
        };
        let bootstrap = acceptor.bootstrap(cfg).await?;
        let first = acceptor.create_instance()?;
        Ok((acceptor, bootstrap, first))
    }

    async fn bootstrap(&self, cfg: &PipeConfig) -> Result<Bootstrap> {
        let wait = cfg.bootstrap_connect_timeout();
        for attempt in 1..=cfg.bootstrap_attempts {
            let server = self.create_instance()?.server;

            let client = match open_client(&self.address, cfg, wait).await {
                Ok(client) => client,
                Err(e) => {
                    debug!(
                        attempt,
                        error = %e,
                        "bootstrap client could not connect, usually because a real client \
                         connected first; recreating instance"
                    );
                    let _ = server.disconnect();
                    continue;
                }
            };

            match timeout(wait, server.connect()).await {
                Ok(Ok(())) => {
                    debug!(attempt, "bootstrap connection established");
                    return Ok(Bootstrap {
                        _client: client,
                        _server: server,
                    });
                }
                Ok(Err(e)) => debug!(attempt, error = %e, "bootstrap instance failed to connect"),
                Err(_) => debug!(attempt, "bootstrap instance did not observe its client"),
            }
            let _ = server.disconnect();
        }

        error!(
            pipe = %self.address,
            attempts = cfg.bootstrap_attempts,
            "could not start listener: bootstrap connection failed"
        );
        Err(Error::ListenerStartFailed {
            attempts: cfg.bootstrap_attempts,
        })
    }

    pub(super) fn create_instance(&self) -> io::Result<Pending> {
        let server = self.options.create(&self.address)?;
        Ok(Pending { server })
    }

    pub(super) fn cleanup(&self) {}
}

impl Pending {
    pub(super) async fn accept(self) -> io::Result<PipeConnection> {
        self.server.connect().await?;
        Ok(PipeConnection::Server(self.server))
    }
}

pub(super) fn is_early_disconnect(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::BrokenPipe
        || matches!(
            e.raw_os_error(),
            Some(ERROR_BROKEN_PIPE | ERROR_NO_DATA | ERROR_PIPE_NOT_CONNECTED)
        )
}

/// Opens a client, polling while every instance is busy until `wait` elapses.
async fn open_client(address: &str, cfg: &PipeConfig, wait: Duration) -> io::Result<NamedPipeClient> {
    let deadline = Instant::now() + wait;
    let poll = (wait / 10).clamp(Duration::from_millis(1), MAX_BUSY_POLL);
    loop {
        match ClientOptions::new()
            .pipe_mode(pipe_mode(cfg.transmission_mode))
            .open(address)
        {
            Ok(client) => return Ok(client),
            Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) => {
                trace!(pipe = %address, "all pipe instances busy");
            }
            Err(e) => return Err(e),
        }
        if Instant::now() >= deadline {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "pipe busy"));
        }
        sleep(poll).await;
    }
}

pub(super) async fn connect(cfg: &PipeConfig, cancel: &CancellationToken) -> Result<PipeConnection> {
    let address = pipe_address(&cfg.server_name, &cfg.name);
    let client = tokio::select! {
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        res = open_client(&address, cfg, cfg.connect_timeout()) => match res {
            Ok(client) => client,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => return Err(Error::ConnectTimeout(address)),
            Err(e) => return Err(e.into()),
        },
    };
    Ok(PipeConnection::Client(client))
}

/// One end of a pipe connection.
#[derive(Debug)]
pub enum PipeConnection {
    Server(NamedPipeServer),
    Client(NamedPipeClient),
}

impl Connection for PipeConnection {}

impl AsyncRead for PipeConnection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let res = match self.get_mut() {
            PipeConnection::Server(pipe) => Pin::new(pipe).poll_read(cx, buf),
            PipeConnection::Client(pipe) => Pin::new(pipe).poll_read(cx, buf),
        };
        // the peer closing its end reads as end of stream
        match res {
            Poll::Ready(Err(e)) if is_early_disconnect(&e) => Poll::Ready(Ok(())),
            other => other,
        }
    }
}

impl AsyncWrite for PipeConnection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            PipeConnection::Server(pipe) => Pin::new(pipe).poll_write(cx, buf),
            PipeConnection::Client(pipe) => Pin::new(pipe).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            PipeConnection::Server(pipe) => Pin::new(pipe).poll_flush(cx),
            PipeConnection::Client(pipe) => Pin::new(pipe).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            PipeConnection::Server(pipe) => Pin::new(pipe).poll_shutdown(cx),
            PipeConnection::Client(pipe) => Pin::new(pipe).poll_shutdown(cx),
        }
    }
}
