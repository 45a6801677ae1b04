//! Unix flavour: a Unix domain socket stands in for the named pipe.
//!
//! The listening socket keeps a kernel backlog, so an acceptor is available
//! for as long as the socket is bound and no self-connect bootstrap is needed.

use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::PipeConfig;
use crate::error::{Error, Result};
use crate::transport::Connection;

/// Socket path for a pipe name. Names containing `/` are used verbatim.
pub fn socket_path(name: &str) -> PathBuf {
    if name.contains('/') {
        PathBuf::from(name)
    } else {
        std::env::temp_dir().join(format!("httpipe-{name}.sock"))
    }
}

/// Binds `path`, replacing a stale socket file left by a previous run.
fn bind(path: &Path) -> io::Result<UnixListener> {
    match UnixListener::bind(path) {
        Ok(listener) => return Ok(listener),
        Err(e) if e.kind() == io::ErrorKind::AddrInUse => {}
        Err(e) => return Err(e),
    }

    let file_type = std::fs::symlink_metadata(path)?.file_type();
    if file_type.is_symlink() || !file_type.is_socket() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists and is not a socket", path.display()),
        ));
    }
    // a live server would have accepted this
    if std::os::unix::net::UnixStream::connect(path).is_ok() {
        return Err(io::Error::new(
            io::ErrorKind::AddrInUse,
            format!("{} is served by another listener", path.display()),
        ));
    }

    debug!(path = %path.display(), "removing stale socket");
    std::fs::remove_file(path)?;
    UnixListener::bind(path)
}

pub(super) struct Acceptor {
    listener: Arc<UnixListener>,
    path: PathBuf,
}

/// Nothing to hold: the bound socket already guarantees availability.
pub(super) struct Bootstrap;

pub(super) struct Pending {
    listener: Arc<UnixListener>,
}

impl Acceptor {
    pub(super) async fn bind(cfg: &PipeConfig) -> Result<(Self, Bootstrap, Pending)> {
        let path = socket_path(&cfg.name);
        let listener = Arc::new(bind(&path)?);
        let acceptor = Self { listener, path };
        let first = acceptor.create_instance()?;
        Ok((acceptor, Bootstrap, first))
    }

    pub(super) fn create_instance(&self) -> io::Result<Pending> {
        Ok(Pending {
            listener: Arc::clone(&self.listener),
        })
    }

    pub(super) fn cleanup(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                debug!(path = %self.path.display(), error = %e, "failed to remove socket file");
            }
        }
    }
}

impl Pending {
    pub(super) async fn accept(self) -> io::Result<PipeConnection> {
        let (stream, _) = self.listener.accept().await?;
        Ok(PipeConnection { stream })
    }
}

pub(super) fn is_early_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe
    )
}

pub(super) async fn connect(cfg: &PipeConfig, cancel: &CancellationToken) -> Result<PipeConnection> {
    let path = socket_path(&cfg.name);
    let connect = tokio::time::timeout(cfg.connect_timeout(), UnixStream::connect(&path));

    let stream = tokio::select! {
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        res = connect => match res {
            Ok(stream) => stream?,
            Err(_) => return Err(Error::ConnectTimeout(path.display().to_string())),
        },
    };
    Ok(PipeConnection { stream })
}

/// One end of a pipe connection.
#[derive(Debug)]
pub struct PipeConnection {
    stream: UnixStream,
}

impl PipeConnection {
    pub fn get_ref(&self) -> &UnixStream {
        &self.stream
    }
}

impl Connection for PipeConnection {
    fn supports_half_close(&self) -> bool {
        true
    }
}

impl AsyncRead for PipeConnection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        // a peer that closed with our bytes unread shows up as a reset
        match Pin::new(&mut self.stream).poll_read(cx, buf) {
            Poll::Ready(Err(e)) if e.kind() == io::ErrorKind::ConnectionReset => Poll::Ready(Ok(())),
            other => other,
        }
    }
}

impl AsyncWrite for PipeConnection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}
