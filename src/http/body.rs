//! Read-only body views over a connection.
//!
//! [`BodyStream`] stops at a declared content length no matter how much the
//! connection still holds. [`PrefixedBodyStream`] first replays bytes the
//! line reader pulled off the wire past the header block, then continues on
//! the connection, with one length bound measured across both sources.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, ReadBuf};

/// Body bounded by an optional content length.
///
/// With no length the body runs until the underlying stream reports EOF.
/// Once the bound is reached reads return 0 without touching the stream.
#[derive(Debug)]
pub struct BodyStream<R> {
    inner: Option<R>,
    length: Option<u64>,
    read: u64,
    close_on_end: bool,
}

impl<R> BodyStream<R> {
    pub fn new(inner: R, length: Option<u64>) -> Self {
        Self {
            inner: Some(inner),
            length,
            read: 0,
            close_on_end: false,
        }
    }

    /// Like [`BodyStream::new`], but drops `inner` as soon as the bound is
    /// reached so the connection is released before the body is.
    pub fn closing(inner: R, length: Option<u64>) -> Self {
        Self {
            close_on_end: true,
            ..Self::new(inner, length)
        }
    }

    pub fn length(&self) -> Option<u64> {
        self.length
    }

    pub fn bytes_read(&self) -> u64 {
        self.read
    }

    /// Bytes left before the bound, `None` when unbounded.
    pub fn remaining(&self) -> Option<u64> {
        self.length.map(|len| len.saturating_sub(self.read))
    }

    /// Whether the underlying stream has been released.
    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }

    pub fn get_ref(&self) -> Option<&R> {
        self.inner.as_ref()
    }

    pub fn into_inner(self) -> Option<R> {
        self.inner
    }

    fn release_if_complete(&mut self) {
        if self.close_on_end && self.remaining() == Some(0) {
            self.inner = None;
        }
    }
}

impl<R> AsyncRead for BodyStream<R>
where
    R: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        let remaining = this.remaining();
        if remaining == Some(0) {
            this.release_if_complete();
            return Poll::Ready(Ok(()));
        }
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(Ok(()));
        };
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        let max = match remaining {
            Some(r) => r.min(buf.remaining() as u64) as usize,
            None => buf.remaining(),
        };
        let mut limited = ReadBuf::new(buf.initialize_unfilled_to(max));
        ready!(Pin::new(inner).poll_read(cx, &mut limited))?;
        let n = limited.filled().len();

        buf.advance(n);
        this.read += n as u64;
        this.release_if_complete();
        Poll::Ready(Ok(()))
    }
}

/// Body that drains already-buffered bytes before reading the connection.
#[derive(Debug)]
pub struct PrefixedBodyStream<R> {
    prefix: Bytes,
    body: BodyStream<R>,
}

impl<R> PrefixedBodyStream<R> {
    pub fn new(prefix: Bytes, inner: R, length: Option<u64>) -> Self {
        Self::build(prefix, inner, length, false)
    }

    pub fn closing(prefix: Bytes, inner: R, length: Option<u64>) -> Self {
        Self::build(prefix, inner, length, true)
    }

    fn build(mut prefix: Bytes, inner: R, length: Option<u64>, close_on_end: bool) -> Self {
        if let Some(len) = length {
            if prefix.len() as u64 > len {
                prefix.truncate(len as usize);
            }
        }
        let rest = length.map(|len| len - prefix.len() as u64);
        let body = if close_on_end {
            BodyStream::closing(inner, rest)
        } else {
            BodyStream::new(inner, rest)
        };

        let mut stream = Self { prefix, body };
        if stream.prefix.is_empty() {
            stream.body.release_if_complete();
        }
        stream
    }

    /// Bytes left before the bound, `None` when unbounded.
    pub fn remaining(&self) -> Option<u64> {
        self.body
            .remaining()
            .map(|rest| rest + self.prefix.len() as u64)
    }

    pub fn is_released(&self) -> bool {
        self.body.is_released()
    }

    pub fn get_ref(&self) -> Option<&R> {
        self.body.get_ref()
    }

    /// Splits into the unread prefix bytes and the underlying stream.
    pub fn into_parts(self) -> (Bytes, Option<R>) {
        (self.prefix, self.body.into_inner())
    }
}

impl<R> AsyncRead for PrefixedBodyStream<R>
where
    R: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if !this.prefix.is_empty() {
            let n = this.prefix.len().min(buf.remaining());
            buf.put_slice(&this.prefix[..n]);
            this.prefix.advance(n);
            if this.prefix.is_empty() {
                this.body.release_if_complete();
            }
            return Poll::Ready(Ok(()));
        }

        Pin::new(&mut this.body).poll_read(cx, buf)
    }
}
