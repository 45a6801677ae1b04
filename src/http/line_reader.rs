use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::CodecConfig;
use crate::error::{Error, Result};

/// Buffered scanner yielding LF or CRLF terminated lines from a stream.
///
/// The buffer starts at a configured size and doubles whenever it fills up
/// without holding a complete line. Bytes read past the last returned line
/// stay buffered and are handed back by [`LineReader::into_parts`], so a body
/// that follows the header block is not lost.
pub struct LineReader<R> {
    inner: R,
    buf: BytesMut,
    buffer_size: usize,
    max_line_length: usize,
}

impl<R> LineReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(inner: R) -> Self {
        Self::from_config(inner, &CodecConfig::default())
    }

    pub fn from_config(inner: R, cfg: &CodecConfig) -> Self {
        Self::with_capacity(inner, cfg.line_buffer_size, cfg.max_line_length)
    }

    pub fn with_capacity(inner: R, buffer_size: usize, max_line_length: usize) -> Self {
        let buffer_size = buffer_size.max(1);
        Self {
            inner,
            buf: BytesMut::with_capacity(buffer_size),
            buffer_size,
            max_line_length,
        }
    }

    /// Returns the next line without its terminator or trailing `\r`.
    ///
    /// End of stream before a `\n` is [`Error::UnexpectedEndOfStream`]; a
    /// blank line comes back as an empty slice.
    pub async fn next_line(&mut self) -> Result<Bytes> {
        let mut scanned = 0;
        loop {
            if let Some(pos) = self.buf[scanned..].iter().position(|&b| b == b'\n') {
                let mut line = self.buf.split_to(scanned + pos + 1);
                line.truncate(line.len() - 1);
                if line.last() == Some(&b'\r') {
                    line.truncate(line.len() - 1);
                }
                return Ok(line.freeze());
            }
            scanned = self.buf.len();
            if scanned > self.max_line_length {
                return Err(Error::LineTooLong(self.max_line_length));
            }
            self.fill().await?;
        }
    }

    /// Performs exactly one read from the underlying stream.
    async fn fill(&mut self) -> Result<()> {
        // full without a complete line
        while self.buf.len() >= self.buffer_size {
            self.buffer_size *= 2;
        }
        // reserve shifts unconsumed bytes back to the head when it can
        self.buf.reserve(self.buffer_size - self.buf.len());

        let n = self.inner.read_buf(&mut self.buf).await?;
        if n == 0 {
            return Err(Error::UnexpectedEndOfStream);
        }
        Ok(())
    }

    /// Bytes already read off the stream but not returned as a line.
    pub fn remaining(&self) -> &[u8] {
        &self.buf
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_parts(self) -> (Bytes, R) {
        (self.buf.freeze(), self.inner)
    }
}
