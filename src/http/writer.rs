use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::config::CodecConfig;
use crate::error::{Error, Result};
use crate::http::HTTP_10;
use crate::http::headers::{HeaderList, value_separator};
use crate::http::request::Method;
use crate::http::response::StatusLine;

const LINE_END: &[u8] = b"\n";
const MAX_STATUS_CODE: u16 = 999;

/// Buffers head bytes and writes them to the stream when the fixed-size
/// buffer fills up or on [`HeaderWriter::flush`].
///
/// Callers never deal with the buffer boundary; every write splits across
/// flushes as needed.
pub struct HeaderWriter<W> {
    inner: W,
    buf: Vec<u8>,
    capacity: usize,
}

impl<W> HeaderWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(inner: W) -> Self {
        Self::from_config(inner, &CodecConfig::default())
    }

    pub fn from_config(inner: W, cfg: &CodecConfig) -> Self {
        Self::with_capacity(inner, cfg.header_buffer_size)
    }

    pub fn with_capacity(inner: W, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner,
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of bytes waiting in the buffer.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    async fn write_buffer(&mut self) -> Result<()> {
        if !self.buf.is_empty() {
            self.inner.write_all(&self.buf).await?;
            self.buf.clear();
        }
        Ok(())
    }

    pub async fn write_byte(&mut self, b: u8) -> Result<()> {
        if self.buf.len() == self.capacity {
            self.write_buffer().await?;
        }
        self.buf.push(b);
        Ok(())
    }

    pub async fn write_bytes(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            if self.buf.len() == self.capacity {
                self.write_buffer().await?;
            }
            let n = (self.capacity - self.buf.len()).min(bytes.len());
            self.buf.extend_from_slice(&bytes[..n]);
            bytes = &bytes[n..];
        }
        Ok(())
    }

    /// Writes `s`, failing without writing anything if it is not 7-bit ASCII.
    pub async fn write_str(&mut self, s: &str) -> Result<()> {
        if !s.is_ascii() {
            return Err(Error::NonAsciiHeader(s.to_string()));
        }
        self.write_bytes(s.as_bytes()).await
    }

    /// Writes out the buffer and flushes the underlying stream.
    pub async fn flush(&mut self) -> Result<()> {
        self.write_buffer().await?;
        self.inner.flush().await?;
        Ok(())
    }

    async fn write_headers(&mut self, headers: &HeaderList) -> Result<()> {
        for (name, values) in headers.iter() {
            self.write_str(name).await?;
            self.write_bytes(b": ").await?;
            let separator = value_separator(name);
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    self.write_str(separator).await?;
                }
                self.write_str(value).await?;
            }
            self.write_bytes(LINE_END).await?;
        }
        Ok(())
    }

    /// Writes `METHOD target HTTP/1.0`, the headers and the blank line.
    ///
    /// `target` must already be escaped.
    pub async fn write_request_head(
        &mut self,
        method: &Method,
        target: &str,
        headers: &HeaderList,
    ) -> Result<()> {
        self.write_str(method.as_str()).await?;
        self.write_byte(b' ').await?;
        self.write_str(target).await?;
        self.write_byte(b' ').await?;
        self.write_str(HTTP_10).await?;
        self.write_bytes(LINE_END).await?;
        self.write_headers(headers).await?;
        self.write_bytes(LINE_END).await
    }

    /// Writes `protocol code reason`, the headers and the blank line.
    ///
    /// Codes above 999 are rejected before anything is buffered.
    pub async fn write_status_head(&mut self, status: &StatusLine, headers: &HeaderList) -> Result<()> {
        if status.code > MAX_STATUS_CODE {
            return Err(Error::InvalidStatusCode(status.code));
        }
        self.write_str(&status.version).await?;
        self.write_byte(b' ').await?;
        self.write_str(&format!("{:03}", status.code)).await?;
        self.write_byte(b' ').await?;
        self.write_str(&status.reason).await?;
        self.write_bytes(LINE_END).await?;
        self.write_headers(headers).await?;
        self.write_bytes(LINE_END).await
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Returns the stream. Bytes still buffered are discarded, so flush first.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_status_head() {
        let mut headers = HeaderList::new();
        headers.push("Content-Length", "2");
        let mut writer = HeaderWriter::with_capacity(Vec::new(), 3);

        writer
            .write_status_head(&StatusLine::new(200, "OK"), &headers)
            .await
            .unwrap();
        writer.flush().await.unwrap();

        assert_eq!(writer.into_inner(), b"HTTP/1.0 200 OK\nContent-Length: 2\n\n");
    }
}
