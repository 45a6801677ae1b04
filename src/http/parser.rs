use tokio::io::AsyncRead;

use crate::error::{Error, Result};
use crate::http::HTTP_10;
use crate::http::headers::HeaderList;
use crate::http::line_reader::LineReader;
use crate::http::request::{Method, RequestHead};
use crate::http::response::{ResponseHead, StatusLine};

/// `"HTTP/1.x ddd"`
const MIN_STATUS_LINE_LENGTH: usize = 12;

fn ascii(line: &[u8]) -> Option<&str> {
    if line.is_ascii() {
        std::str::from_utf8(line).ok()
    } else {
        None
    }
}

fn lossy(line: &[u8]) -> String {
    String::from_utf8_lossy(line).into_owned()
}

/// Splits `Name: v1, v2` into the trimmed name and its comma-separated values.
pub fn parse_header_line(line: &[u8]) -> Result<(String, Vec<String>)> {
    let line = ascii(line).ok_or_else(|| Error::NonAsciiHeader(lossy(line)))?;
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| Error::InvalidHeader(line.to_string()))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidHeader(line.to_string()));
    }

    let values = value.split(',').map(|v| v.trim().to_string()).collect();
    Ok((name.to_string(), values))
}

/// Parses `METHOD SP target SP HTTP/1.0`.
pub fn parse_request_line(line: &[u8]) -> Result<(Method, String, String)> {
    let text = ascii(line).ok_or_else(|| Error::InvalidRequestLine(lossy(line)))?;
    let mut parts = text.split(' ');

    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(Error::InvalidRequestLine(text.to_string()));
    };
    if method.is_empty() || target.is_empty() || version.is_empty() {
        return Err(Error::InvalidRequestLine(text.to_string()));
    }
    if version != HTTP_10 {
        return Err(Error::UnsupportedVersion(version.to_string()));
    }

    let method = method
        .parse::<Method>()
        .map_err(|_| Error::InvalidRequestLine(text.to_string()))?;
    Ok((method, target.to_string(), version.to_string()))
}

/// Parses `HTTP/1.0 SP ddd [SP reason]`.
pub fn parse_status_line(line: &[u8]) -> Result<StatusLine> {
    let invalid = || Error::InvalidStatusLine(lossy(line));

    if line.len() < MIN_STATUS_LINE_LENGTH || line[8] != b' ' {
        return Err(invalid());
    }
    if &line[..8] != HTTP_10.as_bytes() {
        return Err(Error::UnsupportedVersion(lossy(&line[..8])));
    }

    let digits = &line[9..12];
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(invalid());
    }
    let code = digits
        .iter()
        .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'));

    let reason = match line.get(MIN_STATUS_LINE_LENGTH) {
        None => String::new(),
        Some(b' ') => ascii(&line[MIN_STATUS_LINE_LENGTH + 1..])
            .ok_or_else(invalid)?
            .to_string(),
        Some(_) => return Err(invalid()),
    };

    Ok(StatusLine {
        version: HTTP_10.to_string(),
        code,
        reason,
    })
}

/// Reads header lines up to and including the blank terminator line.
pub async fn read_headers<R>(reader: &mut LineReader<R>) -> Result<HeaderList>
where
    R: AsyncRead + Unpin,
{
    let mut headers = HeaderList::new();
    loop {
        let line = reader.next_line().await?;
        if line.is_empty() {
            return Ok(headers);
        }
        let (name, values) = parse_header_line(&line)?;
        headers.append(name, values);
    }
}

pub async fn read_request_head<R>(reader: &mut LineReader<R>) -> Result<RequestHead>
where
    R: AsyncRead + Unpin,
{
    let line = reader.next_line().await?;
    let (method, target, version) = parse_request_line(&line)?;
    let headers = read_headers(reader).await?;

    Ok(RequestHead {
        method,
        target,
        version,
        headers,
    })
}

pub async fn read_response_head<R>(reader: &mut LineReader<R>) -> Result<ResponseHead>
where
    R: AsyncRead + Unpin,
{
    let line = reader.next_line().await?;
    let status = parse_status_line(&line)?;
    let headers = read_headers(reader).await?;

    Ok(ResponseHead { status, headers })
}
