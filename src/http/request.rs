//! Bounded header read and start-line/header parsing.
//!
//! Unlike the zero-copy, `'static`-transmuting parser this crate's ancestor
//! used, everything here is owned: a proxied request is read once, forwarded
//! or answered, and thrown away, so there is no connection-lifetime buffer to
//! amortize across many requests.

use memchr::memmem;
use tokio::{io::AsyncReadExt, net::TcpStream, time::timeout};

use crate::limits::ConnLimits;

/// A parsed request-line plus header block.
///
/// `headers` preserves every line in wire order (duplicates included) so the
/// forwarder can replay the original request faithfully; `header()` performs
/// the case-insensitive, last-occurrence-wins lookup the parser contract
/// promises for semantic reads like `Host`.
pub struct ParsedRequest {
    pub method: String,
    pub target: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    /// Bytes that followed the first `CRLF CRLF` in the read buffer.
    pub leftover_body: Vec<u8>,
}

impl ParsedRequest {
    /// Last value associated with `name`, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Reads from `stream` until `CRLF CRLF` appears, the byte cap is hit, or the
/// per-read idle timeout elapses — whichever comes first.
///
/// Returns `None` on timeout, zero-byte read, or hitting the cap without
/// finding the terminator; the caller closes the connection without logging
/// in every one of those cases, so they are collapsed into a single signal.
pub async fn read_header_block(stream: &mut TcpStream, limits: &ConnLimits) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        if memmem::find(&buf, b"\r\n\r\n").is_some() {
            return Some(buf);
        }
        if buf.len() >= limits.max_header_bytes {
            return None;
        }

        let read = timeout(limits.header_read_timeout, stream.read(&mut chunk)).await;
        match read {
            Ok(Ok(0)) | Err(_) => return None,
            Ok(Ok(n)) => buf.extend_from_slice(&chunk[..n]),
            Ok(Err(_)) => return None,
        }
    }
}

/// Parses the header block from [`read_header_block`].
///
/// Decodes every byte as Latin-1: each byte maps 1:1 to the codepoint of the
/// same value, so the result is always valid UTF-8 by construction and no
/// information is lost or rejected regardless of what the client sent.
pub fn parse(buf: &[u8]) -> Option<ParsedRequest> {
    let split_at = memmem::find(buf, b"\r\n\r\n")?;
    let header_part = &buf[..split_at];
    let leftover_body = buf[split_at + 4..].to_vec();

    let mut lines = header_part.split(|&b| b == b'\n').map(strip_cr);

    let first_line = latin1_decode(lines.next()?);
    let mut parts = first_line.splitn(3, ' ');
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();
    let version = parts.next()?.to_string();
    if target.is_empty() || version.is_empty() {
        return None;
    }

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let decoded = latin1_decode(line);
        if let Some((name, value)) = decoded.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    Some(ParsedRequest {
        method,
        target,
        version,
        headers,
        leftover_body,
    })
}

/// Reads the remaining body bytes for the admin surface's small JSON
/// requests: `leftover` is whatever the header read already captured past
/// `CRLF CRLF`; this tops it up to `content_length` or gives up past the
/// header read timeout.
pub async fn read_body(
    stream: &mut TcpStream,
    mut leftover: Vec<u8>,
    content_length: usize,
    limits: &ConnLimits,
) -> Vec<u8> {
    let mut chunk = [0u8; 4096];
    while leftover.len() < content_length {
        let read = timeout(limits.header_read_timeout, stream.read(&mut chunk)).await;
        match read {
            Ok(Ok(0)) | Err(_) | Ok(Err(_)) => break,
            Ok(Ok(n)) => leftover.extend_from_slice(&chunk[..n]),
        }
    }
    leftover.truncate(content_length.min(leftover.len()));
    leftover
}

fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn latin1_decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
