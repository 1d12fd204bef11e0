//! Redis serialization protocol (RESP2) framing for the command surface.
//!
//! Requests are arrays of bulk strings, or inline commands separated by
//! whitespace as typed into a telnet session. Replies map onto integers,
//! bulk strings, arrays and errors.

use crate::command::Reply;
use crate::error::{FilterError, Result};

const MAX_BULK_LEN: usize = 16 * 1024 * 1024;
const MAX_ARGS: usize = 1024;
/// Longest inline command line, newline included.
pub const MAX_INLINE_LEN: usize = 64 * 1024;
/// Most bytes one request may occupy in the connection buffer.
pub const MAX_FRAME_LEN: usize = 2 * MAX_BULK_LEN;

/// Parses one request from the front of `buf`.
///
/// Returns `Ok(None)` while the frame is incomplete, otherwise the arguments
/// and the number of bytes consumed. An empty argument list means the frame
/// carried no command (a blank line or `*0`).
///
/// A request that is still incomplete after `MAX_FRAME_LEN` bytes is a
/// protocol error, so a peer cannot grow the buffer without bound.
pub fn parse_frame(buf: &[u8]) -> Result<Option<(Vec<Vec<u8>>, usize)>> {
    let parsed = match buf.first() {
        None => Ok(None),
        Some(b'*') => parse_array(buf),
        Some(_) => parse_inline(buf),
    };
    if matches!(parsed, Ok(None)) && buf.len() > MAX_FRAME_LEN {
        return Err(FilterError::Protocol(format!(
            "request exceeds {MAX_FRAME_LEN} bytes"
        )));
    }
    parsed
}

fn find_crlf(buf: &[u8], from: usize) -> Option<usize> {
    buf.get(from..)?
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|pos| from + pos)
}

fn parse_length(line: &[u8]) -> Result<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            FilterError::Protocol(format!(
                "invalid length '{}'",
                String::from_utf8_lossy(line)
            ))
        })
}

fn parse_array(buf: &[u8]) -> Result<Option<(Vec<Vec<u8>>, usize)>> {
    let Some(end) = find_crlf(buf, 1) else {
        return Ok(None);
    };
    let count = parse_length(&buf[1..end])?;
    let mut pos = end + 2;
    if count <= 0 {
        return Ok(Some((Vec::new(), pos)));
    }
    let count = count as usize;
    if count > MAX_ARGS {
        return Err(FilterError::Protocol(format!(
            "too many arguments: {count}"
        )));
    }

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        match buf.get(pos) {
            None => return Ok(None),
            Some(b'$') => {}
            Some(other) => {
                return Err(FilterError::Protocol(format!(
                    "expected '$', got '{}'",
                    *other as char
                )));
            }
        }
        let Some(end) = find_crlf(buf, pos + 1) else {
            return Ok(None);
        };
        let len = parse_length(&buf[pos + 1..end])?;
        if len < 0 || len as usize > MAX_BULK_LEN {
            return Err(FilterError::Protocol(format!(
                "invalid bulk length {len}"
            )));
        }
        let start = end + 2;
        let stop = start + len as usize;
        if stop + 2 > MAX_FRAME_LEN {
            return Err(FilterError::Protocol(format!(
                "request exceeds {MAX_FRAME_LEN} bytes"
            )));
        }
        if buf.len() < stop + 2 {
            return Ok(None);
        }
        if &buf[stop..stop + 2] != b"\r\n" {
            return Err(FilterError::Protocol(
                "bulk string not terminated by CRLF".to_string(),
            ));
        }
        args.push(buf[start..stop].to_vec());
        pos = stop + 2;
    }
    Ok(Some((args, pos)))
}

fn parse_inline(buf: &[u8]) -> Result<Option<(Vec<Vec<u8>>, usize)>> {
    let window = &buf[..buf.len().min(MAX_INLINE_LEN)];
    let Some(newline) = window.iter().position(|&b| b == b'\n') else {
        if buf.len() >= MAX_INLINE_LEN {
            return Err(FilterError::Protocol(format!(
                "inline request exceeds {MAX_INLINE_LEN} bytes"
            )));
        }
        return Ok(None);
    };
    let line = &buf[..newline];
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let args = line
        .split(|b| b.is_ascii_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_vec())
        .collect();
    Ok(Some((args, newline + 1)))
}

impl Reply {
    pub fn write_resp(&self, out: &mut Vec<u8>) {
        match self {
            Reply::Integer(n) => {
                out.extend_from_slice(format!(":{n}\r\n").as_bytes());
            }
            Reply::Bulk(bytes) => {
                out.extend_from_slice(format!("${}\r\n", bytes.len()).as_bytes());
                out.extend_from_slice(bytes);
                out.extend_from_slice(b"\r\n");
            }
            Reply::Array(items) => {
                out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
                for item in items {
                    item.write_resp(out);
                }
            }
            Reply::Error(msg) => {
                let msg = msg.replace(['\r', '\n'], " ");
                out.extend_from_slice(format!("-{msg}\r\n").as_bytes());
            }
        }
    }

    pub fn to_resp(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_resp(&mut out);
        out
    }
}

#[cfg(feature = "server")]
mod server {
    use super::parse_frame;
    use crate::command::{CommandAdapter, Reply};
    use crate::error::Result;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tracing::{debug, info, warn};

    /// Accepts RESP connections forever, one task per connection.
    pub async fn serve(listener: TcpListener, adapter: CommandAdapter) -> Result<()> {
        info!(addr = ?listener.local_addr().ok(), "RESP listener ready");
        loop {
            let (socket, peer) = listener.accept().await?;
            debug!(%peer, "accepted connection");
            let adapter = adapter.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(socket, adapter).await {
                    warn!(%peer, error = %e, "connection closed with error");
                }
            });
        }
    }

    /// Serves requests from one stream until the peer hangs up.
    pub async fn handle_connection<S>(mut stream: S, adapter: CommandAdapter) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buffer = Vec::with_capacity(4096);
        let mut chunk = [0u8; 4096];

        loop {
            loop {
                match parse_frame(&buffer) {
                    Ok(Some((args, used))) => {
                        buffer.drain(..used);
                        if args.is_empty() {
                            continue;
                        }
                        let reply = adapter.execute(&args);
                        stream.write_all(&reply.to_resp()).await?;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        stream.write_all(&Reply::error(&e).to_resp()).await?;
                        stream.flush().await?;
                        return Err(e);
                    }
                }
            }

            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            buffer.extend_from_slice(&chunk[..n]);
        }
    }
}

#[cfg(feature = "server")]
pub use server::{handle_connection, serve};
