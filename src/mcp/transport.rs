//! Newline-delimited framing over async byte streams.
//!
//! One JSON message per line. Lines longer than the configured limit are
//! drained and reported as [`Frame::Oversized`] instead of being buffered.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::protocol::Message;

/// Bytes of an oversized frame kept for id salvage.
const OVERSIZED_PREFIX_BYTES: usize = 4096;

/// Result of reading one line.
#[derive(Debug, PartialEq)]
pub enum Frame {
    /// A complete, non-blank line without its terminator.
    Line(Vec<u8>),
    /// A line over the limit; `prefix` holds its first bytes.
    Oversized { len: usize, prefix: Vec<u8> },
    /// End of stream.
    Eof,
}

pub struct FrameReader<R> {
    inner: R,
    max_bytes: usize,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, max_bytes: usize) -> Self {
        Self {
            inner,
            max_bytes,
            buf: Vec::new(),
        }
    }

    /// Read the next non-blank line.
    pub async fn next_frame(&mut self) -> io::Result<Frame> {
        loop {
            self.buf.clear();
            let mut total = 0usize;
            let mut oversized = false;
            let mut saw_any = false;

            loop {
                let available = self.inner.fill_buf().await?;
                if available.is_empty() {
                    if !saw_any {
                        return Ok(Frame::Eof);
                    }
                    break;
                }
                saw_any = true;
                let newline = available.iter().position(|&b| b == b'\n');
                let chunk = &available[..newline.unwrap_or(available.len())];
                total += chunk.len();
                if !oversized {
                    if self.buf.len() + chunk.len() > self.max_bytes {
                        oversized = true;
                        let room = OVERSIZED_PREFIX_BYTES.saturating_sub(self.buf.len());
                        self.buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
                        self.buf.truncate(OVERSIZED_PREFIX_BYTES);
                    } else {
                        self.buf.extend_from_slice(chunk);
                    }
                }
                let consumed = newline.map(|p| p + 1).unwrap_or(available.len());
                self.inner.consume(consumed);
                if newline.is_some() {
                    break;
                }
            }

            if oversized {
                return Ok(Frame::Oversized {
                    len: total,
                    prefix: std::mem::take(&mut self.buf),
                });
            }
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
            if self.buf.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(Frame::Line(std::mem::take(&mut self.buf)));
        }
    }
}

pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Serialize `msg` as a single line and flush it.
    pub async fn write_message(&mut self, msg: &Message) -> io::Result<()> {
        let mut line = serde_json::to_vec(msg).map_err(io::Error::other)?;
        line.push(b'\n');
        self.inner.write_all(&line).await?;
        self.inner.flush().await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
