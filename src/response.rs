//! Streaming reader for HTTP/1.1 responses.
//!
//! The reader pulls one byte at a time out of a fixed-size receive buffer,
//! refilling it from the socket only when it runs dry. Only the status code
//! and the `Content-Length` header are interpreted; every other header is
//! skipped line by line.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::error::{Error, Result};

/// Size of the receive buffer.
pub const RECEIVE_BUFFER_SIZE: usize = 0x100;

const CONTENT_LENGTH_TAIL: &[u8] = b"ontent-Length: ";

/// How the `Content-Length` header name is matched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderMatching {
    /// Byte-for-byte, case-sensitive.
    #[default]
    Exact,
    /// ASCII case-insensitive.
    CaseInsensitive,
}

impl HeaderMatching {
    fn matches(self, expected: u8, actual: u8) -> bool {
        match self {
            HeaderMatching::Exact => expected == actual,
            HeaderMatching::CaseInsensitive => expected.eq_ignore_ascii_case(&actual),
        }
    }
}

/// Which part of the response is being read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// Version and status code.
    StatusLine,
    /// Header lines up to the blank line.
    Headers,
    /// Draining `Content-Length` bytes.
    Body,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::StatusLine => "status line",
            Phase::Headers => "headers",
            Phase::Body => "body",
        };
        write!(f, "{}", s)
    }
}

/// What the reader extracted from a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Response {
    /// Numeric status code.
    pub status: u16,
    /// Declared body length; zero when the header was absent.
    pub content_length: u64,
}

impl Response {
    /// Returns true for any 2xx status.
    pub fn is_success(&self) -> bool {
        self.status / 100 == 2
    }
}

/// Pull parser for an HTTP/1.1 response over an async byte source.
///
/// # Example
///
/// ```ignore
/// use influxdb_line::response::ResponseReader;
///
/// let mut reader = ResponseReader::new(stream);
/// let response = reader.read_response().await?;
/// println!("status {}", response.status);
/// ```
pub struct ResponseReader<R: AsyncRead + Unpin> {
    reader: R,
    buf: [u8; RECEIVE_BUFFER_SIZE],
    pos: usize,
    filled: usize,
    phase: Phase,
    matching: HeaderMatching,
}

impl<R: AsyncRead + Unpin> ResponseReader<R> {
    /// Create a reader with exact header matching.
    pub fn new(reader: R) -> Self {
        Self::with_matching(reader, HeaderMatching::Exact)
    }

    /// Create a reader with the given header matching mode.
    pub fn with_matching(reader: R, matching: HeaderMatching) -> Self {
        Self {
            reader,
            buf: [0; RECEIVE_BUFFER_SIZE],
            pos: 0,
            filled: 0,
            phase: Phase::StatusLine,
            matching,
        }
    }

    /// Bytes received but not consumed yet.
    pub fn buffered(&self) -> &[u8] {
        &self.buf[self.pos..self.filled]
    }

    /// Give back the underlying source.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Read the status line and headers, then drain the body.
    ///
    /// Returns once `Content-Length` body bytes have been consumed. Without a
    /// `Content-Length` header the body is not read at all.
    pub async fn read_response(&mut self) -> Result<Response> {
        self.phase = Phase::StatusLine;
        self.skip_until(b' ').await?;
        let (status, digits) = self.read_number().await?;
        if digits == 0 {
            return Err(Error::Read("missing status code".to_string()));
        }
        let status = u16::try_from(status)
            .map_err(|_| Error::Read(format!("status code {} out of range", status)))?;

        self.phase = Phase::Headers;
        let mut content_length = 0;
        loop {
            self.skip_until(b'\n').await?;
            let first = self.next_byte().await?;
            if self.matching.matches(b'C', first) {
                if self.match_tail(CONTENT_LENGTH_TAIL).await? {
                    content_length = self.read_number().await?.0;
                }
            } else if first == b'\r' && self.next_byte().await? == b'\n' {
                break;
            }
        }

        self.phase = Phase::Body;
        self.drain(content_length).await?;

        debug!(status, content_length, "Read HTTP response.");
        Ok(Response {
            status,
            content_length,
        })
    }

    async fn next_byte(&mut self) -> Result<u8> {
        if self.pos >= self.filled {
            self.fill().await?;
        }
        let byte = self.buf[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    async fn fill(&mut self) -> Result<()> {
        let n = self
            .reader
            .read(&mut self.buf)
            .await
            .map_err(|e| Error::Read(format!("receive failed in {}: {}", self.phase, e)))?;
        if n == 0 {
            return Err(Error::Read(format!("connection closed in {}", self.phase)));
        }
        self.pos = 0;
        self.filled = n;
        Ok(())
    }

    async fn skip_until(&mut self, stop: u8) -> Result<()> {
        while self.next_byte().await? != stop {}
        Ok(())
    }

    /// Accumulate decimal digits. The first non-digit is consumed.
    async fn read_number(&mut self) -> Result<(u64, usize)> {
        let mut value: u64 = 0;
        let mut digits = 0;
        loop {
            let byte = self.next_byte().await?;
            if !byte.is_ascii_digit() {
                return Ok((value, digits));
            }
            value = value
                .saturating_mul(10)
                .saturating_add(u64::from(byte - b'0'));
            digits += 1;
        }
    }

    /// Compare the next bytes with `tail`, stopping at the first mismatch.
    /// The mismatching byte is consumed.
    async fn match_tail(&mut self, tail: &[u8]) -> Result<bool> {
        for &expected in tail {
            let byte = self.next_byte().await?;
            if !self.matching.matches(expected, byte) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn drain(&mut self, content_length: u64) -> Result<()> {
        let mut remaining = content_length;
        loop {
            let available = (self.filled - self.pos) as u64;
            let take = available.min(remaining);
            // take <= available, which is a usize
            self.pos += take as usize;
            remaining -= take;
            if remaining == 0 {
                return Ok(());
            }
            self.fill().await?;
        }
    }
}
