//! UDP and HTTP writers.
//!
//! This module provides the `Client` type, which encodes a token sequence and
//! ships it to an InfluxDB 1.x server either as a single UDP datagram or as
//! one minimal HTTP/1.1 `POST /write` request.

use std::io::{ErrorKind, IoSlice};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpSocket, UdpSocket};
use tracing::{debug, trace};

use crate::encoder::encode_line;
use crate::error::{Error, Result};
use crate::response::{HeaderMatching, ResponseReader};
use crate::token::Token;

/// Connection settings for one server.
///
/// Deserializes from any serde format:
///
/// ```json
/// { "host": "127.0.0.1", "port": 8086, "db": "metrics", "user": "admin", "password": "secret" }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Numeric IPv4 address of the server.
    pub host: String,
    /// UDP or HTTP port.
    pub port: u16,
    /// Target database (HTTP only).
    pub db: String,
    /// User name (HTTP only).
    #[serde(default)]
    pub user: Option<String>,
    /// Password (HTTP only).
    #[serde(default)]
    pub password: Option<String>,
    /// How the response's `Content-Length` header is matched (HTTP only).
    #[serde(default)]
    pub header_matching: HeaderMatching,
}

impl ClientConfig {
    /// Create a config without credentials.
    pub fn new(host: impl Into<String>, port: u16, db: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            db: db.into(),
            user: None,
            password: None,
            header_matching: HeaderMatching::Exact,
        }
    }

    /// Set the user name and password sent in the query string.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Set how the `Content-Length` header name is matched.
    pub fn with_header_matching(mut self, matching: HeaderMatching) -> Self {
        self.header_matching = matching;
        self
    }

    /// Parse `host` and `port` into a socket address.
    pub fn address(&self) -> Result<SocketAddrV4> {
        let ip: Ipv4Addr = self
            .host
            .parse()
            .map_err(|_| Error::Address(self.host.clone()))?;
        Ok(SocketAddrV4::new(ip, self.port))
    }

    /// Build the request line and headers for a body of `body_len` bytes.
    ///
    /// Query-string values are written as given, without percent-encoding.
    pub fn request_head(&self, body_len: usize) -> String {
        format!(
            "POST /write?db={}&u={}&p={} HTTP/1.1\r\nHost: {}\r\nContent-Length: {}\r\n\r\n",
            self.db,
            self.user.as_deref().unwrap_or_default(),
            self.password.as_deref().unwrap_or_default(),
            self.host,
            body_len
        )
    }
}

/// Outcome of a completed HTTP write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteStatus {
    /// The server answered with a 2xx status.
    Accepted(u16),
    /// The server answered with any other status.
    Rejected(u16),
}

impl WriteStatus {
    /// Classify a raw status code.
    pub fn from_status(status: u16) -> Self {
        if status / 100 == 2 {
            WriteStatus::Accepted(status)
        } else {
            WriteStatus::Rejected(status)
        }
    }

    /// Raw status code.
    pub fn status(&self) -> u16 {
        match self {
            WriteStatus::Accepted(s) | WriteStatus::Rejected(s) => *s,
        }
    }

    /// Returns true for a 2xx status.
    pub fn is_success(&self) -> bool {
        matches!(self, WriteStatus::Accepted(_))
    }

    /// `0` for success, the raw status otherwise.
    pub fn code(&self) -> i32 {
        match self {
            WriteStatus::Accepted(_) => 0,
            WriteStatus::Rejected(s) => i32::from(*s),
        }
    }
}

/// Line protocol writer for one server.
///
/// Every call encodes, opens its own socket, sends, and closes it again;
/// nothing is shared between calls.
///
/// # Example
///
/// ```ignore
/// use influxdb_line::{Client, ClientConfig, TokenSequence};
///
/// let client = Client::new(ClientConfig::new("127.0.0.1", 8086, "metrics"));
/// let points = TokenSequence::builder()
///     .measurement("cpu")
///     .tag("host", "web01")
///     .field_float("load", 0.64, 2)
///     .build();
///
/// let status = client.write_http(&points).await?;
/// assert!(status.is_success());
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    config: ClientConfig,
}

impl Client {
    /// Create a client for the given server.
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Encode `tokens` and send them as one UDP datagram.
    pub async fn write_udp(&self, tokens: impl AsRef<[Token]>) -> Result<()> {
        let payload = encode_line(tokens)?;
        self.send_datagram(&payload).await
    }

    /// Send already-encoded line protocol as one UDP datagram.
    ///
    /// A short send is an error; it is never retried.
    pub async fn send_datagram(&self, payload: &[u8]) -> Result<()> {
        let addr = self.config.address()?;
        let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
            .await
            .map_err(Error::Socket)?;

        let expected = payload.len();
        let sent = match socket.send_to(payload, addr).await {
            Ok(sent) => sent,
            Err(e) => {
                debug!(%addr, error = %e, "Datagram send failed.");
                return Err(Error::PartialSend {
                    sent: 0,
                    expected,
                    source: Some(e),
                });
            }
        };
        if sent < expected {
            return Err(Error::PartialSend {
                sent,
                expected,
                source: None,
            });
        }

        debug!(%addr, bytes = sent, "Sent line protocol datagram.");
        Ok(())
    }

    /// Encode `tokens` and POST them to `/write`.
    pub async fn write_http(&self, tokens: impl AsRef<[Token]>) -> Result<WriteStatus> {
        let body = encode_line(tokens)?;
        self.post(&body).await
    }

    /// POST already-encoded line protocol to `/write` and read the status.
    ///
    /// The header block and the body go out as one logical vectored write
    /// that continues after short writes; a write that stalls or fails
    /// before both are out is an error.
    pub async fn post(&self, body: &[u8]) -> Result<WriteStatus> {
        let head = self.config.request_head(body.len());
        let addr = self.config.address()?;

        let socket = TcpSocket::new_v4().map_err(Error::Socket)?;
        let mut stream = socket
            .connect(SocketAddr::V4(addr))
            .await
            .map_err(Error::Connect)?;

        let written = write_request(&mut stream, head.as_bytes(), body).await?;
        debug!(%addr, bytes = written, "Sent line protocol request.");

        let mut reader = ResponseReader::with_matching(&mut stream, self.config.header_matching);
        let response = reader.read_response().await?;
        Ok(WriteStatus::from_status(response.status))
    }
}

/// Write `head` followed by `body`, continuing after short writes until both
/// are out.
///
/// A zero-length write or an I/O error (other than `Interrupted`) stops the
/// request with [`Error::PartialWrite`].
async fn write_request<W>(writer: &mut W, head: &[u8], body: &[u8]) -> Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let expected = head.len() + body.len();
    let mut slices = [IoSlice::new(head), IoSlice::new(body)];
    let mut remaining = &mut slices[..];
    IoSlice::advance_slices(&mut remaining, 0);

    let mut written = 0;
    while written < expected {
        match writer.write_vectored(remaining).await {
            Ok(0) => {
                return Err(Error::PartialWrite {
                    written,
                    expected,
                    source: None,
                });
            }
            Ok(n) => {
                written += n;
                IoSlice::advance_slices(&mut remaining, n);
                trace!(written, expected, "Wrote request bytes.");
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                debug!(written, expected, error = %e, "Request write failed.");
                return Err(Error::PartialWrite {
                    written,
                    expected,
                    source: Some(e),
                });
            }
        }
    }

    writer.flush().await.map_err(|e| Error::PartialWrite {
        written,
        expected,
        source: Some(e),
    })?;
    Ok(written)
}

/// Send `tokens` over UDP, returning `0` or a negative [`Error::code`].
pub async fn send_udp(config: &ClientConfig, tokens: impl AsRef<[Token]>) -> i32 {
    match Client::new(config.clone()).write_udp(tokens).await {
        Ok(()) => 0,
        Err(e) => e.code(),
    }
}

/// POST `tokens` over HTTP, returning `0` for a 2xx status, the raw status
/// for any other response, or a negative [`Error::code`].
pub async fn post_http(config: &ClientConfig, tokens: impl AsRef<[Token]>) -> i32 {
    match Client::new(config.clone()).write_http(tokens).await {
        Ok(status) => status.code(),
        Err(e) => e.code(),
    }
}
