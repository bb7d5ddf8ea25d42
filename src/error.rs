//! Error types for influxdb-line.

use thiserror::Error;

use crate::token::TokenKind;

/// Error type for influxdb-line operations.
///
/// Every variant maps to a distinct negative integer through [`Error::code`],
/// which is what the integer-returning entry points ([`crate::send_udp`],
/// [`crate::post_http`]) hand back to the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// The token sequence violates the line protocol grammar.
    #[error("{token} token not allowed after {previous} at position {position}")]
    Grammar {
        /// Index of the offending token in the sequence.
        position: usize,
        /// Kind of the offending token.
        token: TokenKind,
        /// Kind of the last accepted token.
        previous: TokenKind,
    },

    /// The sequence ran out before an end marker.
    #[error("Token sequence ended without an end marker after {position} tokens")]
    Unterminated {
        /// Number of tokens accepted.
        position: usize,
    },

    /// A float field carried NaN or an infinity.
    #[error("Float field '{key}' is not finite")]
    NonFiniteFloat {
        /// Key of the rejected field.
        key: String,
    },

    /// Growing the output buffer failed.
    #[error("Failed to grow line buffer")]
    Alloc,

    /// The host is not a numeric IPv4 address.
    #[error("Invalid IPv4 address: {0}")]
    Address(String),

    /// Creating the socket failed.
    #[error("Socket error: {0}")]
    Socket(#[source] std::io::Error),

    /// Connecting to the server failed.
    #[error("Connect failed: {0}")]
    Connect(#[source] std::io::Error),

    /// The transport stopped accepting the request before all of it was
    /// written.
    #[error("Partial write: wrote {written} of {expected} bytes")]
    PartialWrite {
        /// Bytes accepted by the transport.
        written: usize,
        /// Header plus body length.
        expected: usize,
        /// Error from the failing write, if it failed rather than stalled.
        #[source]
        source: Option<std::io::Error>,
    },

    /// The datagram was not sent in full.
    #[error("Partial send: sent {sent} of {expected} bytes")]
    PartialSend {
        /// Bytes accepted by the transport.
        sent: usize,
        /// Payload length.
        expected: usize,
        /// Error from the send, if it failed outright.
        #[source]
        source: Option<std::io::Error>,
    },

    /// The response ended or failed before it was fully read.
    #[error("Failed to read response: {0}")]
    Read(String),
}

impl Error {
    /// Returns the negative code reported by the integer entry points.
    pub fn code(&self) -> i32 {
        match self {
            Error::Grammar { .. } | Error::Unterminated { .. } => -1,
            Error::NonFiniteFloat { .. } => -2,
            Error::Alloc => -3,
            Error::Address(_) => -4,
            Error::Socket(_) => -5,
            Error::Connect(_) => -6,
            Error::PartialWrite { .. } => -7,
            Error::Read(_) => -8,
            Error::PartialSend { .. } => -9,
        }
    }
}

/// Result type alias for influxdb-line operations.
pub type Result<T> = std::result::Result<T, Error>;
