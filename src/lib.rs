//! # influxdb-line
//!
//! Line protocol encoder for InfluxDB, with a UDP sender and a minimal,
//! hand-rolled HTTP/1.1 writer.
//!
//! ## Why?
//!
//! Instrumentation code often wants to emit a handful of points without
//! pulling a full HTTP stack into the process. `influxdb-line` encodes points
//! into line protocol and writes them with nothing but a socket:
//!
//! ```text
//! foo,k=v,k2=v2 s="string",f=28.39
//! bar i=1048576i,b=t 1512722735522840439
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use influxdb_line::{Client, ClientConfig, TokenSequence};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(
//!         ClientConfig::new("127.0.0.1", 8086, "metrics").with_credentials("admin", "secret"),
//!     );
//!
//!     let points = TokenSequence::builder()
//!         .measurement("temperature")
//!         .tag("room", "kitchen")
//!         .field_float("value", 21.5, 1)
//!         .timestamp(1512722735522840439)
//!         .build();
//!
//!     let status = client.write_http(&points).await?;
//!     println!("server answered {}", status.status());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Validated grammar**: token order is checked while encoding; a bad
//!   sequence never reaches the wire
//! - **Correct escaping**: measurement names, keys, tag values and string
//!   fields each get their own escape set
//! - **Streaming response reader**: the HTTP status and `Content-Length` are
//!   parsed byte by byte from a 256-byte receive buffer
//! - **Integer codes**: [`send_udp`] and [`post_http`] return `0`, a raw HTTP
//!   status, or a negative [`Error::code`]

pub mod buffer;
pub mod client;
pub mod encoder;
pub mod error;
pub mod escape;
pub mod response;
pub mod token;

// Re-export main types at crate root
pub use client::{Client, ClientConfig, WriteStatus, post_http, send_udp};
pub use encoder::{LineEncoder, encode_line, encode_point};
pub use error::{Error, Result};
pub use token::{LineBuilder, Token, TokenKind, TokenSequence};

// Re-export the building blocks for advanced use cases
pub use buffer::GrowableBuffer;
pub use escape::EscapeContext;
pub use response::{HeaderMatching, Response, ResponseReader};
