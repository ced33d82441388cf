//! Async byte-channel abstraction for wirepair.
//!
//! This is the lowest layer. It names the capabilities the framing layer
//! needs from a connection ([`ByteSource`], [`ByteSink`], [`ByteChannel`])
//! and provides helpers to establish Unix domain socket connections.
//! Any already-connected tokio stream can be used instead.

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use traits::{ByteChannel, ByteSink, ByteSource};

#[cfg(unix)]
pub use uds::{connect, PeerCredentials, UnixSocketListener};
