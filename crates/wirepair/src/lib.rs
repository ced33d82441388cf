//! Framed text and object messages over a single byte-stream connection.
//!
//! wirepair turns any async byte channel into a bidirectional message
//! channel: each message is either UTF-8 text or a codec-encoded object, and
//! each travels as exactly one length-prefixed frame.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte-channel traits and Unix domain socket helpers
//! - [`frame`]: wire formats, decoder/encoder, object codecs and [`ChannelPair`]
//!
//! # Example
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use wirepair::{ChannelPair, FrameConfig, JsonCodec, Message};
//!
//! let stream = wirepair::transport::connect("/tmp/compiler.sock").await?;
//! let mut pair = ChannelPair::from_unix_stream(
//!     stream,
//!     JsonCodec::<serde_json::Value>::new(),
//!     FrameConfig::default(),
//! );
//!
//! pair.send_text("status").await?;
//! if let Message::Object(reply) = pair.recv().await? {
//!     println!("{reply}");
//! }
//! pair.close().await?;
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use wirepair_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use wirepair_frame::*;
}

pub use wirepair_frame::{
    ChannelPair, FrameConfig, FrameDecoder, FrameEncoder, FrameError, JsonCodec, Message,
    ObjectCodec, WireFormat,
};
