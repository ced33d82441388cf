//! Message framing over async byte channels.
//!
//! Every message travels as one frame: a fixed-size header announcing the
//! payload kind and length, followed by exactly that many payload bytes.
//! Two header layouts are supported (see [`WireFormat`]):
//!
//! - `Tagged` (default): 1-byte kind (`0x01` object, `0x02` text) and a
//!   4-byte big-endian payload length
//! - `SignedLength`: a 4-byte big-endian two's complement length whose sign
//!   selects the kind (positive object, negative or zero text)
//!
//! [`FrameDecoder`] and [`FrameEncoder`] wrap the read and write halves of a
//! connection; [`ChannelPair`] owns both. Object payloads go through an
//! [`ObjectCodec`], text payloads are UTF-8.

pub mod codec;
pub mod error;
pub mod message;
pub mod object;
pub mod observer;
pub mod pair;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, FrameConfig, FrameHeader, FrameKind, RawFrame, RawFrameCodec,
    WireFormat, DEFAULT_MAX_PAYLOAD, LEGACY_HEADER_SIZE, TAGGED_HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use message::Message;
pub use object::{CodecError, JsonCodec, ObjectCodec, RawCodec, JSON_CODEC_VERSION};
pub use observer::{
    Direction, MessageObserver, MessageSummary, NoopObserver, SharedObserver, TracingObserver,
};
pub use pair::ChannelPair;
#[cfg(unix)]
pub use pair::UnixChannelPair;
pub use reader::FrameDecoder;
pub use writer::FrameEncoder;

pub use tokio_util::sync::CancellationToken;
