use std::time::Duration;

use crate::object::CodecError;

/// Errors that can occur while reading or writing messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The peer closed the connection before a new frame began, the channel
    /// was closed locally, or an earlier failure left this half unusable.
    #[error("channel closed")]
    ChannelClosed,

    /// End of stream arrived in the middle of a header or payload.
    #[error("short read ({received} of {expected} bytes before end of stream)")]
    ShortRead { expected: usize, received: usize },

    /// The object codec rejected an inbound payload.
    #[error("object decode failed: {0}")]
    Decode(#[source] CodecError),

    /// The object codec could not serialize an outbound value.
    #[error("object encode failed: {0}")]
    Encode(#[source] CodecError),

    /// A text payload is not valid UTF-8.
    #[error("text payload is not valid utf-8: {0}")]
    InvalidText(#[from] std::str::Utf8Error),

    /// An inbound header declared a length above the configured maximum.
    #[error("payload length {size} exceeds maximum {max}")]
    LengthOverflow { size: usize, max: usize },

    /// An outbound payload is larger than the configured maximum or the
    /// header can describe. Nothing was written.
    #[error("outbound payload of {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// A tagged header carried an unknown kind byte.
    #[error("unknown frame kind 0x{0:02x}")]
    UnknownKind(u8),

    /// The signed-length format cannot carry an empty object payload.
    #[error("empty object payload cannot be framed with a signed length header")]
    EmptyObject,

    /// A per-frame deadline expired.
    #[error("frame timed out after {0:?}")]
    Timeout(Duration),

    /// An I/O error occurred on the underlying channel.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Whether the connection must be dropped after this error.
    ///
    /// Only errors raised before any byte reached the wire leave the stream
    /// position intact.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            FrameError::Encode(_) | FrameError::EmptyObject | FrameError::PayloadTooLarge { .. }
        )
    }

    /// Classify an I/O error from the write path.
    pub(crate) fn from_write_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::WriteZero
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset => FrameError::ChannelClosed,
            _ => FrameError::Io(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_side_errors_are_not_fatal() {
        assert!(!FrameError::EmptyObject.is_fatal());
        assert!(!FrameError::Encode(CodecError::Empty).is_fatal());
        assert!(!FrameError::PayloadTooLarge { size: 9, max: 4 }.is_fatal());
        assert!(FrameError::LengthOverflow { size: 9, max: 4 }.is_fatal());
        assert!(FrameError::ShortRead {
            expected: 4,
            received: 1
        }
        .is_fatal());
        assert!(FrameError::Decode(CodecError::Empty).is_fatal());
        assert!(FrameError::ChannelClosed.is_fatal());
    }

    #[test]
    fn broken_pipe_maps_to_channel_closed() {
        let err = FrameError::from_write_io(std::io::ErrorKind::BrokenPipe.into());
        assert!(matches!(err, FrameError::ChannelClosed));

        let err = FrameError::from_write_io(std::io::ErrorKind::PermissionDenied.into());
        assert!(matches!(err, FrameError::Io(_)));
    }

    #[test]
    fn display_messages() {
        let err = FrameError::LengthOverflow { size: 10, max: 4 };
        assert_eq!(err.to_string(), "payload length 10 exceeds maximum 4");
        assert_eq!(
            FrameError::UnknownKind(0x7f).to_string(),
            "unknown frame kind 0x7f"
        );
    }
}
