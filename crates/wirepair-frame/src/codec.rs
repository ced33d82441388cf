use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Header size of [`WireFormat::SignedLength`]: a single `i32`.
pub const LEGACY_HEADER_SIZE: usize = 4;

/// Header size of [`WireFormat::Tagged`]: kind (1) + length (4).
pub const TAGGED_HEADER_SIZE: usize = 5;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Layout of the frame header on the wire.
///
/// ```text
/// Tagged (default)
/// ┌───────────┬──────────────┬────────────────────┐
/// │ Kind (1B) │ Length (4B)  │ Payload             │
/// │ 01 / 02   │ u32 BE       │ (Length bytes)      │
/// └───────────┴──────────────┴────────────────────┘
///
/// SignedLength
/// ┌──────────────┬────────────────────┐
/// │ Header (4B)  │ Payload             │
/// │ i32 BE       │ (|Header| bytes)    │
/// └──────────────┴────────────────────┘
///   > 0  object, < 0  text, == 0  empty text
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    /// Explicit one-byte kind followed by an unsigned length.
    #[default]
    Tagged,
    /// Sign of a signed length selects the kind. Spoken by older peers.
    SignedLength,
}

impl WireFormat {
    /// Number of header bytes preceding every payload.
    pub const fn header_size(self) -> usize {
        match self {
            WireFormat::Tagged => TAGGED_HEADER_SIZE,
            WireFormat::SignedLength => LEGACY_HEADER_SIZE,
        }
    }

    /// Largest payload the length field can describe.
    pub const fn max_length(self) -> usize {
        match self {
            WireFormat::Tagged => u32::MAX as usize,
            WireFormat::SignedLength => i32::MAX as usize,
        }
    }
}

/// What a frame's payload holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// Output of the object codec.
    Object = 0x01,
    /// UTF-8 text.
    Text = 0x02,
}

impl FrameKind {
    /// Parse the tagged-format discriminant.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0x01 => Ok(FrameKind::Object),
            0x02 => Ok(FrameKind::Text),
            other => Err(FrameError::UnknownKind(other)),
        }
    }

    /// The tagged-format discriminant.
    pub const fn tag(self) -> u8 {
        self as u8
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            FrameKind::Object => "object",
            FrameKind::Text => "text",
        }
    }
}

/// A decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub kind: FrameKind,
    /// Payload length in bytes.
    pub len: usize,
}

impl FrameHeader {
    pub fn new(kind: FrameKind, len: usize) -> Self {
        Self { kind, len }
    }

    /// Parse exactly `format.header_size()` bytes.
    pub fn parse(bytes: &[u8], format: WireFormat) -> Result<Self> {
        let size = format.header_size();
        if bytes.len() != size {
            return Err(FrameError::ShortRead {
                expected: size,
                received: bytes.len(),
            });
        }

        match format {
            WireFormat::Tagged => {
                let kind = FrameKind::from_tag(bytes[0])?;
                let len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
                Ok(Self { kind, len })
            }
            WireFormat::SignedLength => {
                let raw = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                if raw > 0 {
                    return Ok(Self::new(FrameKind::Object, raw as usize));
                }
                let len = raw.unsigned_abs() as usize;
                if len > format.max_length() {
                    // i32::MIN has no positive counterpart.
                    return Err(FrameError::LengthOverflow {
                        size: len,
                        max: format.max_length(),
                    });
                }
                Ok(Self::new(FrameKind::Text, len))
            }
        }
    }

    /// Append the header to `dst`.
    pub fn encode(&self, format: WireFormat, dst: &mut BytesMut) -> Result<()> {
        if self.len > format.max_length() {
            return Err(FrameError::PayloadTooLarge {
                size: self.len,
                max: format.max_length(),
            });
        }

        match format {
            WireFormat::Tagged => {
                dst.put_u8(self.kind.tag());
                dst.put_u32(self.len as u32);
            }
            WireFormat::SignedLength => {
                let len = self.len as i32;
                let raw = match self.kind {
                    FrameKind::Text => -len,
                    // Header 0 always reads back as text.
                    FrameKind::Object if len == 0 => return Err(FrameError::EmptyObject),
                    FrameKind::Object => len,
                };
                dst.put_i32(raw);
            }
        }
        Ok(())
    }
}

/// An undecoded frame: kind plus raw payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub kind: FrameKind,
    pub payload: Bytes,
}

impl RawFrame {
    pub fn new(kind: FrameKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Total wire size of this frame under `format`.
    pub fn wire_size(&self, format: WireFormat) -> usize {
        format.header_size() + self.payload.len()
    }
}

/// Encode one frame into `dst`.
///
/// Nothing is appended when the header cannot be encoded.
pub fn encode_frame(
    kind: FrameKind,
    payload: &[u8],
    format: WireFormat,
    dst: &mut BytesMut,
) -> Result<()> {
    let header = FrameHeader::new(kind, payload.len());
    let mut head = BytesMut::with_capacity(format.header_size());
    header.encode(format, &mut head)?;

    dst.reserve(head.len() + payload.len());
    dst.put_slice(&head);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes exactly the frame's bytes from the buffer.
pub fn decode_frame(
    src: &mut BytesMut,
    format: WireFormat,
    max_payload: usize,
) -> Result<Option<RawFrame>> {
    let header_size = format.header_size();
    if src.len() < header_size {
        return Ok(None);
    }

    let header = FrameHeader::parse(&src[..header_size], format)?;
    if header.len > max_payload {
        return Err(FrameError::LengthOverflow {
            size: header.len,
            max: max_payload,
        });
    }

    let total = header_size + header.len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(header_size);
    let payload = src.split_to(header.len).freeze();
    Ok(Some(RawFrame {
        kind: header.kind,
        payload,
    }))
}

/// Configuration shared by [`FrameDecoder`](crate::FrameDecoder) and
/// [`FrameEncoder`](crate::FrameEncoder).
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Header layout. Both ends of a connection must agree.
    pub wire_format: WireFormat,
    /// Deadline for one inbound frame, from its first byte to its last.
    pub read_timeout: Option<Duration>,
    /// Deadline for writing one outbound frame.
    pub write_timeout: Option<Duration>,
    /// How long a reader may wait for the next frame to start.
    pub idle_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            wire_format: WireFormat::default(),
            read_timeout: None,
            write_timeout: None,
            idle_timeout: None,
        }
    }
}

impl FrameConfig {
    /// Default configuration speaking the sign-overloaded header.
    pub fn signed_length() -> Self {
        Self {
            wire_format: WireFormat::SignedLength,
            ..Self::default()
        }
    }
}

/// [`tokio_util::codec`] adapter producing [`RawFrame`]s, for use with
/// `FramedRead`/`FramedWrite`.
#[derive(Debug, Clone)]
pub struct RawFrameCodec {
    format: WireFormat,
    max_payload: usize,
}

impl RawFrameCodec {
    pub fn new(format: WireFormat, max_payload: usize) -> Self {
        Self {
            format,
            max_payload,
        }
    }

    pub fn from_config(config: &FrameConfig) -> Self {
        Self::new(config.wire_format, config.max_payload_size)
    }
}

impl Default for RawFrameCodec {
    fn default() -> Self {
        Self::from_config(&FrameConfig::default())
    }
}

impl tokio_util::codec::Decoder for RawFrameCodec {
    type Item = RawFrame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<RawFrame>> {
        decode_frame(src, self.format, self.max_payload)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<RawFrame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ShortRead {
                expected: expected_len(src, self.format),
                received: src.len(),
            }),
        }
    }
}

impl tokio_util::codec::Encoder<RawFrame> for RawFrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: RawFrame, dst: &mut BytesMut) -> Result<()> {
        if frame.payload.len() > self.max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: frame.payload.len(),
                max: self.max_payload,
            });
        }
        encode_frame(frame.kind, &frame.payload, self.format, dst)
    }
}

/// Bytes a truncated buffer would have needed: the header, or the whole frame
/// once the header is known.
fn expected_len(src: &[u8], format: WireFormat) -> usize {
    let header_size = format.header_size();
    if src.len() < header_size {
        return header_size;
    }
    FrameHeader::parse(&src[..header_size], format)
        .map(|header| header_size + header.len)
        .unwrap_or(header_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_text_ok_exact_bytes() {
        let mut buf = BytesMut::new();
        encode_frame(FrameKind::Text, b"ok", WireFormat::SignedLength, &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0xFF, 0xFF, 0xFF, 0xFE, b'o', b'k']);

        let frame = decode_frame(&mut buf, WireFormat::SignedLength, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.kind, FrameKind::Text);
        assert_eq!(frame.payload.as_ref(), b"ok");
        assert!(buf.is_empty());
    }

    #[test]
    fn legacy_small_positive_header_is_object() {
        // +254; text headers are negative.
        let header = FrameHeader::parse(&[0x00, 0x00, 0x00, 0xFE], WireFormat::SignedLength)
            .unwrap();
        assert_eq!(header, FrameHeader::new(FrameKind::Object, 254));
    }

    #[test]
    fn legacy_object_header_is_positive() {
        let mut buf = BytesMut::new();
        encode_frame(FrameKind::Object, b"abc", WireFormat::SignedLength, &mut buf).unwrap();
        assert_eq!(&buf[..4], &3i32.to_be_bytes());
    }

    #[test]
    fn tagged_layout() {
        let mut buf = BytesMut::new();
        encode_frame(FrameKind::Text, b"ok", WireFormat::Tagged, &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0x02, 0x00, 0x00, 0x00, 0x02, b'o', b'k']);

        buf.clear();
        encode_frame(FrameKind::Object, b"{}", WireFormat::Tagged, &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0x01, 0x00, 0x00, 0x00, 0x02, b'{', b'}']);
    }

    #[test]
    fn tagged_empty_text_and_empty_object_do_not_collide() {
        let mut text = BytesMut::new();
        let mut object = BytesMut::new();
        encode_frame(FrameKind::Text, b"", WireFormat::Tagged, &mut text).unwrap();
        encode_frame(FrameKind::Object, b"", WireFormat::Tagged, &mut object).unwrap();
        assert_ne!(text, object);

        let t = decode_frame(&mut text, WireFormat::Tagged, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        let o = decode_frame(&mut object, WireFormat::Tagged, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(t.kind, FrameKind::Text);
        assert_eq!(o.kind, FrameKind::Object);
        assert!(t.payload.is_empty() && o.payload.is_empty());
    }

    #[test]
    fn legacy_zero_header_is_empty_text() {
        let mut buf = BytesMut::new();
        encode_frame(FrameKind::Text, b"", WireFormat::SignedLength, &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0, 0, 0, 0]);

        let frame = decode_frame(&mut buf, WireFormat::SignedLength, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.kind, FrameKind::Text);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn legacy_refuses_empty_object() {
        let mut buf = BytesMut::new();
        let err = encode_frame(FrameKind::Object, b"", WireFormat::SignedLength, &mut buf)
            .unwrap_err();
        assert!(matches!(err, FrameError::EmptyObject));
        assert!(buf.is_empty());
    }

    #[test]
    fn legacy_min_header_overflows() {
        let result = FrameHeader::parse(&i32::MIN.to_be_bytes(), WireFormat::SignedLength);
        assert!(matches!(result, Err(FrameError::LengthOverflow { .. })));
    }

    #[test]
    fn legacy_max_text_header() {
        let header = FrameHeader::parse(&(-i32::MAX).to_be_bytes(), WireFormat::SignedLength)
            .unwrap();
        assert_eq!(header, FrameHeader::new(FrameKind::Text, i32::MAX as usize));
    }

    #[test]
    fn header_encode_rejects_oversized_length() {
        let mut buf = BytesMut::new();
        let header = FrameHeader::new(FrameKind::Text, i32::MAX as usize + 1);
        let err = header.encode(WireFormat::SignedLength, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(!err.is_fatal());
        assert!(header.encode(WireFormat::Tagged, &mut buf).is_ok());
    }

    #[test]
    fn unknown_kind_rejected() {
        let mut buf = BytesMut::from(&[0x7F, 0, 0, 0, 0][..]);
        let result = decode_frame(&mut buf, WireFormat::Tagged, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::UnknownKind(0x7F))));
    }

    #[test]
    fn incomplete_header_needs_more_data() {
        let mut buf = BytesMut::from(&[0x01, 0x00][..]);
        assert!(decode_frame(&mut buf, WireFormat::Tagged, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .is_none());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn incomplete_payload_needs_more_data() {
        let mut buf = BytesMut::new();
        encode_frame(FrameKind::Text, b"hello", WireFormat::Tagged, &mut buf).unwrap();
        buf.truncate(TAGGED_HEADER_SIZE + 2);

        let result = decode_frame(&mut buf, WireFormat::Tagged, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), TAGGED_HEADER_SIZE + 2);
    }

    #[test]
    fn oversized_declared_length() {
        let mut buf = BytesMut::new();
        buf.put_u8(FrameKind::Object.tag());
        buf.put_u32(32 * 1024 * 1024);

        let result = decode_frame(&mut buf, WireFormat::Tagged, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(
            result,
            Err(FrameError::LengthOverflow { size, max }) if size == 32 * 1024 * 1024 && max == DEFAULT_MAX_PAYLOAD
        ));
    }

    #[test]
    fn trailing_bytes_stay_in_buffer() {
        let mut buf = BytesMut::new();
        encode_frame(FrameKind::Text, b"first", WireFormat::SignedLength, &mut buf).unwrap();
        buf.put_slice(&[0xAA, 0xBB]);

        let frame = decode_frame(&mut buf, WireFormat::SignedLength, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.payload.as_ref(), b"first");
        assert_eq!(buf.as_ref(), &[0xAA, 0xBB]);
    }

    #[test]
    fn multiple_frames_in_order() {
        let mut buf = BytesMut::new();
        encode_frame(FrameKind::Object, b"one", WireFormat::Tagged, &mut buf).unwrap();
        encode_frame(FrameKind::Text, b"two", WireFormat::Tagged, &mut buf).unwrap();

        let f1 = decode_frame(&mut buf, WireFormat::Tagged, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        let f2 = decode_frame(&mut buf, WireFormat::Tagged, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!((f1.kind, f1.payload.as_ref()), (FrameKind::Object, b"one".as_ref()));
        assert_eq!((f2.kind, f2.payload.as_ref()), (FrameKind::Text, b"two".as_ref()));
        assert!(buf.is_empty());
    }

    #[test]
    fn wire_size_depends_on_format() {
        let frame = RawFrame::new(FrameKind::Text, Bytes::from_static(b"test"));
        assert_eq!(frame.wire_size(WireFormat::Tagged), TAGGED_HEADER_SIZE + 4);
        assert_eq!(frame.wire_size(WireFormat::SignedLength), LEGACY_HEADER_SIZE + 4);
    }

    #[test]
    fn tokio_codec_decode_eof_reports_short_read() {
        use tokio_util::codec::Decoder;

        let mut codec = RawFrameCodec::new(WireFormat::Tagged, DEFAULT_MAX_PAYLOAD);
        let mut buf = BytesMut::new();
        encode_frame(FrameKind::Text, b"hello", WireFormat::Tagged, &mut buf).unwrap();
        buf.truncate(TAGGED_HEADER_SIZE + 3);

        let err = codec.decode_eof(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::ShortRead { expected, received } if expected == TAGGED_HEADER_SIZE + 5 && received == TAGGED_HEADER_SIZE + 3
        ));
    }

    #[test]
    fn tokio_codec_encoder_enforces_limit() {
        use tokio_util::codec::Encoder;

        let mut codec = RawFrameCodec::new(WireFormat::Tagged, 4);
        let mut buf = BytesMut::new();
        let err = codec
            .encode(RawFrame::new(FrameKind::Text, "oversized"), &mut buf)
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 9, max: 4 }));
        assert!(buf.is_empty());
    }
}
