//! Object codecs: how `Object` payloads become bytes and back.
//!
//! The framing layer only calls [`ObjectCodec::encode`] and
//! [`ObjectCodec::decode`]; what the bytes mean is up to the codec.
//!
//! - [`JsonCodec`]: versioned JSON via `serde_json`, the default for typed values
//! - [`RawCodec`]: pass-through for callers that serialize on their own

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Schema version byte written in front of every [`JsonCodec`] payload.
pub const JSON_CODEC_VERSION: u8 = 1;

/// Errors raised by an [`ObjectCodec`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload was written by an incompatible codec version.
    #[error("unsupported codec version {found} (expected {expected})")]
    UnsupportedVersion { found: u8, expected: u8 },

    /// The payload is empty where the codec requires content.
    #[error("empty payload")]
    Empty,

    /// Codec-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Turns values into payload bytes and back.
pub trait ObjectCodec: Send + Sync + 'static {
    /// The value type carried in `Object` messages.
    type Value: Send + Sync + 'static;

    fn encode(&self, value: &Self::Value) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Value, CodecError>;
}

/// Versioned JSON codec.
///
/// Payload layout: one version byte ([`JSON_CODEC_VERSION`]) followed by a
/// JSON document. The version byte lets the document schema evolve without
/// touching the framing.
pub struct JsonCodec<T> {
    _value: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub const fn new() -> Self {
        Self {
            _value: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for JsonCodec<T> {}

impl<T> fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCodec")
            .field("version", &JSON_CODEC_VERSION)
            .field("value", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> ObjectCodec for JsonCodec<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type Value = T;

    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(64);
        out.push(JSON_CODEC_VERSION);
        serde_json::to_writer(&mut out, value)?;
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        let (&version, document) = bytes.split_first().ok_or(CodecError::Empty)?;
        if version != JSON_CODEC_VERSION {
            return Err(CodecError::UnsupportedVersion {
                found: version,
                expected: JSON_CODEC_VERSION,
            });
        }
        Ok(serde_json::from_slice(document)?)
    }
}

/// Pass-through codec: the object is its own payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl ObjectCodec for RawCodec {
    type Value = Vec<u8>;

    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>, CodecError> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct CompileRequest {
        id: u32,
        args: Vec<String>,
        incremental: bool,
    }

    #[test]
    fn json_roundtrip_struct() {
        let codec = JsonCodec::<CompileRequest>::new();
        let value = CompileRequest {
            id: 7,
            args: vec!["-d".to_string(), "out".to_string()],
            incremental: true,
        };

        let bytes = codec.encode(&value).unwrap();
        assert_eq!(bytes[0], JSON_CODEC_VERSION);
        assert_eq!(codec.decode(&bytes).unwrap(), value);
    }

    #[test]
    fn json_payload_is_never_empty() {
        let codec = JsonCodec::<()>::new();
        let bytes = codec.encode(&()).unwrap();
        assert_eq!(bytes, b"\x01null");
    }

    #[test]
    fn json_rejects_unknown_version() {
        let codec = JsonCodec::<serde_json::Value>::new();
        let err = codec.decode(b"\x09{}").unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnsupportedVersion {
                found: 9,
                expected: JSON_CODEC_VERSION
            }
        ));
    }

    #[test]
    fn json_rejects_empty_payload() {
        let codec = JsonCodec::<serde_json::Value>::new();
        assert!(matches!(codec.decode(b""), Err(CodecError::Empty)));
    }

    #[test]
    fn json_rejects_corrupt_document() {
        let codec = JsonCodec::<CompileRequest>::new();
        assert!(matches!(codec.decode(b"\x01{\"id\":"), Err(CodecError::Json(_))));
    }

    #[test]
    fn raw_codec_passes_bytes_through() {
        let codec = RawCodec;
        let bytes = codec.encode(&vec![1, 2, 3]).unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(codec.decode(&bytes).unwrap(), vec![1, 2, 3]);
        assert!(codec.encode(&Vec::new()).unwrap().is_empty());
    }
}
