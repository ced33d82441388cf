//! Post-completion message observers.
//!
//! The decoder and encoder report each message only after it has been fully
//! read or written. Observers see a summary, never the payload itself, and
//! cannot influence the frame path.

use std::sync::Arc;

use crate::codec::FrameKind;

/// Maximum number of characters kept in a text preview.
pub const PREVIEW_CHARS: usize = 64;

/// Which way a message travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// What observers learn about a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
    pub kind: FrameKind,
    /// Payload size on the wire, header excluded.
    pub payload_len: usize,
    /// Leading characters of a text payload.
    pub preview: Option<String>,
}

impl MessageSummary {
    pub fn text(text: &str) -> Self {
        Self {
            kind: FrameKind::Text,
            payload_len: text.len(),
            preview: Some(text.chars().take(PREVIEW_CHARS).collect()),
        }
    }

    pub fn object(payload_len: usize) -> Self {
        Self {
            kind: FrameKind::Object,
            payload_len,
            preview: None,
        }
    }
}

/// Receives a summary of every message after it completes.
pub trait MessageObserver: Send + Sync {
    fn on_message(&self, direction: Direction, summary: &MessageSummary);
}

pub type SharedObserver = Arc<dyn MessageObserver>;

/// Emits one `tracing` debug event per message.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl MessageObserver for TracingObserver {
    fn on_message(&self, direction: Direction, summary: &MessageSummary) {
        tracing::debug!(
            direction = direction.as_str(),
            kind = summary.kind.as_str(),
            size = summary.payload_len,
            preview = ?summary.preview,
            "message"
        );
    }
}

/// Ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl MessageObserver for NoopObserver {
    fn on_message(&self, _direction: Direction, _summary: &MessageSummary) {}
}

pub(crate) fn default_observer() -> SharedObserver {
    Arc::new(TracingObserver)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records every event for assertions.
    #[derive(Default)]
    pub struct RecordingObserver {
        pub events: Mutex<Vec<(Direction, MessageSummary)>>,
    }

    impl RecordingObserver {
        pub fn events(&self) -> Vec<(Direction, MessageSummary)> {
            self.events.lock().unwrap().clone()
        }
    }

    impl MessageObserver for RecordingObserver {
        fn on_message(&self, direction: Direction, summary: &MessageSummary) {
            self.events.lock().unwrap().push((direction, summary.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_preview_is_truncated_by_chars() {
        let long = "é".repeat(100);
        let summary = MessageSummary::text(&long);
        assert_eq!(summary.payload_len, 200);
        assert_eq!(summary.preview.unwrap().chars().count(), PREVIEW_CHARS);
    }

    #[test]
    fn object_summary_has_no_preview() {
        let summary = MessageSummary::object(12);
        assert_eq!(summary.kind, FrameKind::Object);
        assert_eq!(summary.payload_len, 12);
        assert!(summary.preview.is_none());
    }
}
