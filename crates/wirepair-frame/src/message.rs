use crate::codec::FrameKind;

/// One decoded message: exactly one of text or object per frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<T> {
    /// UTF-8 text, sent without going through the object codec.
    Text(String),
    /// A value carried through the object codec.
    Object(T),
}

impl<T> Message<T> {
    pub fn text(text: impl Into<String>) -> Self {
        Message::Text(text.into())
    }

    pub fn object(value: T) -> Self {
        Message::Object(value)
    }

    pub fn kind(&self) -> FrameKind {
        match self {
            Message::Text(_) => FrameKind::Text,
            Message::Object(_) => FrameKind::Object,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Message::Text(text) => Some(text),
            Message::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&T> {
        match self {
            Message::Object(value) => Some(value),
            Message::Text(_) => None,
        }
    }

    pub fn into_object(self) -> Option<T> {
        match self {
            Message::Object(value) => Some(value),
            Message::Text(_) => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Message::Text(text) => Some(text),
            Message::Object(_) => None,
        }
    }
}
