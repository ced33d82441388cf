use std::io::ErrorKind;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};
use wirepair_transport::ByteSource;

use crate::codec::{FrameConfig, FrameHeader, FrameKind, RawFrame};
use crate::error::{FrameError, Result};
use crate::message::Message;
use crate::object::ObjectCodec;
use crate::observer::{default_observer, Direction, MessageSummary, SharedObserver};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    /// Between frames.
    Idle,
    /// Header or payload partially consumed.
    InFrame,
    /// Stream position is lost; every call fails.
    Broken,
}

/// Reads complete messages from any async byte source.
///
/// Partial reads are handled internally. Bytes that arrive beyond the current
/// frame stay buffered for the next call, so the stream position always sits
/// on a frame boundary between successful calls.
///
/// The first error ends the decoder: the stream can no longer be trusted and
/// every later call returns [`FrameError::ChannelClosed`].
pub struct FrameDecoder<R, C: ObjectCodec> {
    inner: R,
    buf: BytesMut,
    codec: Arc<C>,
    config: FrameConfig,
    observer: SharedObserver,
    cancel: CancellationToken,
    state: ReadState,
}

impl<R: ByteSource, C: ObjectCodec> FrameDecoder<R, C> {
    /// Create a decoder with default configuration.
    pub fn new(inner: R, codec: C) -> Self {
        Self::with_config(inner, Arc::new(codec), FrameConfig::default())
    }

    /// Create a decoder with explicit configuration and a shared codec.
    pub fn with_config(inner: R, codec: Arc<C>, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            codec,
            config,
            observer: default_observer(),
            cancel: CancellationToken::new(),
            state: ReadState::Idle,
        }
    }

    /// Replace the observer notified after each decoded message.
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Abort pending and future reads when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Read the next complete message.
    ///
    /// Returns [`FrameError::ChannelClosed`] when the peer closes between
    /// frames, when the cancellation token fires, and after any earlier error.
    /// Dropping the returned future mid-frame also breaks the decoder.
    pub async fn next_message(&mut self) -> Result<Message<C::Value>> {
        match self.state {
            ReadState::Idle => {}
            ReadState::InFrame => {
                // A previous call was dropped halfway through a frame.
                self.state = ReadState::Broken;
                return Err(FrameError::ChannelClosed);
            }
            ReadState::Broken => return Err(FrameError::ChannelClosed),
        }

        let cancel = self.cancel.clone();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FrameError::ChannelClosed),
            result = self.read_message() => result,
        };

        match &result {
            Ok(_) => self.state = ReadState::Idle,
            Err(FrameError::ChannelClosed) => self.state = ReadState::Broken,
            Err(err) => {
                warn!(error = %err, "inbound frame failed; connection must be dropped");
                self.state = ReadState::Broken;
            }
        }
        result
    }

    /// Read exactly `n` bytes.
    ///
    /// Fails with [`FrameError::ShortRead`] if the stream ends first. On
    /// failure the bytes received so far stay buffered.
    pub async fn read_exactly(&mut self, n: usize) -> Result<Bytes> {
        while self.buf.len() < n {
            let wanted = (n - self.buf.len()).min(READ_CHUNK_SIZE);
            self.buf.reserve(wanted);
            if self.fill().await? == 0 {
                return Err(FrameError::ShortRead {
                    expected: n,
                    received: self.buf.len(),
                });
            }
        }
        Ok(self.buf.split_to(n).freeze())
    }

    /// Read and validate one frame header.
    ///
    /// End of stream before the first header byte is reported as
    /// [`FrameError::ChannelClosed`]; a length above `max_payload_size` as
    /// [`FrameError::LengthOverflow`], before any payload byte is read.
    pub async fn read_header(&mut self) -> Result<FrameHeader> {
        let format = self.config.wire_format;
        let bytes = match self.read_exactly(format.header_size()).await {
            Ok(bytes) => bytes,
            Err(FrameError::ShortRead { received: 0, .. }) => {
                return Err(FrameError::ChannelClosed)
            }
            Err(err) => return Err(err),
        };

        let header = FrameHeader::parse(&bytes, format)?;
        trace!(kind = header.kind.as_str(), len = header.len, "frame header");

        if header.len > self.config.max_payload_size {
            return Err(FrameError::LengthOverflow {
                size: header.len,
                max: self.config.max_payload_size,
            });
        }
        Ok(header)
    }

    async fn read_message(&mut self) -> Result<Message<C::Value>> {
        match self.config.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, self.await_frame_start())
                .await
                .map_err(|_| FrameError::Timeout(limit))??,
            None => self.await_frame_start().await?,
        }

        self.state = ReadState::InFrame;
        let frame = match self.config.read_timeout {
            Some(limit) => tokio::time::timeout(limit, self.read_frame())
                .await
                .map_err(|_| FrameError::Timeout(limit))??,
            None => self.read_frame().await?,
        };

        let (message, summary) = self.decode_payload(frame)?;
        self.observer.on_message(Direction::Inbound, &summary);
        Ok(message)
    }

    async fn read_frame(&mut self) -> Result<RawFrame> {
        let header = self.read_header().await?;
        let payload = self.read_exactly(header.len).await?;
        Ok(RawFrame {
            kind: header.kind,
            payload,
        })
    }

    /// Wait until at least one byte of the next frame is buffered.
    async fn await_frame_start(&mut self) -> Result<()> {
        if !self.buf.is_empty() {
            return Ok(());
        }
        if self.fill().await? == 0 {
            return Err(FrameError::ChannelClosed);
        }
        Ok(())
    }

    async fn fill(&mut self) -> Result<usize> {
        loop {
            match self.inner.read_buf(&mut self.buf).await {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    fn decode_payload(&self, frame: RawFrame) -> Result<(Message<C::Value>, MessageSummary)> {
        match frame.kind {
            FrameKind::Text => {
                let text = std::str::from_utf8(&frame.payload)?.to_owned();
                let summary = MessageSummary::text(&text);
                Ok((Message::Text(text), summary))
            }
            FrameKind::Object => {
                let value = self
                    .codec
                    .decode(&frame.payload)
                    .map_err(FrameError::Decode)?;
                Ok((
                    Message::Object(value),
                    MessageSummary::object(frame.payload.len()),
                ))
            }
        }
    }

    /// Whether an earlier failure has ended this decoder.
    pub fn is_broken(&self) -> bool {
        self.state != ReadState::Idle
    }

    /// Bytes received but not yet consumed by a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the decoder and return the inner source.
    ///
    /// Buffered bytes are discarded.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Update maximum payload size for subsequent frames.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current decoder configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
