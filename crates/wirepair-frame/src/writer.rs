use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use wirepair_transport::ByteSink;

use crate::codec::{encode_frame, FrameConfig, FrameKind};
use crate::error::{FrameError, Result};
use crate::message::Message;
use crate::object::ObjectCodec;
use crate::observer::{default_observer, Direction, MessageSummary, SharedObserver};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteState {
    Ready,
    /// Set while a frame is on its way out; still set if that write was dropped.
    InFrame,
    Broken,
    Shutdown,
}

struct Sink<W> {
    inner: W,
    buf: BytesMut,
    state: WriteState,
}

/// Writes complete messages to any async byte sink.
///
/// Clones share one sink behind a FIFO lock, so frames from concurrent
/// writers never interleave and appear in the order the lock was acquired.
/// Every write returns only after the whole frame has been written and
/// flushed.
pub struct FrameEncoder<W, C: ObjectCodec> {
    sink: Arc<Mutex<Sink<W>>>,
    /// Set once the sink leaves `Ready` for good; readable without the lock.
    closed: Arc<AtomicBool>,
    codec: Arc<C>,
    config: Arc<FrameConfig>,
    observer: SharedObserver,
    cancel: CancellationToken,
}

impl<W, C: ObjectCodec> Clone for FrameEncoder<W, C> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            closed: Arc::clone(&self.closed),
            codec: Arc::clone(&self.codec),
            config: Arc::clone(&self.config),
            observer: Arc::clone(&self.observer),
            cancel: self.cancel.clone(),
        }
    }
}

impl<W: ByteSink, C: ObjectCodec> FrameEncoder<W, C> {
    /// Create an encoder with default configuration.
    pub fn new(inner: W, codec: C) -> Self {
        Self::with_config(inner, Arc::new(codec), FrameConfig::default())
    }

    /// Create an encoder with explicit configuration and a shared codec.
    pub fn with_config(inner: W, codec: Arc<C>, config: FrameConfig) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Sink {
                inner,
                buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
                state: WriteState::Ready,
            })),
            closed: Arc::new(AtomicBool::new(false)),
            codec,
            config: Arc::new(config),
            observer: default_observer(),
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the observer notified after each written message.
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Abort pending and future writes when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Write one message as one frame.
    pub async fn write_message(&self, message: &Message<C::Value>) -> Result<()> {
        match message {
            Message::Text(text) => self.write_text(text).await,
            Message::Object(value) => self.write_object(value).await,
        }
    }

    /// Write a text frame carrying the UTF-8 bytes of `text`.
    pub async fn write_text(&self, text: &str) -> Result<()> {
        self.write_payload(
            FrameKind::Text,
            Cow::Borrowed(text.as_bytes()),
            MessageSummary::text(text),
        )
        .await
    }

    /// Encode `value` with the object codec and write it as one frame.
    ///
    /// Nothing is written if encoding fails.
    pub async fn write_object(&self, value: &C::Value) -> Result<()> {
        let bytes = self.codec.encode(value).map_err(FrameError::Encode)?;
        let summary = MessageSummary::object(bytes.len());
        self.write_payload(FrameKind::Object, Cow::Owned(bytes), summary)
            .await
    }

    async fn write_payload(
        &self,
        kind: FrameKind,
        payload: Cow<'_, [u8]>,
        summary: MessageSummary,
    ) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(FrameError::ChannelClosed),
            result = self.write_frame(kind, &payload) => result?,
        }

        self.observer.on_message(Direction::Outbound, &summary);
        Ok(())
    }

    async fn write_frame(&self, kind: FrameKind, payload: &[u8]) -> Result<()> {
        let mut guard = self.sink.lock().await;
        let sink = &mut *guard;
        match sink.state {
            WriteState::Ready => {}
            WriteState::InFrame => {
                // The previous holder was dropped mid-frame; the peer sees garbage.
                sink.state = WriteState::Broken;
                return Err(FrameError::ChannelClosed);
            }
            WriteState::Broken | WriteState::Shutdown => return Err(FrameError::ChannelClosed),
        }

        sink.buf.clear();
        encode_frame(kind, payload, self.config.wire_format, &mut sink.buf)?;

        sink.state = WriteState::InFrame;
        let in_flight = InFlight {
            closed: &self.closed,
            done: false,
        };
        let result = match self.config.write_timeout {
            Some(limit) => tokio::time::timeout(limit, write_all_flush(&mut sink.inner, &sink.buf))
                .await
                .unwrap_or(Err(FrameError::Timeout(limit))),
            None => write_all_flush(&mut sink.inner, &sink.buf).await,
        };

        match &result {
            Ok(()) => {
                sink.state = WriteState::Ready;
                in_flight.finish();
            }
            Err(err) => {
                warn!(error = %err, "outbound frame failed; connection must be dropped");
                sink.state = WriteState::Broken;
            }
        }
        result
    }

    /// Shut down the write direction. Later writes fail with
    /// [`FrameError::ChannelClosed`]. Calling this again is a no-op.
    ///
    /// Waits for an in-progress frame to finish first.
    pub async fn shutdown(&self) -> Result<()> {
        let mut sink = self.sink.lock().await;
        if sink.state == WriteState::Shutdown {
            return Ok(());
        }
        sink.state = WriteState::Shutdown;
        self.closed.store(true, Ordering::Release);
        match sink.inner.shutdown().await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(FrameError::from_write_io(err)),
        }
    }

    /// Whether writes can no longer succeed: the encoder was cancelled,
    /// shut down, or broken by an earlier failed or abandoned frame.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.closed.load(Ordering::Acquire)
    }

    /// Current encoder configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

/// Marks the encoder closed unless the frame in flight completes.
struct InFlight<'a> {
    closed: &'a AtomicBool,
    done: bool,
}

impl InFlight<'_> {
    fn finish(mut self) {
        self.done = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.closed.store(true, Ordering::Release);
        }
    }
}

async fn write_all_flush<W: AsyncWrite + Unpin>(inner: &mut W, bytes: &[u8]) -> Result<()> {
    inner
        .write_all(bytes)
        .await
        .map_err(FrameError::from_write_io)?;
    inner.flush().await.map_err(FrameError::from_write_io)
}
