//! One bidirectional message channel over one connection.

use std::sync::Arc;

use tokio::io::{ReadHalf, WriteHalf};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;
use wirepair_transport::{ByteChannel, ByteSink, ByteSource};

use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};
use crate::message::Message;
use crate::object::ObjectCodec;
use crate::observer::SharedObserver;
use crate::reader::FrameDecoder;
use crate::writer::FrameEncoder;

/// A [`ChannelPair`] over a split Unix domain socket.
#[cfg(unix)]
pub type UnixChannelPair<C> = ChannelPair<
    tokio::net::unix::OwnedReadHalf,
    tokio::net::unix::OwnedWriteHalf,
    C,
>;

/// Owns the decoder and encoder for the two directions of one connection.
///
/// Closing the pair (explicitly, or by dropping it) cancels a shared token:
/// pending reads and writes on either half, including writes through
/// [`sender`](Self::sender) clones, return [`FrameError::ChannelClosed`].
/// Dropping the pair also shuts the write half down, so the peer sees end of
/// stream even while sender clones are still alive.
pub struct ChannelPair<R, W: ByteSink, C: ObjectCodec> {
    decoder: FrameDecoder<R, C>,
    encoder: FrameEncoder<W, C>,
    close: CancellationToken,
    release: ReleaseOnDrop<W, C>,
}

/// Cancels the close token and shuts the shared write half down on drop.
struct ReleaseOnDrop<W: ByteSink, C: ObjectCodec> {
    armed: Option<(DropGuard, FrameEncoder<W, C>)>,
}

impl<W: ByteSink, C: ObjectCodec> ReleaseOnDrop<W, C> {
    fn disarm(mut self) {
        if let Some((guard, _)) = self.armed.take() {
            guard.disarm();
        }
    }
}

impl<W: ByteSink, C: ObjectCodec> Drop for ReleaseOnDrop<W, C> {
    fn drop(&mut self) {
        let Some((guard, encoder)) = self.armed.take() else {
            return;
        };
        drop(guard);
        // Without a runtime the encoder is dropped here; clones keep the sink.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(err) = encoder.shutdown().await {
                    debug!(error = %err, "shutdown after drop failed");
                }
            });
        }
    }
}

impl<R: ByteSource, W: ByteSink, C: ObjectCodec> ChannelPair<R, W, C> {
    pub fn new(reader: R, writer: W, codec: C, config: FrameConfig) -> Self {
        let codec = Arc::new(codec);
        let close = CancellationToken::new();
        let decoder = FrameDecoder::with_config(reader, Arc::clone(&codec), config.clone())
            .with_cancellation(close.clone());
        let encoder =
            FrameEncoder::with_config(writer, codec, config).with_cancellation(close.clone());

        let release = ReleaseOnDrop {
            armed: Some((close.clone().drop_guard(), encoder.clone())),
        };

        Self {
            decoder,
            encoder,
            close,
            release,
        }
    }

    /// Install `observer` on both directions.
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.decoder = self.decoder.with_observer(Arc::clone(&observer));
        self.encoder = self.encoder.with_observer(observer);
        self
    }

    /// Receive the next message.
    pub async fn recv(&mut self) -> Result<Message<C::Value>> {
        self.decoder.next_message().await
    }

    /// Send one message. Returns once the frame is flushed.
    pub async fn send(&self, message: &Message<C::Value>) -> Result<()> {
        self.encoder.write_message(message).await
    }

    pub async fn send_text(&self, text: &str) -> Result<()> {
        self.encoder.write_text(text).await
    }

    pub async fn send_object(&self, value: &C::Value) -> Result<()> {
        self.encoder.write_object(value).await
    }

    /// An encoder handle for writing from other tasks.
    ///
    /// Writes through it are serialized with this pair's own writes.
    pub fn sender(&self) -> FrameEncoder<W, C> {
        self.encoder.clone()
    }

    /// The token that closes this pair when cancelled.
    pub fn close_token(&self) -> CancellationToken {
        self.close.clone()
    }

    /// Whether sends can no longer succeed. Same answer as
    /// [`FrameEncoder::is_closed`] on any sender clone.
    pub fn is_closed(&self) -> bool {
        self.encoder.is_closed()
    }

    /// Close both directions.
    ///
    /// Releases pending callers and shuts the write half down. Safe to call
    /// more than once.
    pub async fn close(&self) -> Result<()> {
        self.close.cancel();
        match self.encoder.shutdown().await {
            Ok(()) | Err(FrameError::ChannelClosed) => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub fn decoder_mut(&mut self) -> &mut FrameDecoder<R, C> {
        &mut self.decoder
    }

    pub fn encoder(&self) -> &FrameEncoder<W, C> {
        &self.encoder
    }

    /// Split into independently owned halves for full-duplex use.
    ///
    /// The returned token still closes both halves; dropping the parts no
    /// longer cancels it.
    pub fn into_parts(self) -> (FrameDecoder<R, C>, FrameEncoder<W, C>, CancellationToken) {
        let Self {
            decoder,
            encoder,
            close,
            release,
        } = self;
        release.disarm();
        (decoder, encoder, close)
    }
}

impl<S: ByteChannel, C: ObjectCodec> ChannelPair<ReadHalf<S>, WriteHalf<S>, C> {
    /// Build a pair over a single duplex stream.
    pub fn from_stream(stream: S, codec: C, config: FrameConfig) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(reader, writer, codec, config)
    }
}

#[cfg(unix)]
impl<C: ObjectCodec> UnixChannelPair<C> {
    /// Build a pair over a connected Unix domain socket without locking
    /// between directions.
    pub fn from_unix_stream(stream: tokio::net::UnixStream, codec: C, config: FrameConfig) -> Self {
        let (reader, writer) = stream.into_split();
        Self::new(reader, writer, codec, config)
    }
}
