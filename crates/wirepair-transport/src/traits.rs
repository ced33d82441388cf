use tokio::io::{AsyncRead, AsyncWrite};

/// Readable half of a connection.
///
/// Blanket-implemented for every tokio reader that can be moved between tasks,
/// e.g. `tokio::net::unix::OwnedReadHalf`, `tokio::io::ReadHalf<T>` or
/// `tokio::io::DuplexStream`.
pub trait ByteSource: AsyncRead + Unpin + Send + 'static {}

impl<T> ByteSource for T where T: AsyncRead + Unpin + Send + 'static {}

/// Writable half of a connection.
pub trait ByteSink: AsyncWrite + Unpin + Send + 'static {}

impl<T> ByteSink for T where T: AsyncWrite + Unpin + Send + 'static {}

/// A full-duplex connection, e.g. `tokio::net::UnixStream`.
pub trait ByteChannel: ByteSource + ByteSink {}

impl<T> ByteChannel for T where T: ByteSource + ByteSink {}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_channel<T: ByteChannel>() {}
    fn assert_source<T: ByteSource>() {}
    fn assert_sink<T: ByteSink>() {}

    #[test]
    fn tokio_streams_qualify() {
        assert_channel::<tokio::io::DuplexStream>();
        assert_source::<tokio::io::ReadHalf<tokio::io::DuplexStream>>();
        assert_sink::<tokio::io::WriteHalf<tokio::io::DuplexStream>>();
    }

    #[cfg(unix)]
    #[test]
    fn unix_halves_qualify() {
        assert_channel::<tokio::net::UnixStream>();
        assert_source::<tokio::net::unix::OwnedReadHalf>();
        assert_sink::<tokio::net::unix::OwnedWriteHalf>();
    }
}
