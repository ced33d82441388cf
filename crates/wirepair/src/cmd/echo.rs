use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use wirepair_frame::{CancellationToken, FrameError, JsonCodec, UnixChannelPair};
use wirepair_transport::UnixSocketListener;

use crate::cmd::{EchoArgs, FramingOptions};
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::peer_label;

type EchoPair = UnixChannelPair<JsonCodec<Value>>;

/// How a session ended.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// Peer closed the connection between messages.
    Disconnected,
    /// A fatal frame error; the connection is dropped.
    Dropped,
    /// Server shutdown.
    Shutdown,
}

pub async fn run(args: EchoArgs, framing: &FramingOptions) -> CliResult<i32> {
    let config = framing.frame_config(args.legacy)?;
    let listener =
        UnixSocketListener::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;
    info!(path = %args.path.display(), format = ?config.wire_format, "echo server listening");

    let shutdown = CancellationToken::new();
    let mut sessions = JoinSet::new();

    loop {
        let stream = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            accepted = listener.accept() => {
                accepted.map_err(|err| transport_error("accept failed", err))?
            }
            // Reap finished sessions so the set does not grow without bound.
            Some(_) = sessions.join_next(), if !sessions.is_empty() => continue,
        };

        let peer = peer_label(&stream);
        info!(peer = %peer, "peer connected");
        let pair = EchoPair::from_unix_stream(stream, JsonCodec::new(), config.clone());
        sessions.spawn(serve(pair, peer, shutdown.child_token()));
    }

    info!("shutting down echo server");
    shutdown.cancel();
    while sessions.join_next().await.is_some() {}
    Ok(SUCCESS)
}

async fn serve(mut pair: EchoPair, peer: String, shutdown: CancellationToken) -> SessionEnd {
    let end = loop {
        let received = tokio::select! {
            _ = shutdown.cancelled() => break SessionEnd::Shutdown,
            received = pair.recv() => received,
        };

        let message = match received {
            Ok(message) => message,
            Err(err) => break classify_recv_error(&peer, err),
        };

        debug!(peer = %peer, kind = message.kind().as_str(), "echoing message");
        // A peer that stops reading would otherwise hold the send forever.
        let sent = tokio::select! {
            _ = shutdown.cancelled() => break SessionEnd::Shutdown,
            sent = pair.send(&message) => sent,
        };
        if let Err(err) = sent {
            warn!(peer = %peer, error = %err, "echo send failed");
            break SessionEnd::Dropped;
        }
    };

    if let Err(err) = pair.close().await {
        debug!(peer = %peer, error = %err, "close failed");
    }
    info!(peer = %peer, end = ?end, "session ended");
    end
}

fn classify_recv_error(peer: &str, err: FrameError) -> SessionEnd {
    match err {
        FrameError::ChannelClosed => SessionEnd::Disconnected,
        err => {
            warn!(peer = %peer, error = %err, "dropping connection");
            SessionEnd::Dropped
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;
    use wirepair_frame::{FrameConfig, Message};

    use super::*;

    fn session() -> (EchoPair, tokio::net::UnixStream) {
        let (server, client) = tokio::net::UnixStream::pair().unwrap();
        let pair = EchoPair::from_unix_stream(server, JsonCodec::new(), FrameConfig::default());
        (pair, client)
    }

    #[tokio::test]
    async fn echoes_text_and_objects_until_disconnect() {
        let (server, client) = session();
        let task = tokio::spawn(serve(server, "test".to_string(), CancellationToken::new()));

        let mut client =
            EchoPair::from_unix_stream(client, JsonCodec::new(), FrameConfig::default());
        client.send_text("hi").await.unwrap();
        assert_eq!(client.recv().await.unwrap(), Message::text("hi"));

        let value = serde_json::json!({"n": 1});
        client.send_object(&value).await.unwrap();
        assert_eq!(client.recv().await.unwrap(), Message::Object(value));

        client.close().await.unwrap();
        assert_eq!(task.await.unwrap(), SessionEnd::Disconnected);
    }

    #[tokio::test]
    async fn corrupt_frame_drops_connection() {
        let (server, mut client) = session();
        let task = tokio::spawn(serve(server, "test".to_string(), CancellationToken::new()));

        client.write_all(&[0x09, 0, 0, 0, 0]).await.unwrap();
        assert_eq!(task.await.unwrap(), SessionEnd::Dropped);
    }

    #[tokio::test]
    async fn shutdown_ends_idle_session() {
        let (server, _client) = session();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(serve(server, "test".to_string(), shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();
        let end = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("session should stop")
            .unwrap();
        assert_eq!(end, SessionEnd::Shutdown);
    }

    #[tokio::test]
    async fn shutdown_releases_session_blocked_on_non_reading_peer() {
        let (server, client) = session();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(serve(server, "test".to_string(), shutdown.clone()));

        // The client floods the server and never reads the echoes back.
        let client = EchoPair::from_unix_stream(client, JsonCodec::new(), FrameConfig::default());
        let sender = client.sender();
        let flood = tokio::spawn(async move {
            let text = "x".repeat(1024 * 1024);
            for _ in 0..8 {
                if sender.write_text(&text).await.is_err() {
                    break;
                }
            }
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.cancel();
        let end = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("session should stop despite the stalled echo")
            .unwrap();
        assert_eq!(end, SessionEnd::Shutdown);

        drop(client);
        flood.abort();
    }
}
