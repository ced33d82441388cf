//! Minimal echo server: accepts one peer and echoes messages back.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! In another terminal:
//!   cargo run --features cli -- send /tmp/wirepair-echo-<pid>/echo.sock \
//!     --json '{"hello":"world"}' --wait

use wirepair::frame::UnixChannelPair;
use wirepair::transport::UnixSocketListener;
use wirepair::{FrameConfig, FrameError, JsonCodec};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sock_dir = std::env::temp_dir().join(format!("wirepair-echo-{}", std::process::id()));
    std::fs::create_dir_all(&sock_dir)?;
    let sock_path = sock_dir.join("echo.sock");

    let listener = UnixSocketListener::bind(&sock_path)?;
    eprintln!("Listening on {}", sock_path.display());

    let stream = listener.accept().await?;
    let mut pair = UnixChannelPair::from_unix_stream(
        stream,
        JsonCodec::<serde_json::Value>::new(),
        FrameConfig::default(),
    );

    loop {
        match pair.recv().await {
            Ok(message) => {
                eprintln!("Received {} message", message.kind().as_str());
                pair.send(&message).await?;
            }
            Err(FrameError::ChannelClosed) => {
                eprintln!("Peer disconnected");
                break;
            }
            Err(e) => {
                eprintln!("Dropping peer: {e}");
                break;
            }
        }
    }

    pair.close().await?;
    drop(listener);
    let _ = std::fs::remove_dir_all(&sock_dir);
    Ok(())
}
