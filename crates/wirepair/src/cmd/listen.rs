use serde_json::Value;
use tracing::{debug, info};
use wirepair_frame::{FrameError, JsonCodec, UnixChannelPair};
use wirepair_transport::UnixSocketListener;

use crate::cmd::{FramingOptions, ListenArgs};
use crate::exit::{frame_error, transport_error, CliResult, SUCCESS};
use crate::output::{peer_label, print_message, OutputFormat};

pub async fn run(args: ListenArgs, format: OutputFormat, framing: &FramingOptions) -> CliResult<i32> {
    let config = framing.frame_config(args.legacy)?;
    let listener =
        UnixSocketListener::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;

    let mut printed = 0usize;

    loop {
        let stream = tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(SUCCESS),
            accepted = listener.accept() => {
                accepted.map_err(|err| transport_error("accept failed", err))?
            }
        };

        let peer = peer_label(&stream);
        info!(peer = %peer, "peer connected");
        let mut pair =
            UnixChannelPair::from_unix_stream(stream, JsonCodec::<Value>::new(), config.clone());

        loop {
            let received = tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    let _ = pair.close().await;
                    return Ok(SUCCESS);
                }
                received = pair.recv() => received,
            };

            let message = match received {
                Ok(message) => message,
                Err(FrameError::ChannelClosed) => {
                    debug!(peer = %peer, "peer disconnected");
                    break;
                }
                Err(err) => return Err(frame_error("receive failed", err)),
            };

            print_message(&message, &peer, format);
            printed = printed.saturating_add(1);

            if let Some(count) = args.count {
                if printed >= count {
                    let _ = pair.close().await;
                    return Ok(SUCCESS);
                }
            }
        }
    }
}
