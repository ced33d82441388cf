use std::time::Duration;

use serde_json::Value;
use wirepair_frame::{FrameError, JsonCodec, Message, UnixChannelPair};
use wirepair_transport::connect;

use crate::cmd::{parse_duration, FramingOptions, SendArgs};
use crate::exit::{frame_error, transport_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{peer_label, print_message, OutputFormat};

pub async fn run(args: SendArgs, format: OutputFormat, framing: &FramingOptions) -> CliResult<i32> {
    let config = framing.frame_config(args.legacy)?;
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let message = resolve_message(&args)?;

    let stream = connect(&args.path)
        .await
        .map_err(|err| transport_error("connect failed", err))?;
    let peer = peer_label(&stream);
    let mut pair = UnixChannelPair::from_unix_stream(stream, JsonCodec::<Value>::new(), config);

    pair.send(&message)
        .await
        .map_err(|err| frame_error("send failed", err))?;

    if args.wait {
        let reply = wait_for_reply(pair.recv(), wait_timeout).await?;
        print_message(&reply, &peer, format);
    }

    pair.close()
        .await
        .map_err(|err| frame_error("close failed", err))?;
    Ok(SUCCESS)
}

fn resolve_message(args: &SendArgs) -> CliResult<Message<Value>> {
    if let Some(json) = &args.json {
        let value = serde_json::from_str::<Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Ok(Message::Object(value));
    }
    Ok(Message::Text(args.text.clone().unwrap_or_default()))
}

async fn wait_for_reply<F>(reply: F, limit: Duration) -> CliResult<Message<Value>>
where
    F: std::future::Future<Output = Result<Message<Value>, FrameError>>,
{
    match tokio::time::timeout(limit, reply).await {
        Ok(Ok(message)) => Ok(message),
        Ok(Err(err)) => Err(frame_error("receive failed", err)),
        Err(_) => Err(CliError::new(
            TIMEOUT,
            format!("no reply within {}ms", limit.as_millis()),
        )),
    }
}
