use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;
use wirepair_frame::Message;
#[cfg(unix)]
use wirepair_transport::PeerCredentials;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    kind: &'static str,
    payload_size: usize,
    payload: &'a Value,
    peer: &'a str,
    timestamp: String,
}

/// JSON view of a payload; text becomes a JSON string.
fn payload_value(message: &Message<Value>) -> Value {
    match message {
        Message::Text(text) => Value::String(text.clone()),
        Message::Object(value) => value.clone(),
    }
}

/// Bytes the message payload occupies, excluding the codec version byte.
fn payload_size(message: &Message<Value>) -> usize {
    match message {
        Message::Text(text) => text.len(),
        Message::Object(value) => serde_json::to_vec(value).map(|v| v.len()).unwrap_or(0),
    }
}

fn payload_display(message: &Message<Value>) -> String {
    match message {
        Message::Text(text) => text.clone(),
        Message::Object(value) => value.to_string(),
    }
}

pub fn print_message(message: &Message<Value>, peer: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let payload = payload_value(message);
            let out = MessageOutput {
                kind: message.kind().as_str(),
                payload_size: payload_size(message),
                payload: &payload,
                peer,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "SIZE", "PEER", "PAYLOAD"])
                .add_row(vec![
                    message.kind().as_str().to_string(),
                    payload_size(message).to_string(),
                    peer.to_string(),
                    payload_display(message),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "kind={} size={} peer={} payload={}",
                message.kind().as_str(),
                payload_size(message),
                peer,
                payload_display(message)
            );
        }
        OutputFormat::Raw => {
            let mut data = payload_display(message).into_bytes();
            data.push(b'\n');
            print_raw(&data);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Short label for the process behind a connected socket.
#[cfg(unix)]
pub fn peer_label(stream: &tokio::net::UnixStream) -> String {
    match PeerCredentials::of(stream) {
        Some(PeerCredentials { pid: Some(pid), uid, .. }) => format!("pid:{pid} uid:{uid}"),
        Some(PeerCredentials { uid, .. }) => format!("uid:{uid}"),
        None => "unknown".to_string(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn text_payload_renders_as_json_string() {
        let message = Message::text("héllo");
        assert_eq!(payload_value(&message), json!("héllo"));
        assert_eq!(payload_size(&message), 6);
        assert_eq!(payload_display(&message), "héllo");
    }

    #[test]
    fn object_payload_renders_compact() {
        let message = Message::Object(json!({"a": [1, 2]}));
        assert_eq!(payload_display(&message), r#"{"a":[1,2]}"#);
        assert_eq!(payload_size(&message), 11);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn peer_label_names_local_process() {
        let (a, _b) = tokio::net::UnixStream::pair().unwrap();
        let label = peer_label(&a);
        assert!(label.contains(&format!("pid:{}", std::process::id())) || label.starts_with("uid:"));
    }
}
