use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use wirepair_frame::{FrameConfig, WireFormat};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an echo server.
    Echo(EchoArgs),
    /// Send a single message.
    Send(SendArgs),
    /// Listen and print received messages.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, format: OutputFormat, framing: &FramingOptions) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args, framing).await,
        Command::Send(args) => send::run(args, format, framing).await,
        Command::Listen(args) => listen::run(args, format, framing).await,
        Command::Version(args) => version::run(args),
    }
}

/// Framing flags shared by every connection the CLI opens.
#[derive(Debug, Clone, Default)]
pub struct FramingOptions {
    pub max_payload: Option<usize>,
    pub read_timeout: Option<String>,
}

impl FramingOptions {
    pub fn frame_config(&self, legacy: bool) -> CliResult<FrameConfig> {
        let mut config = FrameConfig::default();
        if legacy {
            config.wire_format = WireFormat::SignedLength;
        }
        if let Some(max) = self.max_payload {
            if max == 0 || max > config.wire_format.max_length() {
                return Err(CliError::new(
                    USAGE,
                    format!(
                        "--max-payload must be between 1 and {}",
                        config.wire_format.max_length()
                    ),
                ));
            }
            config.max_payload_size = max;
        }
        if let Some(timeout) = &self.read_timeout {
            config.read_timeout = Some(parse_duration(timeout)?);
        }
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Use the signed-length header instead of the tagged header.
    #[arg(long)]
    pub legacy: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to.
    pub path: PathBuf,
    /// Text payload.
    #[arg(long, conflicts_with = "json", required_unless_present = "json")]
    pub text: Option<String>,
    /// JSON object payload.
    #[arg(long)]
    pub json: Option<String>,
    /// Wait for one reply message and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    /// Use the signed-length header instead of the tagged header.
    #[arg(long)]
    pub legacy: bool,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Use the signed-length header instead of the tagged header.
    #[arg(long)]
    pub legacy: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn legacy_flag_selects_signed_length() {
        let options = FramingOptions::default();
        assert_eq!(
            options.frame_config(true).unwrap().wire_format,
            WireFormat::SignedLength
        );
        assert_eq!(
            options.frame_config(false).unwrap().wire_format,
            WireFormat::Tagged
        );
    }

    #[test]
    fn framing_options_apply_limits_and_timeouts() {
        let options = FramingOptions {
            max_payload: Some(1024),
            read_timeout: Some("250ms".to_string()),
        };
        let config = options.frame_config(false).unwrap();
        assert_eq!(config.max_payload_size, 1024);
        assert_eq!(config.read_timeout, Some(Duration::from_millis(250)));

        let options = FramingOptions {
            max_payload: Some(0),
            read_timeout: None,
        };
        assert_eq!(options.frame_config(false).unwrap_err().code, USAGE);
    }
}
