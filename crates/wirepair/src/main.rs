#[cfg(not(unix))]
compile_error!("the wirepair CLI requires Unix domain sockets");

mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::{Command, FramingOptions};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "wirepair", version, about = "Framed message channel CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "WIREPAIR_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    /// Maximum accepted payload size in bytes.
    #[arg(long, value_name = "BYTES", global = true)]
    max_payload: Option<usize>,

    /// Deadline for receiving the rest of a frame once it has started (e.g. 5s, 500ms).
    #[arg(long, value_name = "DURATION", global = true)]
    read_timeout: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let framing = FramingOptions {
        max_payload: cli.max_payload,
        read_timeout: cli.read_timeout,
    };
    let result = cmd::run(cli.command, format, &framing).await;

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
