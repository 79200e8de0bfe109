mod cmd;
mod exit;
mod logging;
mod output;

use std::time::Duration;

use clap::Parser;

use crate::cmd::{parse_duration, Command, ConnectOptions};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "u2fhid", version, about = "U2F HID security key diagnostics")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Override the HID report size instead of using the device default.
    #[arg(long, value_name = "BYTES", global = true)]
    report_size: Option<usize>,

    /// Per-request timeout (e.g. 3s, 500ms). Keepalives from the device extend it.
    #[arg(
        long,
        value_name = "DURATION",
        default_value = "3s",
        value_parser = parse_duration,
        global = true
    )]
    timeout: Duration,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if err.use_stderr() => {
            let _ = err.print();
            std::process::exit(exit::USAGE);
        }
        Err(err) => err.exit(),
    };
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let options = ConnectOptions {
        report_size: cli.report_size,
        timeout: cli.timeout,
    };
    let result = cmd::run(cli.command, &options, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
