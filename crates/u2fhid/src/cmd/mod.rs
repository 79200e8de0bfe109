use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand};
use u2fhid_session::TransportSession;

use crate::exit::{CliError, CliResult};
use crate::output::OutputFormat;

pub mod info;
pub mod lock;
pub mod msg;
pub mod ping;
pub mod version;
pub mod wink;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Allocate a channel and print what the device reports about itself.
    Info(DeviceArgs),
    /// Echo data through the device and measure the round trip.
    Ping(PingArgs),
    /// Make the device blink or otherwise identify itself.
    Wink(DeviceArgs),
    /// Lock the device to one channel for a few seconds.
    Lock(LockArgs),
    /// Send a raw U2F message (APDU) and print the response.
    Msg(MsgArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Connection options shared by every device command.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub report_size: Option<usize>,
    pub timeout: Duration,
}

pub fn run(command: Command, options: &ConnectOptions, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Info(args) => info::run(args, options, format),
        Command::Ping(args) => ping::run(args, options, format),
        Command::Wink(args) => wink::run(args, options, format),
        Command::Lock(args) => lock::run(args, options, format),
        Command::Msg(args) => msg::run(args, options, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// hidraw device node (e.g. /dev/hidraw0).
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    /// hidraw device node (e.g. /dev/hidraw0).
    pub path: PathBuf,
    /// String to echo.
    #[arg(long, conflicts_with = "size")]
    pub data: Option<String>,
    /// Echo this many generated bytes instead.
    #[arg(long, conflicts_with = "data")]
    pub size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct LockArgs {
    /// hidraw device node (e.g. /dev/hidraw0).
    pub path: PathBuf,
    /// Lock duration; 0 releases an existing lock.
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub seconds: u8,
}

#[derive(Args, Debug)]
pub struct MsgArgs {
    /// hidraw device node (e.g. /dev/hidraw0).
    pub path: PathBuf,
    /// Request APDU as hex.
    #[arg(long)]
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Open `path`, allocate a channel and bind a session to it.
#[cfg(target_os = "linux")]
pub fn open_session(path: &Path, options: &ConnectOptions) -> CliResult<TransportSession> {
    use u2fhid_session::{SessionConfig, SharedDevice};
    use u2fhid_transport::HidrawDevice;

    use crate::exit::{session_error, transport_error};

    let device = match options.report_size {
        Some(size) => HidrawDevice::open_with_report_size(path, size),
        None => HidrawDevice::open(path),
    }
    .map_err(|err| transport_error("open failed", err))?;

    let config = SessionConfig {
        request_timeout: options.timeout,
        ..SessionConfig::default()
    };
    TransportSession::open(SharedDevice::new(device), config)
        .map_err(|err| session_error("channel allocation failed", err))
}

#[cfg(not(target_os = "linux"))]
pub fn open_session(path: &Path, _options: &ConnectOptions) -> CliResult<TransportSession> {
    Err(CliError::new(
        crate::exit::USAGE,
        format!("{}: hidraw devices are only supported on Linux", path.display()),
    ))
}

/// Longest accepted `--timeout`. Keepalives restart the wait, so slow user
/// presence checks never need more.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Parse `5s`, `500ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("duration must not be empty".to_string());
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration: {input}"))?;
    if value == 0 {
        return Err("duration must be greater than zero".to_string());
    }

    let duration = if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    };
    if duration > MAX_TIMEOUT {
        return Err(format!(
            "duration {input} exceeds the maximum of {}s",
            MAX_TIMEOUT.as_secs()
        ));
    }
    Ok(duration)
}

/// Decode a user-supplied hex string, tolerating whitespace.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&compact)
        .map_err(|err| CliError::new(crate::exit::USAGE, format!("--hex is not valid hex: {err}")))
}
