use serde::Serialize;

use crate::cmd::{open_session, ConnectOptions, DeviceArgs};
use crate::exit::{CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct InfoOutput {
    device: String,
    report_size: usize,
    max_payload: usize,
    channel: String,
    protocol_version: u8,
    device_version: String,
    capabilities: Vec<&'static str>,
}

pub fn run(args: DeviceArgs, options: &ConnectOptions, format: OutputFormat) -> CliResult<i32> {
    let session = open_session(&args.path, options)?;
    let info = session
        .device_info()
        .ok_or_else(|| CliError::new(INTERNAL, "allocated session carries no device info"))?;

    let out = InfoOutput {
        device: args.path.display().to_string(),
        report_size: session.device().report_size(),
        max_payload: session.max_payload(),
        channel: info.channel.to_string(),
        protocol_version: info.protocol_version,
        device_version: info.version(),
        capabilities: info.capabilities.names(),
    };

    let fields = [
        ("Device", out.device.clone()),
        ("Report size", out.report_size.to_string()),
        ("Max payload", out.max_payload.to_string()),
        ("Channel", out.channel.clone()),
        ("Protocol", out.protocol_version.to_string()),
        ("Version", out.device_version.clone()),
        ("Capabilities", info.capabilities.to_string()),
    ];
    print_record("Device Info", &out, &fields, format);
    Ok(SUCCESS)
}
