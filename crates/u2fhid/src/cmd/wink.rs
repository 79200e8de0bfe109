use serde::Serialize;
use tracing::warn;

use crate::cmd::{open_session, ConnectOptions, DeviceArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct WinkOutput {
    channel: String,
    advertised: bool,
}

pub fn run(args: DeviceArgs, options: &ConnectOptions, format: OutputFormat) -> CliResult<i32> {
    let mut session = open_session(&args.path, options)?;
    let advertised = session
        .device_info()
        .is_some_and(|info| info.capabilities.wink());
    if !advertised {
        warn!(device = %args.path.display(), "device does not advertise wink; trying anyway");
    }

    session
        .wink()
        .map_err(|err| session_error("wink failed", err))?;

    let out = WinkOutput {
        channel: session.channel().to_string(),
        advertised,
    };
    let fields = [
        ("Channel", out.channel.clone()),
        ("Advertised", out.advertised.to_string()),
    ];
    print_record("Wink", &out, &fields, format);
    Ok(SUCCESS)
}
