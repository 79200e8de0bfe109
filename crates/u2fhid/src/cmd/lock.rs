use serde::Serialize;

use crate::cmd::{open_session, ConnectOptions, LockArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct LockOutput {
    channel: String,
    seconds: u8,
    released: bool,
}

pub fn run(args: LockArgs, options: &ConnectOptions, format: OutputFormat) -> CliResult<i32> {
    let mut session = open_session(&args.path, options)?;
    session
        .lock(args.seconds)
        .map_err(|err| session_error("lock failed", err))?;

    let out = LockOutput {
        channel: session.channel().to_string(),
        seconds: args.seconds,
        released: args.seconds == 0,
    };
    let state = if out.released {
        "released".to_string()
    } else {
        format!("locked for {}s", out.seconds)
    };
    let fields = [("Channel", out.channel.clone()), ("Lock", state)];
    print_record("Lock", &out, &fields, format);
    Ok(SUCCESS)
}
