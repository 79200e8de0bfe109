use std::time::Instant;

use serde::Serialize;

use crate::cmd::{open_session, ConnectOptions, PingArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

const DEFAULT_PING_DATA: &[u8] = b"u2fhid";

#[derive(Serialize)]
struct PingOutput {
    channel: String,
    bytes: usize,
    rtt_ms: f64,
}

pub fn run(args: PingArgs, options: &ConnectOptions, format: OutputFormat) -> CliResult<i32> {
    let data = ping_payload(&args);
    let mut session = open_session(&args.path, options)?;

    let start = Instant::now();
    session
        .ping(&data)
        .map_err(|err| session_error("ping failed", err))?;
    let rtt = start.elapsed();

    let out = PingOutput {
        channel: session.channel().to_string(),
        bytes: data.len(),
        rtt_ms: (rtt.as_secs_f64() * 1000.0 * 100.0).round() / 100.0,
    };
    let fields = [
        ("Channel", out.channel.clone()),
        ("Bytes", out.bytes.to_string()),
        ("Round trip", format!("{:.2}ms", out.rtt_ms)),
    ];
    print_record("Ping", &out, &fields, format);
    Ok(SUCCESS)
}

fn ping_payload(args: &PingArgs) -> Vec<u8> {
    if let Some(data) = &args.data {
        return data.as_bytes().to_vec();
    }
    if let Some(size) = args.size {
        return (0..size).map(|i| i as u8).collect();
    }
    DEFAULT_PING_DATA.to_vec()
}
