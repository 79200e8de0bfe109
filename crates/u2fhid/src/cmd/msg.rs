use serde::Serialize;

use crate::cmd::{open_session, parse_hex, ConnectOptions, MsgArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{hex_preview, print_record, OutputFormat};

#[derive(Serialize)]
struct MsgOutput {
    channel: String,
    request_len: usize,
    response: String,
    status_word: Option<String>,
}

pub fn run(args: MsgArgs, options: &ConnectOptions, format: OutputFormat) -> CliResult<i32> {
    let apdu = parse_hex(&args.hex)?;
    let mut session = open_session(&args.path, options)?;
    let response = session
        .msg(&apdu)
        .map_err(|err| session_error("msg failed", err))?;

    let out = MsgOutput {
        channel: session.channel().to_string(),
        request_len: apdu.len(),
        response: hex::encode(&response),
        status_word: status_word(&response),
    };
    let fields = [
        ("Channel", out.channel.clone()),
        ("Request", format!("{} bytes", out.request_len)),
        ("Response", hex_preview(&response, 32)),
        (
            "Status",
            out.status_word.clone().unwrap_or_else(|| "-".to_string()),
        ),
    ];
    print_record("Message", &out, &fields, format);
    Ok(SUCCESS)
}

/// Trailing ISO 7816 status word, if the response is long enough to carry one.
fn status_word(response: &[u8]) -> Option<String> {
    let split = response.len().checked_sub(2)?;
    Some(hex::encode(&response[split..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_word_is_trailing_two_bytes() {
        assert_eq!(status_word(b"U2F_V2\x90\x00").as_deref(), Some("9000"));
        assert_eq!(status_word(&[0x6d, 0x00]).as_deref(), Some("6d00"));
        assert_eq!(status_word(&[0x01]), None);
    }
}
