//! Command table.
//!
//! Maps command ids to their meaning and the payload length each one may
//! carry. Payload contents are never interpreted here.

use std::fmt;

use crate::channel::Channel;
use crate::error::{FrameError, Result};
use crate::message::Message;

pub const CMD_PING: u8 = 0x01;
pub const CMD_MSG: u8 = 0x03;
pub const CMD_LOCK: u8 = 0x04;
pub const CMD_INIT: u8 = 0x06;
pub const CMD_WINK: u8 = 0x08;
pub const CMD_KEEPALIVE: u8 = 0x3b;
pub const CMD_ERROR: u8 = 0x3f;
pub const CMD_VENDOR_FIRST: u8 = 0x40;
pub const CMD_VENDOR_LAST: u8 = 0x7f;

/// Size of the channel allocation nonce.
pub const INIT_NONCE_SIZE: usize = 8;

/// Size of a channel allocation response: nonce, channel id, version bytes, capabilities.
pub const INIT_RESPONSE_SIZE: usize = INIT_NONCE_SIZE + 4 + 5;

/// A protocol command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Echo; payload returned verbatim.
    Ping,
    /// Application message, passed through uninterpreted.
    Msg,
    /// Exclusive channel lock; one byte of seconds, 0 releases.
    Lock,
    /// Channel allocation or per-channel version query.
    Init,
    /// Visual or audible identification.
    Wink,
    /// The device is still working on the request.
    Keepalive,
    /// Failure report; one byte of status.
    Error,
    /// Vendor-defined command in `0x40..=0x7f`.
    Vendor(u8),
}

/// Which side produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host to device.
    Request,
    /// Device to host.
    Response,
}

/// Allowed payload length for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadContract {
    Any,
    Exact(usize),
    AtLeast(usize),
    OneOf(&'static [usize]),
}

impl PayloadContract {
    /// Returns true if a payload of `len` bytes satisfies the contract.
    pub fn allows(&self, len: usize) -> bool {
        match *self {
            PayloadContract::Any => true,
            PayloadContract::Exact(n) => len == n,
            PayloadContract::AtLeast(n) => len >= n,
            PayloadContract::OneOf(sizes) => sizes.contains(&len),
        }
    }
}

impl fmt::Display for PayloadContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadContract::Any => write!(f, "any length"),
            PayloadContract::Exact(n) => write!(f, "exactly {n} bytes"),
            PayloadContract::AtLeast(n) => write!(f, "at least {n} bytes"),
            PayloadContract::OneOf(sizes) => {
                let sizes: Vec<String> = sizes.iter().map(|s| s.to_string()).collect();
                write!(f, "{} bytes", sizes.join(" or "))
            }
        }
    }
}

impl Command {
    /// Look up a command id. The type bit is ignored.
    pub fn from_id(id: u8) -> Result<Self> {
        match id & !crate::codec::TYPE_INIT {
            CMD_PING => Ok(Command::Ping),
            CMD_MSG => Ok(Command::Msg),
            CMD_LOCK => Ok(Command::Lock),
            CMD_INIT => Ok(Command::Init),
            CMD_WINK => Ok(Command::Wink),
            CMD_KEEPALIVE => Ok(Command::Keepalive),
            CMD_ERROR => Ok(Command::Error),
            id @ CMD_VENDOR_FIRST..=CMD_VENDOR_LAST => Ok(Command::Vendor(id)),
            other => Err(FrameError::UnknownCommand(other)),
        }
    }

    /// The 7-bit command id.
    pub fn id(self) -> u8 {
        match self {
            Command::Ping => CMD_PING,
            Command::Msg => CMD_MSG,
            Command::Lock => CMD_LOCK,
            Command::Init => CMD_INIT,
            Command::Wink => CMD_WINK,
            Command::Keepalive => CMD_KEEPALIVE,
            Command::Error => CMD_ERROR,
            Command::Vendor(id) => id,
        }
    }

    /// Short lowercase name for logs and diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Command::Ping => "ping",
            Command::Msg => "msg",
            Command::Lock => "lock",
            Command::Init => "init",
            Command::Wink => "wink",
            Command::Keepalive => "keepalive",
            Command::Error => "error",
            Command::Vendor(_) => "vendor",
        }
    }

    /// Payload contract for this command on `channel` in `direction`.
    pub fn contract(self, direction: Direction, channel: Channel) -> PayloadContract {
        match (self, direction) {
            (Command::Ping | Command::Msg | Command::Vendor(_), _) => PayloadContract::Any,
            (Command::Lock, Direction::Request) => PayloadContract::Exact(1),
            (Command::Lock, Direction::Response) => PayloadContract::Exact(0),
            (Command::Init, Direction::Request) if channel.is_broadcast() => {
                PayloadContract::Exact(INIT_NONCE_SIZE)
            }
            (Command::Init, Direction::Request) => PayloadContract::OneOf(&[0, INIT_NONCE_SIZE]),
            (Command::Init, Direction::Response) if channel.is_broadcast() => {
                PayloadContract::AtLeast(INIT_RESPONSE_SIZE)
            }
            (Command::Init, Direction::Response) => PayloadContract::Any,
            (Command::Wink, _) => PayloadContract::Exact(0),
            (Command::Keepalive | Command::Error, _) => PayloadContract::Exact(1),
        }
    }

    /// Check a payload length against this command's contract.
    pub fn validate(self, direction: Direction, channel: Channel, payload: &[u8]) -> Result<()> {
        let expected = self.contract(direction, channel);
        if !expected.allows(payload.len()) {
            return Err(FrameError::InvalidCommandPayload {
                command: self.id(),
                len: payload.len(),
                expected,
            });
        }
        Ok(())
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> Self {
        cmd.id()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Vendor(id) => write!(f, "vendor({id:#04x})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Resolve and validate a completed message.
///
/// Fails with [`FrameError::UnknownCommand`] for ids outside the table and
/// [`FrameError::InvalidCommandPayload`] when the length breaks the contract.
/// Neither error poisons the channel.
pub fn dispatch(message: &Message, direction: Direction) -> Result<Command> {
    let command = Command::from_id(message.command)?;
    command.validate(direction, message.channel, &message.payload)?;
    Ok(command)
}

/// Status carried by a keep-alive message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveStatus {
    /// The device is processing the request.
    Processing,
    /// The device waits for the user to touch it.
    UserPresenceNeeded,
    Other(u8),
}

impl From<u8> for KeepaliveStatus {
    fn from(code: u8) -> Self {
        match code {
            1 => KeepaliveStatus::Processing,
            2 => KeepaliveStatus::UserPresenceNeeded,
            other => KeepaliveStatus::Other(other),
        }
    }
}
