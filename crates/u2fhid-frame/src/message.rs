use bytes::Bytes;

use crate::channel::Channel;
use crate::command::Command;
use crate::error::Result;

/// A logical message exchanged above the framing layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// The channel this message belongs to.
    pub channel: Channel,
    /// Command id without the initialization type bit.
    pub command: u8,
    /// The message payload.
    pub payload: Bytes,
}

impl Message {
    /// Create a new message.
    pub fn new(channel: Channel, command: impl Into<u8>, payload: impl Into<Bytes>) -> Self {
        Self {
            channel,
            command: command.into() & !crate::codec::TYPE_INIT,
            payload: payload.into(),
        }
    }

    /// Resolve the command byte against the command table.
    pub fn kind(&self) -> Result<Command> {
        Command::from_id(self.command)
    }
}
