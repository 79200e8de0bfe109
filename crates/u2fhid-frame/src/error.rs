use crate::command::PayloadContract;

/// Errors that can occur while encoding, decoding, framing or dispatching packets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The report size cannot carry the packet headers.
    #[error("invalid report size {size} (must be {min}..={max})")]
    InvalidReportSize { size: usize, min: usize, max: usize },

    /// A report is shorter than the header of the packet kind it appears to be.
    #[error("malformed report ({len} bytes, need at least {min})")]
    MalformedReport { len: usize, min: usize },

    /// A data slice does not fit into a single packet.
    #[error("payload slice too large for frame ({size} bytes, max {max})")]
    PayloadTooLargeForFrame { size: usize, max: usize },

    /// A logical message exceeds the largest expressible payload.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// A continuation sequence number outside 0..=127.
    #[error("invalid sequence number {0} (max 127)")]
    InvalidSequence(u8),

    /// A continuation packet arrived out of order.
    #[error("sequence mismatch (expected {expected}, got {got})")]
    SequenceMismatch { expected: u8, got: u8 },

    /// The command byte does not name a known command.
    #[error("unknown command {0:#04x}")]
    UnknownCommand(u8),

    /// The payload violates the command's length contract.
    #[error("invalid payload for command {command:#04x} ({len} bytes, expected {expected})")]
    InvalidCommandPayload {
        command: u8,
        len: usize,
        expected: PayloadContract,
    },
}

pub type Result<T> = std::result::Result<T, FrameError>;
