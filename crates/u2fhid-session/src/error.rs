use std::time::Duration;

use u2fhid_frame::Command;

use crate::status::DeviceStatus;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Device I/O error.
    #[error("transport error: {0}")]
    Transport(#[from] u2fhid_transport::TransportError),

    /// Framing, reassembly or command validation error.
    #[error("frame error: {0}")]
    Frame(#[from] u2fhid_frame::FrameError),

    /// The device answered with an error message.
    #[error("device error: {0}")]
    Device(DeviceStatus),

    /// No complete response before the deadline.
    #[error("request timed out after {0:?}")]
    RequestTimeout(Duration),

    /// Every allocation attempt got a response for someone else's nonce.
    #[error("channel allocation failed after {attempts} attempts")]
    ChannelAllocationFailed { attempts: u32 },

    /// The request was cancelled through its cancellation token.
    #[error("request cancelled")]
    Cancelled,

    /// The device completed the request with a different command.
    #[error("unexpected response command {got:#04x} (expected {expected})")]
    UnexpectedResponse { expected: Command, got: u8 },

    /// A channel allocation response could not be used.
    #[error("invalid init response: {0}")]
    InvalidInitResponse(String),

    /// A ping came back with different data.
    #[error("ping response does not match request")]
    PingMismatch,
}

impl SessionError {
    /// Returns true if the error came from the device rather than the host side.
    pub fn is_device_error(&self) -> bool {
        matches!(self, SessionError::Device(_))
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
