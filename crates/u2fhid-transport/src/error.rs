use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur in HID report I/O.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the device node.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred while reading or writing a report.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No report arrived within the read timeout.
    #[error("no report received within {0:?}")]
    Timeout(Duration),

    /// A report did not have the device's fixed report size.
    #[error("report size mismatch ({actual} bytes, expected {expected})")]
    ReportSize { expected: usize, actual: usize },

    /// The device went away.
    #[error("device disconnected")]
    Disconnected,
}

impl TransportError {
    /// Returns true if this error is a read timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
