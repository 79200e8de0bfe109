use std::time::Duration;

use bytes::Bytes;

use crate::error::{Result, TransportError};

/// Report size used by nearly every FIDO authenticator.
pub const DEFAULT_REPORT_SIZE: usize = 64;

/// A connected HID device that exchanges fixed-size reports.
///
/// Implementations carry no protocol knowledge: every report is opaque bytes.
/// Both calls block, and `read_report` must give up after `timeout`
/// with [`TransportError::Timeout`].
pub trait HidDevice: Send {
    /// Size in bytes of every input and output report.
    fn report_size(&self) -> usize;

    /// Write one output report. `report.len()` must equal [`report_size`](Self::report_size).
    fn write_report(&mut self, report: &[u8]) -> Result<()>;

    /// Read one input report, waiting at most `timeout`.
    fn read_report(&mut self, timeout: Duration) -> Result<Bytes>;

    /// Human-readable description for diagnostics.
    fn description(&self) -> String {
        "hid device".to_string()
    }
}

impl<D: HidDevice + ?Sized> HidDevice for Box<D> {
    fn report_size(&self) -> usize {
        (**self).report_size()
    }

    fn write_report(&mut self, report: &[u8]) -> Result<()> {
        (**self).write_report(report)
    }

    fn read_report(&mut self, timeout: Duration) -> Result<Bytes> {
        (**self).read_report(timeout)
    }

    fn description(&self) -> String {
        (**self).description()
    }
}

/// Reject a report whose length differs from the device report size.
pub fn check_report_size(expected: usize, report: &[u8]) -> Result<()> {
    if report.len() != expected {
        return Err(TransportError::ReportSize {
            expected,
            actual: report.len(),
        });
    }
    Ok(())
}
