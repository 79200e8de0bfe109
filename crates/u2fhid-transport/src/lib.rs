//! HID report transport abstraction for security keys.
//!
//! A security key exchanges fixed-size HID reports with the host. This crate
//! defines the [`HidDevice`] contract every higher layer talks to:
//! - write exactly one report
//! - read exactly one report, bounded by a timeout
//!
//! On Linux, [`HidrawDevice`] implements the contract over `/dev/hidrawN`.
//! Device enumeration is left to the caller.

pub mod error;
pub mod traits;

#[cfg(target_os = "linux")]
pub mod hidraw;

pub use error::{Result, TransportError};
pub use traits::{check_report_size, HidDevice, DEFAULT_REPORT_SIZE};

#[cfg(target_os = "linux")]
pub use hidraw::HidrawDevice;
