//! Channel allocation and request/response sessions over a U2F HID device.
//!
//! A [`SharedDevice`] wraps one HID device and routes inbound reports to the
//! channel they belong to. [`ChannelAllocator`] obtains a private channel over
//! the broadcast channel, and a [`TransportSession`] runs requests on it.

pub mod allocator;
pub mod device;
pub mod error;
pub mod session;
pub mod status;

#[cfg(test)]
mod testing;

pub use allocator::{AllocatorConfig, Capabilities, ChannelAllocator, DeviceInfo};
pub use device::{SharedDevice, DEFAULT_MAX_PENDING_REPORTS};
pub use error::{Result, SessionError};
pub use session::{SessionConfig, TransportSession};
pub use status::DeviceStatus;
