//! U2F HID transport for security keys.
//!
//! u2fhid talks to FIDO U2F authenticators over raw HID reports: it frames
//! logical messages into fixed-size packets, reassembles responses per
//! channel, allocates channels and runs request/response sessions.
//!
//! # Crate Structure
//!
//! - [`transport`]: HID report I/O (`HidDevice`, Linux hidraw)
//! - [`frame`]: packet codec, message framing, reassembly and the command table
//! - [`session`]: shared device handle, channel allocation and sessions

/// Re-export transport types.
pub mod transport {
    pub use u2fhid_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use u2fhid_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use u2fhid_session::*;
}
