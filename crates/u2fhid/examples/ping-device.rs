//! Allocate a channel on a security key and ping it.
//!
//! Run with:
//!   cargo run --example ping-device -- /dev/hidraw0

#[cfg(target_os = "linux")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::time::Instant;

    use u2fhid::session::{SessionConfig, SharedDevice, TransportSession};
    use u2fhid::transport::HidrawDevice;

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/hidraw0".to_string());

    let device = SharedDevice::new(HidrawDevice::open(&path)?);
    let mut session = TransportSession::open(device, SessionConfig::default())?;
    if let Some(info) = session.device_info() {
        eprintln!(
            "{path}: channel {} version {} capabilities {}",
            info.channel,
            info.version(),
            info.capabilities
        );
    }

    for size in [0usize, 57, 58, 1024, session.max_payload()] {
        let data: Vec<u8> = (0..size).map(|i| i as u8).collect();
        let start = Instant::now();
        session.ping(&data)?;
        eprintln!("ping {size:>5} bytes: {:?}", start.elapsed());
    }

    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn main() {
    eprintln!("ping-device needs Linux hidraw");
}
