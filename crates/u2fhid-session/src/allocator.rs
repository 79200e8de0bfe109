use std::fmt;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{info, warn};
use u2fhid_frame::{Channel, Command, INIT_NONCE_SIZE, INIT_RESPONSE_SIZE};

use crate::device::SharedDevice;
use crate::error::{Result, SessionError};
use crate::session::{SessionConfig, TransportSession};

/// Configuration for channel allocation.
#[derive(Debug, Clone)]
pub struct AllocatorConfig {
    /// Init requests sent before giving up on nonce mismatches.
    pub max_attempts: u32,
    /// Timeout for each init request.
    pub timeout: Duration,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_secs(3),
        }
    }
}

/// Capability flags from the init response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const WINK: u8 = 0x01;
    pub const LOCK: u8 = 0x02;
    pub const CBOR: u8 = 0x04;
    pub const NMSG: u8 = 0x08;

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn wink(self) -> bool {
        self.0 & Self::WINK != 0
    }

    pub const fn lock(self) -> bool {
        self.0 & Self::LOCK != 0
    }

    pub const fn cbor(self) -> bool {
        self.0 & Self::CBOR != 0
    }

    /// Set when the device does NOT implement the msg command.
    pub const fn nmsg(self) -> bool {
        self.0 & Self::NMSG != 0
    }

    /// Names of the set flags.
    pub fn names(self) -> Vec<&'static str> {
        [
            (Self::WINK, "wink"),
            (Self::LOCK, "lock"),
            (Self::CBOR, "cbor"),
            (Self::NMSG, "nmsg"),
        ]
        .into_iter()
        .filter(|(bit, _)| self.0 & bit != 0)
        .map(|(_, name)| name)
        .collect()
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.names();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join(","))
        }
    }
}

/// What the device reported when it assigned a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub channel: Channel,
    pub protocol_version: u8,
    pub major: u8,
    pub minor: u8,
    pub build: u8,
    pub capabilities: Capabilities,
}

impl DeviceInfo {
    /// Parse an init response payload into the echoed nonce and device info.
    ///
    /// Bytes past the fixed layout are ignored.
    pub fn parse(payload: &[u8]) -> Result<([u8; INIT_NONCE_SIZE], DeviceInfo)> {
        if payload.len() < INIT_RESPONSE_SIZE {
            return Err(SessionError::InvalidInitResponse(format!(
                "payload too short: {} (min {})",
                payload.len(),
                INIT_RESPONSE_SIZE
            )));
        }

        let mut nonce = [0u8; INIT_NONCE_SIZE];
        nonce.copy_from_slice(&payload[..INIT_NONCE_SIZE]);
        let rest = &payload[INIT_NONCE_SIZE..];
        let channel = Channel::new(u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]));

        Ok((
            nonce,
            DeviceInfo {
                channel,
                protocol_version: rest[4],
                major: rest[5],
                minor: rest[6],
                build: rest[7],
                capabilities: Capabilities::from_bits(rest[8]),
            },
        ))
    }

    /// Device firmware version as `major.minor.build`.
    pub fn version(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.build)
    }
}

/// Obtains a private channel from the device over the broadcast channel.
#[derive(Debug, Clone)]
pub struct ChannelAllocator {
    device: SharedDevice,
    config: AllocatorConfig,
}

impl ChannelAllocator {
    pub fn new(device: SharedDevice, config: AllocatorConfig) -> Self {
        Self { device, config }
    }

    /// Allocate a channel using nonces from the operating system RNG.
    pub fn allocate(&self) -> Result<DeviceInfo> {
        self.allocate_with_rng(&mut OsRng)
    }

    /// Allocate a channel using nonces drawn from `rng`.
    ///
    /// A response echoing a different nonce answers some other host's
    /// request; it is skipped and a new request with a fresh nonce is sent.
    pub fn allocate_with_rng<R: RngCore + ?Sized>(&self, rng: &mut R) -> Result<DeviceInfo> {
        let session_config = SessionConfig {
            request_timeout: self.config.timeout,
            ..SessionConfig::default()
        };
        let mut broadcast =
            TransportSession::new(self.device.clone(), Channel::BROADCAST, session_config)?;

        for attempt in 1..=self.config.max_attempts {
            let mut nonce = [0u8; INIT_NONCE_SIZE];
            rng.fill_bytes(&mut nonce);

            let response = broadcast.call(Command::Init, &nonce)?;
            let (echoed, info) = DeviceInfo::parse(&response.payload)?;
            if echoed != nonce {
                warn!(
                    attempt,
                    max_attempts = self.config.max_attempts,
                    "init response nonce mismatch; retrying"
                );
                continue;
            }

            if !info.channel.is_assignable() {
                return Err(SessionError::InvalidInitResponse(format!(
                    "device assigned unusable channel {}",
                    info.channel
                )));
            }

            info!(
                channel = %info.channel,
                protocol_version = info.protocol_version,
                version = %info.version(),
                capabilities = %info.capabilities,
                "channel allocated"
            );
            return Ok(info);
        }

        Err(SessionError::ChannelAllocationFailed {
            attempts: self.config.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use u2fhid_frame::{Message, BROADCAST_CID};

    use super::*;
    use crate::testing::{init_response, shared, well_behaved, Reply, Responder};

    fn wrong_nonce(times: usize) -> Responder {
        let mut remaining = times;
        Box::new(move |req: &Message| {
            let nonce = if remaining > 0 {
                remaining -= 1;
                [0xAA; INIT_NONCE_SIZE].to_vec()
            } else {
                req.payload.to_vec()
            };
            vec![Reply::Message(Message::new(
                req.channel,
                Command::Init,
                init_response(&nonce, 0x1122_3344, 0),
            ))]
        })
    }

    fn fast() -> AllocatorConfig {
        AllocatorConfig {
            max_attempts: 3,
            timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn allocates_channel() {
        let (device, requests) = shared(well_behaved(0x1122_3344));
        let info = ChannelAllocator::new(device, fast())
            .allocate_with_rng(&mut StdRng::seed_from_u64(7))
            .unwrap();

        assert_eq!(info.channel, Channel::new(0x1122_3344));
        assert_eq!(info.protocol_version, 2);
        assert_eq!(info.version(), "5.4.1");
        assert!(info.capabilities.wink());
        assert!(info.capabilities.cbor());
        assert!(!info.capabilities.lock());

        let requests = requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].channel, Channel::BROADCAST);
        assert_eq!(requests[0].payload.len(), INIT_NONCE_SIZE);
    }

    #[test]
    fn allocation_releases_broadcast_channel() {
        let (device, _) = shared(well_behaved(0x1122_3344));
        ChannelAllocator::new(device.clone(), fast())
            .allocate_with_rng(&mut StdRng::seed_from_u64(7))
            .unwrap();
        assert!(!device.is_registered(Channel::BROADCAST));
    }

    #[test]
    fn nonce_mismatch_retries_with_fresh_nonce() {
        let (device, requests) = shared(wrong_nonce(1));
        let info = ChannelAllocator::new(device, fast())
            .allocate_with_rng(&mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(info.channel, Channel::new(0x1122_3344));

        let requests = requests.lock();
        assert_eq!(requests.len(), 2);
        assert_ne!(requests[0].payload, requests[1].payload);
    }

    #[test]
    fn persistent_mismatch_gives_up() {
        let (device, requests) = shared(wrong_nonce(usize::MAX));
        let err = ChannelAllocator::new(device, fast())
            .allocate_with_rng(&mut StdRng::seed_from_u64(2))
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::ChannelAllocationFailed { attempts: 3 }
        ));
        assert_eq!(requests.lock().len(), 3);
    }

    #[test]
    fn unusable_channels_are_rejected() {
        for cid in [BROADCAST_CID, 0] {
            let (device, _) = shared(well_behaved(cid));
            let err = ChannelAllocator::new(device, fast()).allocate().unwrap_err();
            assert!(matches!(err, SessionError::InvalidInitResponse(_)));
        }
    }

    #[test]
    fn silent_device_times_out() {
        let (device, _) = shared(Box::new(|_: &Message| Vec::<Reply>::new()));
        let err = ChannelAllocator::new(device, fast()).allocate().unwrap_err();
        assert!(matches!(err, SessionError::RequestTimeout(_)));
    }

    #[test]
    fn open_binds_allocated_channel() {
        let (device, requests) = shared(well_behaved(0x0000_0042));
        let mut session = TransportSession::open(device, SessionConfig::default()).unwrap();

        assert_eq!(session.channel(), Channel::new(0x42));
        assert_eq!(session.device_info().unwrap().channel, Channel::new(0x42));
        assert_eq!(session.ping(b"hi").unwrap().as_ref(), b"hi");
        assert_eq!(requests.lock()[1].channel, Channel::new(0x42));
    }

    #[test]
    fn parse_layout() {
        let payload = init_response(&[1, 2, 3, 4, 5, 6, 7, 8], 0xdead_beef, 0x0f);
        let (nonce, info) = DeviceInfo::parse(&payload).unwrap();
        assert_eq!(nonce, [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(info.channel, Channel::new(0xdead_beef));
        assert_eq!(info.capabilities.bits(), 0x0f);
        assert!(info.capabilities.nmsg());

        let mut longer = payload.clone();
        longer.extend_from_slice(&[0xff; 4]);
        assert_eq!(DeviceInfo::parse(&longer).unwrap().1, info);

        assert!(matches!(
            DeviceInfo::parse(&payload[..16]).unwrap_err(),
            SessionError::InvalidInitResponse(_)
        ));
    }

    #[test]
    fn capability_names() {
        assert_eq!(Capabilities::from_bits(0x05).to_string(), "wink,cbor");
        assert_eq!(Capabilities::from_bits(0x0a).to_string(), "lock,nmsg");
        assert_eq!(Capabilities::default().to_string(), "none");
    }
}
