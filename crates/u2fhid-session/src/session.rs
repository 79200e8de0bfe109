use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use u2fhid_frame::{
    decode_packet, dispatch, Channel, Command, Direction, KeepaliveStatus, Message,
    MessageFramer, ReassemblyState, Reassembler,
};

use crate::allocator::{AllocatorConfig, ChannelAllocator, DeviceInfo};
use crate::device::SharedDevice;
use crate::error::{Result, SessionError};
use crate::status::DeviceStatus;

/// Timeouts applied by a [`TransportSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deadline for a complete response. Every keepalive from the device
    /// starts a fresh deadline.
    pub request_timeout: Duration,
    /// Upper bound on a single blocking report read. Cancellation is noticed
    /// between reads, so this also bounds how late a cancel takes effect.
    pub read_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_millis(500),
        }
    }
}

/// Request/response exchange on one channel of a shared device.
///
/// A session owns its channel's reassembly state and runs one request at a
/// time. Several sessions on different channels may share one
/// [`SharedDevice`] from different threads.
pub struct TransportSession {
    device: SharedDevice,
    channel: Channel,
    framer: MessageFramer,
    reassembler: Reassembler,
    config: SessionConfig,
    cancel: CancellationToken,
    info: Option<DeviceInfo>,
}

impl TransportSession {
    /// Bind a session to an already allocated channel.
    ///
    /// The channel stays registered with `device` until the session is dropped.
    pub fn new(device: SharedDevice, channel: Channel, config: SessionConfig) -> Result<Self> {
        let framer = MessageFramer::new(device.report_size())?;
        let reassembler = Reassembler::for_codec(framer.codec());
        device.register(channel);
        Ok(Self {
            device,
            channel,
            framer,
            reassembler,
            config,
            cancel: CancellationToken::new(),
            info: None,
        })
    }

    /// Allocate a fresh channel on `device` and bind a session to it.
    pub fn open(device: SharedDevice, config: SessionConfig) -> Result<Self> {
        let allocator_config = AllocatorConfig {
            timeout: config.request_timeout,
            ..AllocatorConfig::default()
        };
        Self::open_with_config(device, allocator_config, config)
    }

    pub fn open_with_config(
        device: SharedDevice,
        allocator_config: AllocatorConfig,
        config: SessionConfig,
    ) -> Result<Self> {
        let info = ChannelAllocator::new(device.clone(), allocator_config).allocate()?;
        let mut session = Self::new(device, info.channel, config)?;
        session.info = Some(info);
        Ok(session)
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Device details from channel allocation, if this session allocated its channel.
    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.info.as_ref()
    }

    /// Largest payload a single request may carry on this device.
    pub fn max_payload(&self) -> usize {
        self.framer.max_payload()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn device(&self) -> &SharedDevice {
        &self.device
    }

    /// Token that aborts the in-flight request and every later one.
    ///
    /// Use [`renew_cancellation`](Self::renew_cancellation) to make the
    /// session usable again after cancelling.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Replace a cancelled token with a fresh one.
    pub fn renew_cancellation(&mut self) -> CancellationToken {
        self.cancel = CancellationToken::new();
        self.cancel.clone()
    }

    /// Inbound reassembly state of this session's channel.
    pub fn reassembly_state(&self) -> ReassemblyState {
        self.reassembler.state(self.channel)
    }

    /// Send `command` with `payload` and wait for the device's answer.
    ///
    /// A `timeout` too large to express as a deadline waits without one.
    /// Keepalive messages extend the deadline and are not returned. An error
    /// message from the device surfaces as [`SessionError::Device`]. Any other
    /// complete response is returned whatever its command; see
    /// [`call`](Self::call) for a checked variant.
    pub fn request(
        &mut self,
        command: Command,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Message> {
        if self.cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }

        let message = Message::new(self.channel, command, Bytes::copy_from_slice(payload));
        let reports = self.framer.frame(&message)?;
        command.validate(Direction::Request, self.channel, payload)?;

        self.reassembler.discard(self.channel);
        self.device.write_reports(&reports, &self.cancel)?;
        debug!(
            channel = %self.channel,
            command = %command,
            len = payload.len(),
            reports = reports.len(),
            "request sent"
        );

        let result = self.await_response(timeout);
        if result.is_err() {
            self.reassembler.discard(self.channel);
        }
        result
    }

    /// Like [`request`](Self::request) with the configured timeout, but
    /// rejects a response whose command differs from the request's.
    pub fn call(&mut self, command: Command, payload: &[u8]) -> Result<Message> {
        let response = self.request(command, payload, self.config.request_timeout)?;
        if response.command != command.id() {
            return Err(SessionError::UnexpectedResponse {
                expected: command,
                got: response.command,
            });
        }
        Ok(response)
    }

    /// Echo `data` through the device.
    pub fn ping(&mut self, data: &[u8]) -> Result<Bytes> {
        let response = self.call(Command::Ping, data)?;
        if response.payload.as_ref() != data {
            return Err(SessionError::PingMismatch);
        }
        Ok(response.payload)
    }

    /// Send a raw U2F message and return the raw response.
    pub fn msg(&mut self, apdu: &[u8]) -> Result<Bytes> {
        Ok(self.call(Command::Msg, apdu)?.payload)
    }

    /// Ask the device to identify itself visually.
    pub fn wink(&mut self) -> Result<()> {
        self.call(Command::Wink, &[])?;
        Ok(())
    }

    /// Lock the device to this channel for `seconds`; zero releases the lock.
    pub fn lock(&mut self, seconds: u8) -> Result<()> {
        self.call(Command::Lock, &[seconds])?;
        Ok(())
    }

    /// Send an init with no nonce on this channel and return the raw answer.
    ///
    /// Devices answer with their version metadata; the layout is
    /// device-defined, so the payload is returned untouched.
    pub fn query_version(&mut self) -> Result<Bytes> {
        Ok(self.call(Command::Init, &[])?.payload)
    }

    fn await_response(&mut self, timeout: Duration) -> Result<Message> {
        let mut deadline = Instant::now().checked_add(timeout);
        loop {
            if self.cancel.is_cancelled() {
                let dropped = self.device.clear_mailbox(self.channel);
                debug!(channel = %self.channel, dropped, "request cancelled");
                return Err(SessionError::Cancelled);
            }

            let now = Instant::now();
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(now),
                None => self.config.read_timeout,
            };
            if remaining.is_zero() {
                let dropped = self.device.clear_mailbox(self.channel);
                warn!(
                    channel = %self.channel,
                    ?timeout,
                    dropped,
                    "request timed out"
                );
                return Err(SessionError::RequestTimeout(timeout));
            }

            let wait = remaining.min(self.config.read_timeout);
            let Some(report) = self.device.read_for(self.channel, wait)? else {
                continue;
            };
            let packet = decode_packet(&report)?;
            let Some(message) = self.reassembler.push(packet)? else {
                continue;
            };

            match dispatch(&message, Direction::Response)? {
                Command::Keepalive => {
                    let status = KeepaliveStatus::from(message.payload[0]);
                    debug!(channel = %self.channel, ?status, "keepalive");
                    deadline = Instant::now().checked_add(timeout);
                }
                Command::Error => {
                    let status = DeviceStatus::from(message.payload[0]);
                    debug!(channel = %self.channel, %status, "device error");
                    return Err(SessionError::Device(status));
                }
                command => {
                    debug!(
                        channel = %self.channel,
                        command = %command,
                        len = message.payload.len(),
                        "response received"
                    );
                    return Ok(message);
                }
            }
        }
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        self.device.unregister(self.channel);
    }
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession")
            .field("channel", &self.channel)
            .field("device", &self.device)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
