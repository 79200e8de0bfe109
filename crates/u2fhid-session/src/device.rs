use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};
use u2fhid_frame::{peek_channel, Channel};
use u2fhid_transport::HidDevice;

use crate::error::{Result, SessionError};

/// Default bound on reports parked for one channel.
pub const DEFAULT_MAX_PENDING_REPORTS: usize = 256;

/// A HID device shared by every session and allocator talking to it.
///
/// Reads are demultiplexed by channel id: a report read on behalf of one
/// channel that belongs to another is parked in that channel's mailbox and
/// handed out on its next [`read_for`](Self::read_for). Only channels
/// registered with [`register`](Self::register) get a mailbox; reports for
/// any other channel are dropped. All reports of an
/// outbound message are written while holding the device lock, so messages
/// from concurrent sessions never interleave on the wire.
#[derive(Clone)]
pub struct SharedDevice {
    inner: Arc<Mutex<DeviceInner>>,
    report_size: usize,
    description: Arc<str>,
}

struct DeviceInner {
    device: Box<dyn HidDevice>,
    mailboxes: HashMap<Channel, VecDeque<Bytes>>,
    // Channel -> number of live sessions bound to it.
    registered: HashMap<Channel, usize>,
    max_pending: usize,
}

impl DeviceInner {
    fn park(&mut self, owner: Channel, report: Bytes) {
        if !self.registered.contains_key(&owner) {
            trace!(channel = %owner, "dropping report for unregistered channel");
            return;
        }
        let max_pending = self.max_pending;
        let mailbox = self.mailboxes.entry(owner).or_default();
        if mailbox.len() >= max_pending {
            mailbox.pop_front();
            warn!(channel = %owner, max_pending, "mailbox full; dropping oldest report");
        }
        mailbox.push_back(report);
        trace!(channel = %owner, pending = mailbox.len(), "parked report");
    }
}

impl SharedDevice {
    /// Wrap a device with the default mailbox bound.
    pub fn new<D: HidDevice + 'static>(device: D) -> Self {
        Self::with_mailbox_capacity(device, DEFAULT_MAX_PENDING_REPORTS)
    }

    /// Wrap a device, parking at most `max_pending` reports per foreign channel.
    pub fn with_mailbox_capacity<D: HidDevice + 'static>(device: D, max_pending: usize) -> Self {
        let report_size = device.report_size();
        let description: Arc<str> = device.description().into();
        Self {
            inner: Arc::new(Mutex::new(DeviceInner {
                device: Box::new(device),
                mailboxes: HashMap::new(),
                registered: HashMap::new(),
                max_pending: max_pending.max(1),
            })),
            report_size,
            description,
        }
    }

    pub fn report_size(&self) -> usize {
        self.report_size
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Register interest in `channel` so reports read by other sessions are
    /// parked for it. Registrations are counted; each needs a matching
    /// [`unregister`](Self::unregister).
    pub fn register(&self, channel: Channel) {
        let mut inner = self.inner.lock();
        let count = inner.registered.entry(channel).or_insert(0);
        *count += 1;
        trace!(%channel, sessions = *count, "registered channel");
    }

    /// Drop one registration of `channel`. When the last one goes, its
    /// mailbox and any reports still parked in it go with it.
    pub fn unregister(&self, channel: Channel) {
        let mut inner = self.inner.lock();
        let Some(count) = inner.registered.get_mut(&channel) else {
            return;
        };
        *count -= 1;
        if *count > 0 {
            return;
        }
        inner.registered.remove(&channel);
        let dropped = inner.mailboxes.remove(&channel).map_or(0, |m| m.len());
        trace!(%channel, dropped, "unregistered channel");
    }

    /// Whether any live session is bound to `channel`.
    pub fn is_registered(&self, channel: Channel) -> bool {
        self.inner.lock().registered.contains_key(&channel)
    }

    /// Number of channels that currently hold parked reports.
    pub fn parked_channels(&self) -> usize {
        self.inner
            .lock()
            .mailboxes
            .values()
            .filter(|mailbox| !mailbox.is_empty())
            .count()
    }

    /// Write the reports of one message back to back.
    ///
    /// Cancellation is checked before every report; a cancelled write leaves
    /// the device with a truncated message, which it discards on its own
    /// timeout.
    pub fn write_reports(&self, reports: &[Bytes], cancel: &CancellationToken) -> Result<()> {
        let mut inner = self.inner.lock();
        for report in reports {
            if cancel.is_cancelled() {
                return Err(SessionError::Cancelled);
            }
            inner.device.write_report(report)?;
        }
        Ok(())
    }

    /// Fetch the next report addressed to `channel`.
    ///
    /// Returns a parked report if one is waiting. Otherwise reads a single
    /// report from the device, waiting at most `timeout`. `Ok(None)` means
    /// nothing arrived for `channel` yet: either the read timed out or the
    /// report belonged to another channel and was parked or dropped. Reports too short to
    /// carry a channel id are returned as-is so the caller can reject them.
    pub fn read_for(&self, channel: Channel, timeout: Duration) -> Result<Option<Bytes>> {
        let mut inner = self.inner.lock();
        if let Some(report) = inner
            .mailboxes
            .get_mut(&channel)
            .and_then(VecDeque::pop_front)
        {
            return Ok(Some(report));
        }

        let report = match inner.device.read_report(timeout) {
            Ok(report) => report,
            Err(err) if err.is_timeout() => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match peek_channel(&report) {
            Some(owner) if owner != channel => {
                inner.park(owner, report);
                Ok(None)
            }
            _ => Ok(Some(report)),
        }
    }

    /// Drop every report parked for `channel`, returning how many were dropped.
    pub fn clear_mailbox(&self, channel: Channel) -> usize {
        self.inner
            .lock()
            .mailboxes
            .get_mut(&channel)
            .map_or(0, |mailbox| mailbox.drain(..).count())
    }

    /// Number of reports parked for `channel`.
    pub fn pending(&self, channel: Channel) -> usize {
        self.inner
            .lock()
            .mailboxes
            .get(&channel)
            .map_or(0, VecDeque::len)
    }
}

impl std::fmt::Debug for SharedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedDevice")
            .field("description", &self.description)
            .field("report_size", &self.report_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use u2fhid_transport::TransportError;

    use super::*;

    struct Inbox {
        inbound: VecDeque<Bytes>,
        written: Arc<Mutex<Vec<Bytes>>>,
    }

    impl HidDevice for Inbox {
        fn report_size(&self) -> usize {
            8
        }

        fn write_report(&mut self, report: &[u8]) -> u2fhid_transport::Result<()> {
            self.written.lock().push(Bytes::copy_from_slice(report));
            Ok(())
        }

        fn read_report(&mut self, timeout: Duration) -> u2fhid_transport::Result<Bytes> {
            self.inbound
                .pop_front()
                .ok_or(TransportError::Timeout(timeout))
        }
    }

    fn report(cid: u32, tag: u8) -> Bytes {
        let mut buf = cid.to_be_bytes().to_vec();
        buf.extend_from_slice(&[tag, 0, 0, 0]);
        Bytes::from(buf)
    }

    fn device(inbound: Vec<Bytes>, capacity: usize) -> (SharedDevice, Arc<Mutex<Vec<Bytes>>>) {
        let written = Arc::new(Mutex::new(Vec::new()));
        let inbox = Inbox {
            inbound: inbound.into(),
            written: Arc::clone(&written),
        };
        (SharedDevice::with_mailbox_capacity(inbox, capacity), written)
    }

    #[test]
    fn foreign_reports_are_parked() {
        let a = Channel::new(1);
        let b = Channel::new(2);
        let (dev, _) = device(vec![report(2, 0x81), report(1, 0x82)], 8);
        dev.register(b);

        assert_eq!(dev.read_for(a, Duration::ZERO).unwrap(), None);
        assert_eq!(dev.pending(b), 1);
        assert_eq!(dev.read_for(a, Duration::ZERO).unwrap(), Some(report(1, 0x82)));
        assert_eq!(dev.read_for(b, Duration::ZERO).unwrap(), Some(report(2, 0x81)));
        assert_eq!(dev.pending(b), 0);
    }

    #[test]
    fn timeout_reads_as_none() {
        let (dev, _) = device(Vec::new(), 8);
        assert_eq!(dev.read_for(Channel::new(1), Duration::ZERO).unwrap(), None);
    }

    #[test]
    fn full_mailbox_drops_oldest() {
        let a = Channel::new(1);
        let b = Channel::new(2);
        let (dev, _) = device(
            vec![report(2, 0x81), report(2, 0x82), report(2, 0x83)],
            2,
        );
        dev.register(b);
        for _ in 0..3 {
            assert_eq!(dev.read_for(a, Duration::ZERO).unwrap(), None);
        }
        assert_eq!(dev.pending(b), 2);
        assert_eq!(dev.read_for(b, Duration::ZERO).unwrap(), Some(report(2, 0x82)));
        assert_eq!(dev.read_for(b, Duration::ZERO).unwrap(), Some(report(2, 0x83)));
    }

    #[test]
    fn clear_mailbox_counts_dropped() {
        let a = Channel::new(1);
        let b = Channel::new(2);
        let (dev, _) = device(vec![report(2, 0x81), report(2, 0x82)], 8);
        dev.register(b);
        dev.read_for(a, Duration::ZERO).unwrap();
        dev.read_for(a, Duration::ZERO).unwrap();
        assert_eq!(dev.clear_mailbox(b), 2);
        assert_eq!(dev.clear_mailbox(b), 0);
    }

    #[test]
    fn unregistered_channels_get_no_mailbox() {
        let inbound = (0..10_000u32).map(|cid| report(cid + 100, 0x81)).collect();
        let (dev, _) = device(inbound, 8);
        let a = Channel::new(1);

        for _ in 0..10_000 {
            assert_eq!(dev.read_for(a, Duration::ZERO).unwrap(), None);
        }
        assert_eq!(dev.parked_channels(), 0);
        assert_eq!(dev.pending(Channel::new(100)), 0);
    }

    #[test]
    fn last_unregister_drops_mailbox() {
        let a = Channel::new(1);
        let b = Channel::new(2);
        let (dev, _) = device(vec![report(2, 0x81), report(2, 0x82)], 8);
        dev.register(b);
        dev.register(b);
        dev.read_for(a, Duration::ZERO).unwrap();

        dev.unregister(b);
        assert!(dev.is_registered(b));
        assert_eq!(dev.pending(b), 1);

        dev.unregister(b);
        assert!(!dev.is_registered(b));
        assert_eq!(dev.pending(b), 0);
        assert_eq!(dev.parked_channels(), 0);

        // Late reports for a released channel are not parked again.
        dev.read_for(a, Duration::ZERO).unwrap();
        assert_eq!(dev.pending(b), 0);
    }

    #[test]
    fn unregister_without_register_is_ignored() {
        let (dev, _) = device(Vec::new(), 8);
        dev.unregister(Channel::new(7));
        assert!(!dev.is_registered(Channel::new(7)));
    }

    #[test]
    fn short_report_is_returned_to_caller() {
        let (dev, _) = device(vec![Bytes::from_static(&[0x00, 0x01])], 8);
        assert_eq!(
            dev.read_for(Channel::new(1), Duration::ZERO).unwrap(),
            Some(Bytes::from_static(&[0x00, 0x01]))
        );
    }

    #[test]
    fn cancelled_write_sends_nothing_more() {
        let (dev, written) = device(Vec::new(), 8);
        let cancel = CancellationToken::new();
        dev.write_reports(&[report(1, 0x81)], &cancel).unwrap();
        cancel.cancel();
        let err = dev
            .write_reports(&[report(1, 0x81), report(1, 0x00)], &cancel)
            .unwrap_err();
        assert!(matches!(err, SessionError::Cancelled));
        assert_eq!(written.lock().len(), 1);
    }
}
