//! Simulated authenticator for session tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use u2fhid_frame::{decode_packet, Channel, Command, Message, MessageFramer, Reassembler};
use u2fhid_transport::{check_report_size, HidDevice, Result, TransportError};

use crate::device::SharedDevice;

/// One answer queued by a responder.
pub(crate) enum Reply {
    /// A full message, readable immediately.
    Message(Message),
    /// A full message whose first report arrives after a delay.
    Delayed(Duration, Message),
    /// Raw reports, as-is.
    Reports(Vec<Bytes>),
}

pub(crate) type Responder = Box<dyn FnMut(&Message) -> Vec<Reply> + Send>;

pub(crate) type Requests = Arc<Mutex<Vec<Message>>>;

/// Reassembles what the host writes and answers complete requests.
pub(crate) struct SoftDevice {
    framer: MessageFramer,
    reassembler: Reassembler,
    responder: Responder,
    inbound: VecDeque<(Duration, Bytes)>,
    requests: Requests,
}

impl SoftDevice {
    pub(crate) fn new(
        report_size: usize,
        responder: Responder,
    ) -> (Self, Requests) {
        let framer = MessageFramer::new(report_size).unwrap();
        let reassembler = Reassembler::for_codec(framer.codec());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let device = Self {
            framer,
            reassembler,
            responder,
            inbound: VecDeque::new(),
            requests: Arc::clone(&requests),
        };
        (device, requests)
    }

    fn enqueue(&mut self, reply: Reply) {
        let (delay, message) = match reply {
            Reply::Message(message) => (Duration::ZERO, message),
            Reply::Delayed(delay, message) => (delay, message),
            Reply::Reports(reports) => {
                self.inbound
                    .extend(reports.into_iter().map(|r| (Duration::ZERO, r)));
                return;
            }
        };
        let reports = self.framer.frame(&message).unwrap();
        for (i, report) in reports.into_iter().enumerate() {
            let wait = if i == 0 { delay } else { Duration::ZERO };
            self.inbound.push_back((wait, report));
        }
    }
}

impl HidDevice for SoftDevice {
    fn report_size(&self) -> usize {
        self.framer.report_size()
    }

    fn write_report(&mut self, report: &[u8]) -> Result<()> {
        check_report_size(self.report_size(), report)?;
        let packet = decode_packet(report).unwrap();
        if let Some(message) = self.reassembler.push(packet).unwrap() {
            self.requests.lock().push(message.clone());
            for reply in (self.responder)(&message) {
                self.enqueue(reply);
            }
        }
        Ok(())
    }

    fn read_report(&mut self, timeout: Duration) -> Result<Bytes> {
        match self.inbound.front_mut() {
            None => {
                thread::sleep(timeout.min(Duration::from_millis(2)));
                Err(TransportError::Timeout(timeout))
            }
            Some((delay, _)) if *delay > timeout => {
                thread::sleep(timeout);
                *delay -= timeout;
                Err(TransportError::Timeout(timeout))
            }
            Some(_) => {
                let (delay, report) = self.inbound.pop_front().unwrap();
                thread::sleep(delay);
                Ok(report)
            }
        }
    }

    fn description(&self) -> String {
        "soft authenticator".to_string()
    }
}

/// Init response payload assigning `cid`.
pub(crate) fn init_response(nonce: &[u8], cid: u32, capabilities: u8) -> Vec<u8> {
    let mut payload = nonce.to_vec();
    payload.extend_from_slice(&cid.to_be_bytes());
    payload.extend_from_slice(&[2, 5, 4, 1, capabilities]);
    payload
}

pub(crate) fn keepalive(channel: Channel) -> Message {
    Message::new(channel, Command::Keepalive, vec![0x01])
}

pub(crate) fn error(channel: Channel, code: u8) -> Message {
    Message::new(channel, Command::Error, vec![code])
}

/// Answers like a well-behaved authenticator: pings and msgs are echoed,
/// wink and lock acknowledged, init on broadcast assigns `cid`.
pub(crate) fn well_behaved(cid: u32) -> Responder {
    Box::new(move |request: &Message| {
        let reply = match request.kind() {
            Ok(Command::Init) => Message::new(
                request.channel,
                Command::Init,
                init_response(&request.payload, cid, 0x05),
            ),
            Ok(Command::Wink | Command::Lock) => {
                Message::new(request.channel, request.command, Bytes::new())
            }
            _ => request.clone(),
        };
        vec![Reply::Message(reply)]
    })
}

pub(crate) fn shared(responder: Responder) -> (SharedDevice, Requests) {
    let (device, requests) = SoftDevice::new(64, responder);
    (SharedDevice::new(device), requests)
}
