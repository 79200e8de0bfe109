//! A software authenticator speaking the HID framing, for driving the public API.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use u2fhid::frame::{decode_packet, Channel, Command, Message, MessageFramer, Reassembler};
use u2fhid::session::Capabilities;
use u2fhid::transport::{check_report_size, HidDevice, Result, TransportError};

pub type RequestLog = Arc<Mutex<Vec<Message>>>;

/// First channel id handed out by [`SoftKey`].
pub const FIRST_CID: u32 = 0x0100_0000;

pub struct SoftKey {
    framer: MessageFramer,
    reassembler: Reassembler,
    outbound: VecDeque<Bytes>,
    next_cid: u32,
    presence_keepalives: usize,
    log: RequestLog,
}

impl SoftKey {
    pub fn new(report_size: usize) -> (Self, RequestLog) {
        let framer = MessageFramer::new(report_size).unwrap();
        let reassembler = Reassembler::for_codec(framer.codec());
        let log = Arc::new(Mutex::new(Vec::new()));
        let key = Self {
            framer,
            reassembler,
            outbound: VecDeque::new(),
            next_cid: FIRST_CID,
            presence_keepalives: 0,
            log: Arc::clone(&log),
        };
        (key, log)
    }

    /// Precede every msg response with `count` "touch needed" keepalives.
    pub fn with_presence_keepalives(mut self, count: usize) -> Self {
        self.presence_keepalives = count;
        self
    }

    fn respond(&mut self, request: &Message) -> Vec<Message> {
        let channel = request.channel;
        match request.kind() {
            Ok(Command::Init) if channel.is_broadcast() => {
                let cid = self.next_cid;
                self.next_cid += 1;
                let mut payload = request.payload.to_vec();
                payload.extend_from_slice(&cid.to_be_bytes());
                payload.extend_from_slice(&[2, 1, 0, 7, Capabilities::WINK | Capabilities::LOCK]);
                vec![Message::new(channel, Command::Init, payload)]
            }
            Ok(Command::Init) => vec![Message::new(channel, Command::Init, vec![2, 1, 0, 7])],
            Ok(Command::Ping) => vec![request.clone()],
            Ok(Command::Msg) => {
                let mut replies: Vec<Message> = (0..self.presence_keepalives)
                    .map(|_| Message::new(channel, Command::Keepalive, vec![0x02]))
                    .collect();
                let body: &[u8] = if request.payload.get(1) == Some(&0x03) {
                    b"U2F_V2\x90\x00"
                } else {
                    &[0x6d, 0x00]
                };
                replies.push(Message::new(channel, Command::Msg, body.to_vec()));
                replies
            }
            Ok(Command::Wink | Command::Lock) => {
                vec![Message::new(channel, request.command, Bytes::new())]
            }
            _ => vec![Message::new(channel, Command::Error, vec![0x01])],
        }
    }
}

impl HidDevice for SoftKey {
    fn report_size(&self) -> usize {
        self.framer.report_size()
    }

    fn write_report(&mut self, report: &[u8]) -> Result<()> {
        check_report_size(self.report_size(), report)?;
        let packet = decode_packet(report).unwrap();
        if let Some(request) = self.reassembler.push(packet).unwrap() {
            self.log.lock().push(request.clone());
            for reply in self.respond(&request) {
                self.outbound.extend(self.framer.frame(&reply).unwrap());
            }
        }
        Ok(())
    }

    fn read_report(&mut self, timeout: Duration) -> Result<Bytes> {
        match self.outbound.pop_front() {
            Some(report) => Ok(report),
            None => {
                thread::sleep(timeout.min(Duration::from_millis(1)));
                Err(TransportError::Timeout(timeout))
            }
        }
    }

    fn description(&self) -> String {
        "soft key".to_string()
    }
}

pub fn first_channel() -> Channel {
    Channel::new(FIRST_CID)
}
