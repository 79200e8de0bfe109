use bytes::{BufMut, Bytes, BytesMut};

use crate::channel::Channel;
use crate::error::{FrameError, Result};

/// Initialization header: channel (4) + command (1) + payload length (2) = 7 bytes.
pub const INIT_HEADER_SIZE: usize = 7;

/// Continuation header: channel (4) + sequence (1) = 5 bytes.
pub const CONT_HEADER_SIZE: usize = 5;

/// Smallest report that still carries one byte of initialization data.
pub const MIN_REPORT_SIZE: usize = INIT_HEADER_SIZE + 1;

/// Largest supported report size.
pub const MAX_REPORT_SIZE: usize = u16::MAX as usize;

/// Bit 7 of byte 4 marks an initialization packet.
pub const TYPE_INIT: u8 = 0x80;

/// Highest continuation sequence number.
pub const MAX_SEQUENCE: u8 = 0x7f;

/// Upper bound of the 16-bit payload length field.
pub const MAX_PAYLOAD: usize = u16::MAX as usize;

/// First report of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializationPacket {
    pub channel: Channel,
    /// Command id with the type bit masked off.
    pub command: u8,
    /// Total logical payload length of the message.
    pub payload_len: u16,
    /// Everything after the header, padding included.
    pub data: Bytes,
}

/// Subsequent report of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationPacket {
    pub channel: Channel,
    pub sequence: u8,
    /// Everything after the header, padding included.
    pub data: Bytes,
}

/// A decoded report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Initialization(InitializationPacket),
    Continuation(ContinuationPacket),
}

impl Packet {
    /// The channel this packet belongs to.
    pub fn channel(&self) -> Channel {
        match self {
            Packet::Initialization(p) => p.channel,
            Packet::Continuation(p) => p.channel,
        }
    }

    pub fn is_initialization(&self) -> bool {
        matches!(self, Packet::Initialization(_))
    }
}

/// Encodes and decodes raw reports for one report size.
///
/// Wire format (multi-byte fields big-endian, `R` = report size):
/// ```text
/// Initialization
/// ┌──────────────┬─────────────┬───────────────┬──────────────────────┐
/// │ Channel (4B) │ Cmd | 0x80  │ Length (2B)   │ Data (R-7 B, padded) │
/// └──────────────┴─────────────┴───────────────┴──────────────────────┘
/// Continuation
/// ┌──────────────┬─────────────┬──────────────────────┐
/// │ Channel (4B) │ Seq (0-127) │ Data (R-5 B, padded) │
/// └──────────────┴─────────────┴──────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketCodec {
    report_size: usize,
}

impl PacketCodec {
    /// Create a codec for the given report size.
    pub fn new(report_size: usize) -> Result<Self> {
        if !(MIN_REPORT_SIZE..=MAX_REPORT_SIZE).contains(&report_size) {
            return Err(FrameError::InvalidReportSize {
                size: report_size,
                min: MIN_REPORT_SIZE,
                max: MAX_REPORT_SIZE,
            });
        }
        Ok(Self { report_size })
    }

    pub fn report_size(&self) -> usize {
        self.report_size
    }

    /// Data bytes carried by an initialization packet.
    pub fn init_data_size(&self) -> usize {
        self.report_size - INIT_HEADER_SIZE
    }

    /// Data bytes carried by a continuation packet.
    pub fn cont_data_size(&self) -> usize {
        self.report_size - CONT_HEADER_SIZE
    }

    /// Largest payload expressible with sequence numbers 0..=127.
    pub fn max_payload(&self) -> usize {
        let by_sequence =
            self.init_data_size() + (MAX_SEQUENCE as usize + 1) * self.cont_data_size();
        by_sequence.min(MAX_PAYLOAD)
    }

    /// Encode an initialization packet.
    pub fn encode_initialization(
        &self,
        channel: Channel,
        command: u8,
        payload_len: u16,
        data: &[u8],
    ) -> Result<Bytes> {
        if payload_len as usize > self.max_payload() {
            return Err(FrameError::MessageTooLarge {
                size: payload_len as usize,
                max: self.max_payload(),
            });
        }
        if data.len() > self.init_data_size() {
            return Err(FrameError::PayloadTooLargeForFrame {
                size: data.len(),
                max: self.init_data_size(),
            });
        }

        let mut dst = BytesMut::with_capacity(self.report_size);
        dst.put_u32(channel.id());
        dst.put_u8(command | TYPE_INIT);
        dst.put_u16(payload_len);
        dst.put_slice(data);
        dst.resize(self.report_size, 0);
        Ok(dst.freeze())
    }

    /// Encode a continuation packet.
    pub fn encode_continuation(&self, channel: Channel, sequence: u8, data: &[u8]) -> Result<Bytes> {
        if sequence > MAX_SEQUENCE {
            return Err(FrameError::InvalidSequence(sequence));
        }
        if data.len() > self.cont_data_size() {
            return Err(FrameError::PayloadTooLargeForFrame {
                size: data.len(),
                max: self.cont_data_size(),
            });
        }

        let mut dst = BytesMut::with_capacity(self.report_size);
        dst.put_u32(channel.id());
        dst.put_u8(sequence);
        dst.put_slice(data);
        dst.resize(self.report_size, 0);
        Ok(dst.freeze())
    }

    /// Decode a report into a packet.
    pub fn decode(&self, report: &[u8]) -> Result<Packet> {
        decode_packet(report)
    }
}

/// Decode a report into a packet, inspecting the type bit of byte 4.
pub fn decode_packet(report: &[u8]) -> Result<Packet> {
    if report.len() < CONT_HEADER_SIZE {
        return Err(FrameError::MalformedReport {
            len: report.len(),
            min: CONT_HEADER_SIZE,
        });
    }

    let channel = Channel::new(u32::from_be_bytes([
        report[0], report[1], report[2], report[3],
    ]));
    let kind = report[4];

    if kind & TYPE_INIT != 0 {
        if report.len() < INIT_HEADER_SIZE {
            return Err(FrameError::MalformedReport {
                len: report.len(),
                min: INIT_HEADER_SIZE,
            });
        }
        let payload_len = u16::from_be_bytes([report[5], report[6]]);
        Ok(Packet::Initialization(InitializationPacket {
            channel,
            command: kind & !TYPE_INIT,
            payload_len,
            data: Bytes::copy_from_slice(&report[INIT_HEADER_SIZE..]),
        }))
    } else {
        Ok(Packet::Continuation(ContinuationPacket {
            channel,
            sequence: kind & MAX_SEQUENCE,
            data: Bytes::copy_from_slice(&report[CONT_HEADER_SIZE..]),
        }))
    }
}

/// Read the channel id of a report without decoding the rest.
pub fn peek_channel(report: &[u8]) -> Option<Channel> {
    let id: [u8; 4] = report.get(..4)?.try_into().ok()?;
    Some(Channel::new(u32::from_be_bytes(id)))
}
