use bytes::Bytes;
use tracing::debug;

use crate::codec::PacketCodec;
use crate::error::{FrameError, Result};
use crate::message::Message;

/// Splits logical messages into ordered report sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageFramer {
    codec: PacketCodec,
}

impl MessageFramer {
    /// Create a framer for the given report size.
    pub fn new(report_size: usize) -> Result<Self> {
        Ok(Self::with_codec(PacketCodec::new(report_size)?))
    }

    pub fn with_codec(codec: PacketCodec) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &PacketCodec {
        &self.codec
    }

    pub fn report_size(&self) -> usize {
        self.codec.report_size()
    }

    /// Largest payload a single message may carry.
    pub fn max_payload(&self) -> usize {
        self.codec.max_payload()
    }

    /// Number of reports needed for a payload of `payload_len` bytes.
    pub fn packet_count(&self, payload_len: usize) -> usize {
        let rest = payload_len.saturating_sub(self.codec.init_data_size());
        1 + rest.div_ceil(self.codec.cont_data_size())
    }

    /// Frame a message: one initialization packet, then continuations
    /// numbered from 0. The last report is zero-padded.
    pub fn frame(&self, message: &Message) -> Result<Vec<Bytes>> {
        let payload = message.payload.as_ref();
        if payload.len() > self.max_payload() {
            return Err(FrameError::MessageTooLarge {
                size: payload.len(),
                max: self.max_payload(),
            });
        }

        let mut reports = Vec::with_capacity(self.packet_count(payload.len()));
        let split = payload.len().min(self.codec.init_data_size());
        let (head, tail) = payload.split_at(split);

        reports.push(self.codec.encode_initialization(
            message.channel,
            message.command,
            payload.len() as u16,
            head,
        )?);

        for (sequence, chunk) in tail.chunks(self.codec.cont_data_size()).enumerate() {
            reports.push(
                self.codec
                    .encode_continuation(message.channel, sequence as u8, chunk)?,
            );
        }

        debug!(
            channel = %message.channel,
            command = message.command,
            payload_len = payload.len(),
            packets = reports.len(),
            "framed message"
        );
        Ok(reports)
    }
}
