use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::channel::Channel;
use crate::codec::{ContinuationPacket, InitializationPacket, Packet, PacketCodec};
use crate::error::{FrameError, Result};
use crate::message::Message;

/// A message partially received on one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collecting {
    pub channel: Channel,
    pub command: u8,
    /// Total payload length announced by the initialization packet.
    pub expected_len: usize,
    pub next_sequence: u8,
    buffer: BytesMut,
}

impl Collecting {
    /// Bytes received so far.
    pub fn received(&self) -> usize {
        self.buffer.len()
    }

    fn remaining(&self) -> usize {
        self.expected_len - self.buffer.len()
    }

    fn finish(self) -> ReassemblyState {
        ReassemblyState::Complete(Message {
            channel: self.channel,
            command: self.command,
            payload: self.buffer.freeze(),
        })
    }

    fn settle(self) -> ReassemblyState {
        if self.remaining() == 0 {
            self.finish()
        } else {
            ReassemblyState::Collecting(self)
        }
    }
}

/// Inbound state of one channel.
///
/// `Complete` and `Failed` are terminal: the [`Reassembler`] hands them to the
/// caller and forgets the channel, which returns it to `Idle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReassemblyState {
    Idle,
    Collecting(Collecting),
    Complete(Message),
    Failed(FrameError),
}

impl ReassemblyState {
    /// Feed one packet of this state's channel and return the next state.
    pub fn advance(self, packet: Packet, max_payload: usize) -> ReassemblyState {
        match (self, packet) {
            (ReassemblyState::Collecting(current), Packet::Initialization(init)) => {
                warn!(
                    channel = %init.channel,
                    dropped = current.received(),
                    expected = current.expected_len,
                    "initialization packet during reassembly; restarting"
                );
                start(init, max_payload)
            }
            (ReassemblyState::Collecting(current), Packet::Continuation(cont)) => {
                append(current, cont)
            }
            (_, Packet::Initialization(init)) => start(init, max_payload),
            (_, Packet::Continuation(cont)) => {
                trace!(
                    channel = %cont.channel,
                    sequence = cont.sequence,
                    "spurious continuation ignored"
                );
                ReassemblyState::Idle
            }
        }
    }
}

fn start(init: InitializationPacket, max_payload: usize) -> ReassemblyState {
    let expected_len = init.payload_len as usize;
    if expected_len > max_payload {
        return ReassemblyState::Failed(FrameError::MessageTooLarge {
            size: expected_len,
            max: max_payload,
        });
    }

    let take = expected_len.min(init.data.len());
    let mut buffer = BytesMut::with_capacity(expected_len);
    buffer.extend_from_slice(&init.data[..take]);

    trace!(
        channel = %init.channel,
        command = init.command,
        expected_len,
        "reassembly started"
    );

    Collecting {
        channel: init.channel,
        command: init.command,
        expected_len,
        next_sequence: 0,
        buffer,
    }
    .settle()
}

fn append(mut current: Collecting, cont: ContinuationPacket) -> ReassemblyState {
    if cont.sequence != current.next_sequence {
        debug!(
            channel = %current.channel,
            expected = current.next_sequence,
            got = cont.sequence,
            "continuation out of order; reassembly aborted"
        );
        return ReassemblyState::Failed(FrameError::SequenceMismatch {
            expected: current.next_sequence,
            got: cont.sequence,
        });
    }

    let take = current.remaining().min(cont.data.len());
    current.buffer.extend_from_slice(&cont.data[..take]);
    current.next_sequence += 1;
    current.settle()
}

/// Reassembles packets into messages, one independent state machine per channel.
///
/// Only channels with a message in flight occupy an entry; a missing entry is `Idle`.
#[derive(Debug, Clone)]
pub struct Reassembler {
    max_payload: usize,
    channels: HashMap<Channel, Collecting>,
}

impl Reassembler {
    /// Create a reassembler that rejects messages larger than `max_payload`.
    pub fn new(max_payload: usize) -> Self {
        Self {
            max_payload,
            channels: HashMap::new(),
        }
    }

    /// Create a reassembler sized for a codec.
    pub fn for_codec(codec: &PacketCodec) -> Self {
        Self::new(codec.max_payload())
    }

    /// Feed one packet.
    ///
    /// Returns `Ok(Some(message))` when the packet completes a message,
    /// `Ok(None)` while more packets are needed or when the packet was
    /// ignored, and `Err` when the channel's reassembly failed. A failed
    /// channel is back to `Idle`; other channels are untouched.
    pub fn push(&mut self, packet: Packet) -> Result<Option<Message>> {
        let channel = packet.channel();
        let state = match self.channels.remove(&channel) {
            Some(collecting) => ReassemblyState::Collecting(collecting),
            None => ReassemblyState::Idle,
        };

        match state.advance(packet, self.max_payload) {
            ReassemblyState::Idle => Ok(None),
            ReassemblyState::Collecting(collecting) => {
                self.channels.insert(channel, collecting);
                Ok(None)
            }
            ReassemblyState::Complete(message) => {
                debug!(
                    channel = %message.channel,
                    command = message.command,
                    payload_len = message.payload.len(),
                    "message reassembled"
                );
                Ok(Some(message))
            }
            ReassemblyState::Failed(err) => Err(err),
        }
    }

    /// Current state of a channel (`Idle` or `Collecting`).
    pub fn state(&self, channel: Channel) -> ReassemblyState {
        match self.channels.get(&channel) {
            Some(collecting) => ReassemblyState::Collecting(collecting.clone()),
            None => ReassemblyState::Idle,
        }
    }

    pub fn is_idle(&self, channel: Channel) -> bool {
        !self.channels.contains_key(&channel)
    }

    /// Drop any partial message on `channel`. Returns true if one was dropped.
    pub fn discard(&mut self, channel: Channel) -> bool {
        self.channels.remove(&channel).is_some()
    }

    /// Number of channels with a message in flight.
    pub fn in_flight(&self) -> usize {
        self.channels.len()
    }
}

/// Reassemble a complete, ordered report sequence of a single message.
pub fn reassemble<'a, I>(codec: &PacketCodec, reports: I) -> Result<Option<Message>>
where
    I: IntoIterator<Item = &'a Bytes>,
{
    let mut reassembler = Reassembler::for_codec(codec);
    for report in reports {
        if let Some(message) = reassembler.push(codec.decode(report)?)? {
            return Ok(Some(message));
        }
    }
    Ok(None)
}
