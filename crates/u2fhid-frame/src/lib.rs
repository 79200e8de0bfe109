//! Packet framing for the U2F HID transport.
//!
//! Every report exchanged with a security key is one of two packet shapes:
//! - an initialization packet: channel id, command byte with bit 7 set,
//!   big-endian total payload length, leading payload bytes
//! - a continuation packet: channel id, sequence number 0-127, further payload bytes
//!
//! This crate is pure: it encodes, splits, reassembles and classifies
//! messages, and never touches a device.

pub mod channel;
pub mod codec;
pub mod command;
pub mod error;
pub mod framer;
pub mod message;
pub mod reassembly;

pub use channel::{Channel, BROADCAST_CID};
pub use codec::{
    decode_packet, peek_channel, ContinuationPacket, InitializationPacket, Packet, PacketCodec,
    CONT_HEADER_SIZE, INIT_HEADER_SIZE, MAX_PAYLOAD, MAX_SEQUENCE, MIN_REPORT_SIZE,
};
pub use command::{
    dispatch, Command, Direction, KeepaliveStatus, PayloadContract, INIT_NONCE_SIZE,
    INIT_RESPONSE_SIZE,
};
pub use error::{FrameError, Result};
pub use framer::MessageFramer;
pub use message::Message;
pub use reassembly::{reassemble, Collecting, ReassemblyState, Reassembler};
