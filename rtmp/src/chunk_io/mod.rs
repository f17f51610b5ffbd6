//! RTMP chunk stream framing.
//!
//! Messages travel over the connection as chunks: each chunk carries a basic header (format and
//! chunk stream id), a message header compressed against the previous chunk on the same chunk
//! stream, an optional extended timestamp and at most one chunk size worth of payload.

mod chunk_header;
mod errors;
mod receiver;
mod sender;

pub use self::chunk_header::{ChunkHeaderFormat, MessageStreamIdByteOrder, MAX_INITIAL_TIMESTAMP};
pub use self::errors::ChunkSerializationError;
pub use self::receiver::ChunkReceiver;
pub use self::sender::serialize_message;

use bytes::Bytes;

/// Chunk size every RTMP connection starts with, in both directions
pub const DEFAULT_CHUNK_SIZE: u32 = 128;

/// Largest chunk size a SetChunkSize message can carry (31 bits)
pub const MAX_CHUNK_SIZE: u32 = 0x7FFF_FFFF;

/// A complete RTMP message reassembled from one or more chunks
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Chunk {
    pub chunk_stream_id: u32,

    /// Absolute timestamp in milliseconds, wrapping at 32 bits
    pub timestamp: u32,
    pub message_length: u32,
    pub message_type_id: u8,
    pub message_stream_id: u32,
    pub payload: Bytes,
}

/// Bytes ready to be written to the peer.  Packets must be sent in the order they were produced,
/// since the peer decodes every chunk against the state left by the previous ones.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Packet {
    pub bytes: Bytes,
}
