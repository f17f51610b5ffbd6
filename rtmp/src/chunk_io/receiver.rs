use super::chunk_header::{ChunkHeader, ChunkHeaderFormat, MessageStreamIdByteOrder, MAX_INITIAL_TIMESTAMP};
use super::Chunk;
use crate::binary;
use byteorder::{BigEndian, ByteOrder};
use bytes::{Bytes, BytesMut};
use std::cmp::{max, min};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Reassembles RTMP messages out of the chunk stream sent by a peer.
///
/// Every byte received after the handshake must go through the same `ChunkReceiver`, as chunk
/// headers are compressed against previous chunks on the same chunk stream.  Bytes can be
/// passed in as they arrive: a chunk that is not completely available yet is kept and parsed
/// again once more bytes show up.
pub struct ChunkReceiver {
    buffer: BytesMut,
    streams: HashMap<u32, ChunkStreamState>,
}

struct ChunkStreamState {
    header: ChunkHeader,
    fragments: Vec<Bytes>,
    received: usize,
}

enum ParsedValue<T> {
    NotEnoughBytes,
    Value { val: T, next_index: usize },
}

enum ReadResult {
    NotEnoughBytes,
    Desynchronized,
    ChunkConsumed,
    MessageCompleted(Chunk),
}

impl ChunkReceiver {
    pub fn new() -> ChunkReceiver {
        ChunkReceiver {
            buffer: BytesMut::with_capacity(4096),
            streams: HashMap::new(),
        }
    }

    /// Attempts to complete the next RTMP message, reading chunks with at most `chunk_size`
    /// bytes of payload.
    ///
    /// The bytes passed in are appended to whatever is already buffered, so the same bytes
    /// must never be passed in twice.  Only one message is returned per call, which lets the
    /// caller act on a SetChunkSize message before the chunks following it are read.  Callers
    /// are expected to call this in a loop, passing an empty slice after the first call, until
    /// `None` is returned.
    ///
    /// A type 2 or 3 chunk on a chunk stream that has never seen a header means the stream is
    /// desynchronized.  The chunk and everything buffered behind it is discarded and `None`
    /// is returned.
    pub fn next_chunk(&mut self, bytes: &[u8], chunk_size: u32) -> Option<Chunk> {
        self.buffer.extend_from_slice(bytes);

        loop {
            match self.read_chunk(chunk_size) {
                ReadResult::NotEnoughBytes | ReadResult::Desynchronized => return None,
                ReadResult::ChunkConsumed => (),
                ReadResult::MessageCompleted(chunk) => return Some(chunk),
            }
        }
    }

    /// Reads every message that can be completed from the bytes, all with the same chunk size
    pub fn receive(&mut self, bytes: &[u8], chunk_size: u32) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut input = bytes;
        while let Some(chunk) = self.next_chunk(input, chunk_size) {
            chunks.push(chunk);
            input = &[];
        }

        chunks
    }

    /// Discards the partially received message on the chunk stream, as requested by an Abort
    /// message.  The header state is kept.
    pub fn abort(&mut self, chunk_stream_id: u32) {
        if let Some(state) = self.streams.get_mut(&chunk_stream_id) {
            state.fragments.clear();
            state.received = 0;
        }
    }

    /// Forgets all chunk stream state and buffered bytes
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.streams.clear();
    }

    /// Number of received bytes not yet consumed as part of a complete chunk
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn read_chunk(&mut self, chunk_size: u32) -> ReadResult {
        if self.buffer.is_empty() {
            return ReadResult::NotEnoughBytes;
        }

        let format = ChunkHeaderFormat::from_basic_header(self.buffer[0]);
        let (csid, mut index) = match get_csid(&self.buffer[..]) {
            ParsedValue::NotEnoughBytes => return ReadResult::NotEnoughBytes,
            ParsedValue::Value { val, next_index } => (val, next_index),
        };

        let (mut header, received) = match self.streams.get(&csid) {
            Some(state) => (state.header.clone(), state.received),
            None if format.has_length_and_type() => (ChunkHeader::new(csid), 0),
            None => {
                warn!(
                    csid,
                    buffered = self.buffer.len(),
                    "Chunk with a compressed header arrived on a chunk stream with no previous header, discarding input"
                );

                self.buffer.clear();
                return ReadResult::Desynchronized;
            }
        };

        let message_in_progress = received > 0;

        let timestamp_field = if format.has_timestamp_field() {
            match read_u24(&self.buffer, index) {
                ParsedValue::NotEnoughBytes => return ReadResult::NotEnoughBytes,
                ParsedValue::Value { val, next_index } => {
                    index = next_index;
                    Some(val)
                }
            }
        } else {
            None
        };

        if format.has_length_and_type() {
            let length = match read_u24(&self.buffer, index) {
                ParsedValue::NotEnoughBytes => return ReadResult::NotEnoughBytes,
                ParsedValue::Value { val, next_index } => {
                    index = next_index;
                    val
                }
            };

            if self.buffer.len() < index + 1 {
                return ReadResult::NotEnoughBytes;
            }

            header.message_type_id = self.buffer[index];
            index += 1;

            // Some encoders re-declare a different length in the middle of a message.  The
            // length that started the message is the one the fragments are counted against.
            if message_in_progress && length != header.message_length {
                debug!(
                    csid,
                    original = header.message_length,
                    declared = length,
                    "Ignoring message length change in the middle of a message"
                );
            } else {
                header.message_length = length;
            }
        }

        if format == ChunkHeaderFormat::Full {
            if self.buffer.len() < index + 4 {
                return ReadResult::NotEnoughBytes;
            }

            header.message_stream_id = MessageStreamIdByteOrder::read_u32(&self.buffer[index..index + 4]);
            index += 4;
        }

        let has_extended_timestamp = match timestamp_field {
            Some(field) => field == MAX_INITIAL_TIMESTAMP,
            None => header.timestamp_field == MAX_INITIAL_TIMESTAMP,
        };

        let extended_timestamp = if has_extended_timestamp {
            if self.buffer.len() < index + 4 {
                return ReadResult::NotEnoughBytes;
            }

            let value = BigEndian::read_u32(&self.buffer[index..index + 4]);
            index += 4;
            Some(value)
        } else {
            None
        };

        let still_needed = (header.message_length as usize).saturating_sub(received);
        let slice_length = min(still_needed, max(chunk_size, 1) as usize);
        if self.buffer.len() < index + slice_length {
            return ReadResult::NotEnoughBytes;
        }

        match (format, timestamp_field) {
            (ChunkHeaderFormat::Full, Some(field)) => {
                header.timestamp = extended_timestamp.unwrap_or(field);
                header.timestamp_field = field;
                header.timestamp_is_delta = false;
            }

            (_, Some(field)) => {
                let delta = extended_timestamp.unwrap_or(field);
                header.timestamp = header.timestamp.wrapping_add(delta);
                header.timestamp_field = field;
                header.timestamp_is_delta = true;
            }

            (_, None) => {
                // A type 3 chunk only moves the timestamp when it starts a new message with an
                // extended timestamp.  Inside a message it repeats the value already applied.
                if let (Some(value), false) = (extended_timestamp, message_in_progress) {
                    header.timestamp = match header.timestamp_is_delta {
                        true => header.timestamp.wrapping_add(value),
                        false => value,
                    };
                }
            }
        }

        let _ = self.buffer.split_to(index);
        let data = self.buffer.split_to(slice_length).freeze();

        let state = self
            .streams
            .entry(csid)
            .or_insert_with(|| ChunkStreamState {
                header: ChunkHeader::new(csid),
                fragments: Vec::new(),
                received: 0,
            });

        state.header = header;
        if !data.is_empty() {
            state.fragments.push(data);
        }

        state.received += slice_length;
        if state.received < state.header.message_length as usize {
            return ReadResult::ChunkConsumed;
        }

        let payload = binary::concat(&state.fragments);
        state.fragments.clear();
        state.received = 0;

        ReadResult::MessageCompleted(Chunk {
            chunk_stream_id: csid,
            timestamp: state.header.timestamp,
            message_length: state.header.message_length,
            message_type_id: state.header.message_type_id,
            message_stream_id: state.header.message_stream_id,
            payload,
        })
    }
}

impl Default for ChunkReceiver {
    fn default() -> Self {
        ChunkReceiver::new()
    }
}

fn get_csid(buffer: &[u8]) -> ParsedValue<u32> {
    const CSID_MASK: u8 = 0b0011_1111;

    if buffer.is_empty() {
        return ParsedValue::NotEnoughBytes;
    }

    match buffer[0] & CSID_MASK {
        0 => {
            if buffer.len() < 2 {
                ParsedValue::NotEnoughBytes
            } else {
                ParsedValue::Value {
                    val: buffer[1] as u32 + 64,
                    next_index: 2,
                }
            }
        }

        1 => {
            if buffer.len() < 3 {
                ParsedValue::NotEnoughBytes
            } else {
                ParsedValue::Value {
                    val: (buffer[2] as u32 * 256) + buffer[1] as u32 + 64,
                    next_index: 3,
                }
            }
        }

        x => ParsedValue::Value {
            val: x as u32,
            next_index: 1,
        },
    }
}

fn read_u24(buffer: &[u8], index: usize) -> ParsedValue<u32> {
    if buffer.len() < index + 3 {
        return ParsedValue::NotEnoughBytes;
    }

    ParsedValue::Value {
        val: BigEndian::read_u24(&buffer[index..index + 3]),
        next_index: index + 3,
    }
}
