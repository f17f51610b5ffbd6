use byteorder::LittleEndian;

/// Timestamp values at or above this are carried in the 4 byte extended timestamp field, with
/// the 3 byte field set to this value as a marker.
pub const MAX_INITIAL_TIMESTAMP: u32 = 0x00FF_FFFF;

/// Byte order of the message stream id in type 0 chunk headers.
///
/// Every other multi-byte RTMP header field is big endian, but the message stream id is
/// written little endian by Flash and every encoder since.  Both directions must use it.
pub type MessageStreamIdByteOrder = LittleEndian;

/// The four chunk header formats, selected by the top two bits of the basic header
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ChunkHeaderFormat {
    Full,                            // Format 0
    TimeDeltaWithoutMessageStreamId, // Format 1
    TimeDeltaOnly,                   // Format 2
    Empty,                           // Format 3
}

impl ChunkHeaderFormat {
    const FORMAT_MASK: u8 = 0b1100_0000;

    pub fn from_basic_header(byte: u8) -> ChunkHeaderFormat {
        match byte & Self::FORMAT_MASK {
            0b0000_0000 => ChunkHeaderFormat::Full,
            0b0100_0000 => ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId,
            0b1000_0000 => ChunkHeaderFormat::TimeDeltaOnly,
            _ => ChunkHeaderFormat::Empty,
        }
    }

    pub fn mask(self) -> u8 {
        match self {
            ChunkHeaderFormat::Full => 0b0000_0000,
            ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId => 0b0100_0000,
            ChunkHeaderFormat::TimeDeltaOnly => 0b1000_0000,
            ChunkHeaderFormat::Empty => 0b1100_0000,
        }
    }

    pub fn has_timestamp_field(self) -> bool {
        self != ChunkHeaderFormat::Empty
    }

    pub fn has_length_and_type(self) -> bool {
        matches!(
            self,
            ChunkHeaderFormat::Full | ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId
        )
    }
}

/// The header state remembered for a chunk stream, which compressed headers build upon
#[derive(Debug, Clone)]
pub(crate) struct ChunkHeader {
    pub chunk_stream_id: u32,
    pub timestamp: u32,

    /// The raw value of the last 3 byte timestamp field, used to know whether a type 3 chunk
    /// carries an extended timestamp
    pub timestamp_field: u32,

    /// Whether the last timestamp field was a delta (format 1 and 2) or absolute (format 0)
    pub timestamp_is_delta: bool,
    pub message_length: u32,
    pub message_type_id: u8,
    pub message_stream_id: u32,
}

impl ChunkHeader {
    pub fn new(chunk_stream_id: u32) -> ChunkHeader {
        ChunkHeader {
            chunk_stream_id,
            timestamp: 0,
            timestamp_field: 0,
            timestamp_is_delta: false,
            message_length: 0,
            message_type_id: 0,
            message_stream_id: 0,
        }
    }
}
