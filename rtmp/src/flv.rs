//! FLV output for published media.
//!
//! The output is a plain FLV byte stream: the 9 byte file header followed by tags, each tag
//! preceded by the size of the tag before it.

use bytes::{BufMut, Bytes, BytesMut};

/// `FLV`, version 1, audio and video present, 9 byte header
pub const FLV_HEADER: [u8; 9] = [b'F', b'L', b'V', 1, 0x05, 0, 0, 0, 9];

pub const TAG_HEADER_SIZE: usize = 11;
pub const AUDIO_TAG_TYPE: u8 = 8;
pub const VIDEO_TAG_TYPE: u8 = 9;

/// Largest payload the 24 bit data size field can describe
const MAX_TAG_DATA_SIZE: usize = 0x00FF_FFFF;

/// Turns audio and video messages into FLV tags.
#[derive(Debug, Default)]
pub struct FlvTagWriter {
    header_written: bool,
    previous_tag_size: u32,
    previous_timestamp: u32,
}

impl FlvTagWriter {
    pub fn new() -> FlvTagWriter {
        FlvTagWriter::default()
    }

    /// Produces the FLV output for one media message.  The first call that yields any tag also
    /// yields the file header as its own unit ahead of the tags.
    ///
    /// Timestamps never go backwards: a message older than the last written tag is written with
    /// the last tag's timestamp.  Payloads too large for a single tag are spread over consecutive
    /// tags whose timestamps advance by one millisecond each.
    pub fn write(&mut self, tag_type: u8, timestamp: u32, payload: &[u8]) -> Vec<Bytes> {
        let mut output = Vec::new();
        if payload.is_empty() {
            return output;
        }

        if !self.header_written {
            output.push(Bytes::from_static(&FLV_HEADER));
            self.header_written = true;
        }

        let base_timestamp = timestamp.max(self.previous_timestamp);
        for (index, data) in payload.chunks(MAX_TAG_DATA_SIZE).enumerate() {
            let timestamp = base_timestamp.wrapping_add(index as u32);
            output.push(self.write_tag(tag_type, timestamp, data));
            self.previous_timestamp = timestamp;
        }

        output
    }

    /// Starts a new FLV stream, header included
    pub fn reset(&mut self) {
        *self = FlvTagWriter::default();
    }

    fn write_tag(&mut self, tag_type: u8, timestamp: u32, data: &[u8]) -> Bytes {
        let mut bytes = BytesMut::with_capacity(4 + TAG_HEADER_SIZE + data.len());
        bytes.put_u32(self.previous_tag_size);
        bytes.put_u8(tag_type);
        bytes.put_uint(data.len() as u64, 3);

        // Lower 24 bits first, then the upper 8 bits as the extension byte
        bytes.put_uint((timestamp & 0x00FF_FFFF) as u64, 3);
        bytes.put_u8((timestamp >> 24) as u8);

        bytes.put_uint(0, 3);
        bytes.put_slice(data);

        self.previous_tag_size = (TAG_HEADER_SIZE + data.len()) as u32;
        bytes.freeze()
    }
}
