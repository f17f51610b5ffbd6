use crate::errors::RemuxError;
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;

pub const FLV_HEADER_SIZE: usize = 9;
pub const TAG_TYPE_AUDIO: u8 = 8;
pub const TAG_TYPE_VIDEO: u8 = 9;
pub const TAG_TYPE_SCRIPT: u8 = 18;

/// Bytes ahead of the tag data: previous tag size, type, data size, timestamp, stream id
pub(crate) const TAG_PREFIX_SIZE: usize = 4 + 11;

/// A single FLV tag along with the previous tag size that preceded it in the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlvTag {
    pub previous_tag_size: u32,
    pub tag_type: u8,
    pub timestamp: u32,
    pub stream_id: u32,
    pub data: Bytes,
}

impl FlvTag {
    /// Parses one unit as split out by the `FlvTagQueue`
    pub fn parse(unit: &Bytes) -> Result<FlvTag, RemuxError> {
        if unit.len() < TAG_PREFIX_SIZE {
            return Err(RemuxError::NotEnoughData("FLV tag header"));
        }

        let previous_tag_size = BigEndian::read_u32(&unit[0..4]);
        let tag_type = unit[4] & 0x1F;
        let data_size = BigEndian::read_u24(&unit[5..8]) as usize;
        let timestamp = BigEndian::read_u24(&unit[8..11]) | ((unit[11] as u32) << 24);
        let stream_id = BigEndian::read_u24(&unit[12..15]);

        let end = TAG_PREFIX_SIZE + data_size;
        if unit.len() < end {
            return Err(RemuxError::NotEnoughData("FLV tag data"));
        }

        Ok(FlvTag {
            previous_tag_size,
            tag_type,
            timestamp,
            stream_id,
            data: unit.slice(TAG_PREFIX_SIZE..end),
        })
    }
}
