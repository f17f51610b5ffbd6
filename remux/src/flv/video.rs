use crate::errors::RemuxError;
use bytes::Bytes;

pub const CODEC_ID_AVC: u8 = 7;

const FRAME_TYPE_KEYFRAME: u8 = 1;

/// The first byte of a video tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoTagHeader {
    pub frame_type: u8,
    pub codec_id: u8,
    pub data: Bytes,
}

impl VideoTagHeader {
    pub fn parse(data: &Bytes) -> Result<VideoTagHeader, RemuxError> {
        let first = *data
            .first()
            .ok_or(RemuxError::NotEnoughData("video tag header"))?;

        Ok(VideoTagHeader {
            frame_type: first >> 4,
            codec_id: first & 0x0F,
            data: data.slice(1..),
        })
    }

    pub fn is_keyframe(&self) -> bool {
        self.frame_type == FRAME_TYPE_KEYFRAME
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvcPacketType {
    SequenceHeader,
    Nalu,
    EndOfSequence,
    Unknown(u8),
}

impl From<u8> for AvcPacketType {
    fn from(value: u8) -> Self {
        match value {
            0 => AvcPacketType::SequenceHeader,
            1 => AvcPacketType::Nalu,
            2 => AvcPacketType::EndOfSequence,
            x => AvcPacketType::Unknown(x),
        }
    }
}

/// The AVC specific part of a video tag, following the `VideoTagHeader` byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcPacket {
    pub packet_type: AvcPacketType,
    /// Presentation minus decode time, in milliseconds
    pub composition_time: i32,
    pub data: Bytes,
}

impl AvcPacket {
    pub fn parse(data: &Bytes) -> Result<AvcPacket, RemuxError> {
        if data.len() < 4 {
            return Err(RemuxError::NotEnoughData("AVC packet header"));
        }

        let raw = ((data[1] as i32) << 16) | ((data[2] as i32) << 8) | data[3] as i32;

        Ok(AvcPacket {
            packet_type: AvcPacketType::from(data[0]),
            composition_time: (raw << 8) >> 8,
            data: data.slice(4..),
        })
    }
}
