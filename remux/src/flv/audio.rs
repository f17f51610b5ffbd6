use crate::errors::RemuxError;
use bytes::Bytes;

pub const SOUND_FORMAT_AAC: u8 = 10;

/// The first byte of an audio tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTagHeader {
    pub sound_format: u8,
    pub sound_rate: u8,
    pub sound_size: u8,
    pub sound_type: u8,
    pub data: Bytes,
}

impl AudioTagHeader {
    pub fn parse(data: &Bytes) -> Result<AudioTagHeader, RemuxError> {
        let first = *data
            .first()
            .ok_or(RemuxError::NotEnoughData("audio tag header"))?;

        Ok(AudioTagHeader {
            sound_format: first >> 4,
            sound_rate: (first >> 2) & 0x03,
            sound_size: (first >> 1) & 0x01,
            sound_type: first & 0x01,
            data: data.slice(1..),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AacPacketType {
    SequenceHeader,
    Raw,
    Unknown(u8),
}

/// The AAC specific part of an audio tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AacPacket {
    pub packet_type: AacPacketType,
    pub data: Bytes,
}

impl AacPacket {
    pub fn parse(data: &Bytes) -> Result<AacPacket, RemuxError> {
        let packet_type = match data.first() {
            Some(0) => AacPacketType::SequenceHeader,
            Some(1) => AacPacketType::Raw,
            Some(x) => AacPacketType::Unknown(*x),
            None => return Err(RemuxError::NotEnoughData("AAC packet type")),
        };

        Ok(AacPacket {
            packet_type,
            data: data.slice(1..),
        })
    }
}
