use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::io::Cursor;

use crate::messages::{
    MessageDeserializationError, MessageSerializationError, PeerBandwidthLimitType, RtmpMessage,
};

pub fn serialize(
    limit_type: PeerBandwidthLimitType,
    size: u32,
) -> Result<Bytes, MessageSerializationError> {
    let type_id = match limit_type {
        PeerBandwidthLimitType::Hard => 0,
        PeerBandwidthLimitType::Soft => 1,
        PeerBandwidthLimitType::Dynamic => 2,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(5));
    cursor.write_u32::<BigEndian>(size)?;
    cursor.write_u8(type_id)?;

    Ok(Bytes::from(cursor.into_inner()))
}

pub fn deserialize(data: Bytes) -> Result<RtmpMessage, MessageDeserializationError> {
    let mut cursor = Cursor::new(data);
    let size = cursor.read_u32::<BigEndian>()?;
    let limit_type = match cursor.read_u8()? {
        0 => PeerBandwidthLimitType::Hard,
        1 => PeerBandwidthLimitType::Soft,
        2 => PeerBandwidthLimitType::Dynamic,
        _ => return Err(MessageDeserializationError::InvalidMessageFormat),
    };

    Ok(RtmpMessage::SetPeerBandwidth { size, limit_type })
}
