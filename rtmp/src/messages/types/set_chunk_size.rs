use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::io::Cursor;

use crate::messages::{MessageDeserializationError, MessageSerializationError, RtmpMessage};

const MAX_SIZE: u32 = 0x7FFF_FFFF;

pub fn serialize(size: u32) -> Result<Bytes, MessageSerializationError> {
    if size > MAX_SIZE {
        return Err(MessageSerializationError::InvalidChunkSize);
    }

    let mut cursor = Cursor::new(Vec::with_capacity(4));
    cursor.write_u32::<BigEndian>(size)?;

    Ok(Bytes::from(cursor.into_inner()))
}

/// The first bit of the size is reserved and always zero, so it is masked off rather than
/// trusted.
pub fn deserialize(data: Bytes) -> Result<RtmpMessage, MessageDeserializationError> {
    let mut cursor = Cursor::new(data);
    let size = cursor.read_u32::<BigEndian>()? & MAX_SIZE;

    Ok(RtmpMessage::SetChunkSize { size })
}
