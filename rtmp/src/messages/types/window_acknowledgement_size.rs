use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::io::Cursor;

use crate::messages::{MessageDeserializationError, MessageSerializationError, RtmpMessage};

pub fn serialize(size: u32) -> Result<Bytes, MessageSerializationError> {
    let mut cursor = Cursor::new(Vec::with_capacity(4));
    cursor.write_u32::<BigEndian>(size)?;

    Ok(Bytes::from(cursor.into_inner()))
}

pub fn deserialize(data: Bytes) -> Result<RtmpMessage, MessageDeserializationError> {
    let mut cursor = Cursor::new(data);
    let size = cursor.read_u32::<BigEndian>()?;

    Ok(RtmpMessage::WindowAcknowledgement { size })
}
