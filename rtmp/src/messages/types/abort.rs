use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::io::Cursor;

use crate::messages::{MessageDeserializationError, MessageSerializationError, RtmpMessage};

pub fn serialize(stream_id: u32) -> Result<Bytes, MessageSerializationError> {
    let mut cursor = Cursor::new(Vec::with_capacity(4));
    cursor.write_u32::<BigEndian>(stream_id)?;

    Ok(Bytes::from(cursor.into_inner()))
}

pub fn deserialize(data: Bytes) -> Result<RtmpMessage, MessageDeserializationError> {
    let mut cursor = Cursor::new(data);
    let stream_id = cursor.read_u32::<BigEndian>()?;

    Ok(RtmpMessage::Abort { stream_id })
}
