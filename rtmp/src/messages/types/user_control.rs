use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::io::{Cursor, Write};

use crate::messages::{
    MessageDeserializationError, MessageSerializationError, RtmpMessage, UserControlEventType,
};

pub fn serialize(
    event_type: UserControlEventType,
    stream_id: Option<u32>,
    buffer_length: Option<u32>,
    timestamp: Option<u32>,
) -> Result<Bytes, MessageSerializationError> {
    let mut cursor = Cursor::new(Vec::new());
    match event_type {
        UserControlEventType::StreamBegin => write_u32_event(&mut cursor, 0, stream_id)?,
        UserControlEventType::StreamEof => write_u32_event(&mut cursor, 1, stream_id)?,
        UserControlEventType::StreamDry => write_u32_event(&mut cursor, 2, stream_id)?,
        UserControlEventType::SetBufferLength => {
            write_u32_event(&mut cursor, 3, stream_id)?;
            cursor.write_u32::<BigEndian>(buffer_length.unwrap_or(0))?;
        }
        UserControlEventType::StreamIsRecorded => write_u32_event(&mut cursor, 4, stream_id)?,
        UserControlEventType::PingRequest => write_u32_event(&mut cursor, 6, timestamp)?,
        UserControlEventType::PingResponse => write_u32_event(&mut cursor, 7, timestamp)?,
    };

    Ok(Bytes::from(cursor.into_inner()))
}

pub fn deserialize(data: Bytes) -> Result<RtmpMessage, MessageDeserializationError> {
    let mut cursor = Cursor::new(data);
    let event_type = match cursor.read_u16::<BigEndian>()? {
        0 => UserControlEventType::StreamBegin,
        1 => UserControlEventType::StreamEof,
        2 => UserControlEventType::StreamDry,
        3 => UserControlEventType::SetBufferLength,
        4 => UserControlEventType::StreamIsRecorded,
        6 => UserControlEventType::PingRequest,
        7 => UserControlEventType::PingResponse,
        _ => return Err(MessageDeserializationError::InvalidMessageFormat),
    };

    let mut stream_id = None;
    let mut buffer_length = None;
    let mut timestamp = None;

    match event_type {
        UserControlEventType::PingRequest | UserControlEventType::PingResponse => {
            timestamp = Some(cursor.read_u32::<BigEndian>()?)
        }

        UserControlEventType::SetBufferLength => {
            stream_id = Some(cursor.read_u32::<BigEndian>()?);
            buffer_length = Some(cursor.read_u32::<BigEndian>()?);
        }

        _ => stream_id = Some(cursor.read_u32::<BigEndian>()?),
    }

    Ok(RtmpMessage::UserControl {
        event_type,
        stream_id,
        buffer_length,
        timestamp,
    })
}

fn write_u32_event<W: Write>(
    bytes: &mut W,
    event_id: u16,
    value: Option<u32>,
) -> Result<(), MessageSerializationError> {
    bytes.write_u16::<BigEndian>(event_id)?;
    bytes.write_u32::<BigEndian>(value.unwrap_or(0))?;
    Ok(())
}
