use super::chunk_header::{ChunkHeaderFormat, MessageStreamIdByteOrder, MAX_INITIAL_TIMESTAMP};
use super::{ChunkSerializationError, MAX_CHUNK_SIZE};
use crate::messages::MessagePayload;
use byteorder::ByteOrder;
use bytes::{BufMut, Bytes, BytesMut};

const MAX_MESSAGE_LENGTH: usize = 0x00FF_FFFF;
const MAX_CHUNK_STREAM_ID: u32 = 65599;

/// Splits a message into RTMP chunks no larger than `max_chunk_size` bytes of payload each.
///
/// The first chunk always carries a full (type 0) header and every following chunk a type 3
/// header.  No header compression against previously sent messages is attempted, so the
/// output does not depend on anything sent before it.
pub fn serialize_message(
    chunk_stream_id: u32,
    message: &MessagePayload,
    max_chunk_size: u32,
) -> Result<Bytes, ChunkSerializationError> {
    if message.data.len() > MAX_MESSAGE_LENGTH {
        return Err(ChunkSerializationError::MessageTooLong {
            size: message.data.len(),
        });
    }

    if max_chunk_size == 0 || max_chunk_size > MAX_CHUNK_SIZE {
        return Err(ChunkSerializationError::InvalidMaxChunkSize {
            chunk_size: max_chunk_size,
        });
    }

    let chunk_count = (message.data.len() / max_chunk_size as usize) + 1;
    let mut bytes = BytesMut::with_capacity(message.data.len() + chunk_count * 8 + 16);

    add_basic_header(&mut bytes, ChunkHeaderFormat::Full, chunk_stream_id)?;
    bytes.put_uint(message.timestamp.min(MAX_INITIAL_TIMESTAMP) as u64, 3);
    bytes.put_uint(message.data.len() as u64, 3);
    bytes.put_u8(message.type_id);

    let mut stream_id = [0_u8; 4];
    MessageStreamIdByteOrder::write_u32(&mut stream_id, message.message_stream_id);
    bytes.put_slice(&stream_id);
    add_extended_timestamp(&mut bytes, message.timestamp);

    let mut slices = message.data.chunks(max_chunk_size as usize);
    if let Some(first) = slices.next() {
        bytes.put_slice(first);
    }

    for slice in slices {
        add_basic_header(&mut bytes, ChunkHeaderFormat::Empty, chunk_stream_id)?;
        add_extended_timestamp(&mut bytes, message.timestamp);
        bytes.put_slice(slice);
    }

    Ok(bytes.freeze())
}

fn add_basic_header(
    bytes: &mut BytesMut,
    format: ChunkHeaderFormat,
    csid: u32,
) -> Result<(), ChunkSerializationError> {
    match csid {
        2..=63 => bytes.put_u8(format.mask() | csid as u8),
        64..=319 => {
            bytes.put_u8(format.mask());
            bytes.put_u8((csid - 64) as u8);
        }

        320..=MAX_CHUNK_STREAM_ID => {
            let biased = csid - 64;
            bytes.put_u8(format.mask() | 1);
            bytes.put_u8((biased & 0xFF) as u8);
            bytes.put_u8((biased >> 8) as u8);
        }

        _ => return Err(ChunkSerializationError::InvalidChunkStreamId { csid }),
    }

    Ok(())
}

fn add_extended_timestamp(bytes: &mut BytesMut, timestamp: u32) {
    if timestamp >= MAX_INITIAL_TIMESTAMP {
        bytes.put_u32(timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk_io::ChunkReceiver;
    use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
    use std::io::{Cursor, Read};

    fn create_payload(timestamp: u32, length: usize) -> MessagePayload {
        MessagePayload {
            timestamp,
            type_id: 9,
            message_stream_id: 1,
            data: Bytes::from((0..length).map(|x| x as u8).collect::<Vec<u8>>()),
        }
    }

    #[test]
    fn small_message_is_one_type_0_chunk() {
        let message = create_payload(72, 10);
        let bytes = serialize_message(4, &message, 128).unwrap();

        let mut cursor = Cursor::new(&bytes[..]);
        assert_eq!(cursor.read_u8().unwrap(), 4, "Unexpected basic header");
        assert_eq!(cursor.read_u24::<BigEndian>().unwrap(), 72, "Unexpected timestamp");
        assert_eq!(cursor.read_u24::<BigEndian>().unwrap(), 10, "Unexpected length");
        assert_eq!(cursor.read_u8().unwrap(), 9, "Unexpected type id");
        assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 1, "Unexpected stream id");

        let mut payload = Vec::new();
        cursor.read_to_end(&mut payload).unwrap();
        assert_eq!(&payload[..], &message.data[..]);
    }

    #[test]
    fn large_message_is_split_with_type_3_chunks() {
        let message = create_payload(72, 300);
        let bytes = serialize_message(3, &message, 128).unwrap();

        assert_eq!(bytes.len(), 12 + 128 + 1 + 128 + 1 + 44);
        assert_eq!(bytes[12 + 128], 0xC3, "Second chunk was not type 3");
        assert_eq!(bytes[12 + 128 + 1 + 128], 0xC3, "Third chunk was not type 3");
        assert_eq!(bytes[12 + 128 + 1], 128, "Second chunk payload did not continue the message");
    }

    #[test]
    fn extended_timestamp_written_on_every_chunk() {
        let message = create_payload(0x0100_0000, 200);
        let bytes = serialize_message(3, &message, 128).unwrap();

        assert_eq!(&bytes[1..4], &[0xFF, 0xFF, 0xFF]);
        assert_eq!(&bytes[12..16], &[0x01, 0, 0, 0]);
        assert_eq!(bytes[16 + 128], 0xC3);
        assert_eq!(&bytes[17 + 128..21 + 128], &[0x01, 0, 0, 0]);
        assert_eq!(bytes.len(), 16 + 128 + 5 + 72);
    }

    #[test]
    fn two_and_three_byte_chunk_stream_ids() {
        let message = create_payload(0, 1);

        let bytes = serialize_message(300, &message, 128).unwrap();
        assert_eq!(&bytes[0..2], &[0, 236]);

        let bytes = serialize_message(1000, &message, 128).unwrap();
        assert_eq!(&bytes[0..3], &[1, ((1000 - 64) & 0xFF) as u8, ((1000 - 64) >> 8) as u8]);
    }

    #[test]
    fn error_when_chunk_stream_id_is_reserved() {
        let message = create_payload(0, 1);

        match serialize_message(1, &message, 128) {
            Err(ChunkSerializationError::InvalidChunkStreamId { csid: 1 }) => (),
            x => panic!("Unexpected result: {:?}", x),
        }
    }

    #[test]
    fn error_when_message_is_too_long() {
        let message = create_payload(0, MAX_MESSAGE_LENGTH + 1);

        match serialize_message(3, &message, 4096) {
            Err(ChunkSerializationError::MessageTooLong { .. }) => (),
            x => panic!("Unexpected result: {:?}", x),
        }
    }

    #[test]
    fn serialized_chunks_are_reassembled_by_receiver() {
        let first = create_payload(0x00FF_FFFF, 1000);
        let second = create_payload(5, 3);

        let mut bytes = serialize_message(400, &first, 100).unwrap().to_vec();
        bytes.extend_from_slice(&serialize_message(400, &second, 100).unwrap());

        let mut receiver = ChunkReceiver::new();
        let chunks = receiver.receive(&bytes, 100);

        assert_eq!(chunks.len(), 2, "Unexpected number of chunks");
        assert_eq!(chunks[0].chunk_stream_id, 400);
        assert_eq!(chunks[0].timestamp, 0x00FF_FFFF);
        assert_eq!(chunks[0].payload, first.data);
        assert_eq!(chunks[1].timestamp, 5);
        assert_eq!(chunks[1].payload, second.data);
    }
}
