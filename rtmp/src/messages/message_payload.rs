use super::types;
use super::{MessageDeserializationError, MessageSerializationError, RtmpMessage};
use crate::chunk_io::Chunk;
use bytes::Bytes;

/// Represents a raw RTMP message
#[derive(PartialEq, Debug, Clone)]
pub struct MessagePayload {
    pub timestamp: u32,
    pub type_id: u8,
    pub message_stream_id: u32,
    pub data: Bytes,
}

impl MessagePayload {
    pub fn to_rtmp_message(&self) -> Result<RtmpMessage, MessageDeserializationError> {
        let data = self.data.clone();
        match self.type_id {
            1 => types::set_chunk_size::deserialize(data),
            2 => types::abort::deserialize(data),
            3 => types::acknowledgement::deserialize(data),
            4 => types::user_control::deserialize(data),
            5 => types::window_acknowledgement_size::deserialize(data),
            6 => types::set_peer_bandwidth::deserialize(data),
            8 => Ok(RtmpMessage::AudioData { data }),
            9 => Ok(RtmpMessage::VideoData { data }),
            20 => types::amf0_command::deserialize(data),
            _ => Ok(RtmpMessage::Unknown {
                type_id: self.type_id,
                data,
            }),
        }
    }

    pub fn from_rtmp_message(
        message: RtmpMessage,
        timestamp: u32,
        message_stream_id: u32,
    ) -> Result<MessagePayload, MessageSerializationError> {
        let type_id = message.get_message_type_id();

        let data = match message {
            RtmpMessage::Unknown { data, .. } => data,
            RtmpMessage::Abort { stream_id } => types::abort::serialize(stream_id)?,
            RtmpMessage::Acknowledgement { sequence_number } => {
                types::acknowledgement::serialize(sequence_number)?
            }

            RtmpMessage::Amf0Command {
                command_name,
                transaction_id,
                command_object,
                additional_arguments,
            } => types::amf0_command::serialize(
                command_name,
                transaction_id,
                command_object,
                additional_arguments,
            )?,

            RtmpMessage::AudioData { data } => data,
            RtmpMessage::SetChunkSize { size } => types::set_chunk_size::serialize(size)?,
            RtmpMessage::SetPeerBandwidth { size, limit_type } => {
                types::set_peer_bandwidth::serialize(limit_type, size)?
            }

            RtmpMessage::UserControl {
                event_type,
                stream_id,
                buffer_length,
                timestamp,
            } => types::user_control::serialize(event_type, stream_id, buffer_length, timestamp)?,

            RtmpMessage::VideoData { data } => data,
            RtmpMessage::WindowAcknowledgement { size } => {
                types::window_acknowledgement_size::serialize(size)?
            }
        };

        Ok(MessagePayload {
            timestamp,
            type_id,
            message_stream_id,
            data,
        })
    }
}

impl From<&Chunk> for MessagePayload {
    fn from(chunk: &Chunk) -> Self {
        MessagePayload {
            timestamp: chunk.timestamp,
            type_id: chunk.message_type_id,
            message_stream_id: chunk.message_stream_id,
            data: chunk.payload.clone(),
        }
    }
}
