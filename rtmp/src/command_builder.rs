//! Builds the chunk framed messages a server sends while a publisher connects.
//!
//! Protocol control messages go out on chunk stream 2 and commands on chunk stream 3.  Every
//! message starts with a full chunk header, so packets from a `CommandBuilder` can be written in
//! any order relative to each other as long as each packet is written whole.

use crate::chunk_io::{serialize_message, ChunkSerializationError, Packet, DEFAULT_CHUNK_SIZE};
use crate::messages::{
    MessageSerializationError, PeerBandwidthLimitType, RtmpMessage, UserControlEventType,
};
use ingest_amf0::{Amf0Object, Amf0Value};
use thiserror::Error;

/// Chunk size the server switches to while accepting a connection
pub const SERVER_CHUNK_SIZE: u32 = 4500;

/// Window acknowledgement size announced to publishers
pub const WINDOW_ACK_SIZE: u32 = 2_500_000;

/// Peer bandwidth announced to publishers
pub const PEER_BANDWIDTH: u32 = 2_500_000;

pub const FMS_VERSION: &str = "FMS/3,5,7,7009";
const SERVER_VERSION: &str = "3,5,7,7009";

const PROTOCOL_CONTROL_CHUNK_STREAM_ID: u32 = 2;
const COMMAND_CHUNK_STREAM_ID: u32 = 3;

#[derive(Debug, Error)]
pub enum CommandBuilderError {
    #[error("Failed to serialize the message: {0}")]
    MessageSerialization(#[from] MessageSerializationError),

    #[error("Failed to split the message into chunks: {0}")]
    ChunkSerialization(#[from] ChunkSerializationError),
}

/// Serializes outbound messages, tracking the chunk size announced to the peer.
#[derive(Debug)]
pub struct CommandBuilder {
    max_chunk_size: u32,
}

impl CommandBuilder {
    pub fn new() -> CommandBuilder {
        CommandBuilder {
            max_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// The chunk size outbound messages are currently split by
    pub fn max_chunk_size(&self) -> u32 {
        self.max_chunk_size
    }

    /// Returns to the chunk size every connection starts with
    pub fn reset(&mut self) {
        self.max_chunk_size = DEFAULT_CHUNK_SIZE;
    }

    pub fn window_acknowledgement_size(&self, size: u32) -> Result<Packet, CommandBuilderError> {
        let message = RtmpMessage::WindowAcknowledgement { size };
        self.build(PROTOCOL_CONTROL_CHUNK_STREAM_ID, message, 0)
    }

    pub fn set_peer_bandwidth(
        &self,
        size: u32,
        limit_type: PeerBandwidthLimitType,
    ) -> Result<Packet, CommandBuilderError> {
        let message = RtmpMessage::SetPeerBandwidth { size, limit_type };
        self.build(PROTOCOL_CONTROL_CHUNK_STREAM_ID, message, 0)
    }

    pub fn stream_begin(&self, stream_id: u32) -> Result<Packet, CommandBuilderError> {
        let message = RtmpMessage::UserControl {
            event_type: UserControlEventType::StreamBegin,
            stream_id: Some(stream_id),
            buffer_length: None,
            timestamp: None,
        };

        self.build(PROTOCOL_CONTROL_CHUNK_STREAM_ID, message, 0)
    }

    /// Announces a new outbound chunk size.  The announcement itself is split by the old size and
    /// every packet built afterwards by the new one.
    pub fn set_chunk_size(&mut self, size: u32) -> Result<Packet, CommandBuilderError> {
        let message = RtmpMessage::SetChunkSize { size };
        let packet = self.build(PROTOCOL_CONTROL_CHUNK_STREAM_ID, message, 0)?;
        self.max_chunk_size = size;

        Ok(packet)
    }

    /// The `_result` reply accepting a `connect` command
    pub fn connect_result(&self, transaction_id: f64) -> Result<Packet, CommandBuilderError> {
        let mut properties = Amf0Object::with_capacity(3);
        properties.insert("fmsVer", Amf0Value::from(FMS_VERSION));
        properties.insert("capabilities", Amf0Value::Number(31.0));
        properties.insert("mode", Amf0Value::Number(1.0));

        let mut data = Amf0Object::with_capacity(1);
        data.insert("version", Amf0Value::from(SERVER_VERSION));

        let mut information = Amf0Object::with_capacity(5);
        information.insert("code", Amf0Value::from("NetConnection.Connect.Success"));
        information.insert("description", Amf0Value::from("Connection succeeded."));
        information.insert("data", Amf0Value::Object(data));
        information.insert("objectEncoding", Amf0Value::Number(0.0));
        information.insert("level", Amf0Value::from("status"));

        let message = RtmpMessage::Amf0Command {
            command_name: "_result".to_string(),
            transaction_id,
            command_object: Amf0Value::Object(properties),
            additional_arguments: vec![Amf0Value::Object(information)],
        };

        self.build(COMMAND_CHUNK_STREAM_ID, message, 0)
    }

    /// The `_result` reply to `createStream`, handing out `stream_id`
    pub fn create_stream_result(
        &self,
        transaction_id: f64,
        stream_id: u32,
    ) -> Result<Packet, CommandBuilderError> {
        let message = RtmpMessage::Amf0Command {
            command_name: "_result".to_string(),
            transaction_id,
            command_object: Amf0Value::Null,
            additional_arguments: vec![Amf0Value::Number(stream_id as f64)],
        };

        self.build(COMMAND_CHUNK_STREAM_ID, message, 0)
    }

    pub fn on_fc_publish(&self, stream_key: &str) -> Result<Packet, CommandBuilderError> {
        let mut information = Amf0Object::with_capacity(2);
        information.insert("code", Amf0Value::from("NetStream.Publish.Start"));
        information.insert("description", Amf0Value::from(stream_key));

        let message = RtmpMessage::Amf0Command {
            command_name: "onFCPublish".to_string(),
            transaction_id: 0.0,
            command_object: Amf0Value::Null,
            additional_arguments: vec![Amf0Value::Object(information)],
        };

        self.build(COMMAND_CHUNK_STREAM_ID, message, 0)
    }

    /// The `onStatus` notification telling the publisher it may start sending media on
    /// `message_stream_id`
    pub fn publish_start(
        &self,
        message_stream_id: u32,
        stream_key: &str,
    ) -> Result<Packet, CommandBuilderError> {
        let description = format!("{} is now published.", stream_key);

        let mut information = Amf0Object::with_capacity(3);
        information.insert("level", Amf0Value::from("status"));
        information.insert("code", Amf0Value::from("NetStream.Publish.Start"));
        information.insert("description", Amf0Value::Utf8String(description));

        let message = RtmpMessage::Amf0Command {
            command_name: "onStatus".to_string(),
            transaction_id: 0.0,
            command_object: Amf0Value::Null,
            additional_arguments: vec![Amf0Value::Object(information)],
        };

        self.build(COMMAND_CHUNK_STREAM_ID, message, message_stream_id)
    }

    fn build(
        &self,
        chunk_stream_id: u32,
        message: RtmpMessage,
        message_stream_id: u32,
    ) -> Result<Packet, CommandBuilderError> {
        let payload = message.into_message_payload(0, message_stream_id)?;
        let bytes = serialize_message(chunk_stream_id, &payload, self.max_chunk_size)?;

        Ok(Packet { bytes })
    }
}

impl Default for CommandBuilder {
    fn default() -> Self {
        CommandBuilder::new()
    }
}
