/*!
This module contains the RTMP message types the server exchanges with publishers, as well as
functionality for serializing and deserializing these messages into payloads.

`MessagePayload`s carry the auxiliary data of an RTMP message, such as what message stream it
is meant for, its timestamp and what type of message it is.
*/

mod errors;
mod message_payload;
mod types;

pub use self::errors::{MessageDeserializationError, MessageSerializationError};
pub use self::message_payload::MessagePayload;

use bytes::Bytes;
use ingest_amf0::Amf0Value;

pub const SET_CHUNK_SIZE_TYPE_ID: u8 = 1;
pub const ABORT_TYPE_ID: u8 = 2;
pub const ACKNOWLEDGEMENT_TYPE_ID: u8 = 3;
pub const USER_CONTROL_TYPE_ID: u8 = 4;
pub const WINDOW_ACKNOWLEDGEMENT_TYPE_ID: u8 = 5;
pub const SET_PEER_BANDWIDTH_TYPE_ID: u8 = 6;
pub const AUDIO_TYPE_ID: u8 = 8;
pub const VIDEO_TYPE_ID: u8 = 9;
pub const AMF0_COMMAND_TYPE_ID: u8 = 20;

/// The type of bandwidth limiting that is being requested
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum PeerBandwidthLimitType {
    /// Peer should limit its output bandwidth to the indicated window size
    Hard,

    /// The peer should limit it's output bandwidth to the window indicated or the limit
    /// already in effect, whichever is smaller.
    Soft,

    /// If we previously had a hard limit, this limit should be treated as hard.  Otherwise ignore.
    Dynamic,
}

/// Events and notifications that are raised with the peer
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum UserControlEventType {
    /// Notifies the client that a stream has become functional
    StreamBegin,

    /// Notifies the client that the playback of data on the stream is over
    StreamEof,

    /// Notifies the client that there is no more data on the stream.
    StreamDry,

    /// Notifies the server of the buffer size (in milliseconds) that the client is using
    SetBufferLength,

    /// Notifies the client that the stream is a recorded stream.
    StreamIsRecorded,

    /// Server sends this to test whether the client is reachable.
    PingRequest,

    /// Client sends this in response to a ping request
    PingResponse,
}

/// An enumeration of all types of RTMP messages that are supported
#[derive(PartialEq, Debug, Clone)]
pub enum RtmpMessage {
    /// This type of message is used when an RTMP message is encountered with a type id that
    /// we do not know about
    Unknown { type_id: u8, data: Bytes },

    /// Notifies the peer that if it is waiting for chunks to complete a message that it should
    /// discard the chunks it has already received.
    Abort { stream_id: u32 },

    /// An acknowledgement sent to confirm how many bytes that has been received since the
    /// previous acknowledgement.
    Acknowledgement { sequence_number: u32 },

    /// A command being sent, encoded with amf0 values
    Amf0Command {
        command_name: String,
        transaction_id: f64,
        command_object: Amf0Value,
        additional_arguments: Vec<Amf0Value>,
    },

    /// A message containing audio data
    AudioData { data: Bytes },

    /// Tells the peer that the maximum chunk size for RTMP chunks it will be sending is changing
    /// to the specified size.
    SetChunkSize { size: u32 },

    /// Indicates that the peer should limit its output bandwidth
    SetPeerBandwidth {
        size: u32,
        limit_type: PeerBandwidthLimitType,
    },

    /// Notifies the peer of an event, such as a stream being
    /// created or telling the peer how much of a buffer it should have.
    UserControl {
        event_type: UserControlEventType,
        stream_id: Option<u32>,
        buffer_length: Option<u32>,
        timestamp: Option<u32>,
    },

    /// A message containing video data
    VideoData { data: Bytes },

    /// Notifies the peer how many bytes should be received before sending an `Acknowledgement`
    /// message
    WindowAcknowledgement { size: u32 },
}

impl RtmpMessage {
    pub fn into_message_payload(
        self,
        timestamp: u32,
        message_stream_id: u32,
    ) -> Result<MessagePayload, MessageSerializationError> {
        MessagePayload::from_rtmp_message(self, timestamp, message_stream_id)
    }

    pub fn get_message_type_id(&self) -> u8 {
        match *self {
            RtmpMessage::Unknown { type_id, .. } => type_id,
            RtmpMessage::Abort { .. } => ABORT_TYPE_ID,
            RtmpMessage::Acknowledgement { .. } => ACKNOWLEDGEMENT_TYPE_ID,
            RtmpMessage::Amf0Command { .. } => AMF0_COMMAND_TYPE_ID,
            RtmpMessage::AudioData { .. } => AUDIO_TYPE_ID,
            RtmpMessage::SetChunkSize { .. } => SET_CHUNK_SIZE_TYPE_ID,
            RtmpMessage::SetPeerBandwidth { .. } => SET_PEER_BANDWIDTH_TYPE_ID,
            RtmpMessage::UserControl { .. } => USER_CONTROL_TYPE_ID,
            RtmpMessage::VideoData { .. } => VIDEO_TYPE_ID,
            RtmpMessage::WindowAcknowledgement { .. } => WINDOW_ACKNOWLEDGEMENT_TYPE_ID,
        }
    }
}
