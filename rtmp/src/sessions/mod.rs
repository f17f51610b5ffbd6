//! The server side of a publishing RTMP connection.
//!
//! A session is an abstraction that reacts to the bytes a publisher sends with packets to send
//! back, FLV output for the published media and events that applications can perform custom
//! logic on.

mod config;
mod errors;
mod events;
mod result;
mod state;

#[cfg(test)]
mod tests;

use crate::chunk_io::{Chunk, ChunkReceiver, Packet, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
use crate::command_builder::{CommandBuilder, PEER_BANDWIDTH, SERVER_CHUNK_SIZE, WINDOW_ACK_SIZE};
use crate::flv::FlvTagWriter;
use crate::handshake::{Handshake, HandshakeProcessResult, HandshakeState};
use crate::messages::{MessagePayload, PeerBandwidthLimitType, RtmpMessage};
use bytes::Bytes;
use ingest_amf0::Amf0Value;
use tracing::{debug, trace, warn};

pub use self::config::ServerSessionConfig;
pub use self::errors::ServerSessionError;
pub use self::events::ServerSessionEvent;
pub use self::result::ServerSessionResult;
pub use self::state::SessionState;

/// Message stream id handed out by `createStream`.  A session carries a single published
/// stream, so every `createStream` gets the same id.
pub const PUBLISH_STREAM_ID: u32 = 1;

/// Message stream carrying protocol control messages and the connection level commands
const CONTROL_STREAM_ID: u32 = 0;

/// Whether the rest of the current input should still be processed
#[derive(PartialEq, Eq, Debug)]
enum InputFlow {
    Continue,
    Abandon,
}

/// A session that represents the server side of a single RTMP publishing connection.
///
/// The `ServerSession` takes every byte received on the connection, starting with the
/// handshake, and returns what should happen in response.  It does not care how bytes come in
/// or get sent out but leaves that up to the application utilizing it.
///
/// Due to the header compression properties of the RTMP chunking protocol it is required that
/// all bytes received are passed into the `ServerSession` in order, and that all outbound
/// packets it returns are sent to the client **in order** without any other bytes in between.
///
/// A publisher that asks for the wrong application or stream key is not disconnected.  The
/// session raises an event and returns to its pre-handshake state, leaving it to the
/// application to close the connection if it wants to.
pub struct ServerSession {
    config: ServerSessionConfig,
    handshake: Handshake,
    receiver: ChunkReceiver,
    commands: CommandBuilder,
    flv_writer: FlvTagWriter,
    inbound_chunk_size: u32,
    state: SessionState,
    app_name: Option<String>,
    stream_key: Option<String>,
    published_stream_id: Option<u32>,
}

impl ServerSession {
    pub fn new(config: ServerSessionConfig) -> ServerSession {
        ServerSession {
            config,
            handshake: Handshake::new(),
            receiver: ChunkReceiver::new(),
            commands: CommandBuilder::new(),
            flv_writer: FlvTagWriter::new(),
            inbound_chunk_size: DEFAULT_CHUNK_SIZE,
            state: SessionState::WaitingConnect,
            app_name: None,
            stream_key: None,
            published_stream_id: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn handshake_state(&self) -> HandshakeState {
        self.handshake.state()
    }

    /// The application the publisher connected to, once accepted
    pub fn app_name(&self) -> Option<&str> {
        self.app_name.as_deref()
    }

    /// The stream key being published on, once accepted
    pub fn stream_key(&self) -> Option<&str> {
        self.stream_key.as_deref()
    }

    /// Chunk size the peer is currently sending with
    pub fn inbound_chunk_size(&self) -> u32 {
        self.inbound_chunk_size
    }

    /// Takes in bytes received from the peer and returns any responses or events that can be
    /// reacted to, in the order they were produced.
    pub fn handle_input(
        &mut self,
        bytes: &[u8],
    ) -> Result<Vec<ServerSessionResult>, ServerSessionError> {
        let mut results = Vec::new();
        let handshake_remainder;
        let mut input = bytes;

        if !self.handshake.is_completed() {
            match self.handshake.process_bytes(bytes) {
                HandshakeProcessResult::InProgress { response_bytes } => {
                    push_handshake_response(&mut results, response_bytes);
                    return Ok(results);
                }

                HandshakeProcessResult::Completed {
                    response_bytes,
                    remaining_bytes,
                } => {
                    debug!("Handshake completed");
                    push_handshake_response(&mut results, response_bytes);
                    handshake_remainder = remaining_bytes;
                    input = &handshake_remainder;
                }
            }
        }

        while let Some(chunk) = self.receiver.next_chunk(input, self.inbound_chunk_size) {
            input = &[];
            if self.handle_chunk(chunk, &mut results)? == InputFlow::Abandon {
                break;
            }
        }

        Ok(results)
    }

    /// Releases everything buffered for the connection.  Any partially received message is
    /// discarded and no further input is expected.
    pub fn abort(&mut self) {
        debug!(state = ?self.state, "Session aborted");
        self.receiver.reset();
        self.handshake.reset();
        self.state = SessionState::Terminated;
    }

    fn handle_chunk(
        &mut self,
        chunk: Chunk,
        results: &mut Vec<ServerSessionResult>,
    ) -> Result<InputFlow, ServerSessionError> {
        let payload = MessagePayload::from(&chunk);
        let message = match payload.to_rtmp_message() {
            Ok(message) => message,
            Err(error) => {
                warn!(
                    type_id = payload.type_id,
                    chunk_stream_id = chunk.chunk_stream_id,
                    %error,
                    "Dropping message that could not be decoded"
                );

                return Ok(InputFlow::Continue);
            }
        };

        match message {
            RtmpMessage::Amf0Command {
                command_name,
                transaction_id,
                command_object,
                additional_arguments,
            } => {
                return self.handle_amf0_command(
                    payload,
                    command_name,
                    transaction_id,
                    command_object,
                    additional_arguments,
                    results,
                );
            }

            RtmpMessage::SetChunkSize { .. } if payload.message_stream_id != CONTROL_STREAM_ID => {
                trace!(
                    message_stream_id = payload.message_stream_id,
                    "Ignoring SetChunkSize sent outside the control stream"
                );
            }

            RtmpMessage::SetChunkSize { size } => self.handle_set_chunk_size(size, results),
            RtmpMessage::Abort { stream_id } => self.receiver.abort(stream_id),

            RtmpMessage::AudioData { data } | RtmpMessage::VideoData { data } => {
                self.handle_media(payload.type_id, payload.timestamp, data, results)
            }

            RtmpMessage::Unknown { .. } => {
                results.push(ServerSessionResult::UnhandleableMessageReceived(payload))
            }

            other => trace!(received = ?other, "Ignoring protocol control message"),
        }

        Ok(InputFlow::Continue)
    }

    fn handle_amf0_command(
        &mut self,
        payload: MessagePayload,
        command_name: String,
        transaction_id: f64,
        command_object: Amf0Value,
        additional_arguments: Vec<Amf0Value>,
        results: &mut Vec<ServerSessionResult>,
    ) -> Result<InputFlow, ServerSessionError> {
        trace!(command = %command_name, transaction_id, state = ?self.state, "Command received");

        let connection_command = matches!(command_name.as_str(), "connect" | "createStream");
        if connection_command && payload.message_stream_id != CONTROL_STREAM_ID {
            trace!(
                command = %command_name,
                message_stream_id = payload.message_stream_id,
                "Ignoring connection command sent on a media stream"
            );

            return Ok(InputFlow::Continue);
        }

        match command_name.as_str() {
            "connect" => self.handle_command_connect(transaction_id, command_object, results),
            "createStream" => self.handle_command_create_stream(transaction_id, results),
            "FCPublish" => self.handle_command_fc_publish(additional_arguments, results),
            "publish" => {
                self.handle_command_publish(payload.message_stream_id, additional_arguments, results)
            }
            "FCUnpublish" => {
                self.handle_command_fc_unpublish(results);
                Ok(InputFlow::Continue)
            }
            "releaseStream" | "deleteStream" => Ok(InputFlow::Continue),

            _ => {
                results.push(ServerSessionResult::UnhandleableMessageReceived(payload));
                Ok(InputFlow::Continue)
            }
        }
    }

    fn handle_command_connect(
        &mut self,
        transaction_id: f64,
        command_object: Amf0Value,
        results: &mut Vec<ServerSessionResult>,
    ) -> Result<InputFlow, ServerSessionError> {
        if self.state != SessionState::WaitingConnect {
            debug!(state = ?self.state, "Ignoring connect on an already connected session");
            return Ok(InputFlow::Continue);
        }

        let app_name = command_object
            .as_object()
            .and_then(|properties| properties.get("app"))
            .and_then(|app| app.as_str())
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string();

        if let Some(required) = &self.config.required_app {
            if *required != app_name {
                warn!(required = %required, actual = %app_name, "Rejecting connection to unexpected app");
                let event = ServerSessionEvent::AppNameRejected {
                    required: required.clone(),
                    actual: app_name,
                };

                results.push(ServerSessionResult::RaisedEvent(event));
                self.soft_reset();
                return Ok(InputFlow::Abandon);
            }
        }

        let packets = [
            self.commands.window_acknowledgement_size(WINDOW_ACK_SIZE)?,
            self.commands
                .set_peer_bandwidth(PEER_BANDWIDTH, PeerBandwidthLimitType::Dynamic)?,
            self.commands.stream_begin(0)?,
            self.commands.set_chunk_size(SERVER_CHUNK_SIZE)?,
            self.commands.connect_result(transaction_id)?,
        ];

        results.extend(packets.into_iter().map(ServerSessionResult::OutboundResponse));

        debug!(app = %app_name, "Connection accepted");
        self.app_name = Some(app_name);
        self.state = SessionState::WaitingFcPublish;
        Ok(InputFlow::Continue)
    }

    fn handle_command_create_stream(
        &mut self,
        transaction_id: f64,
        results: &mut Vec<ServerSessionResult>,
    ) -> Result<InputFlow, ServerSessionError> {
        if self.state == SessionState::WaitingConnect {
            debug!("Ignoring createStream before connect");
            return Ok(InputFlow::Continue);
        }

        let packet = self
            .commands
            .create_stream_result(transaction_id, PUBLISH_STREAM_ID)?;

        results.push(ServerSessionResult::OutboundResponse(packet));
        Ok(InputFlow::Continue)
    }

    fn handle_command_fc_publish(
        &mut self,
        arguments: Vec<Amf0Value>,
        results: &mut Vec<ServerSessionResult>,
    ) -> Result<InputFlow, ServerSessionError> {
        if self.state != SessionState::WaitingFcPublish {
            debug!(state = ?self.state, "Ignoring FCPublish");
            return Ok(InputFlow::Continue);
        }

        let stream_key = first_string(arguments);
        if !self.is_stream_key_accepted(&stream_key, results) {
            return Ok(InputFlow::Abandon);
        }

        let packet = self.commands.on_fc_publish(&stream_key)?;
        results.push(ServerSessionResult::OutboundResponse(packet));

        self.stream_key = Some(stream_key);
        self.state = SessionState::WaitingPublish;
        Ok(InputFlow::Continue)
    }

    fn handle_command_publish(
        &mut self,
        message_stream_id: u32,
        arguments: Vec<Amf0Value>,
        results: &mut Vec<ServerSessionResult>,
    ) -> Result<InputFlow, ServerSessionError> {
        match self.state {
            SessionState::WaitingFcPublish | SessionState::WaitingPublish => (),
            _ => {
                debug!(state = ?self.state, "Ignoring publish");
                return Ok(InputFlow::Continue);
            }
        }

        // Publishers that skipped FCPublish name their stream key here
        let mut stream_key = first_string(arguments);
        if stream_key.is_empty() {
            stream_key = self.stream_key.clone().unwrap_or_default();
        }

        if !self.is_stream_key_accepted(&stream_key, results) {
            return Ok(InputFlow::Abandon);
        }

        let packet = self.commands.publish_start(message_stream_id, &stream_key)?;
        results.push(ServerSessionResult::OutboundResponse(packet));

        let app_name = self.app_name.clone().unwrap_or_default();
        debug!(app = %app_name, stream_key = %stream_key, stream_id = message_stream_id, "Publish started");

        let event = ServerSessionEvent::PublishStarted {
            app_name,
            stream_key: stream_key.clone(),
            stream_id: message_stream_id,
        };

        results.push(ServerSessionResult::RaisedEvent(event));
        self.stream_key = Some(stream_key);
        self.published_stream_id = Some(message_stream_id);
        self.state = SessionState::Published;
        Ok(InputFlow::Continue)
    }

    fn handle_command_fc_unpublish(&mut self, results: &mut Vec<ServerSessionResult>) {
        if self.state == SessionState::Terminated {
            return;
        }

        debug!(state = ?self.state, "Publisher unpublished");
        self.state = SessionState::Terminated;

        let event = ServerSessionEvent::SessionTerminated {
            app_name: self.app_name.clone().unwrap_or_default(),
            stream_key: self.stream_key.clone().unwrap_or_default(),
            stream_id: self.published_stream_id.unwrap_or(0),
        };

        results.push(ServerSessionResult::RaisedEvent(event));
    }

    fn handle_set_chunk_size(&mut self, size: u32, results: &mut Vec<ServerSessionResult>) {
        if size == 0 || size > MAX_CHUNK_SIZE {
            warn!(size, "Ignoring invalid chunk size from peer");
            return;
        }

        self.inbound_chunk_size = size;
        let event = ServerSessionEvent::ClientChunkSizeChanged {
            new_chunk_size: size,
        };

        results.push(ServerSessionResult::RaisedEvent(event));
    }

    fn handle_media(
        &mut self,
        type_id: u8,
        timestamp: u32,
        data: Bytes,
        results: &mut Vec<ServerSessionResult>,
    ) {
        if self.state != SessionState::Published {
            trace!(type_id, state = ?self.state, "Ignoring media received while not publishing");
            return;
        }

        if !self.config.dump_flv {
            return;
        }

        let tags = self.flv_writer.write(type_id, timestamp, &data);
        results.extend(tags.into_iter().map(ServerSessionResult::FlvTag));
    }

    fn is_stream_key_accepted(
        &mut self,
        stream_key: &str,
        results: &mut Vec<ServerSessionResult>,
    ) -> bool {
        let required = match &self.config.required_stream_key {
            Some(required) if required != stream_key => required.clone(),
            _ => return true,
        };

        warn!(required = %required, actual = %stream_key, "Rejecting unexpected stream key");
        let event = ServerSessionEvent::StreamKeyRejected {
            required,
            actual: stream_key.to_string(),
        };

        results.push(ServerSessionResult::RaisedEvent(event));
        self.soft_reset();
        false
    }

    /// Returns the connection to its pre-handshake state so the peer has to start over
    fn soft_reset(&mut self) {
        self.handshake.reset();
        self.receiver.reset();
        self.commands.reset();
        self.flv_writer.reset();
        self.inbound_chunk_size = DEFAULT_CHUNK_SIZE;
        self.state = SessionState::WaitingConnect;
        self.app_name = None;
        self.stream_key = None;
        self.published_stream_id = None;
    }
}

fn push_handshake_response(results: &mut Vec<ServerSessionResult>, response_bytes: Vec<u8>) {
    if !response_bytes.is_empty() {
        let packet = Packet {
            bytes: Bytes::from(response_bytes),
        };

        results.push(ServerSessionResult::OutboundResponse(packet));
    }
}

fn first_string(arguments: Vec<Amf0Value>) -> String {
    arguments
        .into_iter()
        .next()
        .and_then(Amf0Value::into_string)
        .unwrap_or_default()
}
