use super::*;
use crate::chunk_io::serialize_message;
use crate::flv::FLV_HEADER;
use crate::handshake::{HandshakePacket, PACKET_SIZE, RANDOM_SIZE, RTMP_VERSION};
use crate::messages::UserControlEventType;
use ingest_amf0::Amf0Object;

const CLIENT_CHUNK_SIZE: u32 = DEFAULT_CHUNK_SIZE;

/// Decodes what the server sends, the way a publisher would
struct TestClient {
    receiver: ChunkReceiver,
    chunk_size: u32,
}

impl TestClient {
    fn new() -> Self {
        TestClient {
            receiver: ChunkReceiver::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    fn read_packet(&mut self, packet: &Packet) -> Vec<(u32, RtmpMessage)> {
        let mut messages = Vec::new();
        let mut input: &[u8] = &packet.bytes;
        while let Some(chunk) = self.receiver.next_chunk(input, self.chunk_size) {
            input = &[];
            let message = MessagePayload::from(&chunk).to_rtmp_message().unwrap();
            if let RtmpMessage::SetChunkSize { size } = message {
                self.chunk_size = size;
            }

            messages.push((chunk.message_stream_id, message));
        }

        messages
    }

    /// Decodes every outbound packet in the results, one message per packet
    fn read_responses(&mut self, results: &[ServerSessionResult]) -> Vec<RtmpMessage> {
        let mut messages = Vec::new();
        for result in results {
            if let ServerSessionResult::OutboundResponse(packet) = result {
                let mut read = self.read_packet(packet);
                assert_eq!(read.len(), 1, "Expected exactly one message per packet");
                messages.push(read.remove(0).1);
            }
        }

        messages
    }
}

fn c0_c1() -> Vec<u8> {
    let random: Vec<u8> = (0..RANDOM_SIZE).map(|x| (x % 256) as u8).collect();
    let mut bytes = vec![RTMP_VERSION];
    bytes.extend(HandshakePacket::initial(1000, &random).to_bytes());
    bytes
}

/// Routes session logs to the test output, shown for failing tests
fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Completes the handshake and returns the C2 that was accepted
fn perform_handshake(session: &mut ServerSession) -> Vec<u8> {
    init_logging();
    let results = session.handle_input(&c0_c1()).unwrap();
    let response = match &results[..] {
        [ServerSessionResult::OutboundResponse(packet)] => packet.bytes.clone(),
        x => panic!("Unexpected handshake results: {:?}", x),
    };

    let s1 = HandshakePacket::parse(&response[1..]).unwrap();
    let c2 = HandshakePacket::echo(&s1, 2000).to_bytes();
    let results = session.handle_input(&c2).unwrap();
    assert_vec_match!(results);
    assert_eq!(session.handshake_state(), HandshakeState::Established);

    c2
}

fn serialize(chunk_stream_id: u32, message: RtmpMessage, timestamp: u32, message_stream_id: u32) -> Vec<u8> {
    let payload = message.into_message_payload(timestamp, message_stream_id).unwrap();
    serialize_message(chunk_stream_id, &payload, CLIENT_CHUNK_SIZE).unwrap().to_vec()
}

fn command(name: &str, transaction_id: f64, command_object: Amf0Value, arguments: Vec<Amf0Value>, message_stream_id: u32) -> Vec<u8> {
    let message = RtmpMessage::Amf0Command {
        command_name: name.to_string(),
        transaction_id,
        command_object,
        additional_arguments: arguments,
    };

    serialize(3, message, 0, message_stream_id)
}

fn connect(app: &str) -> Vec<u8> {
    let mut properties = Amf0Object::new();
    properties.insert("app", Amf0Value::from(app));
    properties.insert("type", Amf0Value::from("nonprivate"));
    properties.insert("flashVer", Amf0Value::from("FMLE/3.0 (compatible; FMSc/1.0)"));
    properties.insert("tcUrl", Amf0Value::Utf8String(format!("rtmp://127.0.0.1/{}", app)));

    command("connect", 1.0, Amf0Value::Object(properties), vec![], 0)
}

fn fc_publish(stream_key: &str) -> Vec<u8> {
    command("FCPublish", 3.0, Amf0Value::Null, vec![Amf0Value::from(stream_key)], 0)
}

fn publish(stream_key: &str) -> Vec<u8> {
    command(
        "publish",
        5.0,
        Amf0Value::Null,
        vec![Amf0Value::from(stream_key), Amf0Value::from("live")],
        PUBLISH_STREAM_ID,
    )
}

fn media(type_id: u8, timestamp: u32, data: &[u8]) -> Vec<u8> {
    let data = Bytes::copy_from_slice(data);
    let message = match type_id {
        8 => RtmpMessage::AudioData { data },
        _ => RtmpMessage::VideoData { data },
    };

    serialize(if type_id == 8 { 4 } else { 6 }, message, timestamp, PUBLISH_STREAM_ID)
}

fn is_command(message: &RtmpMessage, name: &str) -> bool {
    matches!(message, RtmpMessage::Amf0Command { command_name, .. } if command_name == name)
}

fn status_code(message: &RtmpMessage) -> Option<&str> {
    match message {
        RtmpMessage::Amf0Command { additional_arguments, .. } => additional_arguments
            .first()
            .and_then(|argument| argument.as_object())
            .and_then(|information| information.get("code"))
            .and_then(|code| code.as_str()),
        _ => None,
    }
}

/// Connects and publishes, returning a session ready for media
fn published_session(config: ServerSessionConfig) -> (ServerSession, TestClient) {
    let mut session = ServerSession::new(config);
    let mut client = TestClient::new();
    perform_handshake(&mut session);

    for input in [connect("live"), fc_publish("key"), publish("key")] {
        let results = session.handle_input(&input).unwrap();
        client.read_responses(&results);
    }

    assert_eq!(session.state(), SessionState::Published);
    (session, client)
}

fn flv_tags(results: &[ServerSessionResult]) -> Vec<Bytes> {
    results
        .iter()
        .filter_map(|result| match result {
            ServerSessionResult::FlvTag(bytes) => Some(bytes.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn handshake_responses_are_returned_as_one_packet() {
    let mut session = ServerSession::new(ServerSessionConfig::new());
    let results = session.handle_input(&c0_c1()).unwrap();

    assert_vec_match!(results,
        ServerSessionResult::OutboundResponse(ref packet) if packet.bytes.len() == 1 + PACKET_SIZE * 2,
    );

    assert_eq!(session.handshake_state(), HandshakeState::WaitingTwo);
}

#[test]
fn incorrect_c2_does_not_complete_handshake() {
    let mut session = ServerSession::new(ServerSessionConfig::new());
    let results = session.handle_input(&c0_c1()).unwrap();
    let response = match &results[0] {
        ServerSessionResult::OutboundResponse(packet) => packet.bytes.clone(),
        x => panic!("Unexpected result: {:?}", x),
    };

    let s1 = HandshakePacket::parse(&response[1..]).unwrap();
    let mut c2 = HandshakePacket::echo(&s1, 0).to_bytes();
    c2[100] = c2[100].wrapping_add(1);

    let results = session.handle_input(&c2).unwrap();
    assert_vec_match!(results);
    assert_eq!(session.handshake_state(), HandshakeState::WaitingTwo);
    assert_eq!(session.state(), SessionState::WaitingConnect);
}

#[test]
fn full_publish_sequence_produces_expected_results_in_order() {
    let mut session = ServerSession::new(ServerSessionConfig::new().with_flv_output(true));
    let mut client = TestClient::new();
    perform_handshake(&mut session);

    let results = session.handle_input(&connect("live")).unwrap();
    let messages = client.read_responses(&results);
    assert_eq!(results.len(), 5, "Unexpected number of connect results");
    assert_eq!(messages[0], RtmpMessage::WindowAcknowledgement { size: WINDOW_ACK_SIZE });
    assert_eq!(
        messages[1],
        RtmpMessage::SetPeerBandwidth {
            size: PEER_BANDWIDTH,
            limit_type: PeerBandwidthLimitType::Dynamic,
        }
    );
    assert_eq!(
        messages[2],
        RtmpMessage::UserControl {
            event_type: UserControlEventType::StreamBegin,
            stream_id: Some(0),
            buffer_length: None,
            timestamp: None,
        }
    );
    assert_eq!(messages[3], RtmpMessage::SetChunkSize { size: SERVER_CHUNK_SIZE });
    assert!(is_command(&messages[4], "_result"), "Expected _result: {:?}", messages[4]);
    assert_eq!(status_code(&messages[4]), Some("NetConnection.Connect.Success"));
    assert_eq!(session.state(), SessionState::WaitingFcPublish);

    let results = session.handle_input(&fc_publish("key")).unwrap();
    let messages = client.read_responses(&results);
    assert_eq!(results.len(), 1, "Unexpected number of FCPublish results");
    assert!(is_command(&messages[0], "onFCPublish"), "Expected onFCPublish: {:?}", messages[0]);
    assert_eq!(session.state(), SessionState::WaitingPublish);

    let results = session.handle_input(&publish("key")).unwrap();
    assert_vec_match!(results,
        ServerSessionResult::OutboundResponse(_),
        ServerSessionResult::RaisedEvent(ServerSessionEvent::PublishStarted {
            ref app_name,
            ref stream_key,
            stream_id: PUBLISH_STREAM_ID,
        }) if app_name == "live" && stream_key == "key",
    );

    let messages = client.read_responses(&results);
    assert!(is_command(&messages[0], "onStatus"), "Expected onStatus: {:?}", messages[0]);
    assert_eq!(status_code(&messages[0]), Some("NetStream.Publish.Start"));
    assert_eq!(session.state(), SessionState::Published);

    let mut input = media(8, 10, &[0xAF, 0x01, 1, 2, 3]);
    input.extend(media(9, 20, &[0x17, 0x01, 0, 0, 0, 4, 5]));

    let results = session.handle_input(&input).unwrap();
    assert_vec_match!(results,
        ServerSessionResult::FlvTag(_),
        ServerSessionResult::FlvTag(_),
        ServerSessionResult::FlvTag(_),
    );

    let tags = flv_tags(&results);
    assert_eq!(&tags[0][..], &FLV_HEADER, "First output should be the FLV header");

    assert_eq!(&tags[1][0..4], &[0, 0, 0, 0], "First tag's previous tag size should be zero");
    assert_eq!(tags[1][4], 8, "Expected an audio tag");
    assert_eq!(&tags[1][15..], &[0xAF, 0x01, 1, 2, 3]);

    assert_eq!(&tags[2][0..4], &[0, 0, 0, 11 + 5], "Previous tag size not chained");
    assert_eq!(tags[2][4], 9, "Expected a video tag");
    assert_eq!(&tags[2][15..], &[0x17, 0x01, 0, 0, 0, 4, 5]);

    let audio_timestamp = u32::from_be_bytes([tags[1][11], tags[1][8], tags[1][9], tags[1][10]]);
    let video_timestamp = u32::from_be_bytes([tags[2][11], tags[2][8], tags[2][9], tags[2][10]]);
    assert_eq!(audio_timestamp, 10);
    assert_eq!(video_timestamp, 20);
}

#[test]
fn release_stream_and_create_stream_are_handled_during_publish() {
    let mut session = ServerSession::new(ServerSessionConfig::new());
    let mut client = TestClient::new();
    perform_handshake(&mut session);
    session.handle_input(&connect("live")).unwrap();

    let release = command("releaseStream", 2.0, Amf0Value::Null, vec![Amf0Value::from("key")], 0);
    let results = session.handle_input(&release).unwrap();
    assert_vec_match!(results);

    session.handle_input(&fc_publish("key")).unwrap();

    // The connect responses switched the server to a larger chunk size
    client.chunk_size = SERVER_CHUNK_SIZE;
    let results = session.handle_input(&command("createStream", 4.0, Amf0Value::Null, vec![], 0)).unwrap();
    let messages = client.read_responses(&results);
    match &messages[..] {
        [RtmpMessage::Amf0Command {
            command_name,
            transaction_id,
            command_object: Amf0Value::Null,
            additional_arguments,
        }] if command_name == "_result" => {
            assert_eq!(*transaction_id, 4.0);
            assert_eq!(additional_arguments, &vec![Amf0Value::Number(PUBLISH_STREAM_ID as f64)]);
        }

        x => panic!("Unexpected createStream response: {:?}", x),
    }

    let results = session.handle_input(&publish("key")).unwrap();
    assert_vec_contains!(results, ServerSessionResult::RaisedEvent(ServerSessionEvent::PublishStarted { .. }));
}

#[test]
fn connect_to_unexpected_app_is_rejected() {
    let config = ServerSessionConfig::new().with_required_app("stream");
    let mut session = ServerSession::new(config);
    perform_handshake(&mut session);

    let results = session.handle_input(&connect("live")).unwrap();
    assert_vec_match!(results,
        ServerSessionResult::RaisedEvent(ServerSessionEvent::AppNameRejected {
            ref required,
            ref actual,
        }) if required == "stream" && actual == "live",
    );

    assert_eq!(session.state(), SessionState::WaitingConnect);
    assert_eq!(session.handshake_state(), HandshakeState::WaitingZero);
    assert_eq!(session.app_name(), None);
}

#[test]
fn rejected_session_can_handshake_again() {
    let config = ServerSessionConfig::new().with_required_app("stream");
    let mut session = ServerSession::new(config);
    perform_handshake(&mut session);
    session.handle_input(&connect("live")).unwrap();

    perform_handshake(&mut session);
    let results = session.handle_input(&connect("stream")).unwrap();
    assert_eq!(results.len(), 5, "Expected the connect responses");
    assert_eq!(session.app_name(), Some("stream"));
}

#[test]
fn bytes_after_rejected_connect_are_discarded() {
    let config = ServerSessionConfig::new().with_required_app("stream");
    let mut session = ServerSession::new(config);
    perform_handshake(&mut session);

    let mut input = connect("live");
    input.extend(fc_publish("key"));

    let results = session.handle_input(&input).unwrap();
    assert_eq!(results.len(), 1, "Only the rejection should be returned");
    assert_eq!(session.handshake_state(), HandshakeState::WaitingZero);
}

#[test]
fn trailing_slash_is_removed_from_app_name() {
    let config = ServerSessionConfig::new().with_required_app("live");
    let mut session = ServerSession::new(config);
    perform_handshake(&mut session);

    let results = session.handle_input(&connect("live/")).unwrap();
    assert_eq!(results.len(), 5, "Expected the connect responses");
    assert_eq!(session.app_name(), Some("live"));
}

#[test]
fn fc_publish_with_unexpected_stream_key_is_rejected() {
    let config = ServerSessionConfig::new().with_required_stream_key("secret");
    let mut session = ServerSession::new(config);
    perform_handshake(&mut session);
    session.handle_input(&connect("live")).unwrap();

    let results = session.handle_input(&fc_publish("guess")).unwrap();
    assert_vec_match!(results,
        ServerSessionResult::RaisedEvent(ServerSessionEvent::StreamKeyRejected {
            ref required,
            ref actual,
        }) if required == "secret" && actual == "guess",
    );

    assert_eq!(session.state(), SessionState::WaitingConnect);
    assert_eq!(session.handshake_state(), HandshakeState::WaitingZero);
}

#[test]
fn publish_without_fc_publish_is_accepted() {
    let config = ServerSessionConfig::new().with_required_stream_key("secret");
    let mut session = ServerSession::new(config);
    perform_handshake(&mut session);
    session.handle_input(&connect("live")).unwrap();

    let results = session.handle_input(&publish("secret")).unwrap();
    assert_vec_match!(results,
        ServerSessionResult::OutboundResponse(_),
        ServerSessionResult::RaisedEvent(ServerSessionEvent::PublishStarted { ref stream_key, .. })
            if stream_key == "secret",
    );

    assert_eq!(session.stream_key(), Some("secret"));
}

#[test]
fn publish_without_fc_publish_checks_stream_key() {
    let config = ServerSessionConfig::new().with_required_stream_key("secret");
    let mut session = ServerSession::new(config);
    perform_handshake(&mut session);
    session.handle_input(&connect("live")).unwrap();

    let results = session.handle_input(&publish("guess")).unwrap();
    assert_vec_match!(results,
        ServerSessionResult::RaisedEvent(ServerSessionEvent::StreamKeyRejected { .. }),
    );
}

#[test]
fn media_before_publishing_is_ignored() {
    let mut session = ServerSession::new(ServerSessionConfig::new().with_flv_output(true));
    perform_handshake(&mut session);
    session.handle_input(&connect("live")).unwrap();

    let results = session.handle_input(&media(9, 0, &[0x17, 0, 0, 0, 0])).unwrap();
    assert_vec_match!(results);
}

#[test]
fn media_is_not_returned_when_flv_output_is_disabled() {
    let (mut session, _) = published_session(ServerSessionConfig::new());

    let results = session.handle_input(&media(8, 0, &[0xAF, 1, 2])).unwrap();
    assert_vec_match!(results);
}

#[test]
fn decreasing_media_timestamps_are_clamped() {
    let (mut session, _) = published_session(ServerSessionConfig::new().with_flv_output(true));

    let mut input = media(9, 100, &[0x27, 1]);
    input.extend(media(8, 40, &[0xAF, 1]));
    let tags = flv_tags(&session.handle_input(&input).unwrap());

    assert_eq!(tags.len(), 3);
    assert_eq!(&tags[2][8..12], &[0, 0, 100, 0], "Audio tag should not go back in time");
}

#[test]
fn fc_unpublish_terminates_the_session() {
    let (mut session, _) = published_session(ServerSessionConfig::new());

    let results = session
        .handle_input(&command("FCUnpublish", 6.0, Amf0Value::Null, vec![Amf0Value::from("key")], 0))
        .unwrap();

    assert_vec_match!(results,
        ServerSessionResult::RaisedEvent(ServerSessionEvent::SessionTerminated {
            ref app_name,
            ref stream_key,
            stream_id: PUBLISH_STREAM_ID,
        }) if app_name == "live" && stream_key == "key",
    );

    assert_eq!(session.state(), SessionState::Terminated);

    let results = session.handle_input(&media(8, 0, &[0xAF, 1])).unwrap();
    assert_vec_match!(results);
}

#[test]
fn client_chunk_size_applies_to_following_chunks_in_same_input() {
    let mut session = ServerSession::new(ServerSessionConfig::new());
    perform_handshake(&mut session);

    let mut input = serialize(2, RtmpMessage::SetChunkSize { size: 4096 }, 0, 0);
    let message = RtmpMessage::Amf0Command {
        command_name: "connect".to_string(),
        transaction_id: 1.0,
        command_object: Amf0Value::Object(
            vec![
                ("app", Amf0Value::from("live")),
                ("tcUrl", Amf0Value::Utf8String(format!("rtmp://{}/live", "a".repeat(200)))),
            ]
            .into_iter()
            .collect(),
        ),
        additional_arguments: vec![],
    };

    let payload = message.into_message_payload(0, 0).unwrap();
    assert!(payload.data.len() > 128, "Connect should need more than one default sized chunk");
    input.extend_from_slice(&serialize_message(3, &payload, 4096).unwrap());

    let results = session.handle_input(&input).unwrap();
    assert_eq!(results.len(), 6, "Unexpected results: {:?}", results);
    assert_vec_contains!(results,
        ServerSessionResult::RaisedEvent(ServerSessionEvent::ClientChunkSizeChanged { new_chunk_size: 4096 })
    );

    assert_eq!(session.inbound_chunk_size(), 4096);
    assert_eq!(session.state(), SessionState::WaitingFcPublish);
}

#[test]
fn zero_chunk_size_is_ignored() {
    let mut session = ServerSession::new(ServerSessionConfig::new());
    perform_handshake(&mut session);

    let results = session
        .handle_input(&serialize(2, RtmpMessage::SetChunkSize { size: 0 }, 0, 0))
        .unwrap();

    assert_vec_match!(results);
    assert_eq!(session.inbound_chunk_size(), DEFAULT_CHUNK_SIZE);
}

#[test]
fn chunk_size_on_media_stream_is_ignored() {
    let mut session = ServerSession::new(ServerSessionConfig::new());
    perform_handshake(&mut session);

    let results = session
        .handle_input(&serialize(2, RtmpMessage::SetChunkSize { size: 4096 }, 0, PUBLISH_STREAM_ID))
        .unwrap();

    assert_vec_match!(results);
    assert_eq!(session.inbound_chunk_size(), DEFAULT_CHUNK_SIZE);
}

#[test]
fn connect_on_media_stream_is_ignored() {
    let mut session = ServerSession::new(ServerSessionConfig::new());
    perform_handshake(&mut session);

    let properties = vec![("app", Amf0Value::from("live"))].into_iter().collect();
    let input = command("connect", 1.0, Amf0Value::Object(properties), vec![], PUBLISH_STREAM_ID);
    let results = session.handle_input(&input).unwrap();

    assert_vec_match!(results);
    assert_eq!(session.state(), SessionState::WaitingConnect);
}

#[test]
fn create_stream_on_media_stream_is_ignored() {
    let mut session = ServerSession::new(ServerSessionConfig::new());
    perform_handshake(&mut session);
    session.handle_input(&connect("live")).unwrap();

    let input = command("createStream", 4.0, Amf0Value::Null, vec![], PUBLISH_STREAM_ID);
    let results = session.handle_input(&input).unwrap();

    assert_vec_match!(results);
}

#[test]
fn connect_sent_together_with_c2_is_processed() {
    let mut session = ServerSession::new(ServerSessionConfig::new());
    let results = session.handle_input(&c0_c1()).unwrap();
    let response = match &results[0] {
        ServerSessionResult::OutboundResponse(packet) => packet.bytes.clone(),
        x => panic!("Unexpected result: {:?}", x),
    };

    let s1 = HandshakePacket::parse(&response[1..]).unwrap();
    let mut input = HandshakePacket::echo(&s1, 0).to_bytes();
    input.extend(connect("live"));

    let results = session.handle_input(&input).unwrap();
    assert_eq!(results.len(), 5, "Expected the connect responses");
    assert_eq!(session.state(), SessionState::WaitingFcPublish);
}

#[test]
fn input_split_into_single_bytes_gives_same_results() {
    let mut session = ServerSession::new(ServerSessionConfig::new());
    perform_handshake(&mut session);

    let mut results = Vec::new();
    for byte in connect("live") {
        results.extend(session.handle_input(&[byte]).unwrap());
    }

    assert_eq!(results.len(), 5, "Expected the connect responses");
}

#[test]
fn unknown_commands_are_returned_as_unhandleable() {
    let mut session = ServerSession::new(ServerSessionConfig::new());
    perform_handshake(&mut session);
    session.handle_input(&connect("live")).unwrap();

    let results = session
        .handle_input(&command("_checkbw", 2.0, Amf0Value::Null, vec![], 0))
        .unwrap();

    assert_vec_match!(results,
        ServerSessionResult::UnhandleableMessageReceived(ref payload) if payload.type_id == 20,
    );
}

#[test]
fn undecodable_command_is_dropped_without_breaking_the_session() {
    let mut session = ServerSession::new(ServerSessionConfig::new());
    perform_handshake(&mut session);

    let broken = MessagePayload {
        timestamp: 0,
        type_id: 20,
        message_stream_id: 0,
        data: Bytes::from_static(&[0x02, 0x00, 0x01, b'a', 0x42]),
    };

    let mut input = serialize_message(3, &broken, CLIENT_CHUNK_SIZE).unwrap().to_vec();
    input.extend(connect("live"));

    let results = session.handle_input(&input).unwrap();
    assert_eq!(results.len(), 5, "Expected only the connect responses");
}

#[test]
fn abort_message_discards_partial_message() {
    let mut session = ServerSession::new(ServerSessionConfig::new());
    perform_handshake(&mut session);

    // The first chunk of a connect that never completes
    let partial = connect(&"x".repeat(300));
    let first_chunk = &partial[..12 + CLIENT_CHUNK_SIZE as usize];
    assert_vec_match!(session.handle_input(first_chunk).unwrap());

    let abort = serialize(2, RtmpMessage::Abort { stream_id: 3 }, 0, 0);
    assert_vec_match!(session.handle_input(&abort).unwrap());

    let results = session.handle_input(&connect("live")).unwrap();
    assert_eq!(results.len(), 5, "Expected the connect responses");
    assert_eq!(session.app_name(), Some("live"));
}

#[test]
fn aborted_session_releases_state() {
    let (mut session, _) = published_session(ServerSessionConfig::new());
    session.abort();

    assert_eq!(session.state(), SessionState::Terminated);
    assert_eq!(session.handshake_state(), HandshakeState::WaitingZero);
}
