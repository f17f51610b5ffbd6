//! The RTMP handshake that opens every connection.
//!
//! The peer sends C0 (version byte), C1 (time, zero, 1528 random bytes) and C2 (echo of S1).
//! The server answers C0 with S0, and C1 with S1 (its own time and random data) immediately
//! followed by S2 (the echo of C1).  The handshake is complete once C2 echoes S1's random block
//! exactly.  Any bytes after C2 already belong to the chunk stream.

mod packets;

pub use self::packets::{HandshakePacket, PACKET_SIZE, RANDOM_SIZE, RTMP_VERSION};

use rand::RngCore;
use tracing::{debug, warn};

/// The stages the handshake moves through, strictly in order
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum HandshakeState {
    WaitingZero,
    WaitingOne,
    WaitingTwo,
    Established,
}

/// The outcome of feeding bytes into the handshake
#[derive(Eq, PartialEq, Debug)]
pub enum HandshakeProcessResult {
    /// The handshake needs more bytes.  Any response bytes must be sent to the peer.
    InProgress { response_bytes: Vec<u8> },

    /// The handshake has completed.  `remaining_bytes` were received after C2 and must be
    /// handed to the chunk layer.
    Completed {
        response_bytes: Vec<u8>,
        remaining_bytes: Vec<u8>,
    },
}

/// Server side handshake state machine.
///
/// Partial packets are buffered, so bytes can be fed in however the transport delivers them.
pub struct Handshake {
    state: HandshakeState,
    own_time: u32,
    own_random: Vec<u8>,
    peer_packet: Option<HandshakePacket>,
    buffer: Vec<u8>,
}

impl Handshake {
    pub fn new() -> Handshake {
        Handshake {
            state: HandshakeState::WaitingZero,
            own_time: 0,
            own_random: create_random_data(),
            peer_packet: None,
            buffer: Vec::new(),
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state == HandshakeState::Established
    }

    /// Returns the handshake to its initial state with fresh random data, forcing the peer to
    /// start over with C0.
    pub fn reset(&mut self) {
        self.state = HandshakeState::WaitingZero;
        self.own_random = create_random_data();
        self.peer_packet = None;
        self.buffer.clear();
    }

    pub fn process_bytes(&mut self, data: &[u8]) -> HandshakeProcessResult {
        if self.state == HandshakeState::Established {
            return HandshakeProcessResult::Completed {
                response_bytes: Vec::new(),
                remaining_bytes: data.to_vec(),
            };
        }

        self.buffer.extend_from_slice(data);
        let mut response_bytes = Vec::new();

        loop {
            let progressed = match self.state {
                HandshakeState::WaitingZero => self.process_zero(&mut response_bytes),
                HandshakeState::WaitingOne => self.process_one(&mut response_bytes),
                HandshakeState::WaitingTwo => self.process_two(),
                HandshakeState::Established => {
                    let remaining_bytes = std::mem::take(&mut self.buffer);
                    return HandshakeProcessResult::Completed {
                        response_bytes,
                        remaining_bytes,
                    };
                }
            };

            if !progressed {
                return HandshakeProcessResult::InProgress { response_bytes };
            }
        }
    }

    fn process_zero(&mut self, response_bytes: &mut Vec<u8>) -> bool {
        if self.buffer.is_empty() {
            return false;
        }

        let version = self.buffer.remove(0);
        if version != RTMP_VERSION {
            warn!(version, "Peer requested an unsupported RTMP version, answering with version 3");
        }

        response_bytes.push(RTMP_VERSION);
        self.state = HandshakeState::WaitingOne;
        true
    }

    fn process_one(&mut self, response_bytes: &mut Vec<u8>) -> bool {
        let packet = match HandshakePacket::parse(&self.buffer) {
            Some(packet) => packet,
            None => return false,
        };

        self.buffer.drain(..PACKET_SIZE);

        let s1 = HandshakePacket::initial(self.own_time, &self.own_random);
        let s2 = HandshakePacket::echo(&packet, self.own_time);
        s1.write_to(response_bytes);
        s2.write_to(response_bytes);

        debug!(peer_time = packet.time, "Received C1, sent S1 and S2");
        self.peer_packet = Some(packet);
        self.state = HandshakeState::WaitingTwo;
        true
    }

    fn process_two(&mut self) -> bool {
        let packet = match HandshakePacket::parse(&self.buffer) {
            Some(packet) => packet,
            None => return false,
        };

        if packet.random != self.own_random {
            // The echo is wrong.  The packet and anything queued behind it is discarded and the
            // handshake keeps waiting for a valid C2.
            debug!("C2 did not echo our random data, handshake not completed");
            self.buffer.clear();
            return false;
        }

        self.buffer.drain(..PACKET_SIZE);
        self.state = HandshakeState::Established;
        true
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Handshake::new()
    }
}

fn create_random_data() -> Vec<u8> {
    let mut random_data = vec![0_u8; RANDOM_SIZE];
    rand::thread_rng().fill_bytes(&mut random_data);
    random_data
}
