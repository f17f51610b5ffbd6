use byteorder::{BigEndian, ByteOrder};

/// The only RTMP version this server speaks (plain, unencrypted RTMP)
pub const RTMP_VERSION: u8 = 3;

/// Size of the C1/S1 and C2/S2 packets
pub const PACKET_SIZE: usize = 1536;

/// Size of the random data block at the end of the C1/S1 and C2/S2 packets
pub const RANDOM_SIZE: usize = 1528;

const TIME_SIZE: usize = 4;

/// A C1/S1 or C2/S2 packet: two 32 bit big endian time fields followed by the random block.
///
/// For C1/S1 the second time field is zero.  For C2/S2 the packet echoes the time and random
/// data of the peer's C1/S1, with `time2` carrying the local time when it was read.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct HandshakePacket {
    pub time: u32,
    pub time2: u32,
    pub random: Vec<u8>,
}

impl HandshakePacket {
    /// Builds a C1/S1 packet
    pub fn initial(time: u32, random: &[u8]) -> Self {
        HandshakePacket {
            time,
            time2: 0,
            random: random.to_vec(),
        }
    }

    /// Builds the C2/S2 echo of a received C1/S1 packet
    pub fn echo(received: &HandshakePacket, own_time: u32) -> Self {
        HandshakePacket {
            time: received.time,
            time2: own_time,
            random: received.random.clone(),
        }
    }

    /// Reads a packet from the start of `bytes`, returning `None` if fewer than
    /// `PACKET_SIZE` bytes are available.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < PACKET_SIZE {
            return None;
        }

        Some(HandshakePacket {
            time: BigEndian::read_u32(&bytes[0..TIME_SIZE]),
            time2: BigEndian::read_u32(&bytes[TIME_SIZE..TIME_SIZE * 2]),
            random: bytes[TIME_SIZE * 2..PACKET_SIZE].to_vec(),
        })
    }

    pub fn write_to(&self, output: &mut Vec<u8>) {
        let mut times = [0_u8; TIME_SIZE * 2];
        BigEndian::write_u32(&mut times[0..TIME_SIZE], self.time);
        BigEndian::write_u32(&mut times[TIME_SIZE..], self.time2);
        output.extend_from_slice(&times);
        output.extend_from_slice(&self.random);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(PACKET_SIZE);
        self.write_to(&mut output);
        output
    }
}
