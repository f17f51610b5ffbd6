//! Splitting sections and PES packets into transport stream packets

use bytes::{BufMut, Bytes, BytesMut};

pub const PACKET_SIZE: usize = 188;
pub const HEADER_SIZE: usize = 4;
pub const SYNC_BYTE: u8 = 0x47;
const PAYLOAD_SIZE: usize = PACKET_SIZE - HEADER_SIZE;
const STUFFING_BYTE: u8 = 0xFF;

pub const STREAM_ID_AUDIO: u8 = 0xC0;
pub const STREAM_ID_VIDEO: u8 = 0xE0;

/// Streams whose PES packets carry their data right after the length, with no optional header
const STREAM_IDS_WITHOUT_OPTIONAL_HEADER: [u8; 8] = [0xBC, 0xBE, 0xBF, 0xF0, 0xF1, 0xFF, 0xF2, 0xF8];

/// Presentation timestamps are 33 bit, 90kHz
pub const TIMESTAMP_MASK: u64 = (1 << 33) - 1;

const ADAPTATION_PAYLOAD_ONLY: u8 = 0b01;
const ADAPTATION_FIELD_ONLY: u8 = 0b10;
const ADAPTATION_FIELD_AND_PAYLOAD: u8 = 0b11;

/// The 4 bit continuity counter of one pid
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ContinuityCounter(u8);

impl ContinuityCounter {
    /// Value for the next packet carrying payload; advances the counter
    pub fn next(&mut self) -> u8 {
        let value = self.0;
        self.0 = (self.0 + 1) & 0x0F;
        value
    }
}

/// Packetizes a PSI section behind a zero pointer field, stuffing the last packet with 0xFF
pub fn packetize_section(section: &[u8], pid: u16, counter: &mut ContinuityCounter) -> Vec<Bytes> {
    let mut data = Vec::with_capacity(section.len() + 1);
    data.push(0); // pointer field
    data.extend_from_slice(section);

    data.chunks(PAYLOAD_SIZE)
        .enumerate()
        .map(|(index, slice)| {
            let mut packet = BytesMut::with_capacity(PACKET_SIZE);
            put_header(&mut packet, pid, index == 0, ADAPTATION_PAYLOAD_ONLY, counter.next());
            packet.put_slice(slice);
            packet.put_bytes(STUFFING_BYTE, PACKET_SIZE - packet.len());
            packet.freeze()
        })
        .collect()
}

/// Builds a PES packet.  The optional header (and with it the timestamps) is left out for the
/// stream ids that do not carry one.  A zero length field is written when `omit_length` is set or
/// the packet is too long for it, which is only allowed for video.
pub fn build_pes(
    stream_id: u8,
    pts: Option<u64>,
    dts: Option<u64>,
    data: &[u8],
    omit_length: bool,
) -> Bytes {
    let has_optional_header = !STREAM_IDS_WITHOUT_OPTIONAL_HEADER.contains(&stream_id);
    let header_data_length = pts.map_or(0, |_| 5) + dts.map_or(0, |_| 5);
    let optional_length = if has_optional_header {
        3 + header_data_length
    } else {
        0
    };

    let pes_length = optional_length + data.len();
    let mut pes = BytesMut::with_capacity(6 + pes_length);
    pes.put_slice(&[0x00, 0x00, 0x01, stream_id]);
    if omit_length || pes_length > u16::MAX as usize {
        pes.put_u16(0);
    } else {
        pes.put_u16(pes_length as u16);
    }

    if has_optional_header {
        pes.put_u8(0x80);
        pes.put_u8(pts.map_or(0, |_| 0x80) | dts.map_or(0, |_| 0x40));
        pes.put_u8(header_data_length as u8);

        if let Some(pts) = pts {
            let prefix = if dts.is_some() { 0x30 } else { 0x20 };
            put_timestamp(&mut pes, prefix, pts);
        }

        if let Some(dts) = dts {
            put_timestamp(&mut pes, 0x10, dts);
        }
    }

    pes.put_slice(data);
    pes.freeze()
}

/// Spreads a PES packet over transport packets.  A short final slice is padded through the
/// adaptation field.
pub fn packetize_pes(pes: &[u8], pid: u16, counter: &mut ContinuityCounter) -> Vec<Bytes> {
    pes.chunks(PAYLOAD_SIZE)
        .enumerate()
        .map(|(index, slice)| {
            let mut packet = BytesMut::with_capacity(PACKET_SIZE);
            let adaptation_control = if slice.len() == PAYLOAD_SIZE {
                ADAPTATION_PAYLOAD_ONLY
            } else {
                ADAPTATION_FIELD_AND_PAYLOAD
            };

            put_header(&mut packet, pid, index == 0, adaptation_control, counter.next());
            if slice.len() < PAYLOAD_SIZE {
                let adaptation_length = PAYLOAD_SIZE - 1 - slice.len();
                packet.put_u8(adaptation_length as u8);
                if adaptation_length > 0 {
                    packet.put_u8(0x00); // no flags
                    packet.put_bytes(STUFFING_BYTE, adaptation_length - 1);
                }
            }

            packet.put_slice(slice);
            packet.freeze()
        })
        .collect()
}

/// A packet carrying nothing but a PCR in its adaptation field.  Packets without payload do not
/// advance the continuity counter, so the caller passes the value to repeat.
pub fn pcr_packet(pid: u16, continuity_counter: u8, pcr: u64) -> Bytes {
    let base = pcr & TIMESTAMP_MASK;
    let mut packet = BytesMut::with_capacity(PACKET_SIZE);
    put_header(&mut packet, pid, false, ADAPTATION_FIELD_ONLY, continuity_counter);
    packet.put_u8((PAYLOAD_SIZE - 1) as u8);
    packet.put_u8(0x10); // PCR flag

    // 33 bit base, 6 reserved bits, 9 bit extension left at zero
    packet.put_u32((base >> 1) as u32);
    packet.put_u8((((base & 1) as u8) << 7) | 0x7E);
    packet.put_u8(0x00);

    packet.put_bytes(STUFFING_BYTE, PACKET_SIZE - packet.len());
    packet.freeze()
}

fn put_header(
    packet: &mut BytesMut,
    pid: u16,
    payload_unit_start: bool,
    adaptation_control: u8,
    continuity_counter: u8,
) {
    packet.put_u8(SYNC_BYTE);
    packet.put_u16(((payload_unit_start as u16) << 14) | (pid & 0x1FFF));
    packet.put_u8((adaptation_control << 4) | (continuity_counter & 0x0F));
}

fn put_timestamp(buffer: &mut BytesMut, prefix: u8, timestamp: u64) {
    let timestamp = timestamp & TIMESTAMP_MASK;
    buffer.put_u8(prefix | ((((timestamp >> 30) & 0x07) as u8) << 1) | 1);
    buffer.put_u16(((((timestamp >> 15) & 0x7FFF) as u16) << 1) | 1);
    buffer.put_u16((((timestamp & 0x7FFF) as u16) << 1) | 1);
}
