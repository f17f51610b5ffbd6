//! Program specific information sections

use super::crc32::crc32_mpeg2;
use bytes::{BufMut, Bytes, BytesMut};

pub const PAT_TABLE_ID: u8 = 0x00;
pub const PMT_TABLE_ID: u8 = 0x02;

/// An elementary stream listed in a PMT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementaryStream {
    pub stream_type: u8,
    pub pid: u16,
}

/// Program association table mapping each `(program_number, pmt_pid)` pair
pub fn build_pat(programs: &[(u16, u16)]) -> Bytes {
    let mut section = section_header(PAT_TABLE_ID, 0);
    for (program_number, pmt_pid) in programs {
        section.put_u16(*program_number);
        section.put_u16(0xE000 | (pmt_pid & 0x1FFF));
    }

    finish_section(section)
}

/// Program map table for a single program without descriptors
pub fn build_pmt(program_number: u16, pcr_pid: u16, streams: &[ElementaryStream]) -> Bytes {
    let mut section = section_header(PMT_TABLE_ID, program_number);
    section.put_u16(0xE000 | (pcr_pid & 0x1FFF));
    section.put_u16(0xF000); // program info length 0
    for stream in streams {
        section.put_u8(stream.stream_type);
        section.put_u16(0xE000 | (stream.pid & 0x1FFF));
        section.put_u16(0xF000); // ES info length 0
    }

    finish_section(section)
}

/// Table id, a zero length placeholder, the id extension, version 0 (current) and the section
/// numbers.
fn section_header(table_id: u8, id_extension: u16) -> BytesMut {
    let mut section = BytesMut::with_capacity(32);
    section.put_u8(table_id);
    section.put_u16(0xB000);
    section.put_u16(id_extension);
    section.put_u8(0xC1);
    section.put_u8(0);
    section.put_u8(0);
    section
}

/// Fills in the section length and appends the CRC
fn finish_section(mut section: BytesMut) -> Bytes {
    let section_length = (section.len() - 3 + 4) as u16;
    section[1] = 0xB0 | ((section_length >> 8) as u8 & 0x0F);
    section[2] = section_length as u8;

    let crc = crc32_mpeg2(&section);
    section.put_u32(crc);
    section.freeze()
}
