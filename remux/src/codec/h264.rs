use crate::errors::RemuxError;
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;

pub const NAL_UNIT_TYPE_IDR: u8 = 5;
pub const NAL_UNIT_TYPE_SPS: u8 = 7;
pub const NAL_UNIT_TYPE_PPS: u8 = 8;
pub const NAL_UNIT_TYPE_AUD: u8 = 9;

pub fn nal_unit_type(nal_unit: &[u8]) -> Option<u8> {
    nal_unit.first().map(|header| header & 0x1F)
}

/// The `AVCDecoderConfigurationRecord` sent in an AVC sequence header.  Only the first SPS and
/// PPS are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcDecoderConfigurationRecord {
    pub profile_indication: u8,
    pub profile_compatibility: u8,
    pub level_indication: u8,
    /// Byte width of the length prefix in front of each NAL unit
    pub nalu_length_size: usize,
    pub sps: Bytes,
    pub pps: Bytes,
    /// The record as received, for use as an `avcC` box body
    pub raw: Bytes,
}

impl AvcDecoderConfigurationRecord {
    pub fn parse(data: &Bytes) -> Result<AvcDecoderConfigurationRecord, RemuxError> {
        if data.len() < 6 {
            return Err(RemuxError::NotEnoughData("AVC decoder configuration record"));
        }

        let nalu_length_size = (data[4] & 0x03) as usize + 1;
        let mut offset = 6;

        let sps_count = data[5] & 0x1F;
        let mut sps = None;
        for _ in 0..sps_count {
            let unit = read_parameter_set(data, &mut offset)?;
            sps.get_or_insert(unit);
        }

        let pps_count = *data
            .get(offset)
            .ok_or(RemuxError::NotEnoughData("PPS count"))?;
        offset += 1;

        let mut pps = None;
        for _ in 0..pps_count {
            let unit = read_parameter_set(data, &mut offset)?;
            pps.get_or_insert(unit);
        }

        Ok(AvcDecoderConfigurationRecord {
            profile_indication: data[1],
            profile_compatibility: data[2],
            level_indication: data[3],
            nalu_length_size,
            sps: sps.ok_or(RemuxError::MissingParameterSet("SPS"))?,
            pps: pps.ok_or(RemuxError::MissingParameterSet("PPS"))?,
            raw: data.clone(),
        })
    }

    /// Splits a length prefixed AVC sample into its NAL units
    pub fn split_nal_units<'a>(&self, sample: &'a [u8]) -> Result<Vec<&'a [u8]>, RemuxError> {
        let mut units = Vec::new();
        let mut rest = sample;
        while !rest.is_empty() {
            if rest.len() < self.nalu_length_size {
                return Err(RemuxError::NotEnoughData("NAL unit length"));
            }

            let length = BigEndian::read_uint(rest, self.nalu_length_size) as usize;
            rest = &rest[self.nalu_length_size..];
            if length > rest.len() {
                return Err(RemuxError::TruncatedNalUnit {
                    length,
                    remaining: rest.len(),
                });
            }

            units.push(&rest[..length]);
            rest = &rest[length..];
        }

        Ok(units)
    }
}

fn read_parameter_set(data: &Bytes, offset: &mut usize) -> Result<Bytes, RemuxError> {
    if data.len() < *offset + 2 {
        return Err(RemuxError::NotEnoughData("parameter set length"));
    }

    let length = BigEndian::read_u16(&data[*offset..]) as usize;
    let start = *offset + 2;
    if data.len() < start + length {
        return Err(RemuxError::NotEnoughData("parameter set"));
    }

    *offset = start + length;
    Ok(data.slice(start..start + length))
}
