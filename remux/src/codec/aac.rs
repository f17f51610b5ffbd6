use crate::bitstream::BitReader;
use crate::errors::RemuxError;
use bytes::{BufMut, Bytes, BytesMut};

/// Sampling frequencies by their 4 bit index
const SAMPLING_FREQUENCIES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

const ESCAPE_OBJECT_TYPE: u32 = 31;
const EXPLICIT_FREQUENCY_INDEX: u32 = 15;
const AAC_LC_OBJECT_TYPE: u8 = 2;

pub const ADTS_HEADER_SIZE: usize = 7;
const MAX_ADTS_FRAME_LENGTH: usize = 0x1FFF;

/// The `AudioSpecificConfig` sent in an AAC sequence header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSpecificConfig {
    pub object_type: u8,
    pub sampling_frequency: u32,
    pub channel_configuration: u8,
    /// The config as received, for use inside an `esds` box
    pub raw: Bytes,
}

impl AudioSpecificConfig {
    pub fn parse(data: &Bytes) -> Result<AudioSpecificConfig, RemuxError> {
        let mut reader = BitReader::new(data);

        let mut object_type = reader.read_bits(5)?;
        if object_type == ESCAPE_OBJECT_TYPE {
            object_type = 32 + reader.read_bits(6)?;
        }

        let frequency_index = reader.read_bits(4)?;
        let sampling_frequency = if frequency_index == EXPLICIT_FREQUENCY_INDEX {
            reader.read_bits(24)?
        } else {
            *SAMPLING_FREQUENCIES
                .get(frequency_index as usize)
                .ok_or(RemuxError::ReservedSamplingFrequencyIndex(frequency_index as u8))?
        };

        let channel_configuration = reader.read_bits(4)? as u8;

        Ok(AudioSpecificConfig {
            object_type: object_type as u8,
            sampling_frequency,
            channel_configuration,
            raw: data.clone(),
        })
    }

    pub fn sampling_frequency_index(&self) -> Option<u8> {
        SAMPLING_FREQUENCIES
            .iter()
            .position(|frequency| *frequency == self.sampling_frequency)
            .map(|index| index as u8)
    }

    /// Builds the 7 byte ADTS header (no CRC) for a raw AAC frame of `payload_length` bytes
    pub fn adts_header(&self, payload_length: usize) -> Result<[u8; ADTS_HEADER_SIZE], RemuxError> {
        let frequency_index = self
            .sampling_frequency_index()
            .ok_or(RemuxError::UnsupportedSamplingFrequency(self.sampling_frequency))?;

        let frame_length = ADTS_HEADER_SIZE + payload_length;
        if frame_length > MAX_ADTS_FRAME_LENGTH {
            return Err(RemuxError::AdtsFrameTooLong(frame_length));
        }

        // The profile field only has room for the first four object types
        let profile = match self.object_type {
            1..=4 => self.object_type - 1,
            _ => AAC_LC_OBJECT_TYPE - 1,
        };

        let channels = self.channel_configuration;
        let length = frame_length as u16;
        Ok([
            0xFF,
            0xF1, // MPEG-4, layer 0, no CRC
            (profile << 6) | (frequency_index << 2) | ((channels & 0x04) >> 2),
            ((channels & 0x03) << 6) | ((length & 0x1800) >> 11) as u8,
            ((length & 0x07F8) >> 3) as u8,
            (((length & 0x07) << 5) as u8) | 0x1F, // buffer fullness 0x7FF
            0xFC,
        ])
    }

    /// Prefixes a raw AAC frame with its ADTS header
    pub fn to_adts(&self, payload: &[u8]) -> Result<Bytes, RemuxError> {
        let header = self.adts_header(payload.len())?;
        let mut frame = BytesMut::with_capacity(ADTS_HEADER_SIZE + payload.len());
        frame.put_slice(&header);
        frame.put_slice(payload);

        Ok(frame.freeze())
    }
}
