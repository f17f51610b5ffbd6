use super::packetize::{
    build_pes, packetize_pes, packetize_section, pcr_packet, ContinuityCounter, STREAM_ID_AUDIO,
    STREAM_ID_VIDEO, TIMESTAMP_MASK,
};
use super::psi::{build_pat, build_pmt, ElementaryStream};
use crate::codec::h264::{
    nal_unit_type, NAL_UNIT_TYPE_AUD, NAL_UNIT_TYPE_IDR, NAL_UNIT_TYPE_PPS, NAL_UNIT_TYPE_SPS,
};
use crate::codec::{AudioSpecificConfig, AvcDecoderConfigurationRecord};
use crate::errors::RemuxError;
use crate::flv::{
    AacPacket, AacPacketType, AudioTagHeader, AvcPacket, AvcPacketType, FlvTag, FlvTagQueue,
    VideoTagHeader, CODEC_ID_AVC, SOUND_FORMAT_AAC, TAG_TYPE_AUDIO, TAG_TYPE_VIDEO,
};
use bytes::Bytes;
use tracing::{debug, trace, warn};

pub const PAT_PID: u16 = 0x0000;
pub const PMT_PID: u16 = 0x0100;
pub const PCR_PID: u16 = 0x0101;
pub const H264_PID: u16 = 0x0102;
pub const AAC_PID: u16 = 0x0103;

const PROGRAM_NUMBER: u16 = 1;
const STREAM_TYPE_H264: u8 = 0x1B;
const STREAM_TYPE_AAC: u8 = 0x0F;

/// PAT, PMT and PCR are repeated at least this often, in milliseconds of presentation time
const PSI_INTERVAL: u32 = 100;

/// The PCR pid never carries payload, so its continuity counter stays put
const PCR_CONTINUITY_COUNTER: u8 = 0;

const START_CODE: [u8; 3] = [0x00, 0x00, 0x01];
const ACCESS_UNIT_DELIMITER: [u8; 6] = [0x00, 0x00, 0x00, 0x01, NAL_UNIT_TYPE_AUD, 0xF0];

/// Converts an FLV byte stream of H.264 and AAC into transport stream packets.
///
/// Video goes out on pid 0x102 as Annex B access units, audio on pid 0x103 as ADTS frames.
/// The tables and a PCR are written ahead of the first media packet and again whenever 100ms or
/// more of presentation time has passed since they were last written.
pub struct FlvToTs {
    queue: FlvTagQueue,
    avc_config: Option<AvcDecoderConfigurationRecord>,
    aac_config: Option<AudioSpecificConfig>,
    last_psi_timestamp: Option<u32>,
    pat: Bytes,
    pmt: Bytes,
    pat_counter: ContinuityCounter,
    pmt_counter: ContinuityCounter,
    video_counter: ContinuityCounter,
    audio_counter: ContinuityCounter,
}

impl FlvToTs {
    pub fn new() -> FlvToTs {
        let streams = [
            ElementaryStream {
                stream_type: STREAM_TYPE_H264,
                pid: H264_PID,
            },
            ElementaryStream {
                stream_type: STREAM_TYPE_AAC,
                pid: AAC_PID,
            },
        ];

        FlvToTs {
            queue: FlvTagQueue::new(),
            avc_config: None,
            aac_config: None,
            last_psi_timestamp: None,
            pat: build_pat(&[(PROGRAM_NUMBER, PMT_PID)]),
            pmt: build_pmt(PROGRAM_NUMBER, PCR_PID, &streams),
            pat_counter: ContinuityCounter::default(),
            pmt_counter: ContinuityCounter::default(),
            video_counter: ContinuityCounter::default(),
            audio_counter: ContinuityCounter::default(),
        }
    }

    /// Accepts the next piece of the FLV stream and returns the packets for every tag it
    /// completed.  Tags that cannot be remuxed are logged and skipped.
    pub fn push(&mut self, flv: &[u8]) -> Vec<Bytes> {
        self.queue.push(flv);

        let mut packets = Vec::new();
        while let Some(unit) = self.queue.pop() {
            if let Err(error) = self.handle_unit(&unit, &mut packets) {
                warn!(%error, "Skipping FLV tag that could not be remuxed to MPEG-TS");
            }
        }

        packets
    }

    fn handle_unit(&mut self, unit: &Bytes, packets: &mut Vec<Bytes>) -> Result<(), RemuxError> {
        let tag = FlvTag::parse(unit)?;
        match tag.tag_type {
            TAG_TYPE_VIDEO => self.handle_video(&tag, packets),
            TAG_TYPE_AUDIO => self.handle_audio(&tag, packets),
            other => {
                trace!(tag_type = other, "Ignoring FLV tag");
                Ok(())
            }
        }
    }

    fn handle_video(&mut self, tag: &FlvTag, packets: &mut Vec<Bytes>) -> Result<(), RemuxError> {
        let header = VideoTagHeader::parse(&tag.data)?;
        if header.codec_id != CODEC_ID_AVC {
            trace!(codec_id = header.codec_id, "Ignoring non AVC video");
            return Ok(());
        }

        let packet = AvcPacket::parse(&header.data)?;
        match packet.packet_type {
            AvcPacketType::SequenceHeader => {
                if self.avc_config.is_none() {
                    let config = AvcDecoderConfigurationRecord::parse(&packet.data)?;
                    debug!(
                        profile = config.profile_indication,
                        level = config.level_indication,
                        "AVC configuration received"
                    );

                    self.avc_config = Some(config);
                }

                return Ok(());
            }

            AvcPacketType::Nalu => (),
            AvcPacketType::EndOfSequence | AvcPacketType::Unknown(_) => return Ok(()),
        }

        let access_unit = match &self.avc_config {
            Some(config) => to_annex_b(config, &packet.data)?,
            None => {
                trace!("Dropping video received before its configuration");
                return Ok(());
            }
        };

        let timestamp = tag.timestamp as i64;
        let dts = (timestamp * 90) as u64 & TIMESTAMP_MASK;
        let pts = ((timestamp + packet.composition_time as i64) * 90).rem_euclid(1 << 33) as u64;
        let pes = build_pes(STREAM_ID_VIDEO, Some(pts), Some(dts), &access_unit, true);

        self.write_psi_if_due(tag.timestamp, packets);
        packets.extend(packetize_pes(&pes, H264_PID, &mut self.video_counter));

        Ok(())
    }

    fn handle_audio(&mut self, tag: &FlvTag, packets: &mut Vec<Bytes>) -> Result<(), RemuxError> {
        let header = AudioTagHeader::parse(&tag.data)?;
        if header.sound_format != SOUND_FORMAT_AAC {
            trace!(sound_format = header.sound_format, "Ignoring non AAC audio");
            return Ok(());
        }

        let packet = AacPacket::parse(&header.data)?;
        match packet.packet_type {
            AacPacketType::SequenceHeader => {
                if self.aac_config.is_none() {
                    let config = AudioSpecificConfig::parse(&packet.data)?;
                    debug!(
                        object_type = config.object_type,
                        sampling_frequency = config.sampling_frequency,
                        channels = config.channel_configuration,
                        "AAC configuration received"
                    );

                    self.aac_config = Some(config);
                }

                return Ok(());
            }

            AacPacketType::Raw => (),
            AacPacketType::Unknown(_) => return Ok(()),
        }

        let frame = match &self.aac_config {
            Some(config) => config.to_adts(&packet.data)?,
            None => {
                trace!("Dropping audio received before its configuration");
                return Ok(());
            }
        };

        let pts = (tag.timestamp as u64 * 90) & TIMESTAMP_MASK;
        let pes = build_pes(STREAM_ID_AUDIO, Some(pts), None, &frame, false);

        self.write_psi_if_due(tag.timestamp, packets);
        packets.extend(packetize_pes(&pes, AAC_PID, &mut self.audio_counter));

        Ok(())
    }

    fn write_psi_if_due(&mut self, timestamp: u32, packets: &mut Vec<Bytes>) {
        let due = match self.last_psi_timestamp {
            None => true,
            // A timestamp that went backwards (or wrapped) restarts the interval
            Some(last) => timestamp < last || timestamp - last >= PSI_INTERVAL,
        };

        if !due {
            return;
        }

        self.last_psi_timestamp = Some(timestamp);
        packets.extend(packetize_section(&self.pat, PAT_PID, &mut self.pat_counter));
        packets.extend(packetize_section(&self.pmt, PMT_PID, &mut self.pmt_counter));
        packets.push(pcr_packet(PCR_PID, PCR_CONTINUITY_COUNTER, timestamp as u64 * 90));
    }
}

impl Default for FlvToTs {
    fn default() -> Self {
        FlvToTs::new()
    }
}

/// Rewrites a length prefixed sample with start codes.  An access unit delimiter is added when
/// the sample has none, and the SPS and PPS from the configuration record go in front of the
/// first IDR slice of a sample that does not carry its own.
fn to_annex_b(
    config: &AvcDecoderConfigurationRecord,
    sample: &[u8],
) -> Result<Vec<u8>, RemuxError> {
    let units = config.split_nal_units(sample)?;
    let has_delimiter = units
        .iter()
        .any(|unit| nal_unit_type(unit) == Some(NAL_UNIT_TYPE_AUD));

    let mut has_parameter_sets = units.iter().any(|unit| {
        matches!(
            nal_unit_type(unit),
            Some(NAL_UNIT_TYPE_SPS) | Some(NAL_UNIT_TYPE_PPS)
        )
    });

    let mut output = Vec::with_capacity(sample.len() + config.sps.len() + config.pps.len() + 16);
    if !has_delimiter {
        output.extend_from_slice(&ACCESS_UNIT_DELIMITER);
    }

    for unit in units {
        if nal_unit_type(unit) == Some(NAL_UNIT_TYPE_IDR) && !has_parameter_sets {
            output.extend_from_slice(&START_CODE);
            output.extend_from_slice(&config.sps);
            output.extend_from_slice(&START_CODE);
            output.extend_from_slice(&config.pps);
            has_parameter_sets = true;
        }

        output.extend_from_slice(&START_CODE);
        output.extend_from_slice(unit);
    }

    Ok(output)
}
