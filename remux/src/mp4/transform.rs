use super::boxes::{init_segment, mdat, moof, Fragment, Sample, Track, TrackKind};
use crate::codec::{AudioSpecificConfig, AvcDecoderConfigurationRecord};
use crate::errors::RemuxError;
use crate::flv::{
    AacPacket, AacPacketType, AudioTagHeader, AvcPacket, AvcPacketType, FlvTag, FlvTagQueue,
    VideoTagHeader, CODEC_ID_AVC, SOUND_FORMAT_AAC, TAG_TYPE_AUDIO, TAG_TYPE_VIDEO,
};
use bytes::Bytes;
use tracing::{debug, trace, warn};

pub const VIDEO_TRACK_ID: u32 = 1;
pub const AUDIO_TRACK_ID: u32 = 2;
pub const VIDEO_TIMESCALE: u32 = 90000;

/// 30 frames per second at the video timescale
pub const VIDEO_DEFAULT_DURATION: u32 = 3000;

/// Samples per AAC frame, at a timescale equal to the sampling frequency
pub const AAC_FRAME_DURATION: u32 = 1024;

/// Used when the AudioSpecificConfig defers the channel layout to a program config element
const FALLBACK_CHANNEL_COUNT: u16 = 2;

/// Converts an FLV byte stream of H.264 and AAC into fragmented MP4.
///
/// The initialization segment is produced together with the first media sample and covers the
/// tracks whose configuration has been seen by then.  Every sample after that becomes its own
/// `moof`+`mdat` pair.  Video samples keep their length prefixed NAL units since the `avcC` box
/// carries the original configuration record.
pub struct FlvToMp4 {
    queue: FlvTagQueue,
    avc_config: Option<AvcDecoderConfigurationRecord>,
    aac_config: Option<AudioSpecificConfig>,
    tracks: Option<Vec<Track>>,
    sequence_number: u32,
}

impl FlvToMp4 {
    pub fn new() -> FlvToMp4 {
        FlvToMp4 {
            queue: FlvTagQueue::new(),
            avc_config: None,
            aac_config: None,
            tracks: None,
            sequence_number: 0,
        }
    }

    /// Accepts the next piece of the FLV stream and returns the segments it completed
    pub fn push(&mut self, flv: &[u8]) -> Vec<Bytes> {
        self.queue.push(flv);

        let mut segments = Vec::new();
        while let Some(unit) = self.queue.pop() {
            if let Err(error) = self.handle_unit(&unit, &mut segments) {
                warn!(%error, "Skipping FLV tag that could not be remuxed to MP4");
            }
        }

        segments
    }

    fn handle_unit(&mut self, unit: &Bytes, segments: &mut Vec<Bytes>) -> Result<(), RemuxError> {
        let tag = FlvTag::parse(unit)?;
        match tag.tag_type {
            TAG_TYPE_VIDEO => self.handle_video(&tag, segments),
            TAG_TYPE_AUDIO => self.handle_audio(&tag, segments),
            other => {
                trace!(tag_type = other, "Ignoring FLV tag");
                Ok(())
            }
        }
    }

    fn handle_video(&mut self, tag: &FlvTag, segments: &mut Vec<Bytes>) -> Result<(), RemuxError> {
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

        if self.avc_config.is_none() {
            trace!("Dropping video received before its configuration");
            return Ok(());
        }

        self.write_init_segment_if_needed(segments);
        if !self.has_track(VIDEO_TRACK_ID) {
            trace!("Dropping video for a track missing from the initialization segment");
            return Ok(());
        }

        let composition_offset = packet.composition_time as i64 * (VIDEO_TIMESCALE / 1000) as i64;
        let sample = Sample {
            duration: VIDEO_DEFAULT_DURATION,
            size: packet.data.len() as u32,
            is_sync: header.is_keyframe(),
            composition_time_offset: composition_offset as i32,
        };

        let decode_time = tag.timestamp as u64 * (VIDEO_TIMESCALE / 1000) as u64;
        self.write_fragment(VIDEO_TRACK_ID, decode_time, sample, &packet.data, segments);

        Ok(())
    }

    fn handle_audio(&mut self, tag: &FlvTag, segments: &mut Vec<Bytes>) -> Result<(), RemuxError> {
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

        let sampling_frequency = match &self.aac_config {
            Some(config) => config.sampling_frequency,
            None => {
                trace!("Dropping audio received before its configuration");
                return Ok(());
            }
        };

        self.write_init_segment_if_needed(segments);
        if !self.has_track(AUDIO_TRACK_ID) {
            trace!("Dropping audio for a track missing from the initialization segment");
            return Ok(());
        }

        let sample = Sample {
            duration: AAC_FRAME_DURATION,
            size: packet.data.len() as u32,
            is_sync: true,
            composition_time_offset: 0,
        };

        let decode_time = tag.timestamp as u64 * sampling_frequency as u64 / 1000;
        self.write_fragment(AUDIO_TRACK_ID, decode_time, sample, &packet.data, segments);

        Ok(())
    }

    fn write_init_segment_if_needed(&mut self, segments: &mut Vec<Bytes>) {
        if self.tracks.is_some() {
            return;
        }

        let mut tracks = Vec::with_capacity(2);
        if let Some(config) = &self.avc_config {
            tracks.push(Track {
                track_id: VIDEO_TRACK_ID,
                timescale: VIDEO_TIMESCALE,
                kind: TrackKind::Video {
                    width: 0,
                    height: 0,
                    avc_config: config.raw.clone(),
                },
            });
        }

        if let Some(config) = &self.aac_config {
            let channels = match config.channel_configuration {
                0 => FALLBACK_CHANNEL_COUNT,
                x => x as u16,
            };

            tracks.push(Track {
                track_id: AUDIO_TRACK_ID,
                timescale: config.sampling_frequency,
                kind: TrackKind::Audio {
                    channels,
                    sample_rate: config.sampling_frequency,
                    audio_specific_config: config.raw.clone(),
                },
            });
        }

        debug!(track_count = tracks.len(), "Writing MP4 initialization segment");
        segments.push(init_segment(&tracks));
        self.tracks = Some(tracks);
    }

    fn has_track(&self, track_id: u32) -> bool {
        self.tracks
            .as_ref()
            .map_or(false, |tracks| tracks.iter().any(|track| track.track_id == track_id))
    }

    fn write_fragment(
        &mut self,
        track_id: u32,
        base_media_decode_time: u64,
        sample: Sample,
        data: &[u8],
        segments: &mut Vec<Bytes>,
    ) {
        self.sequence_number = self.sequence_number.wrapping_add(1);
        let fragment = Fragment {
            track_id,
            base_media_decode_time,
            default_sample_duration: sample.duration,
            samples: vec![sample],
        };

        let mut segment = moof(self.sequence_number, &[fragment]);
        segment.extend_from_slice(&mdat(&[data]));
        segments.push(Bytes::from(segment));
    }
}

impl Default for FlvToMp4 {
    fn default() -> Self {
        FlvToMp4::new()
    }
}
