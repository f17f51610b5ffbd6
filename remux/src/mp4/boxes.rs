//! ISO BMFF box builders for an initialization segment (`ftyp` + `moov`) and media fragments
//! (`moof` + `mdat`).

use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, Bytes};

pub const SAMPLE_FLAGS_SYNC: u32 = 0x0200_0000;
pub const SAMPLE_FLAGS_NON_SYNC: u32 = 0x0101_0000;

const TFHD_DEFAULT_SAMPLE_DURATION: u32 = 0x00_0008;
const TFHD_DEFAULT_BASE_IS_MOOF: u32 = 0x02_0000;

/// data offset, then per sample duration, size, flags and composition time offset
const TRUN_FLAGS: u32 = 0x00_0F01;

const UNITY_MATRIX: [u32; 9] = [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000];

/// ISO 639-2 `und` packed into 15 bits
const LANGUAGE_UNDETERMINED: u16 = 0x55C4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackKind {
    Video {
        width: u16,
        height: u16,
        /// AVCDecoderConfigurationRecord
        avc_config: Bytes,
    },
    Audio {
        channels: u16,
        sample_rate: u32,
        audio_specific_config: Bytes,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub track_id: u32,
    pub timescale: u32,
    pub kind: TrackKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub duration: u32,
    pub size: u32,
    pub is_sync: bool,
    pub composition_time_offset: i32,
}

/// The samples of one track within a `moof`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub track_id: u32,
    pub base_media_decode_time: u64,
    pub default_sample_duration: u32,
    pub samples: Vec<Sample>,
}

pub fn make_box(box_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(8 + payload.len());
    output.put_u32((8 + payload.len()) as u32);
    output.put_slice(box_type);
    output.put_slice(payload);
    output
}

pub fn make_full_box(box_type: &[u8; 4], version: u8, flags: u32, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + payload.len());
    body.put_u32(((version as u32) << 24) | (flags & 0x00FF_FFFF));
    body.put_slice(payload);
    make_box(box_type, &body)
}

/// `ftyp` followed by a `moov` describing every track
pub fn init_segment(tracks: &[Track]) -> Bytes {
    let mut output = ftyp();
    output.extend_from_slice(&moov(tracks));
    Bytes::from(output)
}

pub fn ftyp() -> Vec<u8> {
    let mut payload = Vec::with_capacity(16);
    payload.put_slice(b"isom");
    payload.put_u32(1);
    payload.put_slice(b"isom");
    payload.put_slice(b"avc1");
    make_box(b"ftyp", &payload)
}

pub fn moov(tracks: &[Track]) -> Vec<u8> {
    let next_track_id = tracks.iter().map(|track| track.track_id).max().unwrap_or(0) + 1;

    let mut payload = mvhd(next_track_id);
    for track in tracks {
        payload.extend_from_slice(&trak(track));
    }

    let mut trex_boxes = Vec::new();
    for track in tracks {
        trex_boxes.extend_from_slice(&trex(track.track_id));
    }

    payload.extend_from_slice(&make_box(b"mvex", &trex_boxes));
    make_box(b"moov", &payload)
}

/// A `moof` for the fragments, whose sample data is expected in a single `mdat` directly after
/// it, in fragment order.
pub fn moof(sequence_number: u32, fragments: &[Fragment]) -> Vec<u8> {
    let mut mfhd_payload = Vec::with_capacity(4);
    mfhd_payload.put_u32(sequence_number);

    let mut payload = make_full_box(b"mfhd", 0, 0, &mfhd_payload);
    let mut data_offset_positions = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        let (traf, data_offset_position) = traf(fragment);
        data_offset_positions.push(8 + payload.len() + data_offset_position);
        payload.extend_from_slice(&traf);
    }

    let mut output = make_box(b"moof", &payload);

    // Data offsets count from the start of the moof, past the 8 byte mdat header
    let mut data_offset = output.len() + 8;
    for (fragment, position) in fragments.iter().zip(data_offset_positions) {
        BigEndian::write_i32(&mut output[position..position + 4], data_offset as i32);
        data_offset += fragment
            .samples
            .iter()
            .map(|sample| sample.size as usize)
            .sum::<usize>();
    }

    output
}

pub fn mdat(data: &[&[u8]]) -> Vec<u8> {
    let size: usize = data.iter().map(|part| part.len()).sum();
    let mut output = Vec::with_capacity(8 + size);
    output.put_u32((8 + size) as u32);
    output.put_slice(b"mdat");
    for part in data {
        output.put_slice(part);
    }

    output
}

fn mvhd(next_track_id: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(96);
    payload.put_u32(0); // creation time
    payload.put_u32(0); // modification time
    payload.put_u32(1000); // timescale
    payload.put_u32(0); // duration
    payload.put_u32(0x0001_0000); // rate 1.0
    payload.put_u16(0x0100); // volume 1.0
    payload.put_bytes(0, 10);
    put_matrix(&mut payload);
    payload.put_bytes(0, 24); // pre_defined
    payload.put_u32(next_track_id);
    make_full_box(b"mvhd", 0, 0, &payload)
}

fn trak(track: &Track) -> Vec<u8> {
    let mut payload = tkhd(track);
    payload.extend_from_slice(&mdia(track));
    make_box(b"trak", &payload)
}

fn tkhd(track: &Track) -> Vec<u8> {
    let (volume, width, height) = match &track.kind {
        TrackKind::Video { width, height, .. } => (0, *width, *height),
        TrackKind::Audio { .. } => (0x0100, 0, 0),
    };

    let mut payload = Vec::with_capacity(80);
    payload.put_u32(0); // creation time
    payload.put_u32(0); // modification time
    payload.put_u32(track.track_id);
    payload.put_u32(0);
    payload.put_u32(0); // duration
    payload.put_bytes(0, 8);
    payload.put_u16(0); // layer
    payload.put_u16(0); // alternate group
    payload.put_u16(volume);
    payload.put_u16(0);
    put_matrix(&mut payload);
    payload.put_u32((width as u32) << 16);
    payload.put_u32((height as u32) << 16);

    // enabled, in movie, in preview
    make_full_box(b"tkhd", 0, 0x00_0007, &payload)
}

fn mdia(track: &Track) -> Vec<u8> {
    let mut mdhd = Vec::with_capacity(20);
    mdhd.put_u32(0); // creation time
    mdhd.put_u32(0); // modification time
    mdhd.put_u32(track.timescale);
    mdhd.put_u32(0); // duration
    mdhd.put_u16(LANGUAGE_UNDETERMINED);
    mdhd.put_u16(0);

    let mut payload = make_full_box(b"mdhd", 0, 0, &mdhd);
    payload.extend_from_slice(&match track.kind {
        TrackKind::Video { .. } => hdlr(b"vide", b"VideoHandler\0"),
        TrackKind::Audio { .. } => hdlr(b"soun", b"SoundHandler\0"),
    });

    payload.extend_from_slice(&minf(track));
    make_box(b"mdia", &payload)
}

fn hdlr(handler_type: &[u8; 4], name: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(20 + name.len());
    payload.put_u32(0); // pre_defined
    payload.put_slice(handler_type);
    payload.put_bytes(0, 12);
    payload.put_slice(name);
    make_full_box(b"hdlr", 0, 0, &payload)
}

fn minf(track: &Track) -> Vec<u8> {
    let mut payload = match track.kind {
        TrackKind::Video { .. } => make_full_box(b"vmhd", 0, 1, &[0; 8]),
        TrackKind::Audio { .. } => make_full_box(b"smhd", 0, 0, &[0; 4]),
    };

    let url = make_full_box(b"url ", 0, 1, &[]);
    let mut dref = Vec::with_capacity(4 + url.len());
    dref.put_u32(1);
    dref.put_slice(&url);
    payload.extend_from_slice(&make_box(b"dinf", &make_full_box(b"dref", 0, 0, &dref)));

    payload.extend_from_slice(&stbl(track));
    make_box(b"minf", &payload)
}

fn stbl(track: &Track) -> Vec<u8> {
    let sample_entry = match &track.kind {
        TrackKind::Video {
            width,
            height,
            avc_config,
        } => avc1(*width, *height, avc_config),

        TrackKind::Audio {
            channels,
            sample_rate,
            audio_specific_config,
        } => mp4a(*channels, *sample_rate, audio_specific_config),
    };

    let mut stsd = Vec::with_capacity(4 + sample_entry.len());
    stsd.put_u32(1);
    stsd.put_slice(&sample_entry);

    // Samples are described by the fragments, so the tables stay empty
    let mut payload = make_full_box(b"stsd", 0, 0, &stsd);
    payload.extend_from_slice(&make_full_box(b"stts", 0, 0, &[0; 4]));
    payload.extend_from_slice(&make_full_box(b"stsc", 0, 0, &[0; 4]));
    payload.extend_from_slice(&make_full_box(b"stsz", 0, 0, &[0; 8]));
    payload.extend_from_slice(&make_full_box(b"stco", 0, 0, &[0; 4]));
    make_box(b"stbl", &payload)
}

fn avc1(width: u16, height: u16, avc_config: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(86 + avc_config.len());
    payload.put_bytes(0, 6);
    payload.put_u16(1); // data reference index
    payload.put_bytes(0, 16);
    payload.put_u16(width);
    payload.put_u16(height);
    payload.put_u32(0x0048_0000); // 72 dpi
    payload.put_u32(0x0048_0000);
    payload.put_u32(0);
    payload.put_u16(1); // frame count
    payload.put_bytes(0, 32); // compressor name
    payload.put_u16(0x0018); // depth
    payload.put_i16(-1);
    payload.put_slice(&make_box(b"avcC", avc_config));
    make_box(b"avc1", &payload)
}

fn mp4a(channels: u16, sample_rate: u32, audio_specific_config: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(64 + audio_specific_config.len());
    payload.put_bytes(0, 6);
    payload.put_u16(1); // data reference index
    payload.put_bytes(0, 8);
    payload.put_u16(channels);
    payload.put_u16(16); // sample size
    payload.put_u32(0);
    payload.put_u32(sample_rate.min(0xFFFF) << 16);
    payload.put_slice(&esds(audio_specific_config));
    make_box(b"mp4a", &payload)
}

fn esds(audio_specific_config: &[u8]) -> Vec<u8> {
    let mut decoder_specific_info = Vec::new();
    put_descriptor(&mut decoder_specific_info, 0x05, audio_specific_config);

    let mut decoder_config = Vec::with_capacity(13 + decoder_specific_info.len());
    decoder_config.put_u8(0x40); // MPEG-4 audio
    decoder_config.put_u8(0x15); // audio stream
    decoder_config.put_uint(0, 3); // buffer size
    decoder_config.put_u32(0); // max bitrate
    decoder_config.put_u32(0); // average bitrate
    decoder_config.put_slice(&decoder_specific_info);

    let mut es = Vec::new();
    es.put_u16(0); // ES id
    es.put_u8(0); // flags
    put_descriptor(&mut es, 0x04, &decoder_config);
    put_descriptor(&mut es, 0x06, &[0x02]); // SL config, MP4 predefined

    let mut payload = Vec::new();
    put_descriptor(&mut payload, 0x03, &es);
    make_full_box(b"esds", 0, 0, &payload)
}

/// Writes a descriptor with the short length form when it fits in 7 bits
fn put_descriptor(buffer: &mut Vec<u8>, tag: u8, payload: &[u8]) {
    buffer.put_u8(tag);

    let length = payload.len() as u32;
    if length < 0x80 {
        buffer.put_u8(length as u8);
    } else {
        buffer.put_u8(0x80 | ((length >> 21) & 0x7F) as u8);
        buffer.put_u8(0x80 | ((length >> 14) & 0x7F) as u8);
        buffer.put_u8(0x80 | ((length >> 7) & 0x7F) as u8);
        buffer.put_u8((length & 0x7F) as u8);
    }

    buffer.put_slice(payload);
}

fn trex(track_id: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(20);
    payload.put_u32(track_id);
    payload.put_u32(1); // sample description index
    payload.put_u32(0); // duration
    payload.put_u32(0); // size
    payload.put_u32(SAMPLE_FLAGS_NON_SYNC);
    make_full_box(b"trex", 0, 0, &payload)
}

/// Returns the `traf` and the position of the trun data offset within it
fn traf(fragment: &Fragment) -> (Vec<u8>, usize) {
    let mut tfhd = Vec::with_capacity(8);
    tfhd.put_u32(fragment.track_id);
    tfhd.put_u32(fragment.default_sample_duration);

    let mut payload = make_full_box(
        b"tfhd",
        0,
        TFHD_DEFAULT_BASE_IS_MOOF | TFHD_DEFAULT_SAMPLE_DURATION,
        &tfhd,
    );

    let decode_time = fragment.base_media_decode_time;
    payload.extend_from_slice(&match u32::try_from(decode_time) {
        Ok(decode_time) => make_full_box(b"tfdt", 0, 0, &decode_time.to_be_bytes()),
        Err(_) => make_full_box(b"tfdt", 1, 0, &decode_time.to_be_bytes()),
    });

    // Negative composition offsets need a version 1 trun
    let has_negative_offset = fragment
        .samples
        .iter()
        .any(|sample| sample.composition_time_offset < 0);
    let trun_version = if has_negative_offset { 1 } else { 0 };

    let mut trun = Vec::with_capacity(8 + fragment.samples.len() * 16);
    trun.put_u32(fragment.samples.len() as u32);
    trun.put_i32(0); // data offset, patched by moof()
    for sample in &fragment.samples {
        trun.put_u32(sample.duration);
        trun.put_u32(sample.size);
        trun.put_u32(if sample.is_sync {
            SAMPLE_FLAGS_SYNC
        } else {
            SAMPLE_FLAGS_NON_SYNC
        });

        trun.put_i32(sample.composition_time_offset);
    }

    // traf header, then the trun's box header, full box header and sample count
    let data_offset_position = 8 + payload.len() + 8 + 4 + 4;
    payload.extend_from_slice(&make_full_box(b"trun", trun_version, TRUN_FLAGS, &trun));

    (make_box(b"traf", &payload), data_offset_position)
}

fn put_matrix(buffer: &mut Vec<u8>) {
    for value in UNITY_MATRIX {
        buffer.put_u32(value);
    }
}
