use byteorder::{BigEndian, ByteOrder};
use ingest_rtmp::flv::{FlvTagWriter, AUDIO_TAG_TYPE, VIDEO_TAG_TYPE};

/// avcC with a 4 byte NAL length size, one SPS and one PPS
pub const AVC_RECORD: [u8; 17] = [
    0x01, 0x64, 0x00, 0x1F, 0xFF, 0xE1, 0x00, 0x04, 0x67, 0x64, 0x00, 0x1F, 0x01, 0x00, 0x02, 0x68,
    0xEE,
];

/// AAC LC, 44100 Hz, stereo
pub const AAC_CONFIG: [u8; 2] = [0x12, 0x10];

pub enum TestTag {
    VideoConfig,
    AudioConfig,
    Video {
        timestamp: u32,
        keyframe: bool,
        composition_time: u32,
        nal_units: Vec<Vec<u8>>,
    },
    Audio {
        timestamp: u32,
        frame: Vec<u8>,
    },
    Raw {
        tag_type: u8,
        timestamp: u32,
        payload: Vec<u8>,
    },
}

impl TestTag {
    pub fn idr(timestamp: u32) -> TestTag {
        TestTag::Video {
            timestamp,
            keyframe: true,
            composition_time: 0,
            nal_units: vec![vec![0x65, 0x88, 0x84]],
        }
    }

    pub fn audio(timestamp: u32) -> TestTag {
        TestTag::Audio {
            timestamp,
            frame: vec![0x21, 0x22, 0x23],
        }
    }
}

/// Runs the tags through an `FlvTagWriter`, returning the FLV stream as one buffer
pub fn flv_stream(tags: &[TestTag]) -> Vec<u8> {
    let mut writer = FlvTagWriter::new();
    let mut stream = Vec::new();
    for tag in tags {
        let (tag_type, timestamp, payload) = match tag {
            TestTag::VideoConfig => {
                let mut payload = vec![0x17, 0x00, 0x00, 0x00, 0x00];
                payload.extend_from_slice(&AVC_RECORD);
                (VIDEO_TAG_TYPE, 0, payload)
            }

            TestTag::AudioConfig => {
                let mut payload = vec![0xAF, 0x00];
                payload.extend_from_slice(&AAC_CONFIG);
                (AUDIO_TAG_TYPE, 0, payload)
            }

            TestTag::Video {
                timestamp,
                keyframe,
                composition_time,
                nal_units,
            } => {
                let frame_type = if *keyframe { 0x10 } else { 0x20 };
                let cts = composition_time.to_be_bytes();
                let mut payload = vec![frame_type | 0x07, 0x01, cts[1], cts[2], cts[3]];
                for unit in nal_units {
                    payload.extend_from_slice(&(unit.len() as u32).to_be_bytes());
                    payload.extend_from_slice(unit);
                }

                (VIDEO_TAG_TYPE, *timestamp, payload)
            }

            TestTag::Audio { timestamp, frame } => {
                let mut payload = vec![0xAF, 0x01];
                payload.extend_from_slice(frame);
                (AUDIO_TAG_TYPE, *timestamp, payload)
            }

            TestTag::Raw {
                tag_type,
                timestamp,
                payload,
            } => (*tag_type, *timestamp, payload.clone()),
        };

        for unit in writer.write(tag_type, timestamp, &payload) {
            stream.extend_from_slice(&unit);
        }
    }

    stream
}

/// Types of the MP4 boxes directly inside `data`
pub fn child_types(data: &[u8]) -> Vec<[u8; 4]> {
    let mut types = Vec::new();
    let mut offset = 0;
    while offset + 8 <= data.len() {
        let size = BigEndian::read_u32(&data[offset..]) as usize;
        types.push([data[offset + 4], data[offset + 5], data[offset + 6], data[offset + 7]]);
        offset += size;
    }

    assert_eq!(offset, data.len(), "Box sizes do not add up");
    types
}

/// Body of the first MP4 box of the given type directly inside `data`
pub fn child<'a>(data: &'a [u8], box_type: &[u8; 4]) -> &'a [u8] {
    let mut offset = 0;
    while offset + 8 <= data.len() {
        let size = BigEndian::read_u32(&data[offset..]) as usize;
        if &data[offset + 4..offset + 8] == box_type {
            return &data[offset + 8..offset + size];
        }

        offset += size;
    }

    panic!("No {} box found", String::from_utf8_lossy(box_type));
}
