//! Fragmented MP4 output

pub mod boxes;
mod transform;

pub use self::transform::{
    FlvToMp4, AAC_FRAME_DURATION, AUDIO_TRACK_ID, VIDEO_DEFAULT_DURATION, VIDEO_TIMESCALE,
    VIDEO_TRACK_ID,
};
