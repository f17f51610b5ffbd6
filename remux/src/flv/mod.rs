//! Reading the FLV byte stream back into tags

mod audio;
mod queue;
mod tag;
mod video;

pub use self::audio::{AacPacket, AacPacketType, AudioTagHeader, SOUND_FORMAT_AAC};
pub use self::queue::FlvTagQueue;
pub use self::tag::{FlvTag, FLV_HEADER_SIZE, TAG_TYPE_AUDIO, TAG_TYPE_SCRIPT, TAG_TYPE_VIDEO};
pub use self::video::{AvcPacket, AvcPacketType, VideoTagHeader, CODEC_ID_AVC};
