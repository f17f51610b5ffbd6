//! Codec configuration records carried in FLV sequence headers

pub mod aac;
pub mod h264;

pub use self::aac::AudioSpecificConfig;
pub use self::h264::AvcDecoderConfigurationRecord;
