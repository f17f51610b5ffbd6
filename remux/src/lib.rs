//! Repackaging of FLV tagged H.264 and AAC media into other containers.
//!
//! Both transforms consume the raw FLV byte stream (as produced by
//! `ingest_rtmp::flv::FlvTagWriter`) in arbitrarily sized pieces:
//!
//! * [`FlvToTs`](ts::FlvToTs) turns it into 188 byte MPEG-2 transport stream packets, with the
//!   PAT/PMT and a PCR repeated every 100 milliseconds of presentation time.
//! * [`FlvToMp4`](mp4::FlvToMp4) turns it into fragmented MP4: an `ftyp`+`moov` initialization
//!   segment followed by one `moof`+`mdat` pair per access unit.
//!
//! Both hold on to the first H.264 and AAC configuration records they see and drop media that
//! arrives before its configuration.

#[cfg(test)]
mod test_utils;

pub mod bitstream;
pub mod codec;
pub mod errors;
pub mod flv;
pub mod mp4;
pub mod ts;

pub use errors::RemuxError;
