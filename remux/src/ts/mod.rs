//! MPEG-2 transport stream output

pub mod crc32;
pub mod packetize;
pub mod psi;
mod transform;

pub use self::transform::{FlvToTs, AAC_PID, H264_PID, PAT_PID, PCR_PID, PMT_PID};
