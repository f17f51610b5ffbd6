use thiserror::Error;

/// Problems found while parsing FLV tags or the codec data carried in them
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemuxError {
    #[error("Not enough data to read the {0}")]
    NotEnoughData(&'static str),

    #[error("AAC sampling frequency index {0} is reserved")]
    ReservedSamplingFrequencyIndex(u8),

    #[error("Sampling frequency {0} Hz has no ADTS frequency index")]
    UnsupportedSamplingFrequency(u32),

    #[error("ADTS frame of {0} bytes does not fit the 13 bit frame length")]
    AdtsFrameTooLong(usize),

    #[error("AVC decoder configuration record carries no {0}")]
    MissingParameterSet(&'static str),

    #[error("NAL unit length {length} exceeds the {remaining} bytes left in the sample")]
    TruncatedNalUnit { length: usize, remaining: usize },
}
