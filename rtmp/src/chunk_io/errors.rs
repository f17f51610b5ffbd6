use thiserror::Error;

/// An enumeration defining all the possible errors that could occur while serializing
/// RTMP messages into RTMP chunks.
#[derive(Debug, Error)]
pub enum ChunkSerializationError {
    /// RTMP specification states that a message cannot be more than 16777215, even when split
    /// across multiple RTMP chunks
    #[error("The current message has a length of {size} bytes, which is over the allowed size of 16777215 bytes")]
    MessageTooLong { size: usize },

    /// Chunk stream ids 0 and 1 are reserved for the extended basic header forms
    #[error("Chunk stream id {csid} cannot be encoded, only ids between 2 and 65599 are allowed")]
    InvalidChunkStreamId { csid: u32 },

    #[error("An invalid chunk size of {chunk_size} was specified.  Chunk size must be greater than 0 and less than 2147483648")]
    InvalidMaxChunkSize { chunk_size: u32 },
}
