use std::{io, string};
use thiserror::Error;

/// Errors that can occur while decoding AMF0 values
#[derive(Debug, Error)]
pub enum Amf0DeserializationError {
    /// The type marker is not one this codec understands (e.g. AMF3 switch, references,
    /// typed objects).  The enclosing message cannot be decoded.
    #[error("Encountered unsupported AMF0 type marker {marker}")]
    UnsupportedType { marker: u8 },

    /// An object end marker was found where a value was expected
    #[error("Encountered an object end marker at offset {offset} outside of an object")]
    UnexpectedObjectEnd { offset: usize },

    #[error("Hit end of the byte buffer but was expecting more data")]
    UnexpectedEof,

    #[error("String value was not valid utf-8: {0}")]
    FromUtf8Error(#[from] string::FromUtf8Error),

    #[error("{0}")]
    Io(io::Error),
}

impl From<io::Error> for Amf0DeserializationError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::UnexpectedEof => Amf0DeserializationError::UnexpectedEof,
            _ => Amf0DeserializationError::Io(error),
        }
    }
}

/// Errors that can occur while encoding AMF0 values
#[derive(Debug, Error)]
pub enum Amf0SerializationError {
    #[error("String length greater than 65,535, use a long string instead")]
    NormalStringTooLong,

    #[error("Object property name '{name}' is longer than 65,535 bytes")]
    PropertyNameTooLong { name: String },

    #[error("Value is larger than the 4GB limit of AMF0 length prefixes")]
    ValueTooLarge,

    #[error("{0}")]
    Io(#[from] io::Error),
}
