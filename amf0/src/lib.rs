//! This crate provides functionality for serializing and deserializing data
//! based on the Adobe AMF0 encoding specification located at
//! <https://wwwimages2.adobe.com/content/dam/acom/en/devnet/pdf/amf0-file-format-specification.pdf>
//!
//! Only the subset of AMF0 that RTMP command channels actually carry is modelled.  ECMA arrays
//! are read as objects, since RTMP peers use them interchangeably.
//!
//! # Examples
//! ```
//! use ingest_amf0::{Amf0Object, Amf0Value, serialize, deserialize};
//!
//! // Put some data into the Amf0Value types
//! let mut properties = Amf0Object::new();
//! properties.insert("app", Amf0Value::Number(99.0));
//! properties.insert("second", Amf0Value::Utf8String("test".to_string()));
//!
//! let value1 = Amf0Value::Number(32.0);
//! let value2 = Amf0Value::Boolean(true);
//! let object = Amf0Value::Object(properties);
//!
//! let input = vec![value1, object, value2];
//!
//! // Serialize the values into a vector of bytes
//! let serialized_data = serialize(&input).unwrap();
//!
//! // Deserialize the vector of bytes back into Amf0Value types
//! let results = deserialize(&serialized_data).unwrap();
//!
//! assert_eq!(input, results);
//! ```

mod deserialization;
mod errors;
mod object;
mod serialization;

pub use crate::deserialization::{deserialize, read_value};
pub use crate::errors::{Amf0DeserializationError, Amf0SerializationError};
pub use crate::object::Amf0Object;
pub use crate::serialization::serialize;

/// An Enum representing the different supported types of Amf0 values
#[derive(PartialEq, Debug, Clone)]
pub enum Amf0Value {
    Number(f64),
    Boolean(bool),
    Utf8String(String),

    /// A string whose byte length does not fit in 16 bits
    LongString(String),

    /// Properties in the order they were encoded.  ECMA arrays decode into this variant as well.
    Object(Amf0Object),
    StrictArray(Vec<Amf0Value>),

    /// Milliseconds since the unix epoch, with the encoded time zone offset already applied
    Date(f64),
    Null,
    Undefined,
}

impl Amf0Value {
    pub fn as_number(&self) -> Option<f64> {
        match *self {
            Amf0Value::Number(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match *self {
            Amf0Value::Boolean(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the string contents of either a normal or long string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Amf0Value::Utf8String(value) | Amf0Value::LongString(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Amf0Object> {
        match self {
            Amf0Value::Object(properties) => Some(properties),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            Amf0Value::Utf8String(value) | Amf0Value::LongString(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<Amf0Object> {
        match self {
            Amf0Value::Object(properties) => Some(properties),
            _ => None,
        }
    }
}

impl From<&str> for Amf0Value {
    fn from(value: &str) -> Self {
        Amf0Value::Utf8String(value.to_string())
    }
}

impl From<f64> for Amf0Value {
    fn from(value: f64) -> Self {
        Amf0Value::Number(value)
    }
}

impl From<bool> for Amf0Value {
    fn from(value: bool) -> Self {
        Amf0Value::Boolean(value)
    }
}

impl From<Amf0Object> for Amf0Value {
    fn from(value: Amf0Object) -> Self {
        Amf0Value::Object(value)
    }
}

mod markers {
    pub const NUMBER_MARKER: u8 = 0;
    pub const BOOLEAN_MARKER: u8 = 1;
    pub const STRING_MARKER: u8 = 2;
    pub const OBJECT_MARKER: u8 = 3;
    pub const NULL_MARKER: u8 = 5;
    pub const UNDEFINED_MARKER: u8 = 6;
    pub const ECMA_ARRAY_MARKER: u8 = 8;
    pub const OBJECT_END_MARKER: u8 = 9;
    pub const STRICT_ARRAY_MARKER: u8 = 10;
    pub const DATE_MARKER: u8 = 11;
    pub const LONG_STRING_MARKER: u8 = 12;
    pub const UTF_8_EMPTY_MARKER: u16 = 0;
}
