//! Module contains functionality for serializing values into an
//! bytes based on the AMF0 specification
//! (http://wwwimages.adobe.com/content/dam/Adobe/en/devnet/amf/pdf/amf0-file-format-specification.pdf)

use crate::errors::Amf0SerializationError;
use crate::markers;
use crate::{Amf0Object, Amf0Value};
use byteorder::{BigEndian, WriteBytesExt};

/// Serializes values into an amf0 encoded vector of bytes
pub fn serialize(values: &[Amf0Value]) -> Result<Vec<u8>, Amf0SerializationError> {
    let mut bytes = vec![];
    for value in values {
        serialize_value(value, &mut bytes)?;
    }

    Ok(bytes)
}

fn serialize_value(value: &Amf0Value, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    match value {
        Amf0Value::Boolean(val) => {
            bytes.push(markers::BOOLEAN_MARKER);
            bytes.push(*val as u8);
            Ok(())
        }

        Amf0Value::Null => {
            bytes.push(markers::NULL_MARKER);
            Ok(())
        }

        Amf0Value::Undefined => {
            bytes.push(markers::UNDEFINED_MARKER);
            Ok(())
        }

        Amf0Value::Number(val) => {
            bytes.push(markers::NUMBER_MARKER);
            bytes.write_f64::<BigEndian>(*val)?;
            Ok(())
        }

        Amf0Value::Utf8String(val) => serialize_string(val, bytes),
        Amf0Value::LongString(val) => serialize_long_string(val, bytes),
        Amf0Value::Object(val) => serialize_object(val, bytes),
        Amf0Value::StrictArray(val) => serialize_strict_array(val, bytes),
        Amf0Value::Date(val) => {
            // Dates are kept in UTC, so the time zone field is always zero
            bytes.push(markers::DATE_MARKER);
            bytes.write_f64::<BigEndian>(*val)?;
            bytes.write_i16::<BigEndian>(0)?;
            Ok(())
        }
    }
}

fn serialize_string(value: &str, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    if value.len() > (u16::MAX as usize) {
        return Err(Amf0SerializationError::NormalStringTooLong);
    }

    bytes.push(markers::STRING_MARKER);
    bytes.write_u16::<BigEndian>(value.len() as u16)?;
    bytes.extend(value.as_bytes());
    Ok(())
}

fn serialize_long_string(value: &str, bytes: &mut Vec<u8>) -> Result<(), Amf0SerializationError> {
    if value.len() > (u32::MAX as usize) {
        return Err(Amf0SerializationError::ValueTooLarge);
    }

    bytes.push(markers::LONG_STRING_MARKER);
    bytes.write_u32::<BigEndian>(value.len() as u32)?;
    bytes.extend(value.as_bytes());
    Ok(())
}

fn serialize_object(
    properties: &Amf0Object,
    bytes: &mut Vec<u8>,
) -> Result<(), Amf0SerializationError> {
    bytes.push(markers::OBJECT_MARKER);

    for (name, value) in properties {
        if name.len() > (u16::MAX as usize) {
            return Err(Amf0SerializationError::PropertyNameTooLong { name: name.clone() });
        }

        bytes.write_u16::<BigEndian>(name.len() as u16)?;
        bytes.extend(name.as_bytes());
        serialize_value(value, bytes)?;
    }

    bytes.write_u16::<BigEndian>(markers::UTF_8_EMPTY_MARKER)?;
    bytes.push(markers::OBJECT_END_MARKER);
    Ok(())
}

fn serialize_strict_array(
    array: &[Amf0Value],
    bytes: &mut Vec<u8>,
) -> Result<(), Amf0SerializationError> {
    let mut elements = Vec::new();
    for value in array {
        serialize_value(value, &mut elements)?;
    }

    if elements.len() > (u32::MAX as usize) {
        return Err(Amf0SerializationError::ValueTooLarge);
    }

    bytes.push(markers::STRICT_ARRAY_MARKER);
    bytes.write_u32::<BigEndian>(elements.len() as u32)?;
    bytes.extend(elements);
    Ok(())
}
