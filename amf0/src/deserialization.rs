//! This module contains functionality to deserialize values from bytes
//! that were encoded via the AMF0 specification
//! (http://wwwimages.adobe.com/content/dam/Adobe/en/devnet/amf/pdf/amf0-file-format-specification.pdf)

use crate::errors::Amf0DeserializationError;
use crate::markers;
use crate::{Amf0Object, Amf0Value};
use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use std::io::{Cursor, Read};

const MINUTES_TO_MILLISECONDS: f64 = 60_000.0;

enum Element {
    Value(Amf0Value),
    ObjectEnd,
}

/// Decodes every AMF0 value contained in the buffer, in order.
///
/// Object end markers found between top level values are skipped.  Any value that cannot be
/// decoded fails the whole buffer, as there is no way to know where the next value would start.
pub fn deserialize(bytes: &[u8]) -> Result<Vec<Amf0Value>, Amf0DeserializationError> {
    let mut cursor = Cursor::new(bytes);
    let mut results = vec![];

    while (cursor.position() as usize) < bytes.len() {
        match read_element(&mut cursor)? {
            Element::Value(value) => results.push(value),
            Element::ObjectEnd => (),
        }
    }

    Ok(results)
}

/// Decodes a single AMF0 value starting at `offset`, returning the value and the offset of the
/// first byte after it.
pub fn read_value(
    bytes: &[u8],
    offset: usize,
) -> Result<(Amf0Value, usize), Amf0DeserializationError> {
    if offset >= bytes.len() {
        return Err(Amf0DeserializationError::UnexpectedEof);
    }

    let mut cursor = Cursor::new(bytes);
    cursor.set_position(offset as u64);

    match read_element(&mut cursor)? {
        Element::Value(value) => Ok((value, cursor.position() as usize)),
        Element::ObjectEnd => Err(Amf0DeserializationError::UnexpectedObjectEnd { offset }),
    }
}

fn read_element(cursor: &mut Cursor<&[u8]>) -> Result<Element, Amf0DeserializationError> {
    let marker = cursor.read_u8()?;
    let value = match marker {
        markers::NUMBER_MARKER => Amf0Value::Number(cursor.read_f64::<BigEndian>()?),
        markers::BOOLEAN_MARKER => Amf0Value::Boolean(cursor.read_u8()? != 0),
        markers::STRING_MARKER => {
            let length = cursor.read_u16::<BigEndian>()? as usize;
            Amf0Value::Utf8String(read_utf8(cursor, length)?)
        }

        markers::OBJECT_MARKER => Amf0Value::Object(parse_object(cursor)?),
        markers::NULL_MARKER => Amf0Value::Null,
        markers::UNDEFINED_MARKER => Amf0Value::Undefined,
        markers::ECMA_ARRAY_MARKER => parse_ecma_array(cursor)?,
        markers::OBJECT_END_MARKER => return Ok(Element::ObjectEnd),
        markers::STRICT_ARRAY_MARKER => parse_strict_array(cursor)?,
        markers::DATE_MARKER => parse_date(cursor)?,
        markers::LONG_STRING_MARKER => {
            let length = cursor.read_u32::<BigEndian>()? as usize;
            Amf0Value::LongString(read_utf8(cursor, length)?)
        }

        _ => return Err(Amf0DeserializationError::UnsupportedType { marker }),
    };

    Ok(Element::Value(value))
}

fn read_utf8(cursor: &mut Cursor<&[u8]>, length: usize) -> Result<String, Amf0DeserializationError> {
    // Checked up front so a corrupt long string length can't trigger a 4GB allocation
    if length > remaining(cursor) {
        return Err(Amf0DeserializationError::UnexpectedEof);
    }

    let mut buffer = vec![0_u8; length];
    cursor.read_exact(&mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}

fn parse_object(cursor: &mut Cursor<&[u8]>) -> Result<Amf0Object, Amf0DeserializationError> {
    let mut properties = Amf0Object::new();

    loop {
        if skip_padded_object_end(cursor) {
            return Ok(properties);
        }

        let name_length = cursor.read_u16::<BigEndian>()? as usize;
        let name = read_utf8(cursor, name_length)?;

        // The regular terminator is an empty name followed by the end marker, but any name
        // followed by the end marker closes the object.
        match read_element(cursor)? {
            Element::ObjectEnd => return Ok(properties),
            Element::Value(value) => {
                properties.insert(name, value);
            }
        }
    }
}

/// Some encoders emit the object terminator with a leading junk byte (`?? 00 00 09`).  When
/// that pattern is present at a property boundary it is consumed as the end of the object.
fn skip_padded_object_end(cursor: &mut Cursor<&[u8]>) -> bool {
    let position = cursor.position() as usize;
    let bytes = *cursor.get_ref();
    if position + 4 > bytes.len() {
        return false;
    }

    let word = BigEndian::read_u32(&bytes[position..position + 4]);
    if word & 0x00FF_FFFF != markers::OBJECT_END_MARKER as u32 {
        return false;
    }

    cursor.set_position((position + 4) as u64);
    true
}

fn parse_ecma_array(cursor: &mut Cursor<&[u8]>) -> Result<Amf0Value, Amf0DeserializationError> {
    // The associative count is frequently wrong in the wild and the array is terminated by an
    // object end marker anyway, so it is read past and the array is parsed as an object.
    let _associative_count = cursor.read_u32::<BigEndian>()?;
    Ok(Amf0Value::Object(parse_object(cursor)?))
}

fn parse_strict_array(cursor: &mut Cursor<&[u8]>) -> Result<Amf0Value, Amf0DeserializationError> {
    // The prefix is the byte length of the encoded elements, not the element count
    let byte_length = cursor.read_u32::<BigEndian>()? as usize;
    if byte_length > remaining(cursor) {
        return Err(Amf0DeserializationError::UnexpectedEof);
    }

    let end = cursor.position() as usize + byte_length;
    let mut values = Vec::new();
    while (cursor.position() as usize) < end {
        match read_element(cursor)? {
            Element::Value(value) => values.push(value),
            Element::ObjectEnd => (),
        }
    }

    Ok(Amf0Value::StrictArray(values))
}

fn parse_date(cursor: &mut Cursor<&[u8]>) -> Result<Amf0Value, Amf0DeserializationError> {
    let milliseconds = cursor.read_f64::<BigEndian>()?;
    let offset_minutes = cursor.read_i16::<BigEndian>()?;

    Ok(Amf0Value::Date(
        milliseconds + offset_minutes as f64 * MINUTES_TO_MILLISECONDS,
    ))
}

fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    cursor
        .get_ref()
        .len()
        .saturating_sub(cursor.position() as usize)
}

#[cfg(test)]
mod tests {
    use super::{deserialize, read_value};
    use crate::errors::Amf0DeserializationError;
    use crate::markers;
    use crate::{Amf0Object, Amf0Value};
    use byteorder::{BigEndian, WriteBytesExt};

    #[test]
    fn can_deserialize_number() {
        let number: f64 = 332.0;

        let mut vector = vec![];
        vector.write_u8(markers::NUMBER_MARKER).unwrap();
        vector.write_f64::<BigEndian>(number).unwrap();

        let result = deserialize(&vector).unwrap();

        let expected = vec![Amf0Value::Number(number)];
        assert_eq!(result, expected);
    }

    #[test]
    fn can_deserialize_true_and_false_booleans() {
        let vector = vec![
            markers::BOOLEAN_MARKER,
            1,
            markers::BOOLEAN_MARKER,
            0,
        ];

        let result = deserialize(&vector).unwrap();

        let expected = vec![Amf0Value::Boolean(true), Amf0Value::Boolean(false)];
        assert_eq!(result, expected);
    }

    #[test]
    fn can_deserialize_string() {
        let value = "test";

        let mut vector = vec![];
        vector.write_u8(markers::STRING_MARKER).unwrap();
        vector.write_u16::<BigEndian>(value.len() as u16).unwrap();
        vector.extend(value.as_bytes());

        let result = deserialize(&vector).unwrap();

        let expected = vec![Amf0Value::Utf8String(value.to_string())];
        assert_eq!(result, expected);
    }

    #[test]
    fn can_deserialize_long_string() {
        let value = "a long one";

        let mut vector = vec![];
        vector.write_u8(markers::LONG_STRING_MARKER).unwrap();
        vector.write_u32::<BigEndian>(value.len() as u32).unwrap();
        vector.extend(value.as_bytes());
        vector.write_u8(markers::NULL_MARKER).unwrap();

        let result = deserialize(&vector).unwrap();

        let expected = vec![Amf0Value::LongString(value.to_string()), Amf0Value::Null];
        assert_eq!(result, expected);
    }

    #[test]
    fn can_deserialize_null_and_undefined() {
        let vector = vec![markers::NULL_MARKER, markers::UNDEFINED_MARKER];

        let result = deserialize(&vector).unwrap();

        assert_eq!(result, vec![Amf0Value::Null, Amf0Value::Undefined]);
    }

    #[test]
    fn can_deserialize_object() {
        const NUMBER: f64 = 332.0;

        let mut vector = vec![];
        vector.push(markers::OBJECT_MARKER);
        vector.write_u16::<BigEndian>(4).unwrap();
        vector.extend("test".as_bytes());
        vector.push(markers::NUMBER_MARKER);
        vector.write_f64::<BigEndian>(NUMBER).unwrap();
        vector
            .write_u16::<BigEndian>(markers::UTF_8_EMPTY_MARKER)
            .unwrap();
        vector.push(markers::OBJECT_END_MARKER);

        let result = deserialize(&vector).unwrap();

        let mut properties = Amf0Object::new();
        properties.insert("test", Amf0Value::Number(NUMBER));

        let expected = vec![Amf0Value::Object(properties)];
        assert_eq!(result, expected);
    }

    #[test]
    fn object_properties_keep_encoded_order() {
        let mut vector = vec![markers::OBJECT_MARKER];
        for name in &["zeta", "alpha", "mid"] {
            vector.write_u16::<BigEndian>(name.len() as u16).unwrap();
            vector.extend(name.as_bytes());
            vector.push(markers::NULL_MARKER);
        }
        vector.extend(&[0, 0, markers::OBJECT_END_MARKER]);

        let result = deserialize(&vector).unwrap();
        let object = result[0].as_object().unwrap();
        let names: Vec<&str> = object.iter().map(|(name, _)| name.as_str()).collect();

        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn object_end_with_leading_junk_byte_is_tolerated() {
        let mut vector = vec![markers::OBJECT_MARKER];
        vector.write_u16::<BigEndian>(1).unwrap();
        vector.extend("a".as_bytes());
        vector.push(markers::BOOLEAN_MARKER);
        vector.push(1);
        vector.extend(&[0xAB, 0, 0, markers::OBJECT_END_MARKER]);
        vector.push(markers::NULL_MARKER);

        let result = deserialize(&vector).unwrap();

        let mut properties = Amf0Object::new();
        properties.insert("a", Amf0Value::Boolean(true));
        assert_eq!(result, vec![Amf0Value::Object(properties), Amf0Value::Null]);
    }

    #[test]
    fn can_deserialize_emca_array_as_object() {
        let mut vector = vec![];
        vector.push(markers::ECMA_ARRAY_MARKER);
        vector.write_u32::<BigEndian>(7).unwrap();
        vector.write_u16::<BigEndian>(5).unwrap();
        vector.extend("test1".as_bytes());
        vector.push(markers::NUMBER_MARKER);
        vector.write_f64::<BigEndian>(1.0).unwrap();
        vector.write_u16::<BigEndian>(5).unwrap();
        vector.extend("test2".as_bytes());
        vector.write_u8(markers::STRING_MARKER).unwrap();
        vector.write_u16::<BigEndian>(6).unwrap();
        vector.extend("second".as_bytes());
        vector
            .write_u16::<BigEndian>(markers::UTF_8_EMPTY_MARKER)
            .unwrap();
        vector.push(markers::OBJECT_END_MARKER);

        let result = deserialize(&vector).unwrap();

        let mut properties = Amf0Object::new();
        properties.insert("test1", Amf0Value::Number(1.0));
        properties.insert("test2", Amf0Value::Utf8String("second".to_string()));

        let expected = vec![Amf0Value::Object(properties)];
        assert_eq!(result, expected);
    }

    #[test]
    fn can_deserialize_strict_array_with_byte_length_prefix() {
        let mut vector = vec![];
        vector.push(markers::STRICT_ARRAY_MARKER);
        vector.write_u32::<BigEndian>(18).unwrap();
        vector.push(markers::NUMBER_MARKER);
        vector.write_f64::<BigEndian>(1.0).unwrap();
        vector.push(markers::NUMBER_MARKER);
        vector.write_f64::<BigEndian>(2.0).unwrap();
        vector.push(markers::NULL_MARKER);

        let result = deserialize(&vector).unwrap();

        let expected = vec![
            Amf0Value::StrictArray(vec![Amf0Value::Number(1.0), Amf0Value::Number(2.0)]),
            Amf0Value::Null,
        ];
        assert_eq!(result, expected);
    }

    #[test]
    fn date_applies_time_zone_offset() {
        let mut vector = vec![markers::DATE_MARKER];
        vector.write_f64::<BigEndian>(1_000_000.0).unwrap();
        vector.write_i16::<BigEndian>(-60).unwrap();

        let result = deserialize(&vector).unwrap();

        assert_eq!(result, vec![Amf0Value::Date(1_000_000.0 - 3_600_000.0)]);
    }

    #[test]
    fn stray_object_end_at_top_level_is_skipped() {
        let vector = vec![
            markers::NULL_MARKER,
            markers::OBJECT_END_MARKER,
            markers::UNDEFINED_MARKER,
        ];

        let result = deserialize(&vector).unwrap();

        assert_eq!(result, vec![Amf0Value::Null, Amf0Value::Undefined]);
    }

    #[test]
    fn error_when_marker_is_unsupported() {
        let vector = vec![markers::NULL_MARKER, 0x11];

        match deserialize(&vector) {
            Err(Amf0DeserializationError::UnsupportedType { marker: 0x11 }) => (),
            x => panic!("Unexpected result: {:?}", x),
        }
    }

    #[test]
    fn error_when_value_is_truncated() {
        let mut vector = vec![markers::STRING_MARKER];
        vector.write_u16::<BigEndian>(10).unwrap();
        vector.extend("abc".as_bytes());

        match deserialize(&vector) {
            Err(Amf0DeserializationError::UnexpectedEof) => (),
            x => panic!("Unexpected result: {:?}", x),
        }
    }

    #[test]
    fn read_value_returns_offset_after_value() {
        let mut vector = vec![markers::NULL_MARKER, markers::NUMBER_MARKER];
        vector.write_f64::<BigEndian>(5.0).unwrap();
        vector.push(markers::BOOLEAN_MARKER);
        vector.push(1);

        let (value, next) = read_value(&vector, 1).unwrap();
        assert_eq!(value, Amf0Value::Number(5.0));
        assert_eq!(next, 10);

        let (value, next) = read_value(&vector, next).unwrap();
        assert_eq!(value, Amf0Value::Boolean(true));
        assert_eq!(next, vector.len());
    }
}
