use bytes::Bytes;
use ingest_amf0::{self, Amf0Value};

use crate::messages::{MessageDeserializationError, MessageSerializationError, RtmpMessage};

pub fn serialize(
    command_name: String,
    transaction_id: f64,
    command_object: Amf0Value,
    additional_arguments: Vec<Amf0Value>,
) -> Result<Bytes, MessageSerializationError> {
    let mut values = Vec::with_capacity(additional_arguments.len() + 3);
    values.push(Amf0Value::Utf8String(command_name));
    values.push(Amf0Value::Number(transaction_id));
    values.push(command_object);
    values.extend(additional_arguments);

    let bytes = ingest_amf0::serialize(&values)?;
    Ok(Bytes::from(bytes))
}

/// Reads a command.  Only the command name is mandatory: publishers routinely omit trailing
/// values, so a missing transaction id reads as `0` and a missing command object as `Null`.
pub fn deserialize(data: Bytes) -> Result<RtmpMessage, MessageDeserializationError> {
    let mut arguments = ingest_amf0::deserialize(&data)?.into_iter();

    let command_name = match arguments.next() {
        Some(Amf0Value::Utf8String(value)) => value,
        Some(Amf0Value::LongString(value)) => value,
        _ => return Err(MessageDeserializationError::InvalidMessageFormat),
    };

    let transaction_id = match arguments.next() {
        Some(Amf0Value::Number(value)) => value,
        None => 0.0,
        Some(_) => return Err(MessageDeserializationError::InvalidMessageFormat),
    };

    let command_object = arguments.next().unwrap_or(Amf0Value::Null);

    Ok(RtmpMessage::Amf0Command {
        command_name,
        transaction_id,
        command_object,
        additional_arguments: arguments.collect(),
    })
}
