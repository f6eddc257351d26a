//! Canonical CBOR encoding for record messages.
//!
//! Record IDs are content addresses, so the same message must produce
//! identical bytes (and thus an identical hash) everywhere it is encoded.
//! Messages are encoded as a CBOR map with integer keys in ascending order:
//! definite lengths, no floats, smallest valid integer encoding.

use ciborium::value::Value;

use crate::record::RecordMessage;

/// Message field keys (integer keys for compact encoding).
///
/// Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const VERSION: u64 = 0;
    pub const AUTHOR: u64 = 1;
    pub const DATA_FORMAT: u64 = 2;
    pub const SCHEMA: u64 = 3;
    pub const DATA_HASH: u64 = 4;
    pub const DATA_SIZE: u64 = 5;
    pub const TIMESTAMP: u64 = 6;
    pub const ATTESTATION: u64 = 7;
}

/// Encode a record message to canonical CBOR bytes.
pub fn canonical_message_bytes(message: &RecordMessage) -> Vec<u8> {
    let value = message_to_cbor_value(message);
    let mut buf = Vec::new();
    // Serializing a Value cannot fail for the shapes built here.
    ciborium::into_writer(&value, &mut buf).expect("CBOR encoding of in-memory value");
    buf
}

/// Convert a message to a CBOR Value (map with integer keys).
fn message_to_cbor_value(message: &RecordMessage) -> Value {
    // Build map entries in key order (already sorted 0-7)
    let mut entries = Vec::with_capacity(8);

    // 0: version
    entries.push((
        Value::Integer(keys::VERSION.into()),
        Value::Integer(message.version.into()),
    ));

    // 1: author
    entries.push((
        Value::Integer(keys::AUTHOR.into()),
        Value::Text(message.author.as_str().to_string()),
    ));

    // 2: data_format
    entries.push((
        Value::Integer(keys::DATA_FORMAT.into()),
        Value::Text(message.data_format.clone()),
    ));

    // 3: schema (null or text)
    let schema_value = match &message.schema {
        Some(schema) => Value::Text(schema.clone()),
        None => Value::Null,
    };
    entries.push((Value::Integer(keys::SCHEMA.into()), schema_value));

    // 4: data_hash
    entries.push((
        Value::Integer(keys::DATA_HASH.into()),
        Value::Bytes(message.data_hash.0.to_vec()),
    ));

    // 5: data_size
    entries.push((
        Value::Integer(keys::DATA_SIZE.into()),
        Value::Integer(message.data_size.into()),
    ));

    // 6: timestamp
    entries.push((
        Value::Integer(keys::TIMESTAMP.into()),
        Value::Integer(message.timestamp.into()),
    ));

    // 7: attestation
    entries.push((
        Value::Integer(keys::ATTESTATION.into()),
        Value::Bytes(message.attestation.to_vec()),
    ));

    Value::Map(entries)
}
