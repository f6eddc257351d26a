//! Structural validation of record messages and inline bodies.
//!
//! Stores validate authorization and schema rules on their own; the checks
//! here are the structural ones the sync engine needs before trusting a
//! reply. A violation is reported as [`CoreError::Malformed`], which the
//! engine treats exactly like a transport failure.

use crate::error::CoreError;
use crate::hash::ContentHash;
use crate::record::{RecordMessage, MESSAGE_VERSION};

/// Validate the structure of a record message.
pub fn validate_message(message: &RecordMessage) -> Result<(), CoreError> {
    if message.version != MESSAGE_VERSION {
        return Err(CoreError::Malformed(format!(
            "unsupported message version: {}",
            message.version
        )));
    }
    if message.data_format.is_empty() {
        return Err(CoreError::Malformed("empty data_format".into()));
    }
    if let Some(schema) = &message.schema {
        if schema.is_empty() {
            return Err(CoreError::Malformed("empty schema".into()));
        }
    }
    Ok(())
}

/// Validate an inline body against the message that describes it.
///
/// The body must match the declared size and hash byte-for-byte.
pub fn validate_inline_body(message: &RecordMessage, data: &[u8]) -> Result<(), CoreError> {
    if data.len() as u64 != message.data_size {
        return Err(CoreError::Malformed(format!(
            "body length {} does not match declared data_size {}",
            data.len(),
            message.data_size
        )));
    }
    if ContentHash::hash(data) != message.data_hash {
        return Err(CoreError::Malformed("body hash mismatch".into()));
    }
    Ok(())
}
