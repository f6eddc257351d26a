//! Error types for core primitives.

use thiserror::Error;

/// Errors from parsing or validating core data.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Not a well-formed DID.
    #[error("invalid DID: {0}")]
    InvalidDid(String),

    /// Not a well-formed endpoint URL.
    #[error("invalid endpoint URL: {0}")]
    InvalidEndpoint(String),

    /// Hex decoding failed.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// A message or entry failed structural validation.
    #[error("malformed record data: {0}")]
    Malformed(String),
}
