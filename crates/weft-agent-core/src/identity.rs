//! Identity and endpoint identifiers.
//!
//! The agent syncs on behalf of decentralized identifiers (DIDs) against
//! network-addressable store endpoints. Both are opaque strings to the
//! engine; the newtypes exist to prevent mixing them up at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// A decentralized identifier the agent is authorized to sync for.
///
/// Ordered so registry enumeration is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Did(String);

impl Did {
    /// Parse a DID, validating the `did:<method>:` shape.
    pub fn parse(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("did"), Some(method), Some(id)) if !method.is_empty() && !id.is_empty() => {
                Ok(Self(s))
            }
            _ => Err(CoreError::InvalidDid(s)),
        }
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Did {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A store endpoint URL resolved from an identity's service declarations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointUrl(String);

impl EndpointUrl {
    /// Parse an endpoint URL, validating the scheme.
    pub fn parse(s: impl Into<String>) -> Result<Self, CoreError> {
        let s = s.into();
        let valid = ["http://", "https://", "ws://", "wss://"]
            .iter()
            .any(|scheme| s.starts_with(scheme) && s.len() > scheme.len());
        if valid {
            Ok(Self(s))
        } else {
            Err(CoreError::InvalidEndpoint(s))
        }
    }

    /// Get the URL as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EndpointUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_did_parse_valid() {
        let did = Did::parse("did:web:alice.example").unwrap();
        assert_eq!(did.as_str(), "did:web:alice.example");
    }

    #[test]
    fn test_did_parse_rejects_malformed() {
        assert!(Did::parse("alice.example").is_err());
        assert!(Did::parse("did:").is_err());
        assert!(Did::parse("did::abc").is_err());
        assert!(Did::parse("did:web:").is_err());
    }

    #[test]
    fn test_did_ordering_is_lexicographic() {
        let a = Did::parse("did:web:alice.example").unwrap();
        let b = Did::parse("did:web:bob.example").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_endpoint_parse_valid() {
        for url in [
            "https://dwn.example/node",
            "http://localhost:3000",
            "wss://relay.example",
        ] {
            assert!(EndpointUrl::parse(url).is_ok(), "{url}");
        }
    }

    #[test]
    fn test_endpoint_parse_rejects_bad_scheme() {
        assert!(EndpointUrl::parse("ftp://dwn.example").is_err());
        assert!(EndpointUrl::parse("dwn.example").is_err());
        assert!(EndpointUrl::parse("https://").is_err());
    }
}
