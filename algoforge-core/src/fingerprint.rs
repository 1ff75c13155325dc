//! Strategy fingerprinting: lowercase hex SHA-256 over canonical JSON.
//!
//! The hash is computed over the canonical string's UTF-8 bytes, so two
//! documents share a fingerprint exactly when their canonical forms are
//! byte-identical. Display metadata (`meta`) never contributes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::{canonicalize, canonicalize_json, CanonicalError};
use crate::document::{check_schema_version, StrategyDocument};

/// Length of a hex-encoded SHA-256 digest.
pub const HASH_HEX_LEN: usize = 64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HashError {
    #[error("strategy hash must be {HASH_HEX_LEN} hex characters, got {0}")]
    Length(usize),
    #[error("strategy hash must be lowercase hex, found '{0}'")]
    NotLowerHex(char),
}

/// Content-addressed identity of a compiled strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StrategyHash(String);

impl StrategyHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `n` characters, for compact display in listings.
    pub fn short(&self, n: usize) -> &str {
        &self.0[..n.min(HASH_HEX_LEN)]
    }
}

impl fmt::Display for StrategyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StrategyHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HASH_HEX_LEN {
            return Err(HashError::Length(s.chars().count()));
        }
        if let Some(c) = s.chars().find(|c| !matches!(c, '0'..='9' | 'a'..='f')) {
            return Err(HashError::NotLowerHex(c));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for StrategyHash {
    type Error = HashError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StrategyHash> for String {
    fn from(hash: StrategyHash) -> Self {
        hash.0
    }
}

/// Hash an already-canonical string. Total: any string hashes.
pub fn hash_canonical(canonical: &str) -> StrategyHash {
    let digest = Sha256::digest(canonical.as_bytes());
    StrategyHash(hex::encode(digest))
}

/// Canonicalize and hash a typed document.
pub fn document_hash(document: &StrategyDocument) -> Result<StrategyHash, CanonicalError> {
    canonicalize(document).map(|canonical| hash_canonical(&canonical))
}

/// Canonicalize and hash a stored JSON document.
///
/// The document must declare the supported `schema_version`; fields the typed
/// model does not know still contribute to the hash.
pub fn json_hash(value: &serde_json::Value) -> Result<StrategyHash, CanonicalError> {
    check_schema_version(value)?;
    canonicalize_json(value).map(|canonical| hash_canonical(&canonical))
}
