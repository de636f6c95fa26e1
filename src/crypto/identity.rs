//! One-way identity hashing
//!
//! Raw identity tokens never leave this module: the only thing the rest of
//! the system sees is the fixed-length [`IdentityDigest`].

use crate::config::SecurityConfig;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Derive-key context used when no identity salt is configured
const IDENTITY_CONTEXT: &str = "votebox 2024-01-01 voter identity digest v1";

/// Length of the textual (hex) form of a digest
pub const DIGEST_HEX_LEN: usize = 64;

/// Opaque 32-byte BLAKE3 digest of a voter identity token
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityDigest([u8; 32]);

impl IdentityDigest {
    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short prefix that is safe to put in logs
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl From<[u8; 32]> for IdentityDigest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for IdentityDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for IdentityDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityDigest({}..)", self.short())
    }
}

impl FromStr for IdentityDigest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != DIGEST_HEX_LEN {
            return Err(Error::validation(
                "identity digest",
                format!("expected {DIGEST_HEX_LEN} hex characters, got {}", s.len()),
            ));
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| Error::validation("identity digest", format!("invalid hex: {e}")))?;
        Ok(Self(bytes))
    }
}

impl Serialize for IdentityDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for IdentityDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        hex.parse().map_err(serde::de::Error::custom)
    }
}

/// Deterministic one-way transform from identity token to digest
#[derive(Clone)]
pub struct IdentityHasher {
    key: Option<[u8; 32]>,
}

impl IdentityHasher {
    /// Unkeyed hasher using a fixed derive-key context
    pub fn new() -> Self {
        Self { key: None }
    }

    /// Keyed hasher; the key must stay stable for the lifetime of the data
    pub fn with_key(key: [u8; 32]) -> Self {
        Self { key: Some(key) }
    }

    /// Build from security configuration
    pub fn from_config(config: &SecurityConfig) -> Result<Self> {
        Ok(match config.identity_key()? {
            Some(key) => Self::with_key(key),
            None => Self::new(),
        })
    }

    /// Whether a salt key is in use
    pub fn is_keyed(&self) -> bool {
        self.key.is_some()
    }

    /// Digest a raw identity token
    pub fn digest(&self, raw_identity: &str) -> IdentityDigest {
        let mut hasher = match &self.key {
            Some(key) => blake3::Hasher::new_keyed(key),
            None => blake3::Hasher::new_derive_key(IDENTITY_CONTEXT),
        };
        hasher.update(raw_identity.as_bytes());
        IdentityDigest(hasher.finalize().into())
    }
}

impl Default for IdentityHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdentityHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityHasher")
            .field("keyed", &self.is_keyed())
            .finish()
    }
}
