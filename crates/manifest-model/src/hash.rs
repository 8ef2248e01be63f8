//! Manifest content hashing
//!
//! Bootstrap payloads carry the server's `manifest_hash`; when a manifest is
//! materialized locally (design-time preview) the hash is computed as Blake3
//! over its canonical JSON encoding.

use crate::error::HashError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Opaque manifest fingerprint
///
/// Server-provided hashes are kept verbatim; locally computed ones are
/// lowercase hex Blake3 digests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestHash(String);

impl ManifestHash {
    /// Wrap a hash received from the server
    #[inline]
    #[must_use]
    pub fn from_remote(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Compute Blake3 hash of arbitrary bytes
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(hex::encode(blake3::hash(data).as_bytes()))
    }

    /// Compute hash from serializable value (JSON encoding)
    ///
    /// # Errors
    /// Returns error if serialization fails
    #[inline]
    pub fn compute_serializable<T>(value: &T) -> Result<Self, HashError>
    where
        T: Serialize,
    {
        let json = serde_json::to_vec(value)?;
        Ok(Self::compute(&json))
    }

    /// Hash string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short representation (first 16 chars) for logs
    #[inline]
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..16).unwrap_or(&self.0)
    }
}

impl Display for ManifestHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
