//! Deterministic cache keys for snippets
//!
//! A [`Fingerprint`] is the SHA-256 digest of a snippet's exact bytes. When a
//! snippet is executed, the digest also covers a [`KeyEnvelope`] describing the
//! toolchain configuration, so the same text compiled with different flags
//! never shares a cache row.

use crate::{Result, StoreError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Domain separator for invocation keys; bump when the envelope layout changes.
const INVOCATION_KEY_TAG: &[u8] = b"memorun-invocation-v1";

/// Fixed-size digest identifying a snippet (and optionally its configuration)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint([u8; 32]);

/// Compute the fingerprint of raw snippet bytes
#[must_use]
pub fn fingerprint(snippet: &[u8]) -> Fingerprint {
    Fingerprint::from_hasher(Sha256::new_with_prefix(snippet))
}

impl Fingerprint {
    /// Length of the hex representation
    pub const HEX_LEN: usize = 64;

    fn from_hasher(hasher: Sha256) -> Self {
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Fingerprint a snippet together with the configuration it runs under
    #[must_use]
    pub fn for_invocation(source: &[u8], envelope: &KeyEnvelope) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(INVOCATION_KEY_TAG);
        update_field(&mut hasher, envelope.language.as_bytes());
        update_field(&mut hasher, envelope.program.as_bytes());
        update_len(&mut hasher, envelope.args.len());
        for arg in &envelope.args {
            update_field(&mut hasher, arg.as_bytes());
        }
        update_len(&mut hasher, envelope.env.len());
        for (key, value) in &envelope.env {
            update_field(&mut hasher, key.as_bytes());
            update_field(&mut hasher, value.as_bytes());
        }
        update_field(&mut hasher, envelope.memorun_version.as_bytes());
        update_field(&mut hasher, source);
        Self::from_hasher(hasher)
    }

    /// Parse a fingerprint from its 64-character hex form
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        if hex_str.len() != Self::HEX_LEN {
            return Err(StoreError::invalid_fingerprint(format!(
                "expected {} hex characters, got {}",
                Self::HEX_LEN,
                hex_str.len()
            )));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(hex_str, &mut bytes)
            .map_err(|e| StoreError::invalid_fingerprint(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Lowercase hex representation, used as the store's primary key
    #[must_use]
    pub fn as_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw digest bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 12 hex characters, for log lines
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

// Length-prefix every field so adjacent fields cannot be re-split into the same byte stream.
fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    update_len(hasher, bytes.len());
    hasher.update(bytes);
}

fn update_len(hasher: &mut Sha256, len: usize) {
    hasher.update((len as u64).to_le_bytes());
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.as_hex()
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl std::str::FromStr for Fingerprint {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// Execution configuration folded into invocation fingerprints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEnvelope {
    /// Language tag (e.g. "rust")
    pub language: String,
    /// Toolchain program that compiles or interprets the snippet
    pub program: String,
    /// Argument template, without per-invocation paths
    pub args: Vec<String>,
    /// Environment overlay handed to the toolchain
    pub env: BTreeMap<String, String>,
    /// Version of memorun computing the key
    pub memorun_version: String,
}
