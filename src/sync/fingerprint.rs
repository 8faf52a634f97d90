//! Content fingerprints for change detection.
//!
//! MD5 is the default because it matches the ETag S3 assigns to a
//! single-part upload, which lets the store listing stand in for a hash of
//! the stored object. BLAKE3 and SHA-256 are available when objects are
//! fetched and hashed locally.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// Fingerprint algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintAlgorithm {
    /// MD5, comparable with single-part S3 ETags (default).
    #[default]
    Md5,
    /// SHA-256.
    Sha256,
    /// BLAKE3, parallel for large payloads.
    Blake3,
}

impl FingerprintAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }

    /// Length of the hex digest.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha256 | Self::Blake3 => 64,
        }
    }

    /// Fingerprint a payload as lowercase hex.
    pub fn fingerprint(&self, data: &[u8]) -> String {
        match self {
            Self::Md5 => to_hex(&Md5::digest(data)),
            Self::Sha256 => to_hex(&Sha256::digest(data)),
            Self::Blake3 => blake3_hex(data),
        }
    }
}

impl std::fmt::Display for FingerprintAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for FingerprintAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            other => Err(format!("unsupported fingerprint algorithm: {}", other)),
        }
    }
}

/// Fingerprint bytes with the default algorithm.
pub fn fingerprint(data: &[u8]) -> String {
    FingerprintAlgorithm::default().fingerprint(data)
}

/// Normalize a store identity tag for comparison: S3 returns ETags
/// wrapped in double quotes.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().trim_matches('"').to_string()
}

fn blake3_hex(data: &[u8]) -> String {
    // Use parallel hashing for data > 128KB
    if data.len() > 128 * 1024 {
        let mut hasher = blake3::Hasher::new();
        hasher.update_rayon(data);
        hasher.finalize().to_hex().to_string()
    } else {
        blake3::hash(data).to_hex().to_string()
    }
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}
