//! Content digests
//!
//! A [`Digest`] is the `<algorithm>:<hex>` content hash used by registries to address
//! manifests and blobs. Only `sha256` and `sha512` are accepted.

use crate::error::TransferError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256, Sha512};
use std::fmt;
use std::str::FromStr;

/// Digest of zero bytes, used by empty configs and layers
pub const EMPTY_SHA256: &str =
    "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Sha256,
    Sha512,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha512 => "sha512",
        }
    }

    fn hex_len(&self) -> usize {
        match self {
            Algorithm::Sha256 => 64,
            Algorithm::Sha512 => 128,
        }
    }

    fn hash(&self, data: &[u8]) -> String {
        match self {
            Algorithm::Sha256 => hex::encode(Sha256::digest(data)),
            Algorithm::Sha512 => hex::encode(Sha512::digest(data)),
        }
    }
}

/// Validated content digest
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: Algorithm,
    hex: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid digest '{0}'")]
pub struct ParseDigestError(pub String);

impl Digest {
    /// Compute the sha256 digest of `data`.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            algorithm: Algorithm::Sha256,
            hex: Algorithm::Sha256.hash(data),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Lowercase hex part without the algorithm prefix
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Whether a reference string is a digest rather than a tag.
    pub fn is_digest(reference: &str) -> bool {
        reference.parse::<Digest>().is_ok()
    }

    /// Check `data` hashes to this digest.
    pub fn verify(&self, data: &[u8]) -> Result<(), TransferError> {
        let computed = self.algorithm.hash(data);
        if computed != self.hex {
            return Err(TransferError::DigestMismatch {
                expected: self.to_string(),
                actual: format!("{}:{}", self.algorithm.as_str(), computed),
            });
        }
        Ok(())
    }
}

impl FromStr for Digest {
    type Err = ParseDigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseDigestError(s.to_string());
        let (algorithm, hex) = s.split_once(':').ok_or_else(invalid)?;
        let algorithm = match algorithm {
            "sha256" => Algorithm::Sha256,
            "sha512" => Algorithm::Sha512,
            _ => return Err(invalid()),
        };
        if hex.len() != algorithm.hex_len()
            || !hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(invalid());
        }
        Ok(Self {
            algorithm,
            hex: hex.to_string(),
        })
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.as_str(), self.hex)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_sha256() {
        assert_eq!(Digest::from_bytes(b"").to_string(), EMPTY_SHA256);
    }

    #[test]
    fn parses_valid_digests() {
        let digest: Digest = EMPTY_SHA256.parse().unwrap();
        assert_eq!(digest.algorithm(), Algorithm::Sha256);
        assert_eq!(digest.hex().len(), 64);

        let sha512 = format!("sha512:{}", "a".repeat(128));
        assert!(sha512.parse::<Digest>().is_ok());
    }

    #[test]
    fn rejects_tags_and_malformed_digests() {
        let inputs = vec![
            "latest".to_string(),
            "v1.0".to_string(),
            "sha256:".to_string(),
            "sha256:abc".to_string(),
            "md5:d41d8cd98f00b204e9800998ecf8427e".to_string(),
            format!("sha256:{}", "A".repeat(64)),
            format!("sha256:{}", "g".repeat(64)),
        ];
        for input in &inputs {
            assert!(!Digest::is_digest(input), "{input} should not parse");
        }
    }

    #[test]
    fn verifies_content() {
        let digest = Digest::from_bytes(b"hello");
        assert!(digest.verify(b"hello").is_ok());
        assert!(matches!(
            digest.verify(b"world"),
            Err(TransferError::DigestMismatch { .. })
        ));
    }
}
