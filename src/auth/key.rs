//! API key material: hashing, verification and generation.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

use super::error::AuthError;

/// Authentication scheme name carried in the `Authorization` header.
pub const API_KEY_SCHEME: &str = "MonitorApiKey";

/// Length of a generated key in bytes, before encoding.
pub const GENERATED_KEY_BYTES: usize = 32;

/// Supported API key hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    /// SHA-256 (the default).
    #[default]
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    /// Configuration spelling of the algorithm.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "SHA256",
            Self::Sha384 => "SHA384",
            Self::Sha512 => "SHA512",
        }
    }

    /// Digest length in bytes.
    #[must_use]
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Hashes `data`.
    #[must_use]
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "");
        [Self::Sha256, Self::Sha384, Self::Sha512]
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| AuthError::UnsupportedAlgorithm(s.to_string()))
    }
}

/// A validated API key hash.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKeyHash {
    algorithm: HashAlgorithm,
    digest: Vec<u8>,
}

impl ApiKeyHash {
    /// Parses a hex-encoded hash for the given algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedHash`] if `hex_value` is not hex or has
    /// the wrong length for `algorithm`.
    pub fn parse(algorithm: HashAlgorithm, hex_value: &str) -> Result<Self, AuthError> {
        let digest = hex::decode(hex_value.trim())
            .map_err(|e| AuthError::MalformedHash(format!("not hex encoded ({e})")))?;
        if digest.len() != algorithm.digest_len() {
            return Err(AuthError::MalformedHash(format!(
                "{algorithm} expects {} hex characters, got {}",
                algorithm.digest_len() * 2,
                hex_value.trim().len()
            )));
        }
        Ok(Self { algorithm, digest })
    }

    /// Hashes a raw key.
    #[must_use]
    pub fn of_key(algorithm: HashAlgorithm, key: &[u8]) -> Self {
        Self {
            algorithm,
            digest: algorithm.digest(key),
        }
    }

    /// The algorithm the hash was produced with.
    #[must_use]
    pub const fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Upper-case hex rendering of the digest.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.digest)
    }

    /// Checks a presented raw key in constant time.
    #[must_use]
    pub fn verify(&self, presented: &[u8]) -> bool {
        let candidate = self.algorithm.digest(presented);
        candidate.ct_eq(&self.digest).into()
    }

    /// Checks the base64 text of a presented key.
    #[must_use]
    pub fn verify_encoded(&self, encoded: &str) -> bool {
        STANDARD
            .decode(encoded.trim())
            .is_ok_and(|raw| self.verify(&raw))
    }
}

impl fmt::Debug for ApiKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyHash")
            .field("algorithm", &self.algorithm)
            .field("digest", &"<redacted>")
            .finish()
    }
}

/// A freshly generated API key together with its hash.
pub struct GeneratedApiKey {
    encoded: String,
    hash: ApiKeyHash,
}

impl GeneratedApiKey {
    /// Generates a key from the thread-local CSPRNG.
    #[must_use]
    pub fn generate(algorithm: HashAlgorithm) -> Self {
        let mut raw = [0u8; GENERATED_KEY_BYTES];
        rand::rng().fill_bytes(&mut raw);
        Self {
            encoded: STANDARD.encode(raw),
            hash: ApiKeyHash::of_key(algorithm, &raw),
        }
    }

    /// The bearer credential (base64 of the raw key).
    #[must_use]
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    /// The hash of the key.
    #[must_use]
    pub const fn hash(&self) -> &ApiKeyHash {
        &self.hash
    }

    /// Splits into the credential and its hash.
    #[must_use]
    pub fn into_parts(self) -> (String, ApiKeyHash) {
        (self.encoded, self.hash)
    }

    /// The three lines shown to the operator.
    #[must_use]
    pub fn display_lines(&self) -> [String; 3] {
        credential_lines(&self.encoded, &self.hash)
    }
}

/// Formats a credential and its hash as the three operator-facing lines.
#[must_use]
pub fn credential_lines(encoded: &str, hash: &ApiKeyHash) -> [String; 3] {
    [
        format!("Authorization: {API_KEY_SCHEME} {encoded}"),
        format!("ApiKeyHash: {}", hash.to_hex()),
        format!("ApiKeyHashType: {}", hash.algorithm()),
    ]
}

impl fmt::Debug for GeneratedApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedApiKey")
            .field("encoded", &"<redacted>")
            .field("hash", &self.hash)
            .finish()
    }
}
