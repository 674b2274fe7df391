use std::fmt;

use ed25519_dalek::{SigningKey, VerifyingKey, SECRET_KEY_LENGTH};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("malformed base58 key material")]
    Base58,

    #[error("invalid key length: expected {expected} bytes, got {got}")]
    Length { expected: usize, got: usize },

    #[error("bytes do not form a valid ed25519 public key")]
    InvalidPublicKey,
}

// ── PublicKey ────────────────────────────────────────────────────────────────

/// Ed25519 verifying key (32 bytes). Base58-encoded everywhere it crosses the
/// wire; raw bytes internally.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_b58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    pub fn from_b58(s: &str) -> Result<Self, KeyError> {
        let bytes = bs58::decode(s).into_vec().map_err(|_| KeyError::Base58)?;
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| KeyError::Length {
            expected: 32,
            got: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey, KeyError> {
        VerifyingKey::from_bytes(&self.0).map_err(|_| KeyError::InvalidPublicKey)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_b58())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_b58()[..8])
    }
}

// ── KeyPair ──────────────────────────────────────────────────────────────────

/// An Ed25519 keypair: verifying key plus the 32-byte seed it derives from.
///
/// The seed is held in a `Zeroizing` buffer so it is wiped from memory on
/// drop. Seeds travel as base58 strings, like public keys.
pub struct KeyPair {
    pub public_key: PublicKey,
    seed: Zeroizing<[u8; SECRET_KEY_LENGTH]>,
}

impl KeyPair {
    /// Generate a fresh keypair from the system CSPRNG.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// Restore a keypair from a base58-encoded seed.
    pub fn from_seed_b58(seed: &str) -> Result<Self, KeyError> {
        Ok(Self::from_signing_key(signing_key_from_b58(seed)?))
    }

    fn from_signing_key(signing: SigningKey) -> Self {
        let public_key = PublicKey(signing.verifying_key().to_bytes());
        Self {
            public_key,
            seed: Zeroizing::new(signing.to_bytes()),
        }
    }

    pub fn public_key_b58(&self) -> String {
        self.public_key.to_b58()
    }

    pub fn seed_b58(&self) -> String {
        bs58::encode(&self.seed[..]).into_string()
    }

    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.seed)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair {{ public_key: {:?} }}", self.public_key)
    }
}

/// Decode a base58 Ed25519 seed into a signing key.
pub fn signing_key_from_b58(seed: &str) -> Result<SigningKey, KeyError> {
    let bytes = bs58::decode(seed).into_vec().map_err(|_| KeyError::Base58)?;
    let arr: [u8; SECRET_KEY_LENGTH] =
        bytes.as_slice().try_into().map_err(|_| KeyError::Length {
            expected: SECRET_KEY_LENGTH,
            got: bytes.len(),
        })?;
    Ok(SigningKey::from_bytes(&arr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_round_trips_through_b58() {
        let pair = KeyPair::generate();
        let restored = KeyPair::from_seed_b58(&pair.seed_b58()).unwrap();
        assert_eq!(pair.public_key, restored.public_key);
    }

    #[test]
    fn public_key_round_trips_through_b58() {
        let pair = KeyPair::generate();
        let decoded = PublicKey::from_b58(&pair.public_key_b58()).unwrap();
        assert_eq!(decoded, pair.public_key);
    }

    #[test]
    fn malformed_b58_is_rejected() {
        assert!(matches!(
            PublicKey::from_b58("not-base58-0OIl"),
            Err(KeyError::Base58)
        ));
        assert!(matches!(
            PublicKey::from_b58("abc"),
            Err(KeyError::Length { .. })
        ));
    }
}
