//! Signature schemes keyed by public-key length
//!
//! Two schemes are supported: Ed25519 (32-byte public keys, 64-byte detached
//! signatures) and Ethereum-style recoverable ECDSA (20-byte addresses stored
//! in place of public keys, 65-byte `r ‖ s ‖ v` signatures). The scheme of a
//! key is never stored; it is derived from the key's length.

pub mod ed25519;
pub mod ethereum;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Result, TrellisError};

/// Upper bound over all supported signature lengths
pub const MAX_SIGNATURE_LENGTH: usize = 65;

/// Supported signature schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureScheme {
    /// Ed25519 detached signatures over 32-byte public keys
    Ed25519,
    /// Ethereum prefixed-Keccak recoverable ECDSA over 20-byte addresses
    Ethereum,
}

impl SignatureScheme {
    /// Derive the scheme from a public key length
    pub fn from_public_key_length(len: usize) -> Result<Self> {
        match len {
            32 => Ok(Self::Ed25519),
            20 => Ok(Self::Ethereum),
            _ => Err(TrellisError::CryptoSchemaUnknown { key_length: len }),
        }
    }

    /// Length in bytes of a signature under this scheme
    pub fn signature_length(&self) -> usize {
        match self {
            Self::Ed25519 => 64,
            Self::Ethereum => 65,
        }
    }
}

/// A public key (or Ethereum address) with a length-derived scheme
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    /// Construct from raw bytes, validating the length maps to a scheme
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        SignatureScheme::from_public_key_length(bytes.len())?;
        Ok(Self(bytes))
    }

    /// The scheme this key belongs to
    pub fn scheme(&self) -> SignatureScheme {
        // Length was validated at construction.
        match self.0.len() {
            32 => SignatureScheme::Ed25519,
            _ => SignatureScheme::Ethereum,
        }
    }

    /// Length in bytes of signatures produced by this key
    pub fn signature_length(&self) -> usize {
        self.scheme().signature_length()
    }

    /// Borrow the raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Copy out the raw key bytes
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.clone()
    }

    /// Key length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false: zero-length keys do not construct
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short prefix keeps signature bundles and traversal traces readable.
        write!(
            f,
            "PublicKey({}..)",
            hex::encode(&self.0[..4.min(self.0.len())])
        )
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Secret half of a key pair
#[derive(Clone)]
pub enum SecretKey {
    /// Ed25519 seed bytes
    Ed25519([u8; 32]),
    /// secp256k1 scalar bytes
    Ethereum([u8; 32]),
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret material.
        match self {
            Self::Ed25519(_) => write!(f, "SecretKey::Ed25519(..)"),
            Self::Ethereum(_) => write!(f, "SecretKey::Ethereum(..)"),
        }
    }
}

/// A signing key pair
#[derive(Debug, Clone)]
pub struct KeyPair {
    public: PublicKey,
    secret: SecretKey,
}

impl KeyPair {
    /// Derive an Ed25519 key pair from seed bytes
    pub fn ed25519_from_seed(seed: [u8; 32]) -> Self {
        let signing = ed25519_dalek::SigningKey::from_bytes(&seed);
        let public = PublicKey(signing.verifying_key().to_bytes().to_vec());
        Self {
            public,
            secret: SecretKey::Ed25519(seed),
        }
    }

    /// Derive an Ethereum key pair (address as public key) from a secret scalar
    pub fn ethereum_from_secret(secret: [u8; 32]) -> Result<Self> {
        let address = ethereum::address_from_secret(&secret)?;
        Ok(Self {
            public: PublicKey(address.to_vec()),
            secret: SecretKey::Ethereum(secret),
        })
    }

    /// The public key (or address) of this pair
    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    /// Sign a message under the pair's scheme
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        match &self.secret {
            SecretKey::Ed25519(seed) => Ok(ed25519::sign(message, seed).to_vec()),
            SecretKey::Ethereum(secret) => Ok(ethereum::sign(message, secret)?.to_vec()),
        }
    }
}

/// Verify a signature against a message and public key.
///
/// Returns `Ok(false)` for any well-formed-but-wrong signature; errors only
/// when the public key maps to no scheme.
pub fn verify(message: &[u8], signature: &[u8], public_key: &PublicKey) -> Result<bool> {
    if signature.len() != public_key.signature_length() {
        return Ok(false);
    }
    match public_key.scheme() {
        SignatureScheme::Ed25519 => {
            let sig: [u8; 64] = match signature.try_into() {
                Ok(s) => s,
                Err(_) => return Ok(false),
            };
            let pk: [u8; 32] = match public_key.as_bytes().try_into() {
                Ok(p) => p,
                Err(_) => return Ok(false),
            };
            Ok(ed25519::verify(message, &sig, &pk))
        }
        SignatureScheme::Ethereum => {
            let sig: [u8; 65] = match signature.try_into() {
                Ok(s) => s,
                Err(_) => return Ok(false),
            };
            Ok(ethereum::verify(message, &sig, public_key.as_bytes()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_discrimination_by_length() {
        assert_eq!(
            SignatureScheme::from_public_key_length(32).unwrap(),
            SignatureScheme::Ed25519
        );
        assert_eq!(
            SignatureScheme::from_public_key_length(20).unwrap(),
            SignatureScheme::Ethereum
        );
        assert!(matches!(
            SignatureScheme::from_public_key_length(33),
            Err(TrellisError::CryptoSchemaUnknown { key_length: 33 })
        ));
    }

    #[test]
    fn ed25519_sign_verify_roundtrip() {
        let pair = KeyPair::ed25519_from_seed([7u8; 32]);
        let message = b"trellis";
        let sig = pair.sign(message).unwrap();
        assert_eq!(sig.len(), 64);
        assert!(verify(message, &sig, pair.public()).unwrap());
        assert!(!verify(b"other", &sig, pair.public()).unwrap());
    }

    #[test]
    fn ethereum_sign_verify_roundtrip() {
        let pair = KeyPair::ethereum_from_secret([9u8; 32]).unwrap();
        let message = b"trellis";
        let sig = pair.sign(message).unwrap();
        assert_eq!(sig.len(), 65);
        assert_eq!(pair.public().len(), 20);
        assert!(verify(message, &sig, pair.public()).unwrap());
        assert!(!verify(b"other", &sig, pair.public()).unwrap());
    }

    #[test]
    fn wrong_length_signature_is_false_not_error() {
        let pair = KeyPair::ed25519_from_seed([1u8; 32]);
        assert!(!verify(b"m", &[0u8; 65], pair.public()).unwrap());
    }
}
