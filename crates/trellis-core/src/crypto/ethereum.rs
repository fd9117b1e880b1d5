//! Ethereum-style recoverable ECDSA
//!
//! Messages are wrapped in the `\x19Ethereum Signed Message:\n<len>` prefix
//! and digested with Keccak-256 before signing. The stored "public key" is
//! the 20-byte address; verification recovers the full key from the
//! signature and compares its derived address.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};

use crate::hash::keccak256;
use crate::{Result, TrellisError};

/// Keccak digest of the prefixed message
pub fn prefixed_digest(message: &[u8]) -> [u8; 32] {
    let mut data = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
    data.extend_from_slice(message);
    keccak256(&data)
}

/// Derive the 20-byte address from a verifying key
pub fn address_from_verifying_key(key: &VerifyingKey) -> [u8; 20] {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 uncompressed marker; the address is the last 20 bytes
    // of the keccak of the 64-byte key body.
    let digest = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&digest[12..]);
    address
}

/// Derive the address for a secret scalar
pub fn address_from_secret(secret: &[u8; 32]) -> Result<[u8; 20]> {
    let key = SigningKey::from_slice(secret)
        .map_err(|e| TrellisError::crypto(format!("invalid secp256k1 secret: {e}")))?;
    Ok(address_from_verifying_key(key.verifying_key()))
}

/// Sign a message, producing `r ‖ s ‖ v` with `v ∈ {0, 1}`
pub fn sign(message: &[u8], secret: &[u8; 32]) -> Result<[u8; 65]> {
    let key = SigningKey::from_slice(secret)
        .map_err(|e| TrellisError::crypto(format!("invalid secp256k1 secret: {e}")))?;
    let digest = prefixed_digest(message);
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(&digest)
        .map_err(|e| TrellisError::crypto(format!("ecdsa signing failed: {e}")))?;
    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&signature.to_bytes());
    out[64] = recovery_id.to_byte();
    Ok(out)
}

/// Recover the signer's address from a message and signature
pub fn recover(message: &[u8], signature: &[u8; 65]) -> Option<[u8; 20]> {
    // Accept both the raw recovery id and the legacy 27/28 notation.
    let v = match signature[64] {
        v @ 0..=3 => v,
        v @ 27..=30 => v - 27,
        _ => return None,
    };
    let recovery_id = RecoveryId::from_byte(v)?;
    let sig = Signature::from_slice(&signature[..64]).ok()?;
    let digest = prefixed_digest(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id).ok()?;
    Some(address_from_verifying_key(&key))
}

/// Verify a signature by recovery and address comparison
pub fn verify(message: &[u8], signature: &[u8; 65], address: &[u8]) -> bool {
    match recover(message, signature) {
        Some(recovered) => recovered.as_slice() == address,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_recover_roundtrip() {
        let secret = [5u8; 32];
        let address = address_from_secret(&secret).unwrap();
        let sig = sign(b"payload", &secret).unwrap();
        assert_eq!(recover(b"payload", &sig), Some(address));
        assert!(verify(b"payload", &sig, &address));
    }

    #[test]
    fn wrong_message_recovers_different_address() {
        let secret = [6u8; 32];
        let address = address_from_secret(&secret).unwrap();
        let sig = sign(b"payload", &secret).unwrap();
        assert!(!verify(b"other payload", &sig, &address));
    }

    #[test]
    fn legacy_v_notation_accepted() {
        let secret = [8u8; 32];
        let address = address_from_secret(&secret).unwrap();
        let mut sig = sign(b"payload", &secret).unwrap();
        sig[64] += 27;
        assert!(verify(b"payload", &sig, &address));
    }

    #[test]
    fn prefix_is_part_of_the_digest() {
        // The raw keccak of the message must not verify; only the prefixed
        // form is signed.
        let a = prefixed_digest(b"x");
        let b = keccak256(b"x");
        assert_ne!(a, b);
    }
}
