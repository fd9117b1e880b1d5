//! Ed25519 signing and verification

use ed25519_dalek::Signer;

/// Sign a message with an Ed25519 seed, producing a 64-byte detached signature
pub fn sign(message: &[u8], seed: &[u8; 32]) -> [u8; 64] {
    let key = ed25519_dalek::SigningKey::from_bytes(seed);
    key.sign(message).to_bytes()
}

/// Verify a detached Ed25519 signature
pub fn verify(message: &[u8], signature: &[u8; 64], public_key: &[u8; 32]) -> bool {
    let Ok(pk) = ed25519_dalek::VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(signature);
    pk.verify_strict(message, &sig).is_ok()
}

/// Derive the verifying key bytes from a seed
pub fn public_key_from_seed(seed: &[u8; 32]) -> [u8; 32] {
    ed25519_dalek::SigningKey::from_bytes(seed)
        .verifying_key()
        .to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let seed = [3u8; 32];
        let pk = public_key_from_seed(&seed);
        let sig = sign(b"msg", &seed);
        assert!(verify(b"msg", &sig, &pk));
        assert!(!verify(b"other", &sig, &pk));
    }

    #[test]
    fn tampered_signature_fails() {
        let seed = [4u8; 32];
        let pk = public_key_from_seed(&seed);
        let mut sig = sign(b"msg", &seed);
        sig[0] ^= 0x01;
        assert!(!verify(b"msg", &sig, &pk));
    }
}
