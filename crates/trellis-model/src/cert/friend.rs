//! Friend-certificate pairing
//!
//! Two friend certs bind their owners under one symmetric constraints hash:
//! each side hashes its own `(owner, salt, friendLevel, licenseMaxExpireTime)`
//! tuple, the two digests are sorted byte-lexicographically and hashed
//! together. Sorting makes the pairing order-independent, so either side can
//! compute the shared hash without knowing which cert was minted first.

use trellis_core::{hash_args, HashArg};

use super::{Cert, CertKind};

/// Digest of one friend cert's pairing properties
fn side_digest(cert: &Cert) -> [u8; 32] {
    let owner = cert.owner().map(|k| k.to_vec());
    hash_args(&[
        HashArg::opt_bytes(owner.as_deref()),
        HashArg::opt_bytes(cert.salt()),
        HashArg::opt_uint8(cert.friend_level()),
        HashArg::opt_uint32_be(cert.license_max_expire_time()),
    ])
}

/// The symmetric pairing constraints of two friend certs
pub fn pairing_constraints(a: &Cert, b: &Cert) -> [u8; 32] {
    let mut sides = [side_digest(a), side_digest(b)];
    sides.sort();
    hash_args(&[
        HashArg::bytes(sides[0].to_vec()),
        HashArg::bytes(sides[1].to_vec()),
    ])
}

/// Check two friend certs form a valid pair: both are friend certs, both
/// declare the symmetric constraints hash, and both verify.
pub fn is_valid_pair(a: &Cert, b: &Cert) -> bool {
    if a.kind() != CertKind::Friend || b.kind() != CertKind::Friend {
        return false;
    }
    let expected = pairing_constraints(a, b);
    if a.constraints() != Some(expected) || b.constraints() != Some(expected) {
        return false;
    }
    a.verify().unwrap_or(false) && b.verify().unwrap_or(false)
}
