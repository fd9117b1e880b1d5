//! Destroy-hash subsystem
//!
//! Destructible datamodels emit *achilles hashes*: content-addressed match
//! points a later destroy node can strike. Every hash is the outer form
//! `H(topic, owner, inner)` where `inner` is the hash a destroy node carries
//! in its `refId`. Binding the owner into the outer hash means only destroy
//! nodes signed by the same owner can match.

use trellis_core::constants::{
    DESTROY_CERT, DESTROY_LICENSES_FOR_NODE, DESTROY_LICENSES_FOR_TARGET,
    DESTROY_LICENSES_FOR_TARGET_AND_NODE, DESTROY_NODE, DESTROY_SELF_TOTAL,
    MIN_DIFFICULTY_TOTAL_DESTRUCTION,
};
use trellis_core::{hash_args, HashArg, Id32, Result};

use crate::cert::Cert;
use crate::node::Node;
use crate::sign::Datamodel;

/// Inner hash for self-total destruction: `H(topic, owner)`
pub fn self_total_inner(owner: &[u8]) -> Id32 {
    Id32::from_bytes(hash_args(&[
        HashArg::str(DESTROY_SELF_TOTAL),
        HashArg::bytes(owner.to_vec()),
    ]))
}

fn outer(topic: &str, owner: &[u8], inner: Id32) -> Id32 {
    Id32::from_bytes(hash_args(&[
        HashArg::str(topic),
        HashArg::bytes(owner.to_vec()),
        HashArg::bytes(inner.to_bytes().to_vec()),
    ]))
}

fn inner_over_id(topic: &str, owner: &[u8], id: Id32) -> Id32 {
    Id32::from_bytes(hash_args(&[
        HashArg::str(topic),
        HashArg::bytes(owner.to_vec()),
        HashArg::bytes(id.to_bytes().to_vec()),
    ]))
}

fn inner_over_key(topic: &str, owner: &[u8], key: &[u8]) -> Id32 {
    Id32::from_bytes(hash_args(&[
        HashArg::str(topic),
        HashArg::bytes(owner.to_vec()),
        HashArg::bytes(key.to_vec()),
    ]))
}

fn inner_over_key_and_id(topic: &str, owner: &[u8], key: &[u8], id: Id32) -> Id32 {
    Id32::from_bytes(hash_args(&[
        HashArg::str(topic),
        HashArg::bytes(owner.to_vec()),
        HashArg::bytes(key.to_vec()),
        HashArg::bytes(id.to_bytes().to_vec()),
    ]))
}

/// Achilles hashes a destructible node exposes
pub fn node_achilles_hashes(node: &Node) -> Result<Vec<Id32>> {
    if node.is_indestructible() {
        return Ok(Vec::new());
    }
    let Some(owner) = node.effective_owner()? else {
        return Ok(Vec::new());
    };
    let owner = owner.to_vec();
    let id1 = node.id1()?;

    let mut hashes = vec![
        outer(DESTROY_SELF_TOTAL, &owner, self_total_inner(&owner)),
        outer(DESTROY_NODE, &owner, inner_over_id(DESTROY_NODE, &owner, id1)),
    ];
    if node.is_license() {
        if let Some(ref_id) = node.ref_id() {
            hashes.push(outer(
                DESTROY_LICENSES_FOR_NODE,
                &owner,
                inner_over_id(DESTROY_LICENSES_FOR_NODE, &owner, ref_id),
            ));
            if let Some(target) = node.target_public_key() {
                hashes.push(outer(
                    DESTROY_LICENSES_FOR_TARGET,
                    &owner,
                    inner_over_key(DESTROY_LICENSES_FOR_TARGET, &owner, target.as_bytes()),
                ));
                hashes.push(outer(
                    DESTROY_LICENSES_FOR_TARGET_AND_NODE,
                    &owner,
                    inner_over_key_and_id(
                        DESTROY_LICENSES_FOR_TARGET_AND_NODE,
                        &owner,
                        target.as_bytes(),
                        ref_id,
                    ),
                ));
            }
        }
    }
    // Embedded destructible certs contribute their own hashes.
    if let Ok(Some(cert)) = node.attached_cert() {
        hashes.extend(cert_achilles_hashes(&cert)?);
    }
    Ok(hashes)
}

/// Achilles hashes a destructible certificate exposes
pub fn cert_achilles_hashes(cert: &Cert) -> Result<Vec<Id32>> {
    if cert.is_indestructible() {
        return Ok(Vec::new());
    }
    let Some(owner) = cert.issuer()? else {
        return Ok(Vec::new());
    };
    let owner = owner.to_vec();

    let mut hashes = vec![outer(DESTROY_SELF_TOTAL, &owner, self_total_inner(&owner))];
    if let Ok(id1) = cert.id1() {
        hashes.push(outer(
            DESTROY_CERT,
            &owner,
            inner_over_id(DESTROY_CERT, &owner, id1),
        ));
    }
    if let Some(child) = cert.embedded_cert()? {
        hashes.extend(cert_achilles_hashes(&child)?);
    }
    Ok(hashes)
}

/// The achilles hash a destroy node strikes, when it is well-formed.
///
/// The destroy node's `refId` carries the inner hash; the match point is
/// the outer hash under the destroy node's own owner.
pub fn destroy_match_hash(node: &Node) -> Result<Option<Id32>> {
    if !node.is_special() {
        return Ok(None);
    }
    let Some(topic) = node.data().and_then(|d| std::str::from_utf8(d).ok()) else {
        return Ok(None);
    };
    let Some(inner) = node.ref_id() else {
        return Ok(None);
    };
    let Some(owner) = node.effective_owner()? else {
        return Ok(None);
    };
    if topic == DESTROY_SELF_TOTAL
        && node.difficulty().unwrap_or(0) < MIN_DIFFICULTY_TOTAL_DESTRUCTION
    {
        return Ok(None);
    }
    Ok(Some(outer(topic, &owner.to_vec(), inner)))
}
