//! Constraints hashing
//!
//! A certificate pins selected fields of its target by hashing them into the
//! `constraints` field. The `lockedConfig` bitmask gates inclusion: every
//! declared lock position contributes one element, locked positions carry
//! the target field's value and unlocked positions carry the absent tag, so
//! the argument arity is fixed per target family.

use trellis_core::{hash_args, HashArg};

use crate::codec::ModelStore;
use crate::node::Node;
use crate::sign::Datamodel;

use super::{Cert, CertKind};

/// Lockable node fields, in bit order
const NODE_LOCK_FIELDS: [&str; 15] = [
    "id2",
    "parentId",
    "config",
    "network",
    "difficulty",
    "refId",
    "embedded",
    "licenseMinDistance",
    "licenseMaxDistance",
    "region",
    "jurisdiction",
    "childMinDifficulty",
    "blobHash",
    "copiedParentId",
    "copiedId1",
];

/// Additional lockable fields when the target is a license node
const LICENSE_LOCK_FIELDS: [&str; 3] = ["targetPublicKey", "extensions", "friendLevel"];

/// Lockable cert fields, in bit order, for cert-on-cert constraints
const CERT_LOCK_FIELDS: [&str; 6] = [
    "targetPublicKeys",
    "config",
    "targetType",
    "maxChainLength",
    "multiSigThreshold",
    "targetMaxExpireTime",
];

fn locked_args(mask: u32, fields: &[&str], store: &ModelStore) -> Vec<HashArg> {
    let mut args = Vec::with_capacity(fields.len());
    for (bit, name) in fields.iter().enumerate() {
        let locked = mask & (1 << bit) != 0;
        let value = store.get_raw(name).filter(|_| locked);
        match (value, store.schema().by_name(name)) {
            (Some(payload), Some(spec)) => args.push(spec.kind.hash_arg(payload)),
            _ => args.push(HashArg::Absent),
        }
    }
    args
}

/// Compute the constraints hash a cert requires of a node target
pub fn constraints_on_node(cert: &Cert, node: &Node) -> [u8; 32] {
    let mask = cert.locked_config().unwrap_or(0);
    let mut args = locked_args(mask, &NODE_LOCK_FIELDS, node.store());
    if cert.kind() == CertKind::License {
        let license_mask = mask >> NODE_LOCK_FIELDS.len();
        args.extend(locked_args(license_mask, &LICENSE_LOCK_FIELDS, node.store()));
    }
    hash_args(&args)
}

/// Compute the constraints hash a cert requires of a cert target
pub fn constraints_on_cert(cert: &Cert, target: &Cert) -> [u8; 32] {
    let mask = cert.locked_config().unwrap_or(0);
    hash_args(&locked_args(mask, &CERT_LOCK_FIELDS, target.store()))
}

/// Lock bit helper: the mask bit for a node field name
pub fn node_lock_bit(field: &str) -> Option<u32> {
    NODE_LOCK_FIELDS
        .iter()
        .position(|f| *f == field)
        .or_else(|| {
            LICENSE_LOCK_FIELDS
                .iter()
                .position(|f| *f == field)
                .map(|p| p + NODE_LOCK_FIELDS.len())
        })
        .map(|bit| 1u32 << bit)
}
