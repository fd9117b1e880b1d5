//! License tree enumeration and the licensing filter
//!
//! For a licensed node the processor walks its ancestor chain and collects
//! every license whose referenced node sits within the node's declared
//! distance window. A license admits the query target directly, through a
//! chain of extension licenses rooted at an owner-signed license, or — for
//! the embedding pass only — through a friend-certificate pairing.

use std::collections::HashMap;

use trellis_core::{hash_args, HashArg, Id32, PublicKey};
use trellis_model::cert::{friend, Cert, DeepValidate};
use trellis_model::sign;
use trellis_model::Node;

use crate::driver::StoredNode;

/// How a license admits the target
#[derive(Debug, Clone)]
pub enum LicenseVia {
    /// The license targets the query target directly
    Direct,
    /// A chain of extension licenses ends at the query target
    Extension,
    /// A friend-cert pairing bridges the license to the query target;
    /// grants embedding, not visibility
    Friend {
        /// The licensor's side of the pairing
        cert_a: Box<Cert>,
        /// The target's side of the pairing
        cert_b: Box<Cert>,
    },
}

/// One entry of a node's license tree
#[derive(Debug, Clone)]
pub struct LicenseEntry {
    /// The governing license row
    pub license: StoredNode,
    /// Parent-chain distance from the licensed node down to the node
    pub distance: usize,
    /// How the license reaches the target
    pub via: LicenseVia,
}

impl LicenseEntry {
    /// Whether this entry makes the node visible to the target
    pub fn grants_visibility(&self) -> bool {
        matches!(self.via, LicenseVia::Direct | LicenseVia::Extension)
    }
}

/// An ancestor on the node's parent chain, nearest first
#[derive(Debug, Clone)]
pub struct AncestorEntry {
    /// Logical id
    pub id: Id32,
    /// Effective owner, when known
    pub owner: Option<PublicKey>,
}

/// Enumerate the license tree of one node.
///
/// `ancestors` is the node's parent chain nearest-first; `licenses_by_ref`
/// maps logical ids to candidate license rows; `friend_certs` is the pool
/// of friend certificates observed during the traversal.
#[allow(clippy::too_many_arguments)]
pub fn license_tree(
    row: &StoredNode,
    ancestors: &[AncestorEntry],
    licenses_by_ref: &HashMap<Id32, Vec<StoredNode>>,
    target: Option<&PublicKey>,
    now_ms: u64,
    friend_certs: &[Cert],
) -> Vec<LicenseEntry> {
    let mut entries = Vec::new();
    let min = usize::from(row.node.license_min_distance());
    let max = usize::from(row.node.license_max_distance());

    for distance in min..=max {
        let licensed = match distance {
            0 => AncestorEntry {
                id: row.logical_id(),
                owner: row.node.effective_owner().ok().flatten(),
            },
            d => match ancestors.get(d - 1) {
                Some(entry) => entry.clone(),
                None => break,
            },
        };
        let Some(candidates) = licenses_by_ref.get(&licensed.id) else {
            continue;
        };
        for candidate in candidates {
            if let Some(entry) = evaluate_license(
                candidate,
                distance,
                &licensed,
                row,
                ancestors,
                target,
                now_ms,
                friend_certs,
            ) {
                entries.push(entry);
            }
        }
    }
    entries
}

#[allow(clippy::too_many_arguments)]
fn evaluate_license(
    candidate: &StoredNode,
    distance: usize,
    licensed: &AncestorEntry,
    row: &StoredNode,
    ancestors: &[AncestorEntry],
    target: Option<&PublicKey>,
    now_ms: u64,
    friend_certs: &[Cert],
) -> Option<LicenseEntry> {
    let license = &candidate.node;
    if !license.is_license() {
        return None;
    }
    let (ok, _) = license.validate(DeepValidate::Deep, Some(now_ms));
    if !ok || !sign::verify(license).unwrap_or(false) {
        return None;
    }
    if license.disallow_parent_licensing() && distance > 0 {
        return None;
    }
    if license.disallow_retro_licensing() {
        let (Some(lc), Some(nc)) = (license.creation_time(), row.node.creation_time()) else {
            return None;
        };
        if lc > nc {
            return None;
        }
    }
    if let Some(lock) = license.parent_path_hash() {
        if path_hash(licensed.id, distance, ancestors, row.logical_id()) != lock {
            return None;
        }
    }

    // Resolve the chain down to an owner-signed root license.
    let chain_end = resolve_extension_chain(license, licensed)?;

    let license_target = license.target_public_key()?;
    if let Some(target) = target {
        if &license_target == target {
            let via = if chain_end.extended {
                LicenseVia::Extension
            } else {
                LicenseVia::Direct
            };
            return Some(LicenseEntry {
                license: candidate.clone(),
                distance,
                via,
            });
        }
        // Friend bridging: the license stops at an intermediary but a valid
        // pairing connects the licensor to the target's side.
        if license.friend_level().unwrap_or(0) >= 1 {
            if let Some((cert_a, cert_b)) =
                find_friend_pair(license, &chain_end.root_owner, target, friend_certs)
            {
                return Some(LicenseEntry {
                    license: candidate.clone(),
                    distance,
                    via: LicenseVia::Friend {
                        cert_a: Box::new(cert_a),
                        cert_b: Box::new(cert_b),
                    },
                });
            }
        }
    }
    None
}

struct ChainEnd {
    root_owner: PublicKey,
    extended: bool,
}

/// Walk embedded extension licenses down to the owner-signed root.
///
/// Each step must consume one extension: the inner license targets the
/// outer license's owner and the outer's remaining count is strictly below
/// the inner's. The root's owner must own the licensed node.
fn resolve_extension_chain(license: &Node, licensed: &AncestorEntry) -> Option<ChainEnd> {
    let mut current = license.clone();
    let mut extended = false;
    loop {
        let owner = current.effective_owner().ok().flatten()?;
        let decoded = current.embedded().map(Node::decode);
        match decoded {
            None => {
                // Owner-signed root: the licensor must own the licensed node.
                if licensed.owner.as_ref() != Some(&owner) {
                    return None;
                }
                return Some(ChainEnd {
                    root_owner: owner,
                    extended,
                });
            }
            Some(Err(_)) => return None,
            Some(Ok(inner)) => {
                if !inner.is_license() {
                    return None;
                }
                if inner.target_public_key().as_ref() != Some(&owner) {
                    return None;
                }
                if inner.extensions() == 0 || current.extensions() >= inner.extensions() {
                    return None;
                }
                if inner.ref_id() != license.ref_id() {
                    return None;
                }
                if !sign::verify(&inner).unwrap_or(false) {
                    return None;
                }
                extended = true;
                current = inner;
            }
        }
    }
}

/// Find a verifying friend pair connecting `licensor` to `target`
fn find_friend_pair(
    license: &Node,
    licensor: &PublicKey,
    target: &PublicKey,
    friend_certs: &[Cert],
) -> Option<(Cert, Cert)> {
    let level = license.friend_level().unwrap_or(0);
    let expire = license.expire_time()?;
    for cert_a in friend_certs {
        if cert_a.owner().as_ref() != Some(licensor) {
            continue;
        }
        for cert_b in friend_certs {
            if cert_b.owner().as_ref() != Some(target) {
                continue;
            }
            if !friend::is_valid_pair(cert_a, cert_b) {
                continue;
            }
            let min_level = cert_a
                .friend_level()
                .unwrap_or(0)
                .min(cert_b.friend_level().unwrap_or(0));
            if level > min_level {
                continue;
            }
            let min_expire = cert_a
                .license_max_expire_time()
                .unwrap_or(u32::MAX)
                .min(cert_b.license_max_expire_time().unwrap_or(u32::MAX));
            if expire > min_expire {
                continue;
            }
            return Some((cert_a.clone(), cert_b.clone()));
        }
    }
    None
}

/// Path lock hash: the licensed ancestor's id folded over each step of the
/// parent chain down to the node
fn path_hash(
    licensed_id: Id32,
    distance: usize,
    ancestors: &[AncestorEntry],
    node_id: Id32,
) -> Id32 {
    let mut digest = hash_args(&[HashArg::bytes(licensed_id.as_bytes().to_vec())]);
    // Steps between the licensed ancestor and the node, top-down.
    for step in (0..distance.saturating_sub(1)).rev() {
        if let Some(entry) = ancestors.get(step) {
            digest = hash_args(&[
                HashArg::bytes(digest.to_vec()),
                HashArg::bytes(entry.id.as_bytes().to_vec()),
            ]);
        }
    }
    if distance > 0 {
        digest = hash_args(&[
            HashArg::bytes(digest.to_vec()),
            HashArg::bytes(node_id.as_bytes().to_vec()),
        ]);
    }
    Id32::from_bytes(digest)
}

/// Compute the path lock a license must carry to bind a node at the given
/// chain, for license builders
pub fn path_lock_for(chain_top_down: &[Id32]) -> Id32 {
    let mut iter = chain_top_down.iter();
    let Some(first) = iter.next() else {
        return Id32::ZERO;
    };
    let mut digest = hash_args(&[HashArg::bytes(first.as_bytes().to_vec())]);
    for id in iter {
        digest = hash_args(&[
            HashArg::bytes(digest.to_vec()),
            HashArg::bytes(id.as_bytes().to_vec()),
        ]);
    }
    Id32::from_bytes(digest)
}
