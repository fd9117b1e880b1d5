//! License extension embedding
//!
//! A license with remaining extensions can be re-granted: the processor
//! produces an *unsigned* license node owned by the querier that embeds the
//! original license image with one fewer extension. The caller signs and
//! stores it. Friend-certificate pairings let an intermediary bridge a
//! license to the other paired party without either side sharing keys.

use trellis_core::{PublicKey, Result, TrellisError};
use trellis_model::cert::{friend, Cert};
use trellis_model::{ExportView, Node, NodeKind};

use crate::driver::StoredNode;

/// Build an unsigned extension of `original` from `source` to `target`.
///
/// The extension sits under the original's parent, references the same
/// licensed node, embeds the original image and decrements the remaining
/// extension count.
pub fn build_extension(
    original: &StoredNode,
    source: &PublicKey,
    target: &PublicKey,
    now_seconds: u32,
) -> Result<Node> {
    let license = &original.node;
    if !license.is_license() {
        return Err(TrellisError::invalid("only licenses can be extended"));
    }
    if license.extensions() == 0 {
        return Err(TrellisError::invalid("license has no extensions left"));
    }
    if license.target_public_key().as_ref() != Some(source) {
        return Err(TrellisError::invalid(
            "only the license target may extend it",
        ));
    }

    let mut extension = Node::new(NodeKind::License);
    extension.set_parent_id(
        license
            .parent_id()
            .ok_or_else(|| TrellisError::invalid("license without parentId"))?,
    )?;
    extension.set_owner(source)?;
    extension.set_ref_id(
        license
            .ref_id()
            .ok_or_else(|| TrellisError::invalid("license without refId"))?,
    )?;
    extension.set_target_public_key(target)?;
    extension.set_extensions(license.extensions() - 1)?;
    extension.set_config(license.config().unwrap_or(0))?;
    if let Some(level) = license.friend_level() {
        extension.set_friend_level(level)?;
    }
    extension.set_creation_time(now_seconds)?;
    extension.set_expire_time(
        license
            .expire_time()
            .ok_or_else(|| TrellisError::invalid("license without expireTime"))?,
    )?;
    extension.set_embedded(&license.export(ExportView::Stored))?;
    Ok(extension)
}

/// Bridge a license through a friend-cert pairing.
///
/// `license` targets the intermediary (`source`); `cert_a` belongs to the
/// licensor's side and `cert_b` to the recipient's. On success the returned
/// unsigned extension targets `cert_b`'s owner, carries both certs, and its
/// expiry is clamped to the pairing's bounds.
pub fn apply_friend_certs(
    license: &StoredNode,
    cert_a: &Cert,
    cert_b: &Cert,
    source: &PublicKey,
    now_seconds: u32,
) -> Result<Node> {
    if !friend::is_valid_pair(cert_a, cert_b) {
        return Err(TrellisError::invalid("friend certs do not pair"));
    }
    let level = license.node.friend_level().unwrap_or(0);
    if level == 0 {
        return Err(TrellisError::invalid("license does not allow friend bridging"));
    }
    let min_level = cert_a
        .friend_level()
        .unwrap_or(0)
        .min(cert_b.friend_level().unwrap_or(0));
    if level > min_level {
        return Err(TrellisError::invalid("friend level exceeds the pairing's"));
    }
    let expire = license
        .node
        .expire_time()
        .ok_or_else(|| TrellisError::invalid("license without expireTime"))?;
    let min_expire = cert_a
        .license_max_expire_time()
        .unwrap_or(u32::MAX)
        .min(cert_b.license_max_expire_time().unwrap_or(u32::MAX));
    if expire > min_expire {
        return Err(TrellisError::invalid(
            "license outlives the pairing's expiry bound",
        ));
    }
    let target = cert_b
        .owner()
        .ok_or_else(|| TrellisError::invalid("friend cert without owner"))?;

    let mut extension = build_extension(license, source, &target, now_seconds)?;
    extension.set_friend_cert_a(cert_a)?;
    extension.set_friend_cert_b(cert_b)?;
    Ok(extension)
}
