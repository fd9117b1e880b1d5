//! Node validation
//!
//! Mirrors the certificate rule list, then adds node-specific rules: parent
//! presence, license-distance ordering, license field completeness, destroy
//! node well-formedness, and deep validation of the attached cert chain and
//! embedded image.

use trellis_core::constants::{
    DESTROY_CERT, DESTROY_FRIEND_CERT, DESTROY_LICENSES_FOR_NODE, DESTROY_LICENSES_FOR_TARGET,
    DESTROY_LICENSES_FOR_TARGET_AND_NODE, DESTROY_NODE, DESTROY_SELF_TOTAL,
    MIN_DIFFICULTY_TOTAL_DESTRUCTION,
};

use crate::cert::DeepValidate;
use crate::interface;
use crate::sign::{self, Datamodel};

use super::{Node, NodeKind};

/// Every destroy topic a special data node may carry
const DESTROY_TOPICS: [&str; 7] = [
    DESTROY_SELF_TOTAL,
    DESTROY_NODE,
    DESTROY_CERT,
    DESTROY_FRIEND_CERT,
    DESTROY_LICENSES_FOR_NODE,
    DESTROY_LICENSES_FOR_TARGET,
    DESTROY_LICENSES_FOR_TARGET_AND_NODE,
];

fn fail(reason: impl Into<String>) -> (bool, String) {
    (false, reason.into())
}

impl Node {
    /// Validate this node.
    ///
    /// `at_time_ms` pins the validity-window check to a caller-supplied
    /// time; omitted means the window is not checked.
    pub fn validate(&self, deep: DeepValidate, at_time_ms: Option<u64>) -> (bool, String) {
        if self.parent_id().is_none() {
            return fail("missing parentId");
        }

        let Some(creation) = self.creation_time() else {
            return fail("missing creationTime");
        };
        let Some(expire) = self.expire_time() else {
            return fail("missing expireTime");
        };
        if creation > expire {
            return fail("creationTime exceeds expireTime");
        }
        if let Some(at) = at_time_ms {
            let at_seconds = at / 1000;
            if at_seconds < u64::from(creation) || at_seconds > u64::from(expire) {
                return fail("outside validity window");
            }
        }

        if self.config().is_none() {
            return fail("missing config");
        }

        let has_owner = self.store().get_raw("owner").is_some();
        let has_cert = self.store().get_raw("cert").is_some();
        if has_owner == has_cert {
            return fail("exactly one of owner and cert required");
        }
        if has_owner && self.owner().is_none() {
            return fail("owner public key length unsupported");
        }

        if self.license_min_distance() > self.license_max_distance() {
            return fail("licenseMinDistance exceeds licenseMaxDistance");
        }

        if self.is_license() {
            if self.ref_id().is_none() {
                return fail("license missing refId");
            }
            if self.target_public_key().is_none() {
                return fail("license missing targetPublicKey");
            }
        }

        if self.is_special() {
            let Some(topic) = self.data().and_then(|d| std::str::from_utf8(d).ok()) else {
                return fail("special node carries no destroy topic");
            };
            if !DESTROY_TOPICS.contains(&topic) {
                return fail("unknown destroy topic");
            }
            if self.ref_id().is_none() {
                return fail("destroy node missing refId");
            }
            if topic == DESTROY_SELF_TOTAL
                && self.difficulty().unwrap_or(0) < MIN_DIFFICULTY_TOTAL_DESTRUCTION
            {
                return fail("total destruction requires higher difficulty");
            }
        }

        if self.online_validated() && !self.has_online_validation() {
            return fail("onlineValidated without hasOnlineValidation");
        }

        if deep != DeepValidate::MidSigning {
            let entries = match sign::extract_signatures(self) {
                Ok(entries) => entries,
                Err(e) => return fail(e.to_string()),
            };
            let required = match self.required_signatures() {
                Ok(required) => required,
                Err(e) => return fail(e.to_string()),
            };
            if entries.len() != required {
                return fail(format!(
                    "signature count mismatch: {} of {required}",
                    entries.len()
                ));
            }
        }

        if deep != DeepValidate::Shallow {
            if has_cert {
                let cert = match self.attached_cert() {
                    Ok(Some(cert)) => cert,
                    Ok(None) => return fail("cert not decodable"),
                    Err(e) => return fail(format!("cert not decodable: {e}")),
                };
                let (ok, reason) = cert.validate(DeepValidate::Deep, at_time_ms);
                if !ok {
                    return fail(format!("cert invalid: {reason}"));
                }
                let (ok, reason) = cert.validate_against_node(self);
                if !ok {
                    return fail(reason);
                }
            }
            if let Some(image) = self.embedded() {
                if let Err(e) = interface::decode_any(image) {
                    return fail(format!("embedded image not decodable: {e}"));
                }
            }
        }

        (true, String::new())
    }

    /// Child admission against this node's declared difficulty floor
    pub fn accepts_child_difficulty(&self, child: &Node) -> bool {
        match self.child_min_difficulty() {
            Some(floor) => child.difficulty().unwrap_or(0) >= floor,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::schema;
    use trellis_core::{Id32, KeyPair};

    fn base_node(kind: NodeKind, seed: u8) -> (Node, KeyPair) {
        let owner = KeyPair::ed25519_from_seed([seed; 32]);
        let mut node = Node::new(kind);
        node.set_parent_id(Id32::from_bytes([1u8; 32])).unwrap();
        node.set_owner(owner.public()).unwrap();
        node.set_config(schema::CONFIG_PUBLIC).unwrap();
        node.set_creation_time(1_000).unwrap();
        node.set_expire_time(11_000).unwrap();
        (node, owner)
    }

    #[test]
    fn signed_data_node_validates() {
        let (mut node, owner) = base_node(NodeKind::Data, 1);
        sign::sign(&mut node, &owner).unwrap();
        let (ok, reason) = node.validate(DeepValidate::Deep, Some(5_000_000));
        assert!(ok, "{reason}");
    }

    #[test]
    fn unsigned_node_fails_count() {
        let (node, _) = base_node(NodeKind::Data, 2);
        let (ok, reason) = node.validate(DeepValidate::Deep, None);
        assert!(!ok);
        assert!(reason.contains("signature count"));
        // Mid-signing skips the count rule.
        let (ok, _) = node.validate(DeepValidate::MidSigning, None);
        assert!(ok);
    }

    #[test]
    fn license_requires_ref_and_target() {
        let (mut node, owner) = base_node(NodeKind::License, 3);
        sign::sign(&mut node, &owner).unwrap();
        let (ok, reason) = node.validate(DeepValidate::Deep, None);
        assert!(!ok);
        assert!(reason.contains("refId"));
    }

    #[test]
    fn inverted_license_distances_rejected() {
        let (mut node, _) = base_node(NodeKind::Data, 4);
        node.set_license_min_distance(3).unwrap();
        node.set_license_max_distance(1).unwrap();
        let (ok, reason) = node.validate(DeepValidate::MidSigning, None);
        assert!(!ok);
        assert!(reason.contains("licenseMinDistance"));
    }

    #[test]
    fn destroy_node_difficulty_floor() {
        let (mut node, _) = base_node(NodeKind::Data, 5);
        node.set_special(true).unwrap();
        node.set_data(DESTROY_SELF_TOTAL.as_bytes()).unwrap();
        node.set_ref_id(Id32::from_bytes([7u8; 32])).unwrap();
        node.set_difficulty(1).unwrap();
        let (ok, reason) = node.validate(DeepValidate::MidSigning, None);
        assert!(!ok);
        assert!(reason.contains("difficulty"));
        node.set_difficulty(2).unwrap();
        let (ok, _) = node.validate(DeepValidate::MidSigning, None);
        assert!(ok);
    }

    #[test]
    fn unknown_destroy_topic_rejected() {
        let (mut node, _) = base_node(NodeKind::Data, 6);
        node.set_special(true).unwrap();
        node.set_data(b"special/destroy/other").unwrap();
        node.set_ref_id(Id32::from_bytes([7u8; 32])).unwrap();
        let (ok, reason) = node.validate(DeepValidate::MidSigning, None);
        assert!(!ok);
        assert!(reason.contains("topic"));
    }
}
