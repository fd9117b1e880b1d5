//! Certificate validation
//!
//! Validation is data, not an error path: every rule failure returns
//! `(false, reason)` with the first failing rule's human-readable reason.

use trellis_core::constants::MAX_CERT_CHAIN_LENGTH;

use crate::node::Node;
use crate::sign::{self, Datamodel};

use super::{constraints, Cert};

/// Depth of a validation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeepValidate {
    /// This cert only; no recursion into the embedded chain
    Shallow,
    /// Recurse into the embedded chain, all rules
    Deep,
    /// Recurse, but skip the signature-count rule (used mid-signing)
    MidSigning,
}

fn fail(reason: impl Into<String>) -> (bool, String) {
    (false, reason.into())
}

impl Cert {
    /// Validate this certificate.
    ///
    /// `at_time_ms` pins the validity-window check to a caller-supplied
    /// time; omitted means the window is not checked.
    pub fn validate(&self, deep: DeepValidate, at_time_ms: Option<u64>) -> (bool, String) {
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
        let has_embedded = self.store().get_raw("cert").is_some();
        if has_owner == has_embedded {
            return fail("exactly one of owner and embedded cert required");
        }
        if has_owner && self.owner().is_none() {
            return fail("owner public key length unsupported");
        }

        let keys = match self.target_public_keys() {
            Ok(keys) => keys,
            Err(e) => return fail(e.to_string()),
        };
        if keys.is_empty() {
            return fail("targetPublicKeys must not be empty");
        }

        match self.multi_sig_threshold() {
            Some(0) => return fail("threshold of zero"),
            Some(1) => return fail("threshold of one must be implicit"),
            Some(t) if usize::from(t) > keys.len() => {
                return fail("threshold exceeds eligible signers");
            }
            _ => {}
        }

        if self.online_validated() && !self.has_online_validation() {
            return fail("onlineValidated without hasOnlineValidation");
        }
        if self.online_cert_online() && !self.has_online_cert() {
            return fail("onlineCertOnline without hasOnlineCert");
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

        if deep != DeepValidate::Shallow && has_embedded {
            let child = match self.embedded_cert() {
                Ok(Some(child)) => child,
                Ok(None) => return fail("embedded cert not decodable"),
                Err(e) => return fail(format!("embedded cert not decodable: {e}")),
            };
            if !self.kind().accepts_embedded(child.kind()) {
                return fail("embedded cert kind not embeddable here");
            }
            if !child.accepts_target(self.kind().prefix()) {
                return fail("embedded cert does not accept this target type");
            }
            if let Some(child_creation) = child.creation_time() {
                if child_creation > creation {
                    return fail("embedded cert created after its target");
                }
            }
            if let Some(child_expire) = child.expire_time() {
                if creation > child_expire {
                    return fail("target created after embedded cert expires");
                }
            }
            if let Some(max_expire) = child.target_max_expire_time() {
                if expire > max_expire {
                    return fail("target outlives embedded cert's expire bound");
                }
            }
            if child.constraints().is_some() {
                let computed = constraints::constraints_on_cert(&child, self);
                if child.constraints() != Some(computed) {
                    return fail("constraints hash mismatch on embedded cert");
                }
            }

            match self.chain_within_limits() {
                Ok(true) => {}
                Ok(false) => return fail("certificate chain exceeds declared length"),
                Err(e) => return fail(e.to_string()),
            }

            let (ok, reason) = child.validate(DeepValidate::Deep, at_time_ms);
            if !ok {
                return fail(format!("embedded cert invalid: {reason}"));
            }
        }

        (true, String::new())
    }

    /// Check every chain member allows the certs stacked above it
    fn chain_within_limits(&self) -> trellis_core::Result<bool> {
        let mut chain = vec![self.clone()];
        while let Some(child) = chain.last().map(Cert::embedded_cert).transpose()?.flatten() {
            chain.push(child);
        }
        if chain.len() > usize::from(MAX_CERT_CHAIN_LENGTH) {
            return Ok(false);
        }
        for (above, cert) in chain.iter().enumerate().skip(1) {
            if usize::from(cert.max_chain_length()) < above {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Validate this cert against the node that carries it
    pub fn validate_against_node(&self, node: &Node) -> (bool, String) {
        if !self.accepts_target(node.kind().prefix()) {
            return fail("cert does not accept this node type");
        }
        let (Some(creation), Some(expire)) = (node.creation_time(), node.expire_time()) else {
            return fail("node missing time window");
        };
        if let Some(cert_creation) = self.creation_time() {
            if cert_creation > creation {
                return fail("cert created after its target node");
            }
        }
        if let Some(cert_expire) = self.expire_time() {
            if creation > cert_expire {
                return fail("node created after cert expires");
            }
        }
        if let Some(max_expire) = self.target_max_expire_time() {
            if expire > max_expire {
                return fail("node outlives cert's expire bound");
            }
        }
        if self.constraints().is_some() {
            let computed = constraints::constraints_on_node(self, node);
            if self.constraints() != Some(computed) {
                return fail("constraints hash mismatch on node");
            }
        }
        (true, String::new())
    }
}
