//! Certificate layer
//!
//! A certificate confers signing rights on its target keys. Certificates
//! stack: an outer cert may embed exactly one child cert, the issuer is the
//! owner of the innermost cert, and the eligible signers of any datamodel
//! are the target keys of its innermost cert (or the owner when no cert is
//! embedded). Multi-signature thresholds, constraints hashing, online bits
//! and destroy hashes all live at this layer.

pub mod constraints;
pub mod friend;
pub mod schema;
mod validate;

use trellis_core::{PublicKey, Result, TrellisError};

use crate::codec::{ExportView, ModelSchema, ModelStore};
use crate::interface::{InterfaceHeader, InterfacePrefix, PRIMARY_CERT};
use crate::sign::{self, Datamodel};

pub use validate::DeepValidate;

/// Certificate kinds, keyed by interface prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertKind {
    /// Embeddable chain certificate
    Chain,
    /// Certifies data nodes
    Data,
    /// Certifies license nodes
    License,
    /// Certifies session authentication
    Auth,
    /// One half of a symmetric friend pairing
    Friend,
}

impl CertKind {
    /// Every certificate kind
    pub const ALL: [CertKind; 5] = [
        CertKind::Chain,
        CertKind::Data,
        CertKind::License,
        CertKind::Auth,
        CertKind::Friend,
    ];

    /// The schema of this kind
    pub fn schema(&self) -> &'static ModelSchema {
        match self {
            CertKind::Chain => &schema::CHAIN_CERT_SCHEMA,
            CertKind::Data => &schema::DATA_CERT_SCHEMA,
            CertKind::License => &schema::LICENSE_CERT_SCHEMA,
            CertKind::Auth => &schema::AUTH_CERT_SCHEMA,
            CertKind::Friend => &schema::FRIEND_CERT_SCHEMA,
        }
    }

    /// The interface header of this kind
    pub fn header(&self) -> InterfaceHeader {
        self.schema().header
    }

    /// The 4-byte interface prefix of this kind
    pub fn prefix(&self) -> InterfacePrefix {
        self.header().prefix()
    }

    /// Resolve a kind from an image prefix
    pub fn from_prefix(prefix: InterfacePrefix) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.prefix() == prefix)
    }

    /// Which kinds this kind may embed; only chain certs stack
    pub fn accepts_embedded(&self, child: CertKind) -> bool {
        matches!(child, CertKind::Chain)
    }
}

/// A certificate of any kind over its decoded field store
#[derive(Debug, Clone)]
pub struct Cert {
    kind: CertKind,
    store: ModelStore,
}

impl Cert {
    /// Create an empty, unsigned certificate
    pub fn new(kind: CertKind) -> Self {
        Self {
            kind,
            store: ModelStore::new(kind.schema()),
        }
    }

    /// Decode a certificate image, preserving any transient records
    pub fn decode(image: &[u8]) -> Result<Self> {
        let prefix = InterfacePrefix::of_image(image)?;
        let kind = CertKind::from_prefix(prefix).ok_or_else(|| {
            TrellisError::decode("header", format!("not a certificate interface: {prefix:?}"))
        })?;
        Ok(Self {
            kind,
            store: ModelStore::load(kind.schema(), image, true)?,
        })
    }

    /// This certificate's kind
    pub fn kind(&self) -> CertKind {
        self.kind
    }

    /// True when the image prefix belongs to a certificate
    pub fn is_cert_image(image: &[u8]) -> bool {
        InterfacePrefix::of_image(image)
            .map(|p| p.0[..2] == PRIMARY_CERT.to_be_bytes())
            .unwrap_or(false)
    }

    /// Serialize the selected view
    pub fn export(&self, view: ExportView) -> Vec<u8> {
        self.store.export(view)
    }

    // ─── Field accessors ────────────────────────────────────────────────

    /// Owner (issuer) of a root certificate
    pub fn owner(&self) -> Option<PublicKey> {
        self.store
            .get_raw("owner")
            .and_then(|b| PublicKey::from_bytes(b.to_vec()).ok())
    }

    /// Set the owner
    pub fn set_owner(&mut self, owner: &PublicKey) -> Result<()> {
        self.store.set_raw("owner", owner.to_vec())
    }

    /// The certified target keys, decoded from the length-prefixed list
    pub fn target_public_keys(&self) -> Result<Vec<PublicKey>> {
        let Some(payload) = self.store.get_raw("targetPublicKeys") else {
            return Ok(Vec::new());
        };
        decode_key_list(payload)
    }

    /// Set the certified target keys
    pub fn set_target_public_keys(&mut self, keys: &[PublicKey]) -> Result<()> {
        self.store.set_raw("targetPublicKeys", encode_key_list(keys))
    }

    /// Raw config bits
    pub fn config(&self) -> Option<u16> {
        self.store.get_u16_le("config")
    }

    /// Set raw config bits
    pub fn set_config(&mut self, config: u16) -> Result<()> {
        self.store.set_u16_le("config", config)
    }

    fn config_bit(&self, bit: u16) -> bool {
        self.config().map(|c| c & bit != 0).unwrap_or(false)
    }

    fn set_config_bit(&mut self, bit: u16, on: bool) -> Result<()> {
        let mut config = self.config().unwrap_or(0);
        if on {
            config |= bit;
        } else {
            config &= !bit;
        }
        self.set_config(config)
    }

    /// The cert ignores destroy hashes
    pub fn is_indestructible(&self) -> bool {
        self.config_bit(schema::CONFIG_INDESTRUCTIBLE)
    }

    /// Mark the cert indestructible
    pub fn set_indestructible(&mut self, on: bool) -> Result<()> {
        self.set_config_bit(schema::CONFIG_INDESTRUCTIBLE, on)
    }

    /// Validity additionally requires online validation
    pub fn has_online_validation(&self) -> bool {
        self.config_bit(schema::CONFIG_HAS_ONLINE_VALIDATION)
    }

    /// Require online validation
    pub fn set_has_online_validation(&mut self, on: bool) -> Result<()> {
        self.set_config_bit(schema::CONFIG_HAS_ONLINE_VALIDATION, on)
    }

    /// Validity additionally requires an online cert check
    pub fn has_online_cert(&self) -> bool {
        self.config_bit(schema::CONFIG_HAS_ONLINE_CERT)
    }

    /// Require an online cert check
    pub fn set_has_online_cert(&mut self, on: bool) -> Result<()> {
        self.set_config_bit(schema::CONFIG_HAS_ONLINE_CERT, on)
    }

    /// Locked-field bitmask driving the constraints hash
    pub fn locked_config(&self) -> Option<u32> {
        self.store.get_u32_be("lockedConfig")
    }

    /// Set the locked-field bitmask
    pub fn set_locked_config(&mut self, mask: u32) -> Result<()> {
        self.store.set_u32_be("lockedConfig", mask)
    }

    /// Creation time in seconds
    pub fn creation_time(&self) -> Option<u32> {
        self.store.get_u32_be("creationTime")
    }

    /// Set creation time in seconds
    pub fn set_creation_time(&mut self, seconds: u32) -> Result<()> {
        self.store.set_u32_be("creationTime", seconds)
    }

    /// Expire time in seconds
    pub fn expire_time(&self) -> Option<u32> {
        self.store.get_u32_be("expireTime")
    }

    /// Set expire time in seconds
    pub fn set_expire_time(&mut self, seconds: u32) -> Result<()> {
        self.store.set_u32_be("expireTime", seconds)
    }

    /// Decode the embedded child certificate, when present
    pub fn embedded_cert(&self) -> Result<Option<Cert>> {
        match self.store.get_raw("cert") {
            Some(image) => Ok(Some(Cert::decode(image)?)),
            None => Ok(None),
        }
    }

    /// Embed a child certificate
    pub fn set_embedded_cert(&mut self, child: &Cert) -> Result<()> {
        self.store.set_raw("cert", child.export(ExportView::Stored))
    }

    /// The declared constraints hash
    pub fn constraints(&self) -> Option<[u8; 32]> {
        self.store.get_id("constraints").map(|id| id.to_bytes())
    }

    /// Set the constraints hash
    pub fn set_constraints(&mut self, hash: [u8; 32]) -> Result<()> {
        self.store.set_raw("constraints", hash.to_vec())
    }

    /// The allowed target type prefix (0–6 bytes)
    pub fn target_type(&self) -> &[u8] {
        self.store.get_raw("targetType").unwrap_or(&[])
    }

    /// Set the allowed target type prefix
    pub fn set_target_type(&mut self, prefix: &[u8]) -> Result<()> {
        self.store.set_raw("targetType", prefix.to_vec())
    }

    /// True when this cert accepts the given target interface
    pub fn accepts_target(&self, target: InterfacePrefix) -> bool {
        target.accepts(self.target_type())
    }

    /// Maximum number of certs allowed to stack above this one
    pub fn max_chain_length(&self) -> u8 {
        self.store.get_u8("maxChainLength").unwrap_or(0)
    }

    /// Set the maximum chain length
    pub fn set_max_chain_length(&mut self, length: u8) -> Result<()> {
        self.store.set_u8("maxChainLength", length)
    }

    /// Declared multi-signature threshold; absent means single-signer
    pub fn multi_sig_threshold(&self) -> Option<u8> {
        self.store.get_u8("multiSigThreshold")
    }

    /// Set the multi-signature threshold
    pub fn set_multi_sig_threshold(&mut self, threshold: u8) -> Result<()> {
        self.store.set_u8("multiSigThreshold", threshold)
    }

    /// Upper bound on the target's expire time
    pub fn target_max_expire_time(&self) -> Option<u32> {
        self.store.get_u32_be("targetMaxExpireTime")
    }

    /// Set the target expire bound
    pub fn set_target_max_expire_time(&mut self, seconds: u32) -> Result<()> {
        self.store.set_u32_be("targetMaxExpireTime", seconds)
    }

    /// Friend pairing salt (friend certs)
    pub fn salt(&self) -> Option<&[u8]> {
        self.store.get_raw("salt")
    }

    /// Set the friend pairing salt
    pub fn set_salt(&mut self, salt: &[u8]) -> Result<()> {
        self.store.set_raw("salt", salt.to_vec())
    }

    /// Friend level (friend certs)
    pub fn friend_level(&self) -> Option<u8> {
        self.store.get_u8("friendLevel")
    }

    /// Set the friend level
    pub fn set_friend_level(&mut self, level: u8) -> Result<()> {
        self.store.set_u8("friendLevel", level)
    }

    /// Upper bound on bridged license expiry (friend certs)
    pub fn license_max_expire_time(&self) -> Option<u32> {
        self.store.get_u32_be("licenseMaxExpireTime")
    }

    /// Set the bridged license expiry bound
    pub fn set_license_max_expire_time(&mut self, seconds: u32) -> Result<()> {
        self.store.set_u32_be("licenseMaxExpireTime", seconds)
    }

    // ─── Online status ──────────────────────────────────────────────────

    fn online_bit(&self, bit: u8) -> bool {
        self.store
            .get_u8("onlineStatus")
            .map(|s| s & bit != 0)
            .unwrap_or(false)
    }

    fn set_online_bit(&mut self, bit: u8, on: bool) -> Result<()> {
        let mut status = self.store.get_u8("onlineStatus").unwrap_or(0);
        if on {
            status |= bit;
        } else {
            status &= !bit;
        }
        self.store.set_u8("onlineStatus", status)
    }

    /// Online validation has confirmed this cert
    pub fn online_validated(&self) -> bool {
        self.online_bit(schema::ONLINE_VALIDATED)
    }

    /// Record the online validation verdict
    pub fn set_online_validated(&mut self, on: bool) -> Result<()> {
        self.set_online_bit(schema::ONLINE_VALIDATED, on)
    }

    /// The cert has been revoked online; sticky
    pub fn online_revoked(&self) -> bool {
        self.online_bit(schema::ONLINE_REVOKED)
    }

    /// Mark the cert revoked. Revocation never clears.
    pub fn set_online_revoked(&mut self) -> Result<()> {
        self.set_online_bit(schema::ONLINE_REVOKED, true)
    }

    /// The online cert check passed
    pub fn online_cert_online(&self) -> bool {
        self.online_bit(schema::ONLINE_CERT_ONLINE)
    }

    /// Record the online cert check verdict
    pub fn set_online_cert_online(&mut self, on: bool) -> Result<()> {
        self.set_online_bit(schema::ONLINE_CERT_ONLINE, on)
    }

    /// Pull online state up from the embedded chain: a revoked descendant
    /// irreversibly revokes this cert.
    pub fn update_online_status(&mut self) -> Result<()> {
        let mut cursor = self.embedded_cert()?;
        while let Some(child) = cursor {
            if child.online_revoked() {
                self.set_online_revoked()?;
                break;
            }
            cursor = child.embedded_cert()?;
        }
        Ok(())
    }

    /// Effective online verdict given the declared online requirements
    pub fn is_online(&self) -> bool {
        if self.online_revoked() {
            return false;
        }
        !(self.has_online_validation() && !self.online_validated())
            && !(self.has_online_cert() && !self.online_cert_online())
    }

    // ─── Chain operations ───────────────────────────────────────────────

    /// Stack depth including this cert
    pub fn count_chain_length(&self) -> Result<usize> {
        let mut depth = 1;
        let mut cursor = self.embedded_cert()?;
        while let Some(child) = cursor {
            depth += 1;
            cursor = child.embedded_cert()?;
        }
        Ok(depth)
    }

    /// The innermost (root) certificate of this chain; self when no child
    pub fn innermost(&self) -> Result<Cert> {
        let mut current = self.clone();
        while let Some(child) = current.embedded_cert()? {
            current = child;
        }
        Ok(current)
    }

    /// The issuer: owner of the innermost certificate
    pub fn issuer(&self) -> Result<Option<PublicKey>> {
        Ok(self.innermost()?.owner())
    }

    /// Verify the whole chain cryptographically
    pub fn verify(&self) -> Result<bool> {
        if !sign::verify(self)? {
            return Ok(false);
        }
        match self.embedded_cert()? {
            Some(child) => child.verify(),
            None => Ok(true),
        }
    }
}

impl Datamodel for Cert {
    fn store(&self) -> &ModelStore {
        &self.store
    }

    fn store_mut(&mut self) -> &mut ModelStore {
        &mut self.store
    }

    fn eligible_signing_keys(&self) -> Result<Vec<PublicKey>> {
        // The embedded cert's targets govern this cert's bundle; a root
        // cert is governed by its own target keys.
        match self.embedded_cert()? {
            Some(child) => child.target_public_keys(),
            None => self.target_public_keys(),
        }
    }

    fn required_signatures(&self) -> Result<usize> {
        let authority = self.embedded_cert()?.unwrap_or_else(|| self.clone());
        Ok(usize::from(authority.multi_sig_threshold().unwrap_or(1)))
    }
}

/// Encode a key list as `(len:u8 ‖ key)*`
pub fn encode_key_list(keys: &[PublicKey]) -> Vec<u8> {
    let mut out = Vec::with_capacity(keys.len() * 33);
    for key in keys {
        out.push(key.len() as u8);
        out.extend_from_slice(key.as_bytes());
    }
    out
}

/// Decode a `(len:u8 ‖ key)*` key list
pub fn decode_key_list(payload: &[u8]) -> Result<Vec<PublicKey>> {
    let mut keys = Vec::new();
    let mut cursor = 0usize;
    while cursor < payload.len() {
        let length = usize::from(payload[cursor]);
        cursor += 1;
        let bytes = payload
            .get(cursor..cursor + length)
            .ok_or_else(|| TrellisError::decode("targetPublicKeys", "truncated key list"))?;
        cursor += length;
        keys.push(PublicKey::from_bytes(bytes.to_vec())?);
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::KeyPair;

    fn single_signer_cert(owner: &KeyPair) -> Cert {
        let mut cert = Cert::new(CertKind::Chain);
        cert.set_owner(owner.public()).unwrap();
        cert.set_target_public_keys(std::slice::from_ref(owner.public()))
            .unwrap();
        cert.set_config(0).unwrap();
        cert.set_creation_time(1_000).unwrap();
        cert.set_expire_time(11_000).unwrap();
        cert
    }

    #[test]
    fn key_list_roundtrip() {
        let a = KeyPair::ed25519_from_seed([1u8; 32]);
        let b = KeyPair::ethereum_from_secret([2u8; 32]).unwrap();
        let keys = vec![a.public().clone(), b.public().clone()];
        let decoded = decode_key_list(&encode_key_list(&keys)).unwrap();
        assert_eq!(decoded, keys);
    }

    #[test]
    fn sign_and_verify_single() {
        let owner = KeyPair::ed25519_from_seed([3u8; 32]);
        let mut cert = single_signer_cert(&owner);
        sign::sign(&mut cert, &owner).unwrap();
        assert!(cert.verify().unwrap());
    }

    #[test]
    fn decode_preserves_image() {
        let owner = KeyPair::ed25519_from_seed([4u8; 32]);
        let mut cert = single_signer_cert(&owner);
        sign::sign(&mut cert, &owner).unwrap();
        let image = cert.export(ExportView::Stored);
        let reloaded = Cert::decode(&image).unwrap();
        assert_eq!(reloaded.export(ExportView::Stored), image);
        assert!(reloaded.verify().unwrap());
        assert_eq!(reloaded.id1().unwrap(), cert.id1().unwrap());
    }

    #[test]
    fn signing_twice_with_same_key_fails() {
        let owner = KeyPair::ed25519_from_seed([5u8; 32]);
        let mut cert = single_signer_cert(&owner);
        sign::sign(&mut cert, &owner).unwrap();
        assert!(sign::sign(&mut cert, &owner).is_err());
    }

    #[test]
    fn mutating_hashable_field_invalidates_signature() {
        let owner = KeyPair::ed25519_from_seed([6u8; 32]);
        let mut cert = single_signer_cert(&owner);
        sign::sign(&mut cert, &owner).unwrap();
        cert.set_expire_time(12_000).unwrap();
        assert!(!cert.verify().unwrap());
    }

    #[test]
    fn revocation_is_sticky_through_chain() {
        let owner = KeyPair::ed25519_from_seed([7u8; 32]);
        let mut inner = single_signer_cert(&owner);
        inner.set_online_revoked().unwrap();
        let mut outer = Cert::new(CertKind::Chain);
        outer
            .set_target_public_keys(std::slice::from_ref(owner.public()))
            .unwrap();
        // Keep the transient revocation bit in the embedded image so the
        // propagation has something to observe.
        outer
            .store_mut()
            .set_raw("cert", inner.export(ExportView::Full))
            .unwrap();
        outer.update_online_status().unwrap();
        assert!(outer.online_revoked());
        assert!(!outer.is_online());
    }
}
