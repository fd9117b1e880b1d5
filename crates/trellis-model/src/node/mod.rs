//! Node layer
//!
//! Nodes are the graph's primary unit: content-addressed, signed, linked to
//! a parent by 32-byte id. Data nodes carry payloads, license nodes grant
//! access to other nodes, carrier nodes ferry embedded datamodel images.
//! Signing, validation, constraints and destroy hashes follow the
//! certificate layer's machinery.

pub mod schema;
mod validate;

use trellis_core::{Id32, PublicKey, Result, TrellisError};

use crate::cert::Cert;
use crate::codec::{ExportView, ModelSchema, ModelStore};
use crate::interface::{InterfaceHeader, InterfacePrefix, PRIMARY_NODE};
use crate::sign::Datamodel;

/// Node kinds, keyed by interface prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Payload-carrying node
    Data,
    /// Grants access to a referenced node
    License,
    /// Opaque container for embedded images
    Carrier,
}

impl NodeKind {
    /// Every node kind
    pub const ALL: [NodeKind; 3] = [NodeKind::Data, NodeKind::License, NodeKind::Carrier];

    /// The schema of this kind
    pub fn schema(&self) -> &'static ModelSchema {
        match self {
            NodeKind::Data => &schema::DATA_NODE_SCHEMA,
            NodeKind::License => &schema::LICENSE_NODE_SCHEMA,
            NodeKind::Carrier => &schema::CARRIER_NODE_SCHEMA,
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
}

/// A node of any kind over its decoded field store
#[derive(Debug, Clone)]
pub struct Node {
    kind: NodeKind,
    store: ModelStore,
}

impl Node {
    /// Create an empty, unsigned node
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            store: ModelStore::new(kind.schema()),
        }
    }

    /// Decode a node image, preserving any transient records
    pub fn decode(image: &[u8]) -> Result<Self> {
        let prefix = InterfacePrefix::of_image(image)?;
        let kind = NodeKind::from_prefix(prefix).ok_or_else(|| {
            TrellisError::decode("header", format!("not a node interface: {prefix:?}"))
        })?;
        Ok(Self {
            kind,
            store: ModelStore::load(kind.schema(), image, true)?,
        })
    }

    /// This node's kind
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// True when the image prefix belongs to a node
    pub fn is_node_image(image: &[u8]) -> bool {
        InterfacePrefix::of_image(image)
            .map(|p| p.0[..2] == PRIMARY_NODE.to_be_bytes())
            .unwrap_or(false)
    }

    /// Serialize the selected view
    pub fn export(&self, view: ExportView) -> Vec<u8> {
        self.store.export(view)
    }

    /// The node's logical id: the alias id of a copy, else `id1`
    pub fn id(&self) -> Result<Id32> {
        match self.id2() {
            Some(id2) => Ok(id2),
            None => self.id1(),
        }
    }

    // ─── Field accessors ────────────────────────────────────────────────

    /// Alias id retained by copies
    pub fn id2(&self) -> Option<Id32> {
        self.store.get_id("id2")
    }

    /// Parent pointer
    pub fn parent_id(&self) -> Option<Id32> {
        self.store.get_id("parentId")
    }

    /// Set the parent pointer
    pub fn set_parent_id(&mut self, parent: Id32) -> Result<()> {
        self.store.set_id("parentId", parent)
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

    /// Readable by anyone
    pub fn is_public(&self) -> bool {
        self.config_bit(schema::CONFIG_PUBLIC)
    }

    /// Mark public
    pub fn set_public(&mut self, on: bool) -> Result<()> {
        self.set_config_bit(schema::CONFIG_PUBLIC, on)
    }

    /// Readable through licenses
    pub fn is_licensed(&self) -> bool {
        self.config_bit(schema::CONFIG_LICENSED)
    }

    /// Mark licensed
    pub fn set_licensed(&mut self, on: bool) -> Result<()> {
        self.set_config_bit(schema::CONFIG_LICENSED, on)
    }

    /// Children of this node require writer licenses
    pub fn is_begin_restrictive_write_mode(&self) -> bool {
        self.config_bit(schema::CONFIG_BEGIN_RESTRICTIVE_WRITE)
    }

    /// Open a restrictive-write scope at this node
    pub fn set_begin_restrictive_write_mode(&mut self, on: bool) -> Result<()> {
        self.set_config_bit(schema::CONFIG_BEGIN_RESTRICTIVE_WRITE, on)
    }

    /// Ends the innermost restrictive-write scope
    pub fn is_end_restrictive_write_mode(&self) -> bool {
        self.config_bit(schema::CONFIG_END_RESTRICTIVE_WRITE)
    }

    /// Close the innermost restrictive-write scope at this node
    pub fn set_end_restrictive_write_mode(&mut self, on: bool) -> Result<()> {
        self.set_config_bit(schema::CONFIG_END_RESTRICTIVE_WRITE, on)
    }

    /// The node ignores destroy hashes
    pub fn is_indestructible(&self) -> bool {
        self.config_bit(schema::CONFIG_INDESTRUCTIBLE)
    }

    /// Mark indestructible
    pub fn set_indestructible(&mut self, on: bool) -> Result<()> {
        self.set_config_bit(schema::CONFIG_INDESTRUCTIBLE, on)
    }

    /// Special node (destroy nodes)
    pub fn is_special(&self) -> bool {
        self.config_bit(schema::CONFIG_SPECIAL)
    }

    /// Mark special
    pub fn set_special(&mut self, on: bool) -> Result<()> {
        self.set_config_bit(schema::CONFIG_SPECIAL, on)
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

    /// The license must predate the licensed node
    pub fn disallow_retro_licensing(&self) -> bool {
        self.config_bit(schema::CONFIG_DISALLOW_RETRO_LICENSING)
    }

    /// Forbid licensing nodes created before this license
    pub fn set_disallow_retro_licensing(&mut self, on: bool) -> Result<()> {
        self.set_config_bit(schema::CONFIG_DISALLOW_RETRO_LICENSING, on)
    }

    /// The license never licenses parent traversal
    pub fn disallow_parent_licensing(&self) -> bool {
        self.config_bit(schema::CONFIG_DISALLOW_PARENT_LICENSING)
    }

    /// Forbid parent licensing
    pub fn set_disallow_parent_licensing(&mut self, on: bool) -> Result<()> {
        self.set_config_bit(schema::CONFIG_DISALLOW_PARENT_LICENSING, on)
    }

    /// The license grants restrictive-write writer rights
    pub fn is_restrictive_mode_writer(&self) -> bool {
        self.config_bit(schema::CONFIG_RESTRICTIVE_WRITER)
    }

    /// Grant restrictive-write writer rights
    pub fn set_restrictive_mode_writer(&mut self, on: bool) -> Result<()> {
        self.set_config_bit(schema::CONFIG_RESTRICTIVE_WRITER, on)
    }

    /// The license grants restrictive-write manager rights
    pub fn is_restrictive_mode_manager(&self) -> bool {
        self.config_bit(schema::CONFIG_RESTRICTIVE_MANAGER)
    }

    /// Grant restrictive-write manager rights
    pub fn set_restrictive_mode_manager(&mut self, on: bool) -> Result<()> {
        self.set_config_bit(schema::CONFIG_RESTRICTIVE_MANAGER, on)
    }

    /// Sibling-owned nodes with matching refId confer read rights
    pub fn allow_rights_by_association(&self) -> bool {
        self.config_bit(schema::CONFIG_ALLOW_RIGHTS_BY_ASSOCIATION)
    }

    /// Allow rights by association
    pub fn set_allow_rights_by_association(&mut self, on: bool) -> Result<()> {
        self.set_config_bit(schema::CONFIG_ALLOW_RIGHTS_BY_ASSOCIATION, on)
    }

    /// Network tag
    pub fn network(&self) -> Option<&str> {
        self.store.get_str("network")
    }

    /// Set the network tag
    pub fn set_network(&mut self, network: &str) -> Result<()> {
        self.store.set_str("network", network)
    }

    /// Owner field of a root-signed node
    pub fn owner(&self) -> Option<PublicKey> {
        self.store
            .get_raw("owner")
            .and_then(|b| PublicKey::from_bytes(b.to_vec()).ok())
    }

    /// Set the owner
    pub fn set_owner(&mut self, owner: &PublicKey) -> Result<()> {
        self.store.set_raw("owner", owner.to_vec())
    }

    /// The owner this node speaks for: the owner field, or the issuer of
    /// the attached certificate chain
    pub fn effective_owner(&self) -> Result<Option<PublicKey>> {
        if let Some(owner) = self.owner() {
            return Ok(Some(owner));
        }
        match self.attached_cert()? {
            Some(cert) => cert.issuer(),
            None => Ok(None),
        }
    }

    /// Referenced node id (licensed target, destroy match hash)
    pub fn ref_id(&self) -> Option<Id32> {
        self.store.get_id("refId")
    }

    /// Set the referenced node id
    pub fn set_ref_id(&mut self, ref_id: Id32) -> Result<()> {
        self.store.set_id("refId", ref_id)
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

    /// Declared work difficulty
    pub fn difficulty(&self) -> Option<u8> {
        self.store.get_u8("difficulty")
    }

    /// Set the declared work difficulty
    pub fn set_difficulty(&mut self, difficulty: u8) -> Result<()> {
        self.store.set_u8("difficulty", difficulty)
    }

    /// Minimum difficulty required of children
    pub fn child_min_difficulty(&self) -> Option<u8> {
        self.store.get_u8("childMinDifficulty")
    }

    /// Set the child difficulty floor
    pub fn set_child_min_difficulty(&mut self, difficulty: u8) -> Result<()> {
        self.store.set_u8("childMinDifficulty", difficulty)
    }

    /// Minimum license distance
    pub fn license_min_distance(&self) -> u8 {
        self.store.get_u8("licenseMinDistance").unwrap_or(0)
    }

    /// Set the minimum license distance
    pub fn set_license_min_distance(&mut self, distance: u8) -> Result<()> {
        self.store.set_u8("licenseMinDistance", distance)
    }

    /// Maximum license distance
    pub fn license_max_distance(&self) -> u8 {
        self.store.get_u8("licenseMaxDistance").unwrap_or(0)
    }

    /// Set the maximum license distance
    pub fn set_license_max_distance(&mut self, distance: u8) -> Result<()> {
        self.store.set_u8("licenseMaxDistance", distance)
    }

    /// Region tag
    pub fn region(&self) -> Option<&str> {
        self.store.get_str("region")
    }

    /// Set the region tag
    pub fn set_region(&mut self, region: &str) -> Result<()> {
        self.store.set_str("region", region)
    }

    /// Jurisdiction tag
    pub fn jurisdiction(&self) -> Option<&str> {
        self.store.get_str("jurisdiction")
    }

    /// Set the jurisdiction tag
    pub fn set_jurisdiction(&mut self, jurisdiction: &str) -> Result<()> {
        self.store.set_str("jurisdiction", jurisdiction)
    }

    /// Raw embedded datamodel image
    pub fn embedded(&self) -> Option<&[u8]> {
        self.store.get_raw("embedded")
    }

    /// Embed a raw datamodel image
    pub fn set_embedded(&mut self, image: &[u8]) -> Result<()> {
        self.store.set_raw("embedded", image.to_vec())
    }

    /// Decode the attached certificate, when present
    pub fn attached_cert(&self) -> Result<Option<Cert>> {
        match self.store.get_raw("cert") {
            Some(image) => Ok(Some(Cert::decode(image)?)),
            None => Ok(None),
        }
    }

    /// Attach a certificate
    pub fn set_attached_cert(&mut self, cert: &Cert) -> Result<()> {
        self.store.set_raw("cert", cert.export(ExportView::Stored))
    }

    /// Blob content hash
    pub fn blob_hash(&self) -> Option<Id32> {
        self.store.get_id("blobHash")
    }

    /// Parent pointer the node had before it was copied
    pub fn copied_parent_id(&self) -> Option<Id32> {
        self.store.get_id("copiedParentId")
    }

    /// `id1` the node had before it was copied again
    pub fn copied_id1(&self) -> Option<Id32> {
        self.store.get_id("copiedId1")
    }

    /// Data payload (data nodes)
    pub fn data(&self) -> Option<&[u8]> {
        self.store.get_raw("data")
    }

    /// Set the data payload
    pub fn set_data(&mut self, data: &[u8]) -> Result<()> {
        self.store.set_raw("data", data.to_vec())
    }

    // ─── License fields ─────────────────────────────────────────────────

    /// True for license nodes
    pub fn is_license(&self) -> bool {
        self.kind == NodeKind::License
    }

    /// Licensed-to public key (license nodes)
    pub fn target_public_key(&self) -> Option<PublicKey> {
        self.store
            .get_raw("targetPublicKey")
            .and_then(|b| PublicKey::from_bytes(b.to_vec()).ok())
    }

    /// Set the licensed-to public key
    pub fn set_target_public_key(&mut self, key: &PublicKey) -> Result<()> {
        self.store.set_raw("targetPublicKey", key.to_vec())
    }

    /// Remaining embed count (license nodes)
    pub fn extensions(&self) -> u8 {
        self.store.get_u8("extensions").unwrap_or(0)
    }

    /// Set the remaining embed count
    pub fn set_extensions(&mut self, extensions: u8) -> Result<()> {
        self.store.set_u8("extensions", extensions)
    }

    /// Friend level required for friend-cert bridging (license nodes)
    pub fn friend_level(&self) -> Option<u8> {
        self.store.get_u8("friendLevel")
    }

    /// Set the friend level
    pub fn set_friend_level(&mut self, level: u8) -> Result<()> {
        self.store.set_u8("friendLevel", level)
    }

    /// Path lock for path-bound licenses
    pub fn parent_path_hash(&self) -> Option<Id32> {
        self.store.get_id("parentPathHash")
    }

    /// Set the path lock
    pub fn set_parent_path_hash(&mut self, hash: Id32) -> Result<()> {
        self.store.set_id("parentPathHash", hash)
    }

    /// Expiry bound inherited by extension licenses
    pub fn license_max_expire_time(&self) -> Option<u32> {
        self.store.get_u32_be("licenseMaxExpireTime")
    }

    /// Set the extension expiry bound
    pub fn set_license_max_expire_time(&mut self, seconds: u32) -> Result<()> {
        self.store.set_u32_be("licenseMaxExpireTime", seconds)
    }

    /// First friend cert carried by a bridged license
    pub fn friend_cert_a(&self) -> Result<Option<Cert>> {
        match self.store.get_raw("friendCertA") {
            Some(image) => Ok(Some(Cert::decode(image)?)),
            None => Ok(None),
        }
    }

    /// Attach the first friend cert
    pub fn set_friend_cert_a(&mut self, cert: &Cert) -> Result<()> {
        self.store
            .set_raw("friendCertA", cert.export(ExportView::Stored))
    }

    /// Second friend cert carried by a bridged license
    pub fn friend_cert_b(&self) -> Result<Option<Cert>> {
        match self.store.get_raw("friendCertB") {
            Some(image) => Ok(Some(Cert::decode(image)?)),
            None => Ok(None),
        }
    }

    /// Attach the second friend cert
    pub fn set_friend_cert_b(&mut self, cert: &Cert) -> Result<()> {
        self.store
            .set_raw("friendCertB", cert.export(ExportView::Stored))
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

    /// Online validation has confirmed this node
    pub fn online_validated(&self) -> bool {
        self.online_bit(schema::ONLINE_VALIDATED)
    }

    /// Record the online validation verdict
    pub fn set_online_validated(&mut self, on: bool) -> Result<()> {
        self.set_online_bit(schema::ONLINE_VALIDATED, on)
    }

    /// The node has been revoked online; sticky
    pub fn online_revoked(&self) -> bool {
        self.online_bit(schema::ONLINE_REVOKED)
    }

    /// Mark the node revoked. Revocation never clears.
    pub fn set_online_revoked(&mut self) -> Result<()> {
        self.set_online_bit(schema::ONLINE_REVOKED, true)
    }

    /// Effective online verdict given the declared online requirements
    pub fn is_online(&self) -> bool {
        if self.online_revoked() {
            return false;
        }
        !(self.has_online_validation() && !self.online_validated())
            && !(self.has_online_cert() && !self.online_bit(schema::ONLINE_CERT_ONLINE))
    }

    /// True when the node is active: online requirements are satisfied
    pub fn is_active(&self) -> bool {
        self.is_online()
    }

    /// Storage timestamp assigned by the store; transient
    pub fn storage_time(&self) -> Option<u32> {
        self.store.get_u32_be("storageTime")
    }

    /// Assign the storage timestamp
    pub fn set_storage_time(&mut self, seconds: u32) -> Result<()> {
        self.store.set_u32_be("storageTime", seconds)
    }

    /// The time the cutoff filter compares against: the storage timestamp
    pub fn effective_storage_time(&self) -> Option<u32> {
        self.storage_time()
    }

    // ─── Copy and embed semantics ───────────────────────────────────────

    /// Copy this signed node under a new parent.
    ///
    /// The copy retains the original's hashable content, remembers the
    /// original signature, parent and id, and must be re-signed by its
    /// owner before it gains an `id1` of its own.
    pub fn copy(&self, new_parent: Id32) -> Result<Node> {
        let old_id1 = self.id1()?;
        let old_id = self.id()?;
        let old_parent = self
            .parent_id()
            .ok_or_else(|| TrellisError::invalid("cannot copy a node without a parent"))?;
        let old_signature = self
            .store
            .get_raw("signature")
            .ok_or_else(|| TrellisError::invalid("cannot copy an unsigned node"))?
            .to_vec();

        let mut copy = Node::decode(&self.export(ExportView::Stored))?;
        copy.store.clear("signature")?;
        copy.store.set_raw("copiedSignature", old_signature)?;
        copy.store.set_id("copiedParentId", old_parent)?;
        copy.set_parent_id(new_parent)?;
        if self.id2().is_some() {
            copy.store.set_id("copiedId1", old_id1)?;
        }
        copy.store.set_id("id2", old_id)?;
        Ok(copy)
    }

    /// Whether this node may be embedded and sent to `target`.
    ///
    /// Private nodes embed only to their own owner.
    pub fn can_send_embedded(&self, target: &PublicKey) -> Result<bool> {
        if self.is_public() {
            return Ok(true);
        }
        Ok(self.effective_owner()?.as_ref() == Some(target))
    }
}

impl Datamodel for Node {
    fn store(&self) -> &ModelStore {
        &self.store
    }

    fn store_mut(&mut self) -> &mut ModelStore {
        &mut self.store
    }

    fn eligible_signing_keys(&self) -> Result<Vec<PublicKey>> {
        match self.attached_cert()? {
            Some(cert) => cert.target_public_keys(),
            None => Ok(self.owner().into_iter().collect()),
        }
    }

    fn required_signatures(&self) -> Result<usize> {
        match self.attached_cert()? {
            Some(cert) => Ok(usize::from(cert.multi_sig_threshold().unwrap_or(1))),
            None => Ok(1),
        }
    }
}
