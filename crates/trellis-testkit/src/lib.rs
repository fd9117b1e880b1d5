//! Test support: deterministic key material, datamodel builders and store
//! seeding helpers shared by the integration suites.

#![forbid(unsafe_code)]

use trellis_core::{Id32, KeyPair, PublicKey};
use trellis_model::cert::{friend, Cert, CertKind};
use trellis_model::node::schema::{CONFIG_LICENSED, CONFIG_PUBLIC};
use trellis_model::sign::{self, Datamodel};
use trellis_model::{ExportView, Node, NodeKind};
use trellis_store::{MemoryStore, NodeStore};

/// Deterministic Ed25519 key pair from a single seed byte
pub fn key(seed: u8) -> KeyPair {
    KeyPair::ed25519_from_seed([seed; 32])
}

/// Deterministic Ethereum key pair from a single seed byte
pub fn eth_key(seed: u8) -> KeyPair {
    KeyPair::ethereum_from_secret([seed.max(1); 32]).expect("valid secp256k1 secret")
}

/// Default creation time used by the builders
pub const CREATION: u32 = 1_000;
/// Default expire time used by the builders
pub const EXPIRE: u32 = 1_000_000;
/// A `now` inside the builders' validity window, in milliseconds
pub const NOW_MS: u64 = 5_000_000;
/// `NOW_MS` in whole seconds
pub const NOW_SECONDS: u32 = (NOW_MS / 1000) as u32;

/// Builder for test nodes
pub struct NodeBuilder {
    node: Node,
}

impl NodeBuilder {
    /// A data node under `parent` owned by `owner`
    pub fn data(owner: &KeyPair, parent: Id32) -> Self {
        let mut node = Node::new(NodeKind::Data);
        node.set_parent_id(parent).expect("parent");
        node.set_owner(owner.public()).expect("owner");
        node.set_config(0).expect("config");
        node.set_creation_time(CREATION).expect("creation");
        node.set_expire_time(EXPIRE).expect("expire");
        Self { node }
    }

    /// A license node under `parent`: `owner` grants `target` access to
    /// `ref_id` with the given extension budget
    pub fn license(
        owner: &KeyPair,
        parent: Id32,
        ref_id: Id32,
        target: &PublicKey,
        extensions: u8,
    ) -> Self {
        let mut node = Node::new(NodeKind::License);
        node.set_parent_id(parent).expect("parent");
        node.set_owner(owner.public()).expect("owner");
        node.set_config(0).expect("config");
        node.set_creation_time(CREATION).expect("creation");
        node.set_expire_time(EXPIRE).expect("expire");
        node.set_ref_id(ref_id).expect("refId");
        node.set_target_public_key(target).expect("target");
        node.set_extensions(extensions).expect("extensions");
        Self { node }
    }

    /// A carrier node under `parent` ferrying an embedded image
    pub fn carrier(owner: &KeyPair, parent: Id32, embedded: &[u8]) -> Self {
        let mut node = Node::new(NodeKind::Carrier);
        node.set_parent_id(parent).expect("parent");
        node.set_owner(owner.public()).expect("owner");
        node.set_config(CONFIG_PUBLIC).expect("config");
        node.set_creation_time(CREATION).expect("creation");
        node.set_expire_time(EXPIRE).expect("expire");
        node.set_embedded(embedded).expect("embedded");
        Self { node }
    }

    /// Mark public
    pub fn public(mut self) -> Self {
        self.node.set_public(true).expect("public");
        self
    }

    /// Mark licensed
    pub fn licensed(mut self) -> Self {
        self.node.set_licensed(true).expect("licensed");
        self
    }

    /// Set the license distance window
    pub fn distances(mut self, min: u8, max: u8) -> Self {
        self.node.set_license_min_distance(min).expect("min");
        self.node.set_license_max_distance(max).expect("max");
        self
    }

    /// Set the creation time
    pub fn created_at(mut self, seconds: u32) -> Self {
        self.node.set_creation_time(seconds).expect("creation");
        self
    }

    /// Set the data payload
    pub fn payload(mut self, data: &[u8]) -> Self {
        self.node.set_data(data).expect("data");
        self
    }

    /// Open a restrictive-write scope at this node
    pub fn begin_restrictive(mut self) -> Self {
        self.node
            .set_begin_restrictive_write_mode(true)
            .expect("begin restrictive");
        self
    }

    /// Grant restrictive-write writer rights (license nodes)
    pub fn writer(mut self) -> Self {
        self.node.set_restrictive_mode_writer(true).expect("writer");
        self
    }

    /// Grant restrictive-write manager rights (license nodes)
    pub fn manager(mut self) -> Self {
        self.node
            .set_restrictive_mode_manager(true)
            .expect("manager");
        self
    }

    /// Set the friend level (license nodes)
    pub fn friend_level(mut self, level: u8) -> Self {
        self.node.set_friend_level(level).expect("friendLevel");
        self
    }

    /// Set region and jurisdiction tags
    pub fn geo(mut self, region: &str, jurisdiction: &str) -> Self {
        self.node.set_region(region).expect("region");
        self.node.set_jurisdiction(jurisdiction).expect("jurisdiction");
        self
    }

    /// Apply any further mutation
    pub fn tweak(mut self, f: impl FnOnce(&mut Node)) -> Self {
        f(&mut self.node);
        self
    }

    /// Sign with `signer` and return the node
    pub fn sign(mut self, signer: &KeyPair) -> Node {
        sign::sign(&mut self.node, signer).expect("signing");
        self.node
    }

    /// The node, unsigned
    pub fn unsigned(self) -> Node {
        self.node
    }
}

/// Shorthand: a signed public data node
pub fn public_node(owner: &KeyPair, parent: Id32, payload: &[u8]) -> Node {
    NodeBuilder::data(owner, parent).public().payload(payload).sign(owner)
}

/// Shorthand: a signed licensed data node with a distance window
pub fn licensed_node(owner: &KeyPair, parent: Id32, payload: &[u8], min: u8, max: u8) -> Node {
    NodeBuilder::data(owner, parent)
        .licensed()
        .distances(min, max)
        .payload(payload)
        .sign(owner)
}

/// Config bits for a licensed node
pub fn licensed_config() -> u16 {
    CONFIG_LICENSED
}

/// A paired set of signed friend certs for two owners
pub fn friend_pair(
    owner_a: &KeyPair,
    owner_b: &KeyPair,
    level: u8,
    license_max_expire: u32,
) -> (Cert, Cert) {
    let mut a = friend_cert_half(owner_a, b"salt-a", level, license_max_expire);
    let mut b = friend_cert_half(owner_b, b"salt-b", level, license_max_expire);
    let constraints = friend::pairing_constraints(&a, &b);
    a.set_constraints(constraints).expect("constraints");
    b.set_constraints(constraints).expect("constraints");
    sign::sign(&mut a, owner_a).expect("sign a");
    sign::sign(&mut b, owner_b).expect("sign b");
    (a, b)
}

fn friend_cert_half(owner: &KeyPair, salt: &[u8], level: u8, license_max_expire: u32) -> Cert {
    let mut cert = Cert::new(CertKind::Friend);
    cert.set_owner(owner.public()).expect("owner");
    cert.set_target_public_keys(std::slice::from_ref(owner.public()))
        .expect("targets");
    cert.set_config(0).expect("config");
    cert.set_creation_time(CREATION).expect("creation");
    cert.set_expire_time(EXPIRE).expect("expire");
    cert.set_salt(salt).expect("salt");
    cert.set_friend_level(level).expect("friendLevel");
    cert.set_license_max_expire_time(license_max_expire)
        .expect("licenseMaxExpireTime");
    cert
}

/// Store signed nodes, returning their id1s in order
pub async fn seed(store: &MemoryStore, nodes: &[Node]) -> Vec<Id32> {
    let images: Vec<Vec<u8>> = nodes.iter().map(|n| n.export(ExportView::Stored)).collect();
    store
        .insert(&images, NOW_SECONDS)
        .await
        .expect("seeding the store")
}

/// The id1 of a signed node
pub fn id_of(node: &Node) -> Id32 {
    node.id1().expect("signed node")
}
