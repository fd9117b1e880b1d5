//! End-to-end signing scenarios: single-signer data nodes and threshold
//! certificates surviving export/reload.

use trellis_core::{Id32, KeyPair};
use trellis_model::cert::DeepValidate;
use trellis_model::node::schema::CONFIG_PUBLIC;
use trellis_model::sign::{self, Datamodel};
use trellis_model::{Cert, CertKind, ExportView, Node, NodeKind};

#[test]
fn single_signer_data_node_roundtrip() {
    let owner = KeyPair::ed25519_from_seed([42u8; 32]);

    let mut node = Node::new(NodeKind::Data);
    node.set_parent_id(Id32::from_bytes([0x01; 32])).unwrap();
    node.set_owner(owner.public()).unwrap();
    node.set_config(CONFIG_PUBLIC).unwrap();
    node.set_creation_time(1_000).unwrap();
    node.set_expire_time(11_000).unwrap();
    node.set_data(b"hello graph").unwrap();
    sign::sign(&mut node, &owner).unwrap();

    let image = node.export(ExportView::Stored);
    let reloaded = Node::decode(&image).unwrap();

    assert!(sign::verify(&reloaded).unwrap());
    let (ok, reason) = reloaded.validate(DeepValidate::Deep, Some(5_000_000));
    assert!(ok, "{reason}");
    assert_eq!(reloaded.id1().unwrap(), node.id1().unwrap());
}

#[test]
fn ethereum_owner_signs_and_verifies() {
    let owner = KeyPair::ethereum_from_secret([7u8; 32]).unwrap();

    let mut node = Node::new(NodeKind::Data);
    node.set_parent_id(Id32::from_bytes([0x01; 32])).unwrap();
    node.set_owner(owner.public()).unwrap();
    node.set_config(CONFIG_PUBLIC).unwrap();
    node.set_creation_time(1_000).unwrap();
    node.set_expire_time(11_000).unwrap();
    sign::sign(&mut node, &owner).unwrap();

    // 65-byte signatures survive the bundle roundtrip.
    let reloaded = Node::decode(&node.export(ExportView::Stored)).unwrap();
    assert!(sign::verify(&reloaded).unwrap());
    let entries = sign::extract_signatures(&reloaded).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].signature.len(), 65);
}

#[test]
fn multisig_threshold_survives_reload_between_signatures() {
    let a = KeyPair::ed25519_from_seed([1u8; 32]);
    let b = KeyPair::ed25519_from_seed([2u8; 32]);
    let c = KeyPair::ed25519_from_seed([3u8; 32]);

    let mut cert = Cert::new(CertKind::Chain);
    cert.set_owner(a.public()).unwrap();
    cert.set_target_public_keys(&[a.public().clone(), b.public().clone(), c.public().clone()])
        .unwrap();
    cert.set_multi_sig_threshold(2).unwrap();
    cert.set_config(0).unwrap();
    cert.set_creation_time(1_000).unwrap();
    cert.set_expire_time(11_000).unwrap();

    sign::sign(&mut cert, &a).unwrap();

    // A partially signed cert ships as bytes and resumes signing elsewhere.
    let parked = Cert::decode(&cert.export(ExportView::Stored)).unwrap();
    let (ok, reason) = parked.validate(DeepValidate::MidSigning, None);
    assert!(ok, "{reason}");
    let (ok, _) = parked.validate(DeepValidate::Deep, None);
    assert!(!ok, "one of two signatures must not fully validate");

    let mut resumed = parked;
    sign::sign(&mut resumed, &c).unwrap();

    let entries = sign::extract_signatures(&resumed).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(resumed.verify().unwrap());
    let (ok, reason) = resumed.validate(DeepValidate::Deep, None);
    assert!(ok, "{reason}");
}

#[test]
fn signature_order_is_committed() {
    let a = KeyPair::ed25519_from_seed([4u8; 32]);
    let b = KeyPair::ed25519_from_seed([5u8; 32]);

    let build = || {
        let mut cert = Cert::new(CertKind::Chain);
        cert.set_owner(a.public()).unwrap();
        cert.set_target_public_keys(&[a.public().clone(), b.public().clone()])
            .unwrap();
        cert.set_multi_sig_threshold(2).unwrap();
        cert.set_config(0).unwrap();
        cert.set_creation_time(1_000).unwrap();
        cert.set_expire_time(11_000).unwrap();
        cert
    };

    let mut ab = build();
    sign::sign(&mut ab, &a).unwrap();
    sign::sign(&mut ab, &b).unwrap();

    let mut ba = build();
    sign::sign(&mut ba, &b).unwrap();
    sign::sign(&mut ba, &a).unwrap();

    assert!(ab.verify().unwrap());
    assert!(ba.verify().unwrap());
    // Different signing order, different bundle, different id1.
    assert_ne!(ab.id1().unwrap(), ba.id1().unwrap());
}

#[test]
fn cert_chain_delegates_node_signing() {
    let issuer = KeyPair::ed25519_from_seed([6u8; 32]);
    let delegate = KeyPair::ed25519_from_seed([7u8; 32]);

    let mut root = Cert::new(CertKind::Chain);
    root.set_owner(issuer.public()).unwrap();
    root.set_target_public_keys(std::slice::from_ref(delegate.public()))
        .unwrap();
    root.set_config(0).unwrap();
    root.set_creation_time(500).unwrap();
    root.set_expire_time(20_000).unwrap();
    root.set_max_chain_length(1).unwrap();
    sign::sign(&mut root, &delegate).unwrap();

    let mut node = Node::new(NodeKind::Data);
    node.set_parent_id(Id32::from_bytes([0x01; 32])).unwrap();
    node.set_attached_cert(&root).unwrap();
    node.set_config(CONFIG_PUBLIC).unwrap();
    node.set_creation_time(1_000).unwrap();
    node.set_expire_time(11_000).unwrap();

    // The issuer did not delegate to themselves.
    assert!(sign::sign(&mut node, &issuer).is_err());
    sign::sign(&mut node, &delegate).unwrap();
    assert!(sign::verify(&node).unwrap());

    // The node speaks for the chain's issuer.
    assert_eq!(node.effective_owner().unwrap().as_ref(), Some(issuer.public()));
}
