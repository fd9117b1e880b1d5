//! The friend-cert intermediary scenario: a license to an intermediary,
//! bridged to the other paired party as an unsigned extension, then stored
//! and used for visibility.

mod common;

use std::sync::Arc;

use trellis_core::Id32;
use trellis_model::interface::{PRIMARY_NODE, SECONDARY_LICENSE_NODE};
use trellis_model::sign::{self, Datamodel};
use trellis_model::{ExportView, InterfacePrefix};
use trellis_store::{IncludeLicenses, MemoryStore, NodeStore, Query};
use trellis_testkit::{
    friend_pair, id_of, key, licensed_node, seed, NodeBuilder, EXPIRE, NOW_SECONDS,
};

use common::{payloads, run_fetch};

const ANCHOR: Id32 = Id32([1u8; 32]);

#[tokio::test]
async fn intermediary_bridges_license_to_paired_party() {
    let party_a = key(1);
    let party_b = key(2);
    let intermediary = key(3);
    let store = Arc::new(MemoryStore::new());

    // The licensed node and a license from a to the intermediary.
    let node_a = licensed_node(&party_a, ANCHOR, b"n-a", 0, 0);
    let license_a = NodeBuilder::license(&party_a, ANCHOR, id_of(&node_a), intermediary.public(), 1)
        .friend_level(1)
        .sign(&party_a);
    let license_a_id = id_of(&license_a);

    // Both parties publish their paired friend certs under the common parent.
    let (cert_a, cert_b) = friend_pair(&party_a, &party_b, 1, EXPIRE);
    let carrier_a = NodeBuilder::carrier(
        &party_a,
        ANCHOR,
        &cert_a.export(ExportView::Stored),
    )
    .sign(&party_a);
    let carrier_b = NodeBuilder::carrier(
        &party_b,
        ANCHOR,
        &cert_b.export(ExportView::Stored),
    )
    .sign(&party_b);

    seed(&store, &[node_a, license_a, carrier_a, carrier_b]).await;

    // The intermediary asks for embeddable licenses toward b.
    let license_prefix = InterfacePrefix::new(PRIMARY_NODE, SECONDARY_LICENSE_NODE).0;
    let (_, embed) = run_fetch(
        &store,
        Query {
            parent_id: Some(ANCHOR),
            source_public_key: Some(intermediary.public().clone()),
            target_public_key: Some(party_b.public().clone()),
            embed: vec![license_prefix.to_vec()],
            ..Query::default()
        },
    )
    .await;

    assert_eq!(embed.len(), 1, "one bridged extension expected");
    let extension = &embed[0];
    assert_eq!(extension.owner().as_ref(), Some(intermediary.public()));
    assert_eq!(extension.target_public_key().as_ref(), Some(party_b.public()));
    assert_eq!(extension.extensions(), 0);
    assert!(extension.friend_cert_a().unwrap().is_some());
    assert!(extension.friend_cert_b().unwrap().is_some());
    // Unsigned: the intermediary signs before storing.
    assert!(extension.id1().is_err());

    // Sign, store, and re-fetch as b: the licensed node and the extension
    // chain are now visible.
    let mut signed_extension = extension.clone();
    sign::sign(&mut signed_extension, &intermediary).unwrap();
    store
        .insert(
            &[signed_extension.export(ExportView::Stored)],
            NOW_SECONDS,
        )
        .await
        .unwrap();

    let (nodes, _) = run_fetch(
        &store,
        Query {
            parent_id: Some(ANCHOR),
            source_public_key: Some(party_b.public().clone()),
            target_public_key: Some(party_b.public().clone()),
            include_licenses: IncludeLicenses::Include,
            ..Query::default()
        },
    )
    .await;
    assert_eq!(payloads(&nodes), vec![b"n-a".to_vec()]);
    assert!(
        nodes
            .iter()
            .any(|n| n.is_license() && n.id1().ok() != Some(license_a_id)),
        "the stored extension accompanies the reply"
    );
}

#[tokio::test]
async fn bridging_respects_friend_level_bounds() {
    let party_a = key(4);
    let party_b = key(5);
    let intermediary = key(6);
    let store = Arc::new(MemoryStore::new());

    let node_a = licensed_node(&party_a, ANCHOR, b"n-a", 0, 0);
    // The license demands friend level 2 but the pairing only grants 1.
    let license_a = NodeBuilder::license(&party_a, ANCHOR, id_of(&node_a), intermediary.public(), 1)
        .friend_level(2)
        .sign(&party_a);
    let (cert_a, cert_b) = friend_pair(&party_a, &party_b, 1, EXPIRE);
    let carrier_a =
        NodeBuilder::carrier(&party_a, ANCHOR, &cert_a.export(ExportView::Stored)).sign(&party_a);
    let carrier_b =
        NodeBuilder::carrier(&party_b, ANCHOR, &cert_b.export(ExportView::Stored)).sign(&party_b);
    seed(&store, &[node_a, license_a, carrier_a, carrier_b]).await;

    let license_prefix = InterfacePrefix::new(PRIMARY_NODE, SECONDARY_LICENSE_NODE).0;
    let (_, embed) = run_fetch(
        &store,
        Query {
            parent_id: Some(ANCHOR),
            source_public_key: Some(intermediary.public().clone()),
            target_public_key: Some(party_b.public().clone()),
            embed: vec![license_prefix.to_vec()],
            ..Query::default()
        },
    )
    .await;
    assert!(embed.is_empty(), "level-2 license must not bridge a level-1 pair");
}

#[tokio::test]
async fn embedding_is_deduped_against_the_store() {
    let party_a = key(7);
    let party_b = key(8);
    let intermediary = key(9);
    let store = Arc::new(MemoryStore::new());

    let node_a = licensed_node(&party_a, ANCHOR, b"n-a", 0, 0);
    let license_a = NodeBuilder::license(&party_a, ANCHOR, id_of(&node_a), intermediary.public(), 1)
        .friend_level(1)
        .sign(&party_a);
    let (cert_a, cert_b) = friend_pair(&party_a, &party_b, 1, EXPIRE);
    let carrier_a =
        NodeBuilder::carrier(&party_a, ANCHOR, &cert_a.export(ExportView::Stored)).sign(&party_a);
    let carrier_b =
        NodeBuilder::carrier(&party_b, ANCHOR, &cert_b.export(ExportView::Stored)).sign(&party_b);
    seed(&store, &[node_a, license_a, carrier_a, carrier_b]).await;

    let license_prefix = InterfacePrefix::new(PRIMARY_NODE, SECONDARY_LICENSE_NODE).0;
    let query = Query {
        parent_id: Some(ANCHOR),
        source_public_key: Some(intermediary.public().clone()),
        target_public_key: Some(party_b.public().clone()),
        embed: vec![license_prefix.to_vec()],
        ..Query::default()
    };

    let (_, embed) = run_fetch(&store, query.clone()).await;
    assert_eq!(embed.len(), 1);

    let mut signed_extension = embed[0].clone();
    sign::sign(&mut signed_extension, &intermediary).unwrap();
    store
        .insert(
            &[signed_extension.export(ExportView::Stored)],
            NOW_SECONDS,
        )
        .await
        .unwrap();

    // The stored embedding suppresses a second emission.
    let (_, embed) = run_fetch(&store, query).await;
    assert!(embed.is_empty());
}
