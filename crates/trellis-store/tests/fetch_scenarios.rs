//! End-to-end fetch scenarios over the in-memory driver.

mod common;

use std::sync::Arc;

use tokio::sync::mpsc;

use trellis_core::{Id32, TrellisError};
use trellis_model::interface::{PRIMARY_NODE, SECONDARY_LICENSE_NODE};
use trellis_model::sign::Datamodel;
use trellis_store::fetch::query::{CmpOp, FilterValue, LimitField, MatchFilter};
use trellis_store::{
    CancelToken, FetchRequest, IncludeLicenses, Match, MemoryStore, NodeStore, Processor,
    ProcessorConfig, Query, ReverseFetch,
};
use trellis_testkit as kit;
use trellis_testkit::{id_of, key, licensed_node, public_node, seed, NodeBuilder, NOW_MS};

use common::{payloads, run_fetch};

const ANCHOR: Id32 = Id32([1u8; 32]);
const SIDE: Id32 = Id32([2u8; 32]);

fn base_query(anchor: Id32) -> Query {
    Query {
        parent_id: Some(anchor),
        ..Query::default()
    }
}

#[tokio::test]
async fn public_nodes_emit_in_creation_order() {
    let owner = key(1);
    let store = Arc::new(MemoryStore::new());

    let late = NodeBuilder::data(&owner, ANCHOR)
        .public()
        .payload(b"late")
        .created_at(3_000)
        .sign(&owner);
    let early = NodeBuilder::data(&owner, ANCHOR)
        .public()
        .payload(b"early")
        .created_at(2_000)
        .sign(&owner);
    seed(&store, &[late, early]).await;

    let (nodes, _) = run_fetch(&store, base_query(ANCHOR)).await;
    assert_eq!(payloads(&nodes), vec![b"early".to_vec(), b"late".to_vec()]);

    let (nodes, _) = run_fetch(
        &store,
        Query {
            descending: true,
            ..base_query(ANCHOR)
        },
    )
    .await;
    assert_eq!(payloads(&nodes), vec![b"late".to_vec(), b"early".to_vec()]);
}

#[tokio::test]
async fn traversal_descends_and_respects_depth() {
    let owner = key(2);
    let store = Arc::new(MemoryStore::new());

    let top = public_node(&owner, ANCHOR, b"top");
    let mid = public_node(&owner, id_of(&top), b"mid");
    let leaf = public_node(&owner, id_of(&mid), b"leaf");
    seed(&store, &[top, mid, leaf]).await;

    let (nodes, _) = run_fetch(&store, base_query(ANCHOR)).await;
    assert_eq!(nodes.len(), 3);

    let (nodes, _) = run_fetch(
        &store,
        Query {
            depth: Some(2),
            ..base_query(ANCHOR)
        },
    )
    .await;
    assert_eq!(payloads(&nodes), vec![b"top".to_vec(), b"mid".to_vec()]);
}

#[tokio::test]
async fn private_nodes_hidden_from_strangers_but_not_their_owner() {
    let owner = key(3);
    let stranger = key(4);
    let store = Arc::new(MemoryStore::new());

    let private = NodeBuilder::data(&owner, ANCHOR).payload(b"mine").sign(&owner);
    let public = public_node(&owner, ANCHOR, b"shared");
    seed(&store, &[private, public]).await;

    let (nodes, _) = run_fetch(
        &store,
        Query {
            source_public_key: Some(stranger.public().clone()),
            target_public_key: Some(stranger.public().clone()),
            ..base_query(ANCHOR)
        },
    )
    .await;
    assert_eq!(payloads(&nodes), vec![b"shared".to_vec()]);

    let (nodes, _) = run_fetch(
        &store,
        Query {
            source_public_key: Some(owner.public().clone()),
            target_public_key: Some(owner.public().clone()),
            ..base_query(ANCHOR)
        },
    )
    .await;
    assert_eq!(nodes.len(), 2);

    // ignoreOwn drops the owner's rows even when public.
    let (nodes, _) = run_fetch(
        &store,
        Query {
            source_public_key: Some(owner.public().clone()),
            target_public_key: Some(owner.public().clone()),
            ignore_own: true,
            ..base_query(ANCHOR)
        },
    )
    .await;
    assert!(nodes.is_empty());
}

#[tokio::test]
async fn license_distance_window_bounds_visibility() {
    let licensor = key(5);
    let reader = key(6);
    let store = Arc::new(MemoryStore::new());

    // A ← B ← C ← D ← E; the license references A.
    let a = licensed_node(&licensor, ANCHOR, b"a", 0, 0);
    let b = licensed_node(&licensor, id_of(&a), b"b", 0, 3);
    let c = licensed_node(&licensor, id_of(&b), b"c", 0, 3);
    let d = licensed_node(&licensor, id_of(&c), b"d", 2, 3);
    let e = licensed_node(&licensor, id_of(&d), b"e", 0, 3);
    let license = NodeBuilder::license(&licensor, SIDE, id_of(&a), reader.public(), 1)
        .sign(&licensor);
    seed(&store, &[a, b, c, d, e, license]).await;

    let query = Query {
        source_public_key: Some(reader.public().clone()),
        target_public_key: Some(reader.public().clone()),
        ..base_query(ANCHOR)
    };
    let (nodes, _) = run_fetch(&store, query.clone()).await;
    assert_eq!(
        payloads(&nodes),
        vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()],
        "E sits past every distance window"
    );

    // Without the license nothing is visible.
    let bare = Arc::new(MemoryStore::new());
    let a = licensed_node(&licensor, ANCHOR, b"a", 0, 0);
    let b = licensed_node(&licensor, id_of(&a), b"b", 0, 3);
    seed(&bare, &[a, b]).await;
    let (nodes, _) = run_fetch(&bare, query).await;
    assert!(nodes.is_empty());
}

#[tokio::test]
async fn retro_licensing_can_be_disallowed() {
    let licensor = key(7);
    let reader = key(8);
    let store = Arc::new(MemoryStore::new());

    // The node predates the license and the license forbids that.
    let node = licensed_node(&licensor, ANCHOR, b"old", 0, 0);
    let license = NodeBuilder::license(&licensor, SIDE, id_of(&node), reader.public(), 0)
        .created_at(kit::CREATION + 500)
        .tweak(|n| n.set_disallow_retro_licensing(true).unwrap())
        .sign(&licensor);
    seed(&store, &[node, license]).await;

    let (nodes, _) = run_fetch(
        &store,
        Query {
            source_public_key: Some(reader.public().clone()),
            target_public_key: Some(reader.public().clone()),
            ..base_query(ANCHOR)
        },
    )
    .await;
    assert!(nodes.is_empty());
}

#[tokio::test]
async fn restrictive_write_across_owners() {
    let owner1 = key(10);
    let owner2 = key(11);
    let owner3 = key(12);

    let a = NodeBuilder::data(&owner1, ANCHOR)
        .public()
        .payload(b"A")
        .begin_restrictive()
        .sign(&owner1);
    let b = NodeBuilder::data(&owner2, id_of(&a))
        .public()
        .payload(b"B")
        .begin_restrictive()
        .sign(&owner2);
    let c = NodeBuilder::data(&owner3, id_of(&b))
        .public()
        .payload(b"C")
        .sign(&owner3);

    let query = Query {
        source_public_key: Some(owner1.public().clone()),
        target_public_key: Some(owner1.public().clone()),
        ..base_query(ANCHOR)
    };

    // No writer licenses: only the scope opener's own node is visible.
    let store = Arc::new(MemoryStore::new());
    seed(&store, &[a.clone(), b.clone(), c.clone()]).await;
    let (nodes, _) = run_fetch(&store, query.clone()).await;
    assert_eq!(payloads(&nodes), vec![b"A".to_vec()]);

    // owner1 admits owner2 under A.
    let w1 = NodeBuilder::license(&owner1, SIDE, id_of(&a), owner2.public(), 0)
        .writer()
        .sign(&owner1);
    let store = Arc::new(MemoryStore::new());
    seed(&store, &[a.clone(), b.clone(), c.clone(), w1.clone()]).await;
    let (nodes, _) = run_fetch(&store, query.clone()).await;
    assert_eq!(payloads(&nodes), vec![b"A".to_vec(), b"B".to_vec()]);

    // owner2 additionally admits owner3 under B.
    let w2 = NodeBuilder::license(&owner2, SIDE, id_of(&b), owner3.public(), 0)
        .writer()
        .sign(&owner2);
    let store = Arc::new(MemoryStore::new());
    seed(&store, &[a, b, c, w1, w2]).await;
    let (nodes, _) = run_fetch(&store, query).await;
    assert_eq!(
        payloads(&nodes),
        vec![b"A".to_vec(), b"B".to_vec(), b"C".to_vec()]
    );
}

#[tokio::test]
async fn end_flag_requires_opener_or_manager() {
    let owner1 = key(13);
    let owner2 = key(14);
    let owner3 = key(15);
    let store = Arc::new(MemoryStore::new());

    let a = NodeBuilder::data(&owner1, ANCHOR)
        .public()
        .payload(b"A")
        .begin_restrictive()
        .sign(&owner1);
    // owner2 is a writer and holds a manager grant; their end-flagged node
    // closes the scope for everything below it.
    let end = NodeBuilder::data(&owner2, id_of(&a))
        .public()
        .payload(b"end")
        .tweak(|n| n.set_end_restrictive_write_mode(true).unwrap())
        .sign(&owner2);
    let free = NodeBuilder::data(&owner3, id_of(&end))
        .public()
        .payload(b"free")
        .sign(&owner3);
    let writer = NodeBuilder::license(&owner1, SIDE, id_of(&a), owner2.public(), 0)
        .writer()
        .sign(&owner1);
    let manager = NodeBuilder::license(&owner1, SIDE, id_of(&a), owner2.public(), 0)
        .manager()
        .tweak(|n| n.set_extensions(1).unwrap())
        .sign(&owner1);
    seed(&store, &[a, end, free, writer, manager]).await;

    let (nodes, _) = run_fetch(
        &store,
        Query {
            source_public_key: Some(owner1.public().clone()),
            target_public_key: Some(owner1.public().clone()),
            ..base_query(ANCHOR)
        },
    )
    .await;
    assert_eq!(
        payloads(&nodes),
        vec![b"A".to_vec(), b"end".to_vec(), b"free".to_vec()]
    );
}

#[tokio::test]
async fn destroy_hides_node_from_subsequent_fetches() {
    let owner = key(16);
    let store = Arc::new(MemoryStore::new());

    let node = public_node(&owner, ANCHOR, b"doomed");
    seed(&store, &[node]).await;
    let (nodes, _) = run_fetch(&store, base_query(ANCHOR)).await;
    assert_eq!(payloads(&nodes), vec![b"doomed".to_vec()]);

    let destroyer = NodeBuilder::data(&owner, SIDE)
        .tweak(|n| {
            n.set_special(true).unwrap();
            n.set_data(trellis_core::constants::DESTROY_SELF_TOTAL.as_bytes())
                .unwrap();
            n.set_ref_id(trellis_model::destroy::self_total_inner(
                owner.public().as_bytes(),
            ))
            .unwrap();
            n.set_difficulty(2).unwrap();
        })
        .sign(&owner);
    seed(&store, &[destroyer]).await;

    let (nodes, _) = run_fetch(&store, base_query(ANCHOR)).await;
    assert!(nodes.is_empty());
}

#[tokio::test]
async fn content_addressed_cycles_terminate() {
    let owner = key(17);
    let store = Arc::new(MemoryStore::new());

    let a = public_node(&owner, ANCHOR, b"a");
    let b = public_node(&owner, id_of(&a), b"b");
    // A copy of `a` under `b` points the walk back at a's children.
    let mut copy = a.copy(id_of(&b)).unwrap();
    trellis_model::sign::sign(&mut copy, &owner).unwrap();
    seed(&store, &[a, b, copy]).await;

    let (nodes, _) = run_fetch(&store, base_query(ANCHOR)).await;
    // a, b, and the copy each emit exactly once.
    assert_eq!(nodes.len(), 3);
}

#[tokio::test]
async fn fetch_is_deterministic_over_a_fixed_store() {
    let owner = key(18);
    let store = Arc::new(MemoryStore::new());
    let mut batch = Vec::new();
    for i in 0u8..12 {
        batch.push(
            NodeBuilder::data(&owner, ANCHOR)
                .public()
                .payload(&[i])
                .created_at(2_000 + u32::from(i % 3))
                .sign(&owner),
        );
    }
    seed(&store, &batch).await;

    let (first, _) = run_fetch(&store, base_query(ANCHOR)).await;
    let (second, _) = run_fetch(&store, base_query(ANCHOR)).await;
    let ids = |nodes: &[trellis_model::Node]| -> Vec<Id32> {
        nodes.iter().map(|n| n.id1().unwrap()).collect()
    };
    assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn match_clauses_filter_and_cap() {
    let owner = key(19);
    let store = Arc::new(MemoryStore::new());
    let reader = key(20);

    let node = public_node(&owner, ANCHOR, b"data");
    let license = NodeBuilder::license(&owner, ANCHOR, id_of(&node), reader.public(), 0)
        .tweak(|n| n.set_public(true).unwrap())
        .sign(&owner);
    seed(&store, &[node, license]).await;

    // Only license nodes.
    let license_prefix =
        trellis_model::InterfacePrefix::new(PRIMARY_NODE, SECONDARY_LICENSE_NODE).0;
    let (nodes, _) = run_fetch(
        &store,
        Query {
            match_clauses: vec![Match {
                node_type: license_prefix.to_vec(),
                ..Match::default()
            }],
            ..base_query(ANCHOR)
        },
    )
    .await;
    assert_eq!(nodes.len(), 1);
    assert!(nodes[0].is_license());

    // Numeric filter: nothing has difficulty ≥ 5.
    let (nodes, _) = run_fetch(
        &store,
        Query {
            match_clauses: vec![Match {
                filters: vec![MatchFilter {
                    field: "difficulty".into(),
                    cmp: CmpOp::Ge,
                    value: FilterValue::Uint(5),
                    mask: None,
                }],
                ..Match::default()
            }],
            ..base_query(ANCHOR)
        },
    )
    .await;
    assert!(nodes.is_empty());
}

#[tokio::test]
async fn limit_field_caps_per_owner() {
    let alice = key(21);
    let bob = key(22);
    let store = Arc::new(MemoryStore::new());
    let mut batch = Vec::new();
    for i in 0u8..3 {
        batch.push(
            NodeBuilder::data(&alice, ANCHOR)
                .public()
                .payload(&[i])
                .sign(&alice),
        );
        batch.push(
            NodeBuilder::data(&bob, ANCHOR)
                .public()
                .payload(&[10 + i])
                .sign(&bob),
        );
    }
    seed(&store, &batch).await;

    let (nodes, _) = run_fetch(
        &store,
        Query {
            match_clauses: vec![Match {
                limit_field: Some(LimitField {
                    name: "owner".into(),
                    limit: 1,
                }),
                ..Match::default()
            }],
            ..base_query(ANCHOR)
        },
    )
    .await;
    assert_eq!(nodes.len(), 2, "one node per owner");
}

#[tokio::test]
async fn geographic_restriction_uses_subsumption_table() {
    let owner = key(23);
    let store = Arc::new(MemoryStore::new());

    let finnish = NodeBuilder::data(&owner, ANCHOR)
        .public()
        .payload(b"fi")
        .geo("EU", "FI")
        .sign(&owner);
    let norwegian = NodeBuilder::data(&owner, ANCHOR)
        .public()
        .payload(b"no")
        .geo("EEA", "NO")
        .sign(&owner);
    seed(&store, &[finnish, norwegian]).await;

    let (nodes, _) = run_fetch(
        &store,
        Query {
            jurisdiction: Some("EU".into()),
            ..base_query(ANCHOR)
        },
    )
    .await;
    assert_eq!(payloads(&nodes), vec![b"fi".to_vec()]);
}

#[tokio::test]
async fn cutoff_time_filters_by_storage_time() {
    let owner = key(24);
    let store = Arc::new(MemoryStore::new());

    let old = public_node(&owner, ANCHOR, b"old");
    store
        .insert(
            &[old.export(trellis_model::ExportView::Stored)],
            1_000,
        )
        .await
        .unwrap();
    let fresh = NodeBuilder::data(&owner, ANCHOR)
        .public()
        .payload(b"fresh")
        .created_at(1_500)
        .sign(&owner);
    store
        .insert(
            &[fresh.export(trellis_model::ExportView::Stored)],
            9_000,
        )
        .await
        .unwrap();

    let (nodes, _) = run_fetch(
        &store,
        Query {
            cutoff_time: Some(5_000),
            ..base_query(ANCHOR)
        },
    )
    .await;
    assert_eq!(payloads(&nodes), vec![b"fresh".to_vec()]);
}

#[tokio::test]
async fn reverse_fetch_climbs_to_ancestors() {
    let owner = key(25);
    let store = Arc::new(MemoryStore::new());

    let x = public_node(&owner, ANCHOR, b"x");
    let y = public_node(&owner, id_of(&x), b"y");
    let z = public_node(&owner, id_of(&y), b"z");
    let z_id = id_of(&z);
    seed(&store, &[x, y, z]).await;

    let (nodes, _) = run_fetch(
        &store,
        Query {
            parent_id: Some(z_id),
            reverse_fetch: ReverseFetch::AllParents,
            ..Query::default()
        },
    )
    .await;
    assert_eq!(
        payloads(&nodes),
        vec![b"z".to_vec(), b"y".to_vec(), b"x".to_vec()]
    );
}

#[tokio::test]
async fn reverse_fetch_only_licensed_stops_at_unlicensed_ancestors() {
    let owner = key(26);
    let reader = key(27);
    let store = Arc::new(MemoryStore::new());

    let x = NodeBuilder::data(&owner, ANCHOR).payload(b"x").sign(&owner);
    let y = licensed_node(&owner, id_of(&x), b"y", 0, 0);
    let z = public_node(&owner, id_of(&y), b"z");
    let z_id = id_of(&z);
    let license = NodeBuilder::license(&owner, SIDE, id_of(&y), reader.public(), 0)
        .sign(&owner);
    seed(&store, &[x, y, z, license]).await;

    let (nodes, _) = run_fetch(
        &store,
        Query {
            parent_id: Some(z_id),
            reverse_fetch: ReverseFetch::OnlyLicensed,
            source_public_key: Some(reader.public().clone()),
            target_public_key: Some(reader.public().clone()),
            include_licenses: IncludeLicenses::Include,
            ..Query::default()
        },
    )
    .await;
    let data: Vec<Vec<u8>> = payloads(&nodes);
    assert!(data.contains(&b"z".to_vec()));
    assert!(data.contains(&b"y".to_vec()));
    assert!(!data.contains(&b"x".to_vec()), "x is not licensed to the reader");
    assert!(nodes.iter().any(|n| n.is_license()), "governing license included");
}

#[tokio::test]
async fn cancellation_stops_without_callbacks() {
    let owner = key(28);
    let store = Arc::new(MemoryStore::new());
    seed(&store, &[public_node(&owner, ANCHOR, b"x")]).await;

    let processor = Processor::new(Arc::clone(&store), ProcessorConfig::default()).unwrap();
    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancelToken::new();
    cancel.cancel();
    let request = FetchRequest {
        query: base_query(ANCHOR),
    };
    let result = processor.fetch(&request, NOW_MS, &cancel, &tx).await;
    assert!(matches!(result, Err(TrellisError::Cancelled)));
    drop(tx);
    assert!(rx.recv().await.is_none(), "no callbacks after cancellation");
}

/// A store whose child queries always fail, for abort-path coverage.
struct FailingStore;

#[async_trait::async_trait]
impl NodeStore for FailingStore {
    async fn fetch_by_parents(
        &self,
        _parents: &[Id32],
    ) -> trellis_core::Result<Vec<trellis_store::StoredNode>> {
        Err(TrellisError::storage("disk on fire"))
    }

    async fn fetch_by_id(
        &self,
        _id: Id32,
    ) -> trellis_core::Result<Option<trellis_store::StoredNode>> {
        Ok(None)
    }

    async fn fetch_licenses_for(
        &self,
        _ref_ids: &[Id32],
    ) -> trellis_core::Result<Vec<trellis_store::StoredNode>> {
        Ok(Vec::new())
    }

    async fn has_extension(
        &self,
        _original_id1: Id32,
        _owner: &trellis_core::PublicKey,
        _target: &trellis_core::PublicKey,
    ) -> trellis_core::Result<bool> {
        Ok(false)
    }

    async fn insert(
        &self,
        _images: &[Vec<u8>],
        _now_seconds: u32,
    ) -> trellis_core::Result<Vec<Id32>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn driver_errors_abort_the_fetch() {
    let processor = Processor::new(Arc::new(FailingStore), ProcessorConfig::default()).unwrap();
    let (tx, _rx) = mpsc::channel(8);
    let cancel = CancelToken::new();
    let request = FetchRequest {
        query: base_query(ANCHOR),
    };
    let result = processor.fetch(&request, NOW_MS, &cancel, &tx).await;
    assert!(matches!(result, Err(TrellisError::Storage { .. })));
}

#[tokio::test]
async fn query_limit_caps_total_emission() {
    let owner = key(29);
    let store = Arc::new(MemoryStore::new());
    let mut batch = Vec::new();
    for i in 0u8..8 {
        batch.push(
            NodeBuilder::data(&owner, ANCHOR)
                .public()
                .payload(&[i])
                .sign(&owner),
        );
    }
    seed(&store, &batch).await;

    let (nodes, _) = run_fetch(
        &store,
        Query {
            limit: Some(3),
            ..base_query(ANCHOR)
        },
    )
    .await;
    assert_eq!(nodes.len(), 3);
}

#[tokio::test]
async fn rights_by_association_follow_a_sibling() {
    let owner = key(30);
    let reader = key(31);
    let store = Arc::new(MemoryStore::new());
    let shared_ref = Id32::from_bytes([9u8; 32]);

    // A private node that opts into association rights, and a sibling the
    // reader owns referencing the same node.
    let private = NodeBuilder::data(&owner, ANCHOR)
        .payload(b"assoc")
        .tweak(|n| {
            n.set_allow_rights_by_association(true).unwrap();
            n.set_ref_id(shared_ref).unwrap();
        })
        .sign(&owner);
    let sibling = NodeBuilder::data(&reader, ANCHOR)
        .public()
        .payload(b"mine")
        .tweak(|n| n.set_ref_id(shared_ref).unwrap())
        .sign(&reader);
    seed(&store, &[private, sibling]).await;

    let (nodes, _) = run_fetch(
        &store,
        Query {
            source_public_key: Some(reader.public().clone()),
            target_public_key: Some(reader.public().clone()),
            ..base_query(ANCHOR)
        },
    )
    .await;
    let data = payloads(&nodes);
    assert!(data.contains(&b"assoc".to_vec()));
    assert!(data.contains(&b"mine".to_vec()));

    // A stranger with no associated sibling sees neither.
    let stranger = key(32);
    let (nodes, _) = run_fetch(
        &store,
        Query {
            source_public_key: Some(stranger.public().clone()),
            target_public_key: Some(stranger.public().clone()),
            ..base_query(ANCHOR)
        },
    )
    .await;
    assert_eq!(payloads(&nodes), vec![b"mine".to_vec()]);
}

#[tokio::test]
async fn path_locked_license_binds_one_path() {
    let owner = key(33);
    let reader = key(34);
    let store = Arc::new(MemoryStore::new());

    let m = public_node(&owner, ANCHOR, b"m");
    let n = licensed_node(&owner, id_of(&m), b"n", 1, 1);
    let lock = trellis_store::fetch::licensing::path_lock_for(&[id_of(&m), id_of(&n)]);
    let license = NodeBuilder::license(&owner, SIDE, id_of(&m), reader.public(), 0)
        .tweak(|l| l.set_parent_path_hash(lock).unwrap())
        .sign(&owner);
    seed(&store, &[m.clone(), n, license]).await;

    let query = Query {
        source_public_key: Some(reader.public().clone()),
        target_public_key: Some(reader.public().clone()),
        ..base_query(ANCHOR)
    };
    let (nodes, _) = run_fetch(&store, query.clone()).await;
    assert!(payloads(&nodes).contains(&b"n".to_vec()));

    // The same license with a wrong path lock licenses nothing.
    let store = Arc::new(MemoryStore::new());
    let n2 = licensed_node(&owner, id_of(&m), b"n2", 1, 1);
    let bad_lock =
        trellis_store::fetch::licensing::path_lock_for(&[id_of(&m), Id32::from_bytes([7u8; 32])]);
    let license = NodeBuilder::license(&owner, SIDE, id_of(&m), reader.public(), 0)
        .tweak(|l| l.set_parent_path_hash(bad_lock).unwrap())
        .sign(&owner);
    seed(&store, &[m, n2, license]).await;
    let (nodes, _) = run_fetch(&store, query).await;
    assert!(!payloads(&nodes).contains(&b"n2".to_vec()));
}
