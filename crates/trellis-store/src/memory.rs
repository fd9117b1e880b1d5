//! In-memory reference driver
//!
//! Keeps every index the SQL shape declares: children by parent, licenses
//! by referenced id, achilles hashes, struck destroy hashes and destroyed
//! rows. Storage time is strictly monotonic per store. Writers take the
//! lock for the whole insert, so readers observe read-committed state.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use trellis_core::{Id32, PublicKey, Result, TrellisError};
use trellis_model::sign::Datamodel;
use trellis_model::{destroy, Node};

use crate::driver::{NodeStore, StoredNode};

#[derive(Default)]
struct Inner {
    nodes: HashMap<Id32, StoredNode>,
    by_parent: HashMap<Id32, Vec<Id32>>,
    by_logical: HashMap<Id32, Vec<Id32>>,
    license_by_ref: HashMap<Id32, Vec<Id32>>,
    achilles: HashMap<Id32, Vec<Id32>>,
    struck: HashSet<Id32>,
    destroyed: HashSet<Id32>,
    clock: u32,
}

/// In-memory `NodeStore` implementation
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (not destroyed) rows
    pub async fn live_count(&self) -> usize {
        let inner = self.inner.read().await;
        inner.nodes.len() - inner.destroyed.len()
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn fetch_by_parents(&self, parents: &[Id32]) -> Result<Vec<StoredNode>> {
        let inner = self.inner.read().await;
        let mut rows = Vec::new();
        for parent in parents {
            let Some(children) = inner.by_parent.get(parent) else {
                continue;
            };
            for id1 in children {
                if inner.destroyed.contains(id1) {
                    continue;
                }
                if let Some(row) = inner.nodes.get(id1) {
                    rows.push(row.clone());
                }
            }
        }
        Ok(rows)
    }

    async fn fetch_by_id(&self, id: Id32) -> Result<Option<StoredNode>> {
        let inner = self.inner.read().await;
        if let Some(row) = inner.nodes.get(&id) {
            if !inner.destroyed.contains(&id) {
                return Ok(Some(row.clone()));
            }
        }
        if let Some(id1s) = inner.by_logical.get(&id) {
            for id1 in id1s {
                if !inner.destroyed.contains(id1) {
                    if let Some(row) = inner.nodes.get(id1) {
                        return Ok(Some(row.clone()));
                    }
                }
            }
        }
        Ok(None)
    }

    async fn fetch_licenses_for(&self, ref_ids: &[Id32]) -> Result<Vec<StoredNode>> {
        let inner = self.inner.read().await;
        let mut rows = Vec::new();
        for ref_id in ref_ids {
            let Some(ids) = inner.license_by_ref.get(ref_id) else {
                continue;
            };
            for id1 in ids {
                if inner.destroyed.contains(id1) {
                    continue;
                }
                if let Some(row) = inner.nodes.get(id1) {
                    rows.push(row.clone());
                }
            }
        }
        Ok(rows)
    }

    async fn has_extension(
        &self,
        original_id1: Id32,
        owner: &PublicKey,
        target: &PublicKey,
    ) -> Result<bool> {
        let inner = self.inner.read().await;
        for (id1, row) in &inner.nodes {
            if inner.destroyed.contains(id1) || !row.node.is_license() {
                continue;
            }
            if row.node.owner().as_ref() != Some(owner)
                || row.node.target_public_key().as_ref() != Some(target)
            {
                continue;
            }
            let Some(embedded) = row.node.embedded() else {
                continue;
            };
            let Ok(inner_node) = Node::decode(embedded) else {
                continue;
            };
            if inner_node.id1().ok() == Some(original_id1) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn insert(&self, images: &[Vec<u8>], now_seconds: u32) -> Result<Vec<Id32>> {
        let mut inner = self.inner.write().await;
        let mut stored = Vec::with_capacity(images.len());
        for image in images {
            let mut node = Node::decode(image)?;
            let id1 = node.id1().map_err(|_| {
                TrellisError::storage("refusing to store an unsigned node")
            })?;
            if inner.nodes.contains_key(&id1) {
                stored.push(id1);
                continue;
            }

            inner.clock = inner.clock.saturating_add(1).max(now_seconds);
            let storage_time = inner.clock;
            node.set_storage_time(storage_time)?;

            let logical = node.id2().unwrap_or(id1);
            let parent = node
                .parent_id()
                .ok_or_else(|| TrellisError::storage("node without parentId"))?;

            // Index the node's own strike points, then apply any strike the
            // node itself performs.
            let achilles = destroy::node_achilles_hashes(&node)?;
            for hash in &achilles {
                inner.achilles.entry(*hash).or_default().push(id1);
            }
            let dead_on_arrival = achilles.iter().any(|h| inner.struck.contains(h));

            if let Some(strike) = destroy::destroy_match_hash(&node)? {
                debug!(strike = %strike, "destroy node stored, striking matches");
                inner.struck.insert(strike);
                let victims = inner.achilles.get(&strike).cloned().unwrap_or_default();
                for victim in victims {
                    inner.destroyed.insert(victim);
                }
            }

            inner.by_parent.entry(parent).or_default().push(id1);
            inner.by_logical.entry(logical).or_default().push(id1);
            if node.is_license() {
                if let Some(ref_id) = node.ref_id() {
                    inner.license_by_ref.entry(ref_id).or_default().push(id1);
                }
            }
            if dead_on_arrival {
                warn!(id1 = %id1, "stored node is already struck by a destroy hash");
                inner.destroyed.insert(id1);
            }
            inner.nodes.insert(id1, StoredNode { id1, node });
            stored.push(id1);
        }
        Ok(stored)
    }
}
