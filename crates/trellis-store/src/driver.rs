//! The storage oracle the query processor consumes
//!
//! The processor never sees SQL: it asks for child rows by parent-id batch,
//! licenses by referenced id, and single nodes by id. Implementations must
//! exclude destroyed rows, assign monotonic storage timestamps on insert,
//! and expose read-committed visibility to concurrent requests.

use async_trait::async_trait;
use trellis_core::{Id32, PublicKey, Result};
use trellis_model::Node;

/// A stored node row: the decoded node plus its content-addressed id
#[derive(Debug, Clone)]
pub struct StoredNode {
    /// Content-addressed id of the stored image
    pub id1: Id32,
    /// Decoded node, transient `storageTime` populated
    pub node: Node,
}

impl StoredNode {
    /// The node's logical id: alias id of a copy, else `id1`
    pub fn logical_id(&self) -> Id32 {
        self.node.id2().unwrap_or(self.id1)
    }
}

/// Async storage oracle
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Child rows of the given parents, destroyed rows excluded
    async fn fetch_by_parents(&self, parents: &[Id32]) -> Result<Vec<StoredNode>>;

    /// A single row by `id1` or logical id
    async fn fetch_by_id(&self, id: Id32) -> Result<Option<StoredNode>>;

    /// License rows whose `refId` is among the given ids
    async fn fetch_licenses_for(&self, ref_ids: &[Id32]) -> Result<Vec<StoredNode>>;

    /// Whether an extension of the given license already exists for the
    /// `(owner, target)` pair; the embedding pass dedupes against this
    async fn has_extension(
        &self,
        original_id1: Id32,
        owner: &PublicKey,
        target: &PublicKey,
    ) -> Result<bool>;

    /// Store images, assigning storage timestamps no earlier than
    /// `now_seconds`. Returns the id1 of each stored image. Destroy nodes
    /// take effect during this call.
    async fn insert(&self, images: &[Vec<u8>], now_seconds: u32) -> Result<Vec<Id32>>;
}
