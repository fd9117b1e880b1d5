//! SQL driver contract
//!
//! Dialect drivers live outside this workspace; this module fixes what they
//! must provide: the table shape, `?`-style placeholders, BLOB parameters,
//! and the `run/get/all/close` surface. `SqlNodeStore` adapts any such
//! driver to the `NodeStore` oracle by issuing `parentId IN (...)` batches
//! with `LIMIT/OFFSET` pagination.

use async_trait::async_trait;

use trellis_core::{Id32, PublicKey, Result, TrellisError};
use trellis_model::sign::Datamodel;
use trellis_model::Node;

use crate::driver::{NodeStore, StoredNode};

/// Required tables, in creation order
pub const TABLES: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS nodes (\
     id1 BLOB PRIMARY KEY,\
     logical_id BLOB NOT NULL,\
     parent_id BLOB NOT NULL,\
     ref_id BLOB,\
     owner BLOB,\
     target_public_key BLOB,\
     is_license INTEGER NOT NULL DEFAULT 0,\
     storage_time INTEGER NOT NULL,\
     destroyed INTEGER NOT NULL DEFAULT 0,\
     image BLOB NOT NULL)",
    "CREATE TABLE IF NOT EXISTS achilles_hashes (\
     hash BLOB NOT NULL,\
     id1 BLOB NOT NULL)",
    "CREATE TABLE IF NOT EXISTS destroy_strikes (\
     hash BLOB PRIMARY KEY)",
];

/// A bound SQL parameter or result cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    /// Integer
    Int(i64),
    /// Text
    Text(String),
    /// BLOB
    Blob(Vec<u8>),
}

impl SqlValue {
    fn as_blob(&self) -> Option<&[u8]> {
        match self {
            SqlValue::Blob(b) => Some(b),
            _ => None,
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// One result row, cells in select order
#[derive(Debug, Clone)]
pub struct SqlRow {
    /// Result cells
    pub cells: Vec<SqlValue>,
}

/// The dialect driver surface
#[async_trait]
pub trait SqlDriver: Send + Sync {
    /// Execute a statement
    async fn run(&self, sql: &str, params: &[SqlValue]) -> Result<()>;

    /// Fetch at most one row
    async fn get(&self, sql: &str, params: &[SqlValue]) -> Result<Option<SqlRow>>;

    /// Fetch every row
    async fn all(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>>;

    /// Close the connection
    async fn close(&self) -> Result<()>;
}

/// Create the required tables on a driver
pub async fn create_tables<D: SqlDriver>(driver: &D) -> Result<()> {
    for ddl in TABLES {
        driver.run(ddl, &[]).await?;
    }
    Ok(())
}

fn placeholders(count: usize) -> String {
    let mut s = String::with_capacity(count * 2);
    for i in 0..count {
        if i > 0 {
            s.push(',');
        }
        s.push('?');
    }
    s
}

fn row_to_stored(row: &SqlRow) -> Result<StoredNode> {
    let image = row
        .cells
        .first()
        .and_then(SqlValue::as_blob)
        .ok_or_else(|| TrellisError::storage("row missing image column"))?;
    let storage_time = row
        .cells
        .get(1)
        .and_then(SqlValue::as_int)
        .ok_or_else(|| TrellisError::storage("row missing storage_time column"))?;
    let mut node = Node::decode(image)?;
    node.set_storage_time(u32::try_from(storage_time).unwrap_or(u32::MAX))?;
    let id1 = node.id1()?;
    Ok(StoredNode { id1, node })
}

/// `NodeStore` over any SQL dialect driver
pub struct SqlNodeStore<D: SqlDriver> {
    driver: D,
    page_size: usize,
}

impl<D: SqlDriver> SqlNodeStore<D> {
    /// Wrap a dialect driver; `page_size` bounds each `LIMIT` page
    pub fn new(driver: D, page_size: usize) -> Self {
        Self {
            driver,
            page_size: page_size.max(1),
        }
    }

    async fn paged(&self, sql_base: &str, params: Vec<SqlValue>) -> Result<Vec<StoredNode>> {
        let mut rows = Vec::new();
        let mut offset = 0i64;
        loop {
            let sql = format!("{sql_base} LIMIT ? OFFSET ?");
            let mut page_params = params.clone();
            page_params.push(SqlValue::Int(self.page_size as i64));
            page_params.push(SqlValue::Int(offset));
            let page = self.driver.all(&sql, &page_params).await?;
            let page_len = page.len();
            for row in &page {
                rows.push(row_to_stored(row)?);
            }
            if page_len < self.page_size {
                return Ok(rows);
            }
            offset += page_len as i64;
        }
    }
}

#[async_trait]
impl<D: SqlDriver> NodeStore for SqlNodeStore<D> {
    async fn fetch_by_parents(&self, parents: &[Id32]) -> Result<Vec<StoredNode>> {
        if parents.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT image, storage_time FROM nodes \
             WHERE parent_id IN ({}) AND destroyed = 0 ORDER BY id1",
            placeholders(parents.len())
        );
        let params = parents
            .iter()
            .map(|p| SqlValue::Blob(p.as_bytes().to_vec()))
            .collect();
        self.paged(&sql, params).await
    }

    async fn fetch_by_id(&self, id: Id32) -> Result<Option<StoredNode>> {
        let row = self
            .driver
            .get(
                "SELECT image, storage_time FROM nodes \
                 WHERE (id1 = ? OR logical_id = ?) AND destroyed = 0",
                &[
                    SqlValue::Blob(id.as_bytes().to_vec()),
                    SqlValue::Blob(id.as_bytes().to_vec()),
                ],
            )
            .await?;
        row.as_ref().map(row_to_stored).transpose()
    }

    async fn fetch_licenses_for(&self, ref_ids: &[Id32]) -> Result<Vec<StoredNode>> {
        if ref_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT image, storage_time FROM nodes \
             WHERE ref_id IN ({}) AND is_license = 1 AND destroyed = 0 ORDER BY id1",
            placeholders(ref_ids.len())
        );
        let params = ref_ids
            .iter()
            .map(|r| SqlValue::Blob(r.as_bytes().to_vec()))
            .collect();
        self.paged(&sql, params).await
    }

    async fn has_extension(
        &self,
        original_id1: Id32,
        owner: &PublicKey,
        target: &PublicKey,
    ) -> Result<bool> {
        // Embedded images are opaque to SQL; narrow by owner and target,
        // then inspect candidates.
        let rows = self
            .paged(
                "SELECT image, storage_time FROM nodes \
                 WHERE is_license = 1 AND owner = ? AND target_public_key = ? \
                 AND destroyed = 0 ORDER BY id1",
                vec![
                    SqlValue::Blob(owner.to_vec()),
                    SqlValue::Blob(target.to_vec()),
                ],
            )
            .await?;
        for row in rows {
            let Some(embedded) = row.node.embedded() else {
                continue;
            };
            let Ok(inner) = Node::decode(embedded) else {
                continue;
            };
            if inner.id1().ok() == Some(original_id1) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn insert(&self, images: &[Vec<u8>], now_seconds: u32) -> Result<Vec<Id32>> {
        use trellis_model::destroy;

        let mut stored = Vec::with_capacity(images.len());
        for image in images {
            let node = Node::decode(image)?;
            let id1 = node
                .id1()
                .map_err(|_| TrellisError::storage("refusing to store an unsigned node"))?;

            let exists = self
                .driver
                .get(
                    "SELECT id1, storage_time FROM nodes WHERE id1 = ?",
                    &[SqlValue::Blob(id1.as_bytes().to_vec())],
                )
                .await?;
            if exists.is_some() {
                stored.push(id1);
                continue;
            }

            let last = self
                .driver
                .get("SELECT MAX(storage_time), 0 FROM nodes", &[])
                .await?
                .and_then(|r| r.cells.first().and_then(SqlValue::as_int))
                .unwrap_or(0);
            let storage_time = (last + 1).max(i64::from(now_seconds));

            let parent = node
                .parent_id()
                .ok_or_else(|| TrellisError::storage("node without parentId"))?;

            let achilles = destroy::node_achilles_hashes(&node)?;
            let mut dead_on_arrival = false;
            for hash in &achilles {
                self.driver
                    .run(
                        "INSERT INTO achilles_hashes (hash, id1) VALUES (?, ?)",
                        &[
                            SqlValue::Blob(hash.as_bytes().to_vec()),
                            SqlValue::Blob(id1.as_bytes().to_vec()),
                        ],
                    )
                    .await?;
                let struck = self
                    .driver
                    .get(
                        "SELECT hash, 0 FROM destroy_strikes WHERE hash = ?",
                        &[SqlValue::Blob(hash.as_bytes().to_vec())],
                    )
                    .await?;
                dead_on_arrival = dead_on_arrival || struck.is_some();
            }

            if let Some(strike) = destroy::destroy_match_hash(&node)? {
                self.driver
                    .run(
                        "INSERT OR IGNORE INTO destroy_strikes (hash) VALUES (?)",
                        &[SqlValue::Blob(strike.as_bytes().to_vec())],
                    )
                    .await?;
                self.driver
                    .run(
                        "UPDATE nodes SET destroyed = 1 WHERE id1 IN \
                         (SELECT id1 FROM achilles_hashes WHERE hash = ?)",
                        &[SqlValue::Blob(strike.as_bytes().to_vec())],
                    )
                    .await?;
            }

            self.driver
                .run(
                    "INSERT INTO nodes (id1, logical_id, parent_id, ref_id, owner, \
                     target_public_key, is_license, storage_time, destroyed, image) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    &[
                        SqlValue::Blob(id1.as_bytes().to_vec()),
                        SqlValue::Blob(node.id2().unwrap_or(id1).as_bytes().to_vec()),
                        SqlValue::Blob(parent.as_bytes().to_vec()),
                        node.ref_id()
                            .map(|r| SqlValue::Blob(r.as_bytes().to_vec()))
                            .unwrap_or(SqlValue::Null),
                        node.owner()
                            .map(|o| SqlValue::Blob(o.to_vec()))
                            .unwrap_or(SqlValue::Null),
                        node.target_public_key()
                            .map(|t| SqlValue::Blob(t.to_vec()))
                            .unwrap_or(SqlValue::Null),
                        SqlValue::Int(i64::from(node.is_license())),
                        SqlValue::Int(storage_time),
                        SqlValue::Int(i64::from(dead_on_arrival)),
                        SqlValue::Blob(image.clone()),
                    ],
                )
                .await?;
            stored.push(id1);
        }
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_lists() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?,?,?");
    }

    #[test]
    fn tables_cover_required_shape() {
        assert!(TABLES[0].contains("parent_id"));
        assert!(TABLES[0].contains("image"));
        assert!(TABLES[1].contains("achilles"));
        assert!(TABLES[2].contains("destroy_strikes"));
    }
}
