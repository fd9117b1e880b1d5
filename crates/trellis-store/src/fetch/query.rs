//! Query descriptions
//!
//! Queries are data: callers describe the anchor, identities, match
//! clauses and flags, and ship them to the processor. Everything derives
//! serde so front-ends can express queries without linking this crate.

use serde::{Deserialize, Serialize};

use trellis_core::{Id32, PublicKey};

/// Comparison operator of a match filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    /// Equal
    Eq,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
    /// Not equal
    Ne,
}

/// Literal a filter compares against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Unsigned integer
    Uint(u64),
    /// UTF-8 string
    Str(String),
    /// Raw bytes
    Bytes(Vec<u8>),
}

/// One filter of a match clause, applied in declared order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchFilter {
    /// Field name to compare
    pub field: String,
    /// Comparison operator
    pub cmp: CmpOp,
    /// Comparison literal
    pub value: FilterValue,
    /// Optional bitmask applied to numeric fields before comparing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<u64>,
}

/// Per-field-value emission cap of a match clause
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitField {
    /// Grouping field name
    pub name: String,
    /// Per-value cap
    pub limit: usize,
}

/// One match clause of a query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Match {
    /// Clause id other clauses may require via `require_id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    /// Only candidates whose parent hit the clause with this id apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_id: Option<u32>,
    /// Levels this clause applies at; empty means every level
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub level: Vec<usize>,
    /// Interface prefix of eligible nodes (0–6 bytes; empty accepts all)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub node_type: Vec<u8>,
    /// Field filters, applied in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<MatchFilter>,
    /// Hits are leaves: traversal does not descend below them
    #[serde(default)]
    pub bottom: bool,
    /// Hits gate traversal but are not emitted
    #[serde(default)]
    pub discard: bool,
    /// Cap on nodes this clause emits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Per-field-value emission cap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_field: Option<LimitField>,
    /// Skip hits until this id1 is encountered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_id1: Option<Id32>,
}

/// Whether and how licenses accompany the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IncludeLicenses {
    /// No license handling
    #[default]
    None,
    /// Include governing licenses in the reply
    Include,
    /// Produce extendable licenses for the querier
    Extend,
    /// Both
    IncludeExtend,
}

impl IncludeLicenses {
    /// Governing licenses are included in the reply
    pub fn includes(&self) -> bool {
        matches!(self, Self::Include | Self::IncludeExtend)
    }

    /// Extension licenses are produced for the querier
    pub fn extends(&self) -> bool {
        matches!(self, Self::Extend | Self::IncludeExtend)
    }
}

/// Direction of the walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReverseFetch {
    /// Walk children, away from the anchor
    #[default]
    Off,
    /// Walk parents, following only licensed nodes
    OnlyLicensed,
    /// Walk parents unconditionally
    AllParents,
}

/// A fetch query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    /// Anchor: traversal starts at this node's children
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Id32>,
    /// Anchor alternative: an explicit root node image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_node: Option<Vec<u8>>,
    /// The querier's identity for privacy decisions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_public_key: Option<PublicKey>,
    /// The identity licenses are resolved against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_public_key: Option<PublicKey>,
    /// Ordered match clauses
    #[serde(default, rename = "match", skip_serializing_if = "Vec::is_empty")]
    pub match_clauses: Vec<Match>,
    /// Interface prefixes of node types eligible for embedding
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embed: Vec<Vec<u8>>,
    /// Traversal depth; absent means unlimited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    /// Cap on emitted nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Only nodes whose effective storage time is at or after this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cutoff_time: Option<u32>,
    /// Invert the emission order
    #[serde(default)]
    pub descending: bool,
    /// Order by storage time instead of creation time
    #[serde(default)]
    pub order_by_storage_time: bool,
    /// Exclude the querier's own nodes
    #[serde(default)]
    pub ignore_own: bool,
    /// Exclude nodes whose online requirements are unmet
    #[serde(default)]
    pub ignore_inactive: bool,
    /// Do not emit the explicit root node
    #[serde(default)]
    pub discard_root: bool,
    /// License accompaniment mode
    #[serde(default)]
    pub include_licenses: IncludeLicenses,
    /// Region restriction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Jurisdiction restriction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
    /// Walk direction
    #[serde(default)]
    pub reverse_fetch: ReverseFetch,
}

/// A fetch request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    /// The query to run
    pub query: Query,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_roundtrips_through_json() {
        let query = Query {
            parent_id: Some(Id32::from_bytes([1u8; 32])),
            match_clauses: vec![Match {
                id: Some(1),
                level: vec![1, 2],
                filters: vec![MatchFilter {
                    field: "difficulty".into(),
                    cmp: CmpOp::Ge,
                    value: FilterValue::Uint(2),
                    mask: None,
                }],
                ..Match::default()
            }],
            limit: Some(10),
            include_licenses: IncludeLicenses::IncludeExtend,
            ..Query::default()
        };
        let json = serde_json::to_string(&query).unwrap();
        let back: Query = serde_json::from_str(&json).unwrap();
        assert_eq!(back.parent_id, query.parent_id);
        assert_eq!(back.match_clauses.len(), 1);
        assert_eq!(back.limit, Some(10));
        assert!(back.include_licenses.extends());
    }

    #[test]
    fn defaults_are_empty() {
        let query: Query = serde_json::from_str("{}").unwrap();
        assert!(query.parent_id.is_none());
        assert_eq!(query.reverse_fetch, ReverseFetch::Off);
        assert!(!query.descending);
    }
}
