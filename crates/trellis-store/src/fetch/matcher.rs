//! Match clause evaluation
//!
//! The first pass runs before the permission filters and records which
//! clauses hit; the second pass runs after them and applies emission
//! accounting (limits, per-field-value groups, bottom and discard).

use std::collections::HashMap;

use trellis_core::{hash_args, HashArg, Id32};
use trellis_model::sign::Datamodel;
use trellis_model::Node;

use super::query::{CmpOp, FilterValue, Match, MatchFilter};

/// Mutable per-run state of one match clause
#[derive(Debug, Default, Clone)]
pub struct MatchState {
    /// Nodes this clause has emitted
    pub emitted: usize,
    /// Emission count per hashed field value
    pub groups: HashMap<[u8; 32], usize>,
    /// Whether the declared cursor id1 has been passed
    pub cursor_passed: bool,
}

/// The query's match clauses plus their per-run states
#[derive(Debug, Clone)]
pub struct MatchSet {
    clauses: Vec<Match>,
    states: Vec<MatchState>,
}

/// Outcome of the first match pass for one candidate
#[derive(Debug, Default, Clone)]
pub struct FirstPassHit {
    /// Indexes of clauses that hit
    pub clause_indexes: Vec<usize>,
    /// Declared ids of clauses that hit, inherited by children
    pub clause_ids: Vec<u32>,
}

impl FirstPassHit {
    /// No clause hit: the candidate drops out of the traversal
    pub fn is_miss(&self) -> bool {
        self.clause_indexes.is_empty()
    }
}

impl MatchSet {
    /// Build from the query's clause list; an empty list becomes one
    /// match-anything clause.
    pub fn new(mut clauses: Vec<Match>) -> Self {
        if clauses.is_empty() {
            clauses.push(Match::default());
        }
        let states = vec![MatchState::default(); clauses.len()];
        Self { clauses, states }
    }

    /// The clause at an index
    pub fn clause(&self, index: usize) -> &Match {
        &self.clauses[index]
    }

    /// First pass: evaluate every applicable clause against a candidate.
    ///
    /// `parent_hits` carries the clause ids that hit on the candidate's
    /// parent, for `require_id` chaining.
    pub fn match_first(
        &mut self,
        node: &Node,
        id1: Id32,
        level: usize,
        parent_hits: &[u32],
    ) -> FirstPassHit {
        let mut hit = FirstPassHit::default();
        for (index, clause) in self.clauses.iter().enumerate() {
            if !clause.level.is_empty() && !clause.level.contains(&level) {
                continue;
            }
            if let Some(required) = clause.require_id {
                if !parent_hits.contains(&required) {
                    continue;
                }
            }
            if !clause.node_type.is_empty() && !node.kind().prefix().accepts(&clause.node_type) {
                continue;
            }
            if !clause.filters.iter().all(|f| filter_matches(node, f)) {
                continue;
            }
            // The cursor consumes hits until its id1 appears.
            if let Some(cursor) = clause.cursor_id1 {
                let state = &mut self.states[index];
                if !state.cursor_passed {
                    if id1 == cursor {
                        state.cursor_passed = true;
                    }
                    continue;
                }
            }
            hit.clause_indexes.push(index);
            if let Some(id) = clause.id {
                hit.clause_ids.push(id);
            }
        }
        hit
    }

    /// Second pass: emission accounting for a permitted node.
    ///
    /// Returns `(emit, descend)`: whether the node enters the reply and
    /// whether traversal continues below it. A node that exhausts every
    /// clause's limit neither emits nor descends.
    pub fn match_second(&mut self, node: &Node, hit: &FirstPassHit) -> (bool, bool) {
        let mut emit = false;
        let mut descend = false;
        for &index in &hit.clause_indexes {
            let clause = &self.clauses[index];

            if let Some(limit) = clause.limit {
                if self.states[index].emitted >= limit {
                    continue;
                }
            }
            if let Some(limit_field) = &clause.limit_field {
                let key = group_key(node, &limit_field.name);
                let count = self.states[index].groups.get(&key).copied().unwrap_or(0);
                if count >= limit_field.limit {
                    continue;
                }
                self.states[index].groups.insert(key, count + 1);
            }
            self.states[index].emitted += 1;

            if !clause.discard {
                emit = true;
            }
            if !clause.bottom {
                descend = true;
            }
        }
        (emit, descend)
    }
}

/// Hash a field's value for per-value limit grouping
fn group_key(node: &Node, field: &str) -> [u8; 32] {
    match node.store().get_raw(field) {
        Some(payload) => hash_args(&[HashArg::bytes(payload.to_vec())]),
        None => hash_args(&[HashArg::Absent]),
    }
}

/// Evaluate a single filter against a node field
pub fn filter_matches(node: &Node, filter: &MatchFilter) -> bool {
    let Some(spec) = node.store().schema().by_name(&filter.field) else {
        return false;
    };
    let payload = node.store().get_raw(&filter.field);

    match &filter.value {
        FilterValue::Uint(literal) => {
            let Some(mut value) = payload.and_then(|p| numeric_value(spec.kind, p)) else {
                return false;
            };
            if let Some(mask) = filter.mask {
                value &= mask;
            }
            compare_ord(value.cmp(literal), filter.cmp)
        }
        FilterValue::Str(literal) => {
            let Some(value) = payload.and_then(|p| std::str::from_utf8(p).ok()) else {
                return false;
            };
            compare_ord(value.cmp(literal.as_str()), filter.cmp)
        }
        FilterValue::Bytes(literal) => {
            let Some(value) = payload else {
                return false;
            };
            compare_ord(value.cmp(literal.as_slice()), filter.cmp)
        }
    }
}

fn numeric_value(kind: trellis_model::FieldKind, payload: &[u8]) -> Option<u64> {
    use trellis_model::FieldKind;
    match kind {
        FieldKind::UInt8 => payload.first().map(|b| u64::from(*b)),
        FieldKind::UInt16Be => <[u8; 2]>::try_from(payload)
            .ok()
            .map(|b| u64::from(u16::from_be_bytes(b))),
        FieldKind::UInt16Le => <[u8; 2]>::try_from(payload)
            .ok()
            .map(|b| u64::from(u16::from_le_bytes(b))),
        FieldKind::UInt24Be => (payload.len() == 3)
            .then(|| u64::from(u32::from_be_bytes([0, payload[0], payload[1], payload[2]]))),
        FieldKind::UInt32Be => <[u8; 4]>::try_from(payload)
            .ok()
            .map(|b| u64::from(u32::from_be_bytes(b))),
        _ => None,
    }
}

fn compare_ord(ordering: std::cmp::Ordering, cmp: CmpOp) -> bool {
    use std::cmp::Ordering::*;
    match cmp {
        CmpOp::Eq => ordering == Equal,
        CmpOp::Ne => ordering != Equal,
        CmpOp::Lt => ordering == Less,
        CmpOp::Le => ordering != Greater,
        CmpOp::Gt => ordering == Greater,
        CmpOp::Ge => ordering != Less,
    }
}
