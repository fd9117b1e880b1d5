//! Restrictive-write scope resolution
//!
//! A node flagged `isBeginRestrictiveWriteMode` opens a scope over its
//! children: only authors admitted by the scope — the opener, or targets of
//! the opener's writer licenses on the scope node — remain visible. Scopes
//! nest along the path; a node is checked against the innermost open scope,
//! and every scope opener was itself admitted by its enclosing scope when
//! the traversal reached it, so admission accumulates across the stack.
//! `isEndRestrictiveWriteMode` closes the innermost scope, by the opener or
//! by a holder of the opener's manager license.

use std::collections::{HashMap, HashSet};

use trellis_core::{Id32, PublicKey};
use trellis_model::cert::DeepValidate;
use trellis_model::sign;

use crate::driver::StoredNode;

/// One open restrictive-write scope
#[derive(Debug, Clone)]
pub struct WriteScope {
    /// Logical id of the node that opened the scope
    pub scope_node_id: Id32,
    /// Owner of the opening node
    pub opener: PublicKey,
    /// Authors admitted as writers
    pub writers: HashSet<PublicKey>,
    /// Holders of manager rights, allowed to end the scope
    pub managers: HashSet<PublicKey>,
}

impl WriteScope {
    /// Whether the scope admits an author
    pub fn admits(&self, author: &PublicKey) -> bool {
        author == &self.opener || self.writers.contains(author)
    }
}

/// The stack of open scopes along one traversal path
#[derive(Debug, Clone, Default)]
pub struct ScopeStack {
    scopes: Vec<WriteScope>,
}

impl ScopeStack {
    /// No open scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a node authored by `author` is visible under this stack
    pub fn admits(&self, author: Option<&PublicKey>) -> bool {
        let Some(innermost) = self.scopes.last() else {
            return true;
        };
        match author {
            Some(author) => innermost.admits(author),
            None => false,
        }
    }

    /// Open scopes
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Derive the stack a node's children inherit.
    ///
    /// An end flag pops the innermost scope when the node's author is the
    /// opener or holds a manager license; otherwise the flag is ignored.
    /// A begin flag then pushes the node's own scope.
    pub fn child_stack(
        &self,
        row: &StoredNode,
        author: Option<&PublicKey>,
        rights: &ScopeRights,
    ) -> ScopeStack {
        let mut next = self.clone();
        if row.node.is_end_restrictive_write_mode() {
            if let (Some(scope), Some(author)) = (next.scopes.last(), author) {
                if author == &scope.opener || scope.managers.contains(author) {
                    next.scopes.pop();
                }
            }
        }
        if row.node.is_begin_restrictive_write_mode() {
            if let Some(opener) = author {
                let scope_node_id = row.logical_id();
                let (writers, managers) = rights.for_scope(scope_node_id, opener);
                next.scopes.push(WriteScope {
                    scope_node_id,
                    opener: opener.clone(),
                    writers,
                    managers,
                });
            }
        }
        next
    }
}

/// Writer and manager grants harvested from license rows, keyed by the
/// scope node they reference
#[derive(Debug, Default)]
pub struct ScopeRights {
    /// scope node id → (license owner, target, writer?, manager?)
    grants: HashMap<Id32, Vec<Grant>>,
}

#[derive(Debug)]
struct Grant {
    owner: PublicKey,
    target: PublicKey,
    writer: bool,
    manager: bool,
}

impl ScopeRights {
    /// Harvest grants from license rows; invalid licenses are ignored
    pub fn harvest(rows: &[StoredNode], now_ms: u64) -> Self {
        let mut rights = Self::default();
        for row in rows {
            let license = &row.node;
            if !license.is_license() {
                continue;
            }
            if !license.is_restrictive_mode_writer() && !license.is_restrictive_mode_manager() {
                continue;
            }
            let (ok, _) = license.validate(DeepValidate::Deep, Some(now_ms));
            if !ok || !sign::verify(license).unwrap_or(false) {
                continue;
            }
            let (Some(ref_id), Some(owner), Some(target)) = (
                license.ref_id(),
                license.effective_owner().ok().flatten(),
                license.target_public_key(),
            ) else {
                continue;
            };
            rights.grants.entry(ref_id).or_default().push(Grant {
                owner,
                target,
                writer: license.is_restrictive_mode_writer(),
                manager: license.is_restrictive_mode_manager(),
            });
        }
        rights
    }

    /// Writers and managers for a scope, restricted to grants issued by the
    /// scope opener
    pub fn for_scope(
        &self,
        scope_node_id: Id32,
        opener: &PublicKey,
    ) -> (HashSet<PublicKey>, HashSet<PublicKey>) {
        let mut writers = HashSet::new();
        let mut managers = HashSet::new();
        if let Some(grants) = self.grants.get(&scope_node_id) {
            for grant in grants {
                if &grant.owner != opener {
                    continue;
                }
                if grant.writer {
                    writers.insert(grant.target.clone());
                }
                if grant.manager {
                    managers.insert(grant.target.clone());
                }
            }
        }
        (writers, managers)
    }

    /// Scope node ids with at least one grant
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}
