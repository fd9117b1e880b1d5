//! Level-synchronous traversal
//!
//! One request runs to completion between driver calls; the only suspension
//! points are the driver queries and the reply channel. Per-request state
//! (match counters, cycle guard, scope stacks, friend-cert pool) is private
//! to the run, so concurrent requests share nothing but the store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, instrument, trace};

use trellis_core::{Id32, PublicKey, Result, TrellisError};
use trellis_model::cert::{CertKind, DeepValidate};
use trellis_model::sign::{self, Datamodel};
use trellis_model::{interface, AnyModel, Cert, Node};

use crate::config::ProcessorConfig;
use crate::driver::{NodeStore, StoredNode};
use crate::region;

use super::licensing::{self, AncestorEntry, LicenseEntry};
use super::matcher::{FirstPassHit, MatchSet};
use super::query::{FetchRequest, Query, ReverseFetch};
use super::restrictive::{ScopeRights, ScopeStack};
use super::{embedding, CancelToken, FetchReplyData};

/// The permissioned query processor
pub struct Processor<S: NodeStore> {
    store: Arc<S>,
    config: ProcessorConfig,
}

/// Traversal context the children of one parent inherit
struct ParentCtx {
    /// Ids children may reference as their parent
    fetch_ids: Vec<Id32>,
    /// The parent row, when stored
    node: Option<StoredNode>,
    /// The children's ancestor chain, nearest first
    ancestors: Vec<AncestorEntry>,
    /// Scopes applying to the children
    scopes: ScopeStack,
    /// Clause ids hit on the parent
    hits: Vec<u32>,
}

struct Candidate {
    row: StoredNode,
    ctx_index: usize,
    hit: FirstPassHit,
}

impl<S: NodeStore> Processor<S> {
    /// Create a processor over a store
    pub fn new(store: Arc<S>, config: ProcessorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// Run one fetch request.
    ///
    /// Reply batches stream through `reply`; the final batch is empty.
    /// Driver errors abort with the partial emission already sent;
    /// cancellation returns without further callbacks.
    #[instrument(skip_all, fields(reverse = ?request.query.reverse_fetch))]
    pub async fn fetch(
        &self,
        request: &FetchRequest,
        now_ms: u64,
        cancel: &CancelToken,
        reply: &mpsc::Sender<FetchReplyData>,
    ) -> Result<()> {
        let query = &request.query;
        match query.reverse_fetch {
            ReverseFetch::Off => self.forward(query, now_ms, cancel, reply).await?,
            _ => self.reverse(query, now_ms, cancel, reply).await?,
        }
        send(reply, FetchReplyData::default()).await
    }

    async fn forward(
        &self,
        query: &Query,
        now_ms: u64,
        cancel: &CancelToken,
        reply: &mpsc::Sender<FetchReplyData>,
    ) -> Result<()> {
        let mut matches = MatchSet::new(query.match_clauses.clone());
        let mut guard: HashMap<Id32, HashSet<Id32>> = HashMap::new();
        let mut friend_certs = Vec::new();
        let mut emitted_total = 0usize;
        let depth = query.depth.unwrap_or(self.config.default_depth);

        let mut ctxs = self
            .seed(query, now_ms, cancel, reply, &mut matches, &mut emitted_total)
            .await?;

        let mut level = 1usize;
        while !ctxs.is_empty() && level <= depth {
            check_cancel(cancel)?;
            if let Some(limit) = query.limit {
                if emitted_total >= limit {
                    break;
                }
            }

            let rows_by_parent = self.fetch_level_rows(&ctxs, cancel).await?;
            let candidates = self.screen_candidates(
                query,
                now_ms,
                level,
                &ctxs,
                &rows_by_parent,
                &mut guard,
                &mut friend_certs,
                &mut matches,
            );
            trace!(level, candidates = candidates.len(), "screened level");

            // One license fetch serves the licensing filter and the scope
            // rights of every candidate on this level.
            let mut ref_ids: HashSet<Id32> = HashSet::new();
            for candidate in &candidates {
                ref_ids.insert(candidate.row.logical_id());
                for ancestor in &ctxs[candidate.ctx_index].ancestors {
                    ref_ids.insert(ancestor.id);
                }
            }
            let ref_ids: Vec<Id32> = ref_ids.into_iter().collect();
            check_cancel(cancel)?;
            let license_rows = self.store.fetch_licenses_for(&ref_ids).await?;
            let mut licenses_by_ref: HashMap<Id32, Vec<StoredNode>> = HashMap::new();
            for row in &license_rows {
                if let Some(ref_id) = row.node.ref_id() {
                    licenses_by_ref.entry(ref_id).or_default().push(row.clone());
                }
            }
            let rights = ScopeRights::harvest(&license_rows, now_ms);

            let mut batch = FetchReplyData::default();
            let mut included: HashSet<Id32> = HashSet::new();
            let mut emitted_level: Vec<(u32, Id32, Node)> = Vec::new();
            let mut next_ctxs = Vec::new();

            for candidate in &candidates {
                let ctx = &ctxs[candidate.ctx_index];
                let author = candidate.row.node.effective_owner().ok().flatten();
                let is_own = match (&query.source_public_key, &author) {
                    (Some(source), Some(author)) => source == author,
                    _ => false,
                };
                if is_own && query.ignore_own {
                    continue;
                }

                let mut visible = candidate.row.node.is_public() || is_own;
                let mut tree: Option<Vec<LicenseEntry>> = None;
                if !visible && candidate.row.node.is_licensed() {
                    let entries = licensing::license_tree(
                        &candidate.row,
                        &ctx.ancestors,
                        &licenses_by_ref,
                        query.target_public_key.as_ref(),
                        now_ms,
                        &friend_certs,
                    );
                    visible = entries.iter().any(LicenseEntry::grants_visibility);
                    tree = Some(entries);
                }
                if !visible
                    && candidate.row.node.allow_rights_by_association()
                    && candidate.row.node.ref_id().is_some()
                {
                    visible = self.sibling_confers_rights(query, candidate, &candidates);
                }
                if visible && !ctx.scopes.admits(author.as_ref()) {
                    visible = false;
                }

                if !visible {
                    // Not visible as a node; it may still be extendable for
                    // the querier through the embed clauses.
                    self.try_embed(query, now_ms, candidate, &friend_certs, &mut batch)
                        .await?;
                    continue;
                }

                let (emit, descend) = matches.match_second(&candidate.row.node, &candidate.hit);
                if emit {
                    emitted_level.push((
                        sort_key(query, &candidate.row),
                        candidate.row.id1,
                        candidate.row.node.clone(),
                    ));
                    if let Some(entries) = &tree {
                        self.accompany_licenses(
                            query,
                            now_ms,
                            entries,
                            &mut included,
                            &mut batch,
                        )
                        .await?;
                    }
                }
                if descend {
                    next_ctxs.push(self.child_ctx(candidate, ctx, &rights, author.as_ref()));
                }
            }

            order_nodes(query, &mut emitted_level);
            if let Some(limit) = query.limit {
                emitted_level.truncate(limit.saturating_sub(emitted_total));
            }
            emitted_total += emitted_level.len();
            for (_, _, node) in emitted_level {
                batch.nodes.push(node);
                if batch.nodes.len() >= self.config.reply_batch_size {
                    check_cancel(cancel)?;
                    send(reply, std::mem::take(&mut batch)).await?;
                }
            }
            if !batch.is_final() {
                check_cancel(cancel)?;
                send(reply, batch).await?;
            }

            ctxs = next_ctxs;
            level += 1;
        }
        debug!(levels = level - 1, emitted = emitted_total, "forward fetch done");
        Ok(())
    }

    /// Build the level-1 contexts from the anchor
    async fn seed(
        &self,
        query: &Query,
        now_ms: u64,
        cancel: &CancelToken,
        reply: &mpsc::Sender<FetchReplyData>,
        matches: &mut MatchSet,
        emitted_total: &mut usize,
    ) -> Result<Vec<ParentCtx>> {
        if let Some(image) = &query.root_node {
            let node = Node::decode(image)?;
            let id1 = node.id1()?;
            let row = StoredNode { id1, node };
            let (ok, reason) = row.node.validate(DeepValidate::Deep, Some(now_ms));
            if !ok {
                return Err(TrellisError::invalid(format!("root node invalid: {reason}")));
            }
            if !sign::verify(&row.node)? {
                return Err(TrellisError::invalid("root node signature invalid"));
            }

            let hit = matches.match_first(&row.node, row.id1, 0, &[]);
            let mut hits = Vec::new();
            if !hit.is_miss() {
                let (emit, _) = matches.match_second(&row.node, &hit);
                if emit && !query.discard_root {
                    check_cancel(cancel)?;
                    send(
                        reply,
                        FetchReplyData {
                            nodes: vec![row.node.clone()],
                            embed: Vec::new(),
                        },
                    )
                    .await?;
                    *emitted_total += 1;
                }
                hits = hit.clause_ids;
            }
            return Ok(vec![self.anchor_ctx(query, Some(row), hits, now_ms).await?]);
        }

        let Some(parent_id) = query.parent_id else {
            return Err(TrellisError::invalid(
                "query needs a parentId or a root node",
            ));
        };
        let row = self.store.fetch_by_id(parent_id).await?;
        match row {
            Some(row) => Ok(vec![self.anchor_ctx(query, Some(row), Vec::new(), now_ms).await?]),
            None => Ok(vec![ParentCtx {
                fetch_ids: vec![parent_id],
                node: None,
                ancestors: Vec::new(),
                scopes: ScopeStack::new(),
                hits: Vec::new(),
            }]),
        }
    }

    async fn anchor_ctx(
        &self,
        _query: &Query,
        row: Option<StoredNode>,
        hits: Vec<u32>,
        now_ms: u64,
    ) -> Result<ParentCtx> {
        let Some(row) = row else {
            return Err(TrellisError::invalid("anchor row required"));
        };
        let owner = row.node.effective_owner().ok().flatten();
        let mut fetch_ids = vec![row.id1];
        let logical = row.logical_id();
        if logical != row.id1 {
            fetch_ids.push(logical);
        }
        let ancestors = vec![AncestorEntry {
            id: logical,
            owner: owner.clone(),
        }];

        // The anchor may itself open a restrictive-write scope.
        let mut scopes = ScopeStack::new();
        if row.node.is_begin_restrictive_write_mode() {
            let license_rows = self.store.fetch_licenses_for(&[logical]).await?;
            let rights = ScopeRights::harvest(&license_rows, now_ms);
            scopes = scopes.child_stack(&row, owner.as_ref(), &rights);
        }

        Ok(ParentCtx {
            fetch_ids,
            node: Some(row),
            ancestors,
            scopes,
            hits,
        })
    }

    async fn fetch_level_rows(
        &self,
        ctxs: &[ParentCtx],
        cancel: &CancelToken,
    ) -> Result<HashMap<Id32, Vec<StoredNode>>> {
        let mut ids: Vec<Id32> = Vec::new();
        let mut seen = HashSet::new();
        for ctx in ctxs {
            for id in &ctx.fetch_ids {
                if seen.insert(*id) {
                    ids.push(*id);
                }
            }
        }
        let mut by_parent: HashMap<Id32, Vec<StoredNode>> = HashMap::new();
        for chunk in ids.chunks(self.config.parent_batch_size) {
            check_cancel(cancel)?;
            let rows = self.store.fetch_by_parents(chunk).await?;
            for row in rows {
                if let Some(parent) = row.node.parent_id() {
                    by_parent.entry(parent).or_default().push(row);
                }
            }
        }
        Ok(by_parent)
    }

    /// Basic validity, geography, cutoff, cycle guard and the first match
    /// pass. Nodes failing any check drop silently.
    #[allow(clippy::too_many_arguments)]
    fn screen_candidates(
        &self,
        query: &Query,
        now_ms: u64,
        level: usize,
        ctxs: &[ParentCtx],
        rows_by_parent: &HashMap<Id32, Vec<StoredNode>>,
        guard: &mut HashMap<Id32, HashSet<Id32>>,
        friend_certs: &mut Vec<Cert>,
        matches: &mut MatchSet,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        for (ctx_index, ctx) in ctxs.iter().enumerate() {
            for fetch_id in &ctx.fetch_ids {
                let Some(rows) = rows_by_parent.get(fetch_id) else {
                    continue;
                };
                for row in rows {
                    let (ok, reason) =
                        row.node
                            .validate(DeepValidate::Deep, Some(now_ms));
                    if !ok {
                        trace!(id1 = %row.id1, reason, "candidate excluded: invalid");
                        continue;
                    }
                    if !sign::verify(&row.node).unwrap_or(false) {
                        trace!(id1 = %row.id1, "candidate excluded: signature");
                        continue;
                    }
                    if !region::admits(query.region.as_deref(), row.node.region())
                        || !region::admits(query.jurisdiction.as_deref(), row.node.jurisdiction())
                    {
                        continue;
                    }
                    if let Some(cutoff) = query.cutoff_time {
                        if row.node.effective_storage_time().unwrap_or(0) < cutoff {
                            continue;
                        }
                    }
                    if query.ignore_inactive && !row.node.is_active() {
                        continue;
                    }
                    if let Some(parent) = &ctx.node {
                        if !parent.node.accepts_child_difficulty(&row.node) {
                            continue;
                        }
                    }

                    // Copies of one logical node process per id1; an id1
                    // seen anywhere before is a cycle and drops.
                    let seen = guard.entry(row.logical_id()).or_default();
                    if !seen.insert(row.id1) {
                        continue;
                    }

                    harvest_friend_certs(&row.node, friend_certs);

                    let hit = matches.match_first(&row.node, row.id1, level, &ctx.hits);
                    if hit.is_miss() {
                        continue;
                    }
                    candidates.push(Candidate {
                        row: row.clone(),
                        ctx_index,
                        hit,
                    });
                }
            }
        }
        candidates
    }

    /// Rights by association: a sibling under the same parent, owned by the
    /// querier, referencing the same node
    fn sibling_confers_rights(
        &self,
        query: &Query,
        candidate: &Candidate,
        candidates: &[Candidate],
    ) -> bool {
        let Some(source) = &query.source_public_key else {
            return false;
        };
        let ref_id = candidate.row.node.ref_id();
        candidates.iter().any(|sibling| {
            sibling.ctx_index == candidate.ctx_index
                && sibling.row.id1 != candidate.row.id1
                && sibling.row.node.ref_id() == ref_id
                && sibling.row.node.effective_owner().ok().flatten().as_ref() == Some(source)
        })
    }

    /// Include governing licenses and produce extensions for the querier
    async fn accompany_licenses(
        &self,
        query: &Query,
        now_ms: u64,
        entries: &[LicenseEntry],
        included: &mut HashSet<Id32>,
        batch: &mut FetchReplyData,
    ) -> Result<()> {
        for entry in entries {
            if query.include_licenses.includes()
                && entry.grants_visibility()
                && included.insert(entry.license.id1)
            {
                batch.nodes.push(entry.license.node.clone());
            }
            if query.include_licenses.extends() {
                self.extend_entry(query, now_ms, entry, batch).await?;
            }
        }
        Ok(())
    }

    /// Produce an unsigned extension from one license-tree entry, deduped
    /// against the store
    async fn extend_entry(
        &self,
        query: &Query,
        now_ms: u64,
        entry: &LicenseEntry,
        batch: &mut FetchReplyData,
    ) -> Result<()> {
        let Some(source) = &query.source_public_key else {
            return Ok(());
        };
        let license = &entry.license;
        if license.node.extensions() == 0
            || license.node.target_public_key().as_ref() != Some(source)
        {
            return Ok(());
        }
        let now_seconds = u32::try_from(now_ms / 1000).unwrap_or(u32::MAX);
        let extension = match &entry.via {
            super::licensing::LicenseVia::Friend { cert_a, cert_b } => {
                embedding::apply_friend_certs(license, cert_a, cert_b, source, now_seconds)
            }
            _ => {
                let Some(target) = &query.target_public_key else {
                    return Ok(());
                };
                if target == source {
                    return Ok(());
                }
                embedding::build_extension(license, source, target, now_seconds)
            }
        };
        let Ok(extension) = extension else {
            return Ok(());
        };
        let Some(target) = extension.target_public_key() else {
            return Ok(());
        };
        if self
            .store
            .has_extension(license.id1, source, &target)
            .await?
        {
            return Ok(());
        }
        batch.embed.push(extension);
        Ok(())
    }

    /// Embed-clause handling for nodes invisible to the querier
    async fn try_embed(
        &self,
        query: &Query,
        now_ms: u64,
        candidate: &Candidate,
        friend_certs: &[Cert],
        batch: &mut FetchReplyData,
    ) -> Result<()> {
        if query.embed.is_empty() {
            return Ok(());
        }
        let node = &candidate.row.node;
        let matches_embed = query
            .embed
            .iter()
            .any(|prefix| node.kind().prefix().accepts(prefix));
        if !matches_embed || !node.is_license() {
            return Ok(());
        }
        let Some(source) = &query.source_public_key else {
            return Ok(());
        };
        if node.extensions() == 0 || node.target_public_key().as_ref() != Some(source) {
            return Ok(());
        }
        let Some(target) = &query.target_public_key else {
            return Ok(());
        };
        if target == source {
            return Ok(());
        }
        let now_seconds = u32::try_from(now_ms / 1000).unwrap_or(u32::MAX);

        // Prefer a friend-cert bridge when the license calls for one.
        let extension = if node.friend_level().unwrap_or(0) >= 1 {
            let licensor = node.effective_owner().ok().flatten();
            let pair = licensor.as_ref().and_then(|licensor| {
                find_pair_for(friend_certs, licensor, target)
            });
            match pair {
                Some((cert_a, cert_b)) => embedding::apply_friend_certs(
                    &candidate.row,
                    cert_a,
                    cert_b,
                    source,
                    now_seconds,
                ),
                None => embedding::build_extension(&candidate.row, source, target, now_seconds),
            }
        } else {
            embedding::build_extension(&candidate.row, source, target, now_seconds)
        };
        let Ok(extension) = extension else {
            return Ok(());
        };
        let Some(actual_target) = extension.target_public_key() else {
            return Ok(());
        };
        if self
            .store
            .has_extension(candidate.row.id1, source, &actual_target)
            .await?
        {
            return Ok(());
        }
        batch.embed.push(extension);
        Ok(())
    }

    fn child_ctx(
        &self,
        candidate: &Candidate,
        ctx: &ParentCtx,
        rights: &ScopeRights,
        author: Option<&PublicKey>,
    ) -> ParentCtx {
        let logical = candidate.row.logical_id();
        let mut fetch_ids = vec![candidate.row.id1];
        if logical != candidate.row.id1 {
            fetch_ids.push(logical);
        }
        let mut ancestors = Vec::with_capacity(ctx.ancestors.len() + 1);
        ancestors.push(AncestorEntry {
            id: logical,
            owner: author.cloned(),
        });
        ancestors.extend(ctx.ancestors.iter().cloned());

        ParentCtx {
            fetch_ids,
            node: Some(candidate.row.clone()),
            ancestors,
            scopes: ctx.scopes.child_stack(&candidate.row, author, rights),
            hits: candidate.hit.clause_ids.clone(),
        }
    }

    /// Walk from the anchor toward the root
    async fn reverse(
        &self,
        query: &Query,
        now_ms: u64,
        cancel: &CancelToken,
        reply: &mpsc::Sender<FetchReplyData>,
    ) -> Result<()> {
        let Some(anchor) = query.parent_id else {
            return Err(TrellisError::invalid("reverse fetch needs a parentId"));
        };
        let depth = query.depth.unwrap_or(self.config.default_depth);

        // Climb first; every node's ancestors are the rest of the chain.
        let mut chain: Vec<StoredNode> = Vec::new();
        let mut seen = HashSet::new();
        let mut current = anchor;
        while chain.len() < depth {
            check_cancel(cancel)?;
            let Some(row) = self.store.fetch_by_id(current).await? else {
                break;
            };
            if !seen.insert(row.id1) {
                break;
            }
            let parent = row.node.parent_id();
            chain.push(row);
            match parent {
                Some(parent) if !parent.is_zero() => current = parent,
                _ => break,
            }
        }

        let chain_ids: Vec<Id32> = chain.iter().map(StoredNode::logical_id).collect();
        check_cancel(cancel)?;
        let license_rows = self.store.fetch_licenses_for(&chain_ids).await?;
        let mut licenses_by_ref: HashMap<Id32, Vec<StoredNode>> = HashMap::new();
        for row in &license_rows {
            if let Some(ref_id) = row.node.ref_id() {
                licenses_by_ref.entry(ref_id).or_default().push(row.clone());
            }
        }

        let mut batch = FetchReplyData::default();
        let mut included = HashSet::new();
        for (index, row) in chain.iter().enumerate() {
            let (ok, _) = row
                .node
                .validate(DeepValidate::Deep, Some(now_ms));
            if !ok || !sign::verify(&row.node).unwrap_or(false) {
                if query.reverse_fetch == ReverseFetch::OnlyLicensed {
                    break;
                }
                continue;
            }

            if query.reverse_fetch == ReverseFetch::OnlyLicensed {
                let ancestors: Vec<AncestorEntry> = chain[index + 1..]
                    .iter()
                    .map(|r| AncestorEntry {
                        id: r.logical_id(),
                        owner: r.node.effective_owner().ok().flatten(),
                    })
                    .collect();
                let author = row.node.effective_owner().ok().flatten();
                let is_own = match (&query.source_public_key, &author) {
                    (Some(source), Some(author)) => source == author,
                    _ => false,
                };
                let mut visible = row.node.is_public() || is_own;
                if !visible && row.node.is_licensed() {
                    let entries = licensing::license_tree(
                        row,
                        &ancestors,
                        &licenses_by_ref,
                        query.target_public_key.as_ref(),
                        now_ms,
                        &[],
                    );
                    visible = entries.iter().any(LicenseEntry::grants_visibility);
                    if visible && query.include_licenses.includes() {
                        for entry in &entries {
                            if entry.grants_visibility() && included.insert(entry.license.id1) {
                                batch.nodes.push(entry.license.node.clone());
                            }
                        }
                    }
                }
                if !visible {
                    // The licensed trail ends here.
                    break;
                }
            }

            batch.nodes.push(row.node.clone());
            if batch.nodes.len() >= self.config.reply_batch_size {
                check_cancel(cancel)?;
                send(reply, std::mem::take(&mut batch)).await?;
            }
        }
        if !batch.is_final() {
            check_cancel(cancel)?;
            send(reply, batch).await?;
        }
        Ok(())
    }
}

fn harvest_friend_certs(node: &Node, pool: &mut Vec<Cert>) {
    let Some(image) = node.embedded() else {
        return;
    };
    if let Ok(AnyModel::Cert(cert)) = interface::decode_any(image) {
        if cert.kind() == CertKind::Friend
            && !pool.iter().any(|c| {
                c.owner() == cert.owner() && c.constraints() == cert.constraints()
            })
        {
            pool.push(cert);
        }
    }
}

fn find_pair_for<'a>(
    pool: &'a [Cert],
    licensor: &PublicKey,
    target: &PublicKey,
) -> Option<(&'a Cert, &'a Cert)> {
    for cert_a in pool {
        if cert_a.owner().as_ref() != Some(licensor) {
            continue;
        }
        for cert_b in pool {
            if cert_b.owner().as_ref() != Some(target) {
                continue;
            }
            if trellis_model::cert::friend::is_valid_pair(cert_a, cert_b) {
                return Some((cert_a, cert_b));
            }
        }
    }
    None
}

fn sort_key(query: &Query, row: &StoredNode) -> u32 {
    if query.order_by_storage_time {
        row.node.effective_storage_time().unwrap_or(0)
    } else {
        row.node.creation_time().unwrap_or(0)
    }
}

fn order_nodes(query: &Query, nodes: &mut [(u32, Id32, Node)]) {
    nodes.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    if query.descending {
        nodes.reverse();
    }
}

fn check_cancel(cancel: &CancelToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(TrellisError::Cancelled);
    }
    Ok(())
}

async fn send(reply: &mpsc::Sender<FetchReplyData>, data: FetchReplyData) -> Result<()> {
    reply
        .send(data)
        .await
        .map_err(|_| TrellisError::Cancelled)
}
