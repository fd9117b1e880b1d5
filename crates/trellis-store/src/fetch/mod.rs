//! The permissioned query processor

pub mod embedding;
pub mod licensing;
pub mod matcher;
pub mod processor;
pub mod query;
pub mod restrictive;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use trellis_model::Node;

pub use processor::Processor;
pub use query::{
    CmpOp, FetchRequest, FilterValue, IncludeLicenses, LimitField, Match, MatchFilter, Query,
    ReverseFetch,
};

/// One emitted reply batch; the final batch is empty on both sides
#[derive(Debug, Default)]
pub struct FetchReplyData {
    /// Visible nodes, in the declared order
    pub nodes: Vec<Node>,
    /// Unsigned license extensions for the querier to sign and store
    pub embed: Vec<Node>,
}

impl FetchReplyData {
    /// True for the completion batch
    pub fn is_final(&self) -> bool {
        self.nodes.is_empty() && self.embed.is_empty()
    }
}

/// Cooperative cancellation flag, checked at every suspension point
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
