//! # Trellis Store - Storage and Query
//!
//! The storage side of the engine and the permissioned query processor:
//!
//! - **Driver contract**: the `NodeStore` oracle trait the processor
//!   consumes, the SQL table shape external dialect drivers implement, and
//!   an in-memory reference driver with destroy-hash indexing and monotonic
//!   storage time.
//! - **Query processor**: level-synchronous traversal over the node graph,
//!   evaluating match clauses, privacy, licensing, restrictive-write scopes
//!   and friend-cert pairings, emitting the visible subgraph in
//!   deterministic order plus any licenses the querier may extend.

#![forbid(unsafe_code)]

pub mod config;
pub mod driver;
pub mod fetch;
pub mod memory;
pub mod region;
pub mod sql;

pub use config::ProcessorConfig;
pub use driver::{NodeStore, StoredNode};
pub use fetch::{
    CancelToken, FetchReplyData, FetchRequest, IncludeLicenses, Match, MatchFilter, Processor,
    Query, ReverseFetch,
};
pub use memory::MemoryStore;
