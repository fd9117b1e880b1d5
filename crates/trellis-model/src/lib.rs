//! # Trellis Model - Datamodel Layer
//!
//! Typed field containers with a stable binary image, and the two datamodel
//! families built on them:
//!
//! - **Certificates**: embeddable chain certs and the top certs (node, data,
//!   license, auth, friend) that confer signing and access rights, with
//!   multi-signature thresholds, constraints hashing and online bits.
//! - **Nodes**: the primary graph unit (data, license, carrier), with parent
//!   pointers, copy semantics, embedding, licensing windows and
//!   restrictive-write flags.
//!
//! Both families share one signing state machine and one destroy-hash
//! subsystem. Everything here is pure data: storage and traversal live in
//! `trellis-store`.

#![forbid(unsafe_code)]

pub mod cert;
pub mod codec;
pub mod destroy;
pub mod interface;
pub mod node;
pub mod sign;

pub use cert::{Cert, CertKind};
pub use codec::{ExportView, FieldKind, FieldSpec, ModelSchema, ModelStore};
pub use interface::{AnyModel, InterfaceHeader, InterfacePrefix};
pub use node::{Node, NodeKind};
pub use sign::{Datamodel, SignatureEntry};
