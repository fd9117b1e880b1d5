//! # Trellis Core - Foundation
//!
//! **Purpose**: single source of truth for the primitives every other crate
//! consumes.
//!
//! This crate provides the foundational pieces of the Trellis graph engine:
//!
//! - `Id32`: 32-byte content-addressed identifiers
//! - Structured hashing: the canonical tagged encoding whose Keccak-256
//!   digest determines ids, constraints and destroy hashes
//! - Signature schemes: Ed25519 and Ethereum-style recoverable ECDSA,
//!   discriminated by public-key length
//! - `TrellisError`: the unified error type
//! - Compile-time constants: destroy topics and difficulty floors
//!
//! # Architecture Constraints
//!
//! This crate has zero dependencies on other Trellis crates. It contains no
//! datamodel schemas (those live in `trellis-model`) and no storage or
//! traversal logic (`trellis-store`).

#![forbid(unsafe_code)]

pub mod constants;
pub mod crypto;
pub mod error;
pub mod hash;
pub mod id;

pub use error::{Result, TrellisError};
pub use hash::{hash_args, keccak256, HashArg};
pub use id::Id32;

pub use crypto::{KeyPair, PublicKey, SecretKey, SignatureScheme, MAX_SIGNATURE_LENGTH};
