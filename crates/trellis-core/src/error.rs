//! Unified error system for Trellis
//!
//! One error type serves the whole workspace. Routine invalidity (a cert
//! failing a validation rule, a node invisible to a querier) is *not* an
//! error: those paths return structured results. Errors are reserved for
//! decode failures, unusable key material, and storage faults.

use serde::{Deserialize, Serialize};

/// Unified error type for all Trellis operations
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum TrellisError {
    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// What was invalid
        message: String,
    },

    /// Cryptographic operation failed
    #[error("Crypto error: {message}")]
    Crypto {
        /// What failed
        message: String,
    },

    /// Public key length matches no known signature scheme
    #[error("Unknown crypto schema for public key of {key_length} bytes")]
    CryptoSchemaUnknown {
        /// Offending key length
        key_length: usize,
    },

    /// A field failed to decode from its binary image
    #[error("Decode error in field {field}: {reason}")]
    Decode {
        /// Field name (or index rendered as text when the name is unknown)
        field: String,
        /// Why decoding failed
        reason: String,
    },

    /// A field payload exceeded its declared maximum size
    #[error("Field {field} size {size} exceeds maximum {max}")]
    FieldSizeExceeded {
        /// Field name
        field: String,
        /// Observed payload size
        size: usize,
        /// Declared maximum
        max: usize,
    },

    /// An image carried a field index the schema does not declare
    #[error("Unknown field index {index}")]
    UnknownField {
        /// Offending field index
        index: u8,
    },

    /// Storage driver failure; aborts the fetch that observed it
    #[error("Storage error: {message}")]
    Storage {
        /// What failed
        message: String,
    },

    /// The caller cancelled the operation
    #[error("Cancelled")]
    Cancelled,
}

impl TrellisError {
    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a crypto error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create a structured decode error
    pub fn decode(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// Convenience result alias used across the workspace
pub type Result<T> = std::result::Result<T, TrellisError>;
