//! Content-addressed identifier types
//!
//! Every node is addressed by a 32-byte digest (`id1`); parent pointers,
//! alias ids from copies (`id2`), constraints hashes and destroy hashes all
//! share the same representation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte content-addressed identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id32(pub [u8; 32]);

impl Id32 {
    /// The all-zero id, used as the root anchor of a graph
    pub const ZERO: Id32 = Id32([0u8; 32]);

    /// Create from a fixed-size array
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Try to construct from a slice
    pub fn try_from_slice(bytes: &[u8]) -> crate::Result<Self> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| crate::TrellisError::invalid("id must be exactly 32 bytes"))?;
        Ok(Self(arr))
    }

    /// Borrow the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to fixed-size array
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    /// True when every byte is zero
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Id32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Id32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short prefix keeps traversal traces readable.
        write!(f, "Id32({}..)", hex::encode(&self.0[..6]))
    }
}

impl From<[u8; 32]> for Id32 {
    fn from(value: [u8; 32]) -> Self {
        Self(value)
    }
}

impl TryFrom<&[u8]> for Id32 {
    type Error = crate::TrellisError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Self::try_from_slice(value)
    }
}

impl AsRef<[u8]> for Id32 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_lengths_rejected() {
        assert!(Id32::try_from_slice(&[0u8; 31]).is_err());
        assert!(Id32::try_from_slice(&[0u8; 33]).is_err());
        assert!(Id32::try_from_slice(&[7u8; 32]).is_ok());
    }

    #[test]
    fn zero_detection() {
        assert!(Id32::ZERO.is_zero());
        assert!(!Id32::from_bytes([1u8; 32]).is_zero());
    }
}
