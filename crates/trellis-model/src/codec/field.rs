//! Field kinds and per-field validation

use trellis_core::{HashArg, Result, TrellisError};

/// Wire type of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// 1-byte unsigned integer
    UInt8,
    /// 2-byte big-endian unsigned integer
    UInt16Be,
    /// 2-byte little-endian unsigned integer (user config bits)
    UInt16Le,
    /// 3-byte big-endian unsigned integer
    UInt24Be,
    /// 4-byte big-endian unsigned integer
    UInt32Be,
    /// Exactly 32 bytes (ids, digests)
    Byte32,
    /// Length-prefixed bytes with a declared size cap
    Bytes {
        /// Maximum payload size
        max: usize,
    },
    /// UTF-8 string with a declared size cap
    Str {
        /// Maximum payload size in bytes
        max: usize,
    },
}

impl FieldKind {
    /// Validate a payload against this kind
    pub fn validate(&self, field: &'static str, payload: &[u8]) -> Result<()> {
        match self {
            FieldKind::UInt8 => expect_width(field, payload, 1),
            FieldKind::UInt16Be | FieldKind::UInt16Le => expect_width(field, payload, 2),
            FieldKind::UInt24Be => expect_width(field, payload, 3),
            FieldKind::UInt32Be => expect_width(field, payload, 4),
            FieldKind::Byte32 => expect_width(field, payload, 32),
            FieldKind::Bytes { max } => expect_max(field, payload, *max),
            FieldKind::Str { max } => {
                expect_max(field, payload, *max)?;
                std::str::from_utf8(payload)
                    .map_err(|_| TrellisError::decode(field, "invalid UTF-8"))?;
                Ok(())
            }
        }
    }

    /// Structured-hash element for a validated payload
    pub fn hash_arg(&self, payload: &[u8]) -> HashArg {
        match self {
            FieldKind::UInt8 => HashArg::Uint {
                value: u64::from(payload[0]),
                width: 1,
            },
            FieldKind::UInt16Be => HashArg::Uint {
                value: u64::from(u16::from_be_bytes([payload[0], payload[1]])),
                width: 2,
            },
            FieldKind::UInt16Le => {
                HashArg::UintLe16(u16::from_le_bytes([payload[0], payload[1]]))
            }
            FieldKind::UInt24Be => HashArg::Uint {
                value: u64::from(u32::from_be_bytes([0, payload[0], payload[1], payload[2]])),
                width: 3,
            },
            FieldKind::UInt32Be => HashArg::Uint {
                value: u64::from(u32::from_be_bytes([
                    payload[0], payload[1], payload[2], payload[3],
                ])),
                width: 4,
            },
            FieldKind::Byte32 | FieldKind::Bytes { .. } => HashArg::Bytes(payload.to_vec()),
            FieldKind::Str { .. } => {
                HashArg::Str(String::from_utf8_lossy(payload).into_owned())
            }
        }
    }
}

fn expect_width(field: &'static str, payload: &[u8], width: usize) -> Result<()> {
    if payload.len() == width {
        Ok(())
    } else {
        Err(TrellisError::decode(
            field,
            format!("expected {width} bytes, got {}", payload.len()),
        ))
    }
}

fn expect_max(field: &'static str, payload: &[u8], max: usize) -> Result<()> {
    if payload.len() <= max {
        Ok(())
    } else {
        Err(TrellisError::FieldSizeExceeded {
            field: field.to_string(),
            size: payload.len(),
            max,
        })
    }
}

/// A declared field of a model schema
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Field name
    pub name: &'static str,
    /// Wire type
    pub kind: FieldKind,
    /// Record index; strictly ascending within a schema
    pub index: u8,
    /// Transient fields never enter the stored image or the hash
    pub transient: bool,
    /// Non-hashable fields (signatures) are stored but excluded from the hash
    pub hashable: bool,
}

impl FieldSpec {
    /// Declare a persistent, hashable field
    pub const fn new(name: &'static str, kind: FieldKind, index: u8) -> Self {
        Self {
            name,
            kind,
            index,
            transient: false,
            hashable: true,
        }
    }

    /// Declare a stored field excluded from the hash (signatures)
    pub const fn unhashed(name: &'static str, kind: FieldKind, index: u8) -> Self {
        Self {
            name,
            kind,
            index,
            transient: false,
            hashable: false,
        }
    }

    /// Declare a transient field (online bits, storage timestamps)
    pub const fn transient(name: &'static str, kind: FieldKind, index: u8) -> Self {
        Self {
            name,
            kind,
            index,
            transient: true,
            hashable: false,
        }
    }
}
