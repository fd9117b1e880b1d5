//! Canonical structured hashing
//!
//! This module is the single algorithm authority for content addressing: the
//! digest of a heterogeneous argument list determines node ids (`id1`),
//! constraints hashes and destroy hashes, so the encoding must stay
//! byte-stable across implementations.
//!
//! Each element is encoded as `tag:u8 ‖ length:u32 BE ‖ payload` and the
//! concatenation is digested with Keccak-256. Absent values are a tag with
//! zero length, which keeps "no value" distinct from "empty value". Nested
//! lists are hashed recursively and contribute their 32-byte digest.

use sha3::{Digest, Keccak256};

/// Element tag: absent / undefined value
const TAG_ABSENT: u8 = 0x00;
/// Element tag: raw byte string
const TAG_BYTES: u8 = 0x01;
/// Element tag: UTF-8 string
const TAG_STRING: u8 = 0x02;
/// Element tag: unsigned integer (payload is the declared-width image)
const TAG_UINT: u8 = 0x03;
/// Element tag: boolean
const TAG_BOOL: u8 = 0x04;
/// Element tag: nested list (payload is the sublist digest)
const TAG_LIST: u8 = 0x05;

/// One element of a structured hash input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashArg {
    /// Absent / undefined value
    Absent,
    /// Raw byte string
    Bytes(Vec<u8>),
    /// UTF-8 string
    Str(String),
    /// Unsigned integer with a declared big-endian width of 1–4 bytes
    Uint {
        /// Integer value; must fit the declared width
        value: u64,
        /// Width in bytes (1, 2, 3 or 4)
        width: u8,
    },
    /// 16-bit integer hashed in little-endian order (user config bits)
    UintLe16(u16),
    /// Boolean
    Bool(bool),
    /// Nested sequence, hashed recursively to its own digest
    List(Vec<HashArg>),
}

impl HashArg {
    /// Byte-string element
    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(value.into())
    }

    /// Byte-string element, or absent when `value` is `None`
    pub fn opt_bytes(value: Option<&[u8]>) -> Self {
        match value {
            Some(v) => Self::Bytes(v.to_vec()),
            None => Self::Absent,
        }
    }

    /// UTF-8 string element
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    /// 1-byte unsigned integer
    pub fn uint8(value: u8) -> Self {
        Self::Uint {
            value: u64::from(value),
            width: 1,
        }
    }

    /// 2-byte big-endian unsigned integer
    pub fn uint16_be(value: u16) -> Self {
        Self::Uint {
            value: u64::from(value),
            width: 2,
        }
    }

    /// 3-byte big-endian unsigned integer
    pub fn uint24_be(value: u32) -> Self {
        Self::Uint {
            value: u64::from(value) & 0x00ff_ffff,
            width: 3,
        }
    }

    /// 4-byte big-endian unsigned integer
    pub fn uint32_be(value: u32) -> Self {
        Self::Uint {
            value: u64::from(value),
            width: 4,
        }
    }

    /// Optional 1-byte unsigned integer
    pub fn opt_uint8(value: Option<u8>) -> Self {
        match value {
            Some(v) => Self::uint8(v),
            None => Self::Absent,
        }
    }

    /// Optional 4-byte big-endian unsigned integer
    pub fn opt_uint32_be(value: Option<u32>) -> Self {
        match value {
            Some(v) => Self::uint32_be(v),
            None => Self::Absent,
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            HashArg::Absent => {
                out.push(TAG_ABSENT);
                out.extend_from_slice(&0u32.to_be_bytes());
            }
            HashArg::Bytes(b) => {
                out.push(TAG_BYTES);
                out.extend_from_slice(&(b.len() as u32).to_be_bytes());
                out.extend_from_slice(b);
            }
            HashArg::Str(s) => {
                out.push(TAG_STRING);
                out.extend_from_slice(&(s.len() as u32).to_be_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            HashArg::Uint { value, width } => {
                let image = value.to_be_bytes();
                let width = usize::from(*width).clamp(1, 4);
                out.push(TAG_UINT);
                out.extend_from_slice(&(width as u32).to_be_bytes());
                out.extend_from_slice(&image[8 - width..]);
            }
            HashArg::UintLe16(value) => {
                out.push(TAG_UINT);
                out.extend_from_slice(&2u32.to_be_bytes());
                out.extend_from_slice(&value.to_le_bytes());
            }
            HashArg::Bool(value) => {
                out.push(TAG_BOOL);
                out.extend_from_slice(&1u32.to_be_bytes());
                out.push(u8::from(*value));
            }
            HashArg::List(items) => {
                let digest = hash_args(items);
                out.push(TAG_LIST);
                out.extend_from_slice(&32u32.to_be_bytes());
                out.extend_from_slice(&digest);
            }
        }
    }
}

/// Hash a structured argument list to a 32-byte Keccak-256 digest
pub fn hash_args(args: &[HashArg]) -> [u8; 32] {
    let mut encoded = Vec::with_capacity(64);
    for arg in args {
        arg.encode_into(&mut encoded);
    }
    keccak256(&encoded)
}

/// Keccak-256 over raw bytes
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}
