//! Interface headers and the prefix-keyed decoder registry
//!
//! The first 6 bytes of every image identify the datamodel:
//! `primary:u16 BE ‖ secondary:u16 BE ‖ class:u8 ‖ major:u8`. The first four
//! bytes alone are the *interface prefix* used for type acceptance checks and
//! decoder dispatch; class and major version pin the exact schema.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use trellis_core::{Result, TrellisError};

use crate::cert::Cert;
use crate::node::Node;

/// Primary interface of every certificate image
pub const PRIMARY_CERT: u16 = 0x0001;
/// Primary interface of every node image
pub const PRIMARY_NODE: u16 = 0x0002;

/// Secondary interface: embeddable chain certificate
pub const SECONDARY_CHAIN_CERT: u16 = 0x0001;
/// Secondary interface: data certificate
pub const SECONDARY_DATA_CERT: u16 = 0x0002;
/// Secondary interface: license certificate
pub const SECONDARY_LICENSE_CERT: u16 = 0x0003;
/// Secondary interface: auth certificate
pub const SECONDARY_AUTH_CERT: u16 = 0x0004;
/// Secondary interface: friend certificate
pub const SECONDARY_FRIEND_CERT: u16 = 0x0005;

/// Secondary interface: data node
pub const SECONDARY_DATA_NODE: u16 = 0x0001;
/// Secondary interface: license node
pub const SECONDARY_LICENSE_NODE: u16 = 0x0002;
/// Secondary interface: carrier node
pub const SECONDARY_CARRIER_NODE: u16 = 0x0003;

/// The 4-byte interface match prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfacePrefix(pub [u8; 4]);

impl InterfacePrefix {
    /// Build from primary and secondary interface ids
    pub const fn new(primary: u16, secondary: u16) -> Self {
        let p = primary.to_be_bytes();
        let s = secondary.to_be_bytes();
        Self([p[0], p[1], s[0], s[1]])
    }

    /// Read the prefix off the front of an image
    pub fn of_image(image: &[u8]) -> Result<Self> {
        let bytes: [u8; 4] = image
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| TrellisError::decode("header", "image shorter than prefix"))?;
        Ok(Self(bytes))
    }

    /// Prefix match against a declared target type of 0–6 bytes.
    ///
    /// An empty target type accepts everything; otherwise the target type
    /// must be a byte prefix of `header ‖ class ‖ major`, compared over at
    /// most the first four bytes.
    pub fn accepts(&self, target_type: &[u8]) -> bool {
        let take = target_type.len().min(4);
        self.0[..take] == target_type[..take]
    }
}

/// The full 6-byte image header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceHeader {
    /// Primary interface id
    pub primary: u16,
    /// Secondary interface id
    pub secondary: u16,
    /// Class id within the interface
    pub class_id: u8,
    /// Major schema version
    pub major_version: u8,
}

impl InterfaceHeader {
    /// Header length in bytes
    pub const LENGTH: usize = 6;

    /// Build a header
    pub const fn new(primary: u16, secondary: u16, class_id: u8, major_version: u8) -> Self {
        Self {
            primary,
            secondary,
            class_id,
            major_version,
        }
    }

    /// The 4-byte match prefix of this header
    pub const fn prefix(&self) -> InterfacePrefix {
        InterfacePrefix::new(self.primary, self.secondary)
    }

    /// Serialize to the 6-byte wire form
    pub fn to_bytes(&self) -> [u8; 6] {
        let p = self.primary.to_be_bytes();
        let s = self.secondary.to_be_bytes();
        [p[0], p[1], s[0], s[1], self.class_id, self.major_version]
    }

    /// Parse from the 6-byte wire form
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::LENGTH {
            return Err(TrellisError::decode("header", "truncated interface header"));
        }
        Ok(Self {
            primary: u16::from_be_bytes([bytes[0], bytes[1]]),
            secondary: u16::from_be_bytes([bytes[2], bytes[3]]),
            class_id: bytes[4],
            major_version: bytes[5],
        })
    }
}

impl fmt::Display for InterfaceHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x}:{:02x}:{:02x}",
            self.primary, self.secondary, self.class_id, self.major_version
        )
    }
}

/// Any decodable datamodel
#[derive(Debug, Clone)]
pub enum AnyModel {
    /// A certificate of any kind
    Cert(Cert),
    /// A node of any kind
    Node(Node),
}

type Decoder = fn(&[u8]) -> Result<AnyModel>;

// Decoder table populated at startup; dispatch replaces dynamic typing.
static REGISTRY: Lazy<HashMap<InterfacePrefix, Decoder>> = Lazy::new(|| {
    let mut map: HashMap<InterfacePrefix, Decoder> = HashMap::new();
    for kind in crate::cert::CertKind::ALL {
        map.insert(kind.prefix(), |image| {
            Cert::decode(image).map(AnyModel::Cert)
        });
    }
    for kind in crate::node::NodeKind::ALL {
        map.insert(kind.prefix(), |image| {
            Node::decode(image).map(AnyModel::Node)
        });
    }
    map
});

/// Decode any registered datamodel from its image
pub fn decode_any(image: &[u8]) -> Result<AnyModel> {
    let prefix = InterfacePrefix::of_image(image)?;
    let decoder = REGISTRY
        .get(&prefix)
        .ok_or_else(|| TrellisError::decode("header", format!("unknown interface {prefix:?}")))?;
    decoder(image)
}
