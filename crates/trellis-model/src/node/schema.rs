//! Node schemas
//!
//! Data, license and carrier nodes share the common field table; data nodes
//! add the payload field and license nodes the licensing fields. Indexes are
//! part of the wire contract and never reassigned.

use once_cell::sync::Lazy;

use crate::codec::{FieldKind, FieldSpec, ModelSchema};
use crate::interface::{
    InterfaceHeader, PRIMARY_NODE, SECONDARY_CARRIER_NODE, SECONDARY_DATA_NODE,
    SECONDARY_LICENSE_NODE,
};

/// Maximum embedded datamodel image size
const EMBEDDED_MAX: usize = 8192;
/// Maximum attached certificate image size
const CERT_MAX: usize = 4096;
/// Maximum signature bundle size
const SIGNATURE_MAX: usize = 1024;
/// Maximum data payload size
const DATA_MAX: usize = 1024;

/// Node config bit: readable by anyone
pub const CONFIG_PUBLIC: u16 = 0x0001;
/// Node config bit: readable through licenses
pub const CONFIG_LICENSED: u16 = 0x0002;
/// Node config bit: children require writer licenses
pub const CONFIG_BEGIN_RESTRICTIVE_WRITE: u16 = 0x0004;
/// Node config bit: ends the innermost restrictive-write scope
pub const CONFIG_END_RESTRICTIVE_WRITE: u16 = 0x0008;
/// Node config bit: the node ignores destroy hashes
pub const CONFIG_INDESTRUCTIBLE: u16 = 0x0010;
/// Node config bit: special node (destroy nodes)
pub const CONFIG_SPECIAL: u16 = 0x0020;
/// Node config bit: validity additionally requires online validation
pub const CONFIG_HAS_ONLINE_VALIDATION: u16 = 0x0040;
/// Node config bit: validity additionally requires an online cert check
pub const CONFIG_HAS_ONLINE_CERT: u16 = 0x0080;
/// License config bit: the license must predate the licensed node
pub const CONFIG_DISALLOW_RETRO_LICENSING: u16 = 0x0100;
/// License config bit: the license never licenses parent traversal
pub const CONFIG_DISALLOW_PARENT_LICENSING: u16 = 0x0200;
/// License config bit: grants restrictive-write writer rights
pub const CONFIG_RESTRICTIVE_WRITER: u16 = 0x0400;
/// License config bit: grants restrictive-write manager rights
pub const CONFIG_RESTRICTIVE_MANAGER: u16 = 0x0800;
/// Node config bit: sibling-owned nodes with matching refId confer rights
pub const CONFIG_ALLOW_RIGHTS_BY_ASSOCIATION: u16 = 0x1000;

/// Transient online bit: validated by an online service
pub const ONLINE_VALIDATED: u8 = 0x01;
/// Transient online bit: revoked; sticky once set
pub const ONLINE_REVOKED: u8 = 0x02;
/// Transient online bit: the online cert check passed
pub const ONLINE_CERT_ONLINE: u8 = 0x04;

const DATA_NODE_FIELDS: [FieldSpec; 24] = [
    FieldSpec::new("id2", FieldKind::Byte32, 0),
    FieldSpec::new("parentId", FieldKind::Byte32, 1),
    FieldSpec::new("config", FieldKind::UInt16Le, 2),
    FieldSpec::new("network", FieldKind::Str { max: 32 }, 3),
    FieldSpec::new("owner", FieldKind::Bytes { max: 32 }, 4),
    FieldSpec::new("refId", FieldKind::Byte32, 5),
    FieldSpec::new("creationTime", FieldKind::UInt32Be, 6),
    FieldSpec::new("expireTime", FieldKind::UInt32Be, 7),
    FieldSpec::new("difficulty", FieldKind::UInt8, 8),
    FieldSpec::new("childMinDifficulty", FieldKind::UInt8, 9),
    FieldSpec::new("licenseMinDistance", FieldKind::UInt8, 10),
    FieldSpec::new("licenseMaxDistance", FieldKind::UInt8, 11),
    FieldSpec::new("region", FieldKind::Str { max: 6 }, 12),
    FieldSpec::new("jurisdiction", FieldKind::Str { max: 6 }, 13),
    FieldSpec::new("embedded", FieldKind::Bytes { max: EMBEDDED_MAX }, 14),
    FieldSpec::new("cert", FieldKind::Bytes { max: CERT_MAX }, 15),
    FieldSpec::new("blobHash", FieldKind::Byte32, 16),
    FieldSpec::new("copiedParentId", FieldKind::Byte32, 17),
    FieldSpec::new("copiedId1", FieldKind::Byte32, 18),
    FieldSpec::new("copiedSignature", FieldKind::Bytes { max: SIGNATURE_MAX }, 19),
    FieldSpec::new("data", FieldKind::Bytes { max: DATA_MAX }, 20),
    FieldSpec::unhashed("signature", FieldKind::Bytes { max: SIGNATURE_MAX }, 29),
    FieldSpec::transient("onlineStatus", FieldKind::UInt8, 30),
    FieldSpec::transient("storageTime", FieldKind::UInt32Be, 31),
];

const LICENSE_NODE_FIELDS: [FieldSpec; 30] = [
    FieldSpec::new("id2", FieldKind::Byte32, 0),
    FieldSpec::new("parentId", FieldKind::Byte32, 1),
    FieldSpec::new("config", FieldKind::UInt16Le, 2),
    FieldSpec::new("network", FieldKind::Str { max: 32 }, 3),
    FieldSpec::new("owner", FieldKind::Bytes { max: 32 }, 4),
    FieldSpec::new("refId", FieldKind::Byte32, 5),
    FieldSpec::new("creationTime", FieldKind::UInt32Be, 6),
    FieldSpec::new("expireTime", FieldKind::UInt32Be, 7),
    FieldSpec::new("difficulty", FieldKind::UInt8, 8),
    FieldSpec::new("childMinDifficulty", FieldKind::UInt8, 9),
    FieldSpec::new("licenseMinDistance", FieldKind::UInt8, 10),
    FieldSpec::new("licenseMaxDistance", FieldKind::UInt8, 11),
    FieldSpec::new("region", FieldKind::Str { max: 6 }, 12),
    FieldSpec::new("jurisdiction", FieldKind::Str { max: 6 }, 13),
    FieldSpec::new("embedded", FieldKind::Bytes { max: EMBEDDED_MAX }, 14),
    FieldSpec::new("cert", FieldKind::Bytes { max: CERT_MAX }, 15),
    FieldSpec::new("blobHash", FieldKind::Byte32, 16),
    FieldSpec::new("copiedParentId", FieldKind::Byte32, 17),
    FieldSpec::new("copiedId1", FieldKind::Byte32, 18),
    FieldSpec::new("copiedSignature", FieldKind::Bytes { max: SIGNATURE_MAX }, 19),
    FieldSpec::new("targetPublicKey", FieldKind::Bytes { max: 32 }, 21),
    FieldSpec::new("extensions", FieldKind::UInt8, 22),
    FieldSpec::new("friendLevel", FieldKind::UInt8, 23),
    FieldSpec::new("parentPathHash", FieldKind::Byte32, 24),
    FieldSpec::new("licenseMaxExpireTime", FieldKind::UInt32Be, 25),
    FieldSpec::new("friendCertA", FieldKind::Bytes { max: CERT_MAX }, 26),
    FieldSpec::new("friendCertB", FieldKind::Bytes { max: CERT_MAX }, 27),
    FieldSpec::unhashed("signature", FieldKind::Bytes { max: SIGNATURE_MAX }, 29),
    FieldSpec::transient("onlineStatus", FieldKind::UInt8, 30),
    FieldSpec::transient("storageTime", FieldKind::UInt32Be, 31),
];

const CARRIER_NODE_FIELDS: [FieldSpec; 23] = [
    FieldSpec::new("id2", FieldKind::Byte32, 0),
    FieldSpec::new("parentId", FieldKind::Byte32, 1),
    FieldSpec::new("config", FieldKind::UInt16Le, 2),
    FieldSpec::new("network", FieldKind::Str { max: 32 }, 3),
    FieldSpec::new("owner", FieldKind::Bytes { max: 32 }, 4),
    FieldSpec::new("refId", FieldKind::Byte32, 5),
    FieldSpec::new("creationTime", FieldKind::UInt32Be, 6),
    FieldSpec::new("expireTime", FieldKind::UInt32Be, 7),
    FieldSpec::new("difficulty", FieldKind::UInt8, 8),
    FieldSpec::new("childMinDifficulty", FieldKind::UInt8, 9),
    FieldSpec::new("licenseMinDistance", FieldKind::UInt8, 10),
    FieldSpec::new("licenseMaxDistance", FieldKind::UInt8, 11),
    FieldSpec::new("region", FieldKind::Str { max: 6 }, 12),
    FieldSpec::new("jurisdiction", FieldKind::Str { max: 6 }, 13),
    FieldSpec::new("embedded", FieldKind::Bytes { max: EMBEDDED_MAX }, 14),
    FieldSpec::new("cert", FieldKind::Bytes { max: CERT_MAX }, 15),
    FieldSpec::new("blobHash", FieldKind::Byte32, 16),
    FieldSpec::new("copiedParentId", FieldKind::Byte32, 17),
    FieldSpec::new("copiedId1", FieldKind::Byte32, 18),
    FieldSpec::new("copiedSignature", FieldKind::Bytes { max: SIGNATURE_MAX }, 19),
    FieldSpec::unhashed("signature", FieldKind::Bytes { max: SIGNATURE_MAX }, 29),
    FieldSpec::transient("onlineStatus", FieldKind::UInt8, 30),
    FieldSpec::transient("storageTime", FieldKind::UInt32Be, 31),
];

/// Schema of data nodes
pub static DATA_NODE_SCHEMA: Lazy<ModelSchema> = Lazy::new(|| ModelSchema {
    header: InterfaceHeader::new(PRIMARY_NODE, SECONDARY_DATA_NODE, 1, 0),
    fields: &DATA_NODE_FIELDS,
});

/// Schema of license nodes
pub static LICENSE_NODE_SCHEMA: Lazy<ModelSchema> = Lazy::new(|| ModelSchema {
    header: InterfaceHeader::new(PRIMARY_NODE, SECONDARY_LICENSE_NODE, 1, 0),
    fields: &LICENSE_NODE_FIELDS,
});

/// Schema of carrier nodes
pub static CARRIER_NODE_SCHEMA: Lazy<ModelSchema> = Lazy::new(|| ModelSchema {
    header: InterfaceHeader::new(PRIMARY_NODE, SECONDARY_CARRIER_NODE, 1, 0),
    fields: &CARRIER_NODE_FIELDS,
});
