//! Certificate schemas
//!
//! All certificate kinds share the base field table; friend certificates add
//! the pairing fields. Indexes are part of the wire contract and never
//! reassigned.

use once_cell::sync::Lazy;

use crate::codec::{FieldKind, FieldSpec, ModelSchema};
use crate::interface::{
    InterfaceHeader, PRIMARY_CERT, SECONDARY_AUTH_CERT, SECONDARY_CHAIN_CERT,
    SECONDARY_DATA_CERT, SECONDARY_FRIEND_CERT, SECONDARY_LICENSE_CERT,
};

/// Maximum concatenated size of the target key list
const TARGET_KEYS_MAX: usize = 8 * 33;
/// Maximum embedded certificate image size
const EMBEDDED_CERT_MAX: usize = 4096;
/// Maximum signature bundle size
const SIGNATURE_MAX: usize = 1024;

/// Cert config bit: the cert ignores destroy hashes
pub const CONFIG_INDESTRUCTIBLE: u16 = 0x0001;
/// Cert config bit: validity additionally requires online validation
pub const CONFIG_HAS_ONLINE_VALIDATION: u16 = 0x0002;
/// Cert config bit: validity additionally requires an online cert check
pub const CONFIG_HAS_ONLINE_CERT: u16 = 0x0004;

/// Transient online bit: validated by an online service
pub const ONLINE_VALIDATED: u8 = 0x01;
/// Transient online bit: revoked; sticky once set
pub const ONLINE_REVOKED: u8 = 0x02;
/// Transient online bit: the online cert check passed
pub const ONLINE_CERT_ONLINE: u8 = 0x04;

const BASE_CERT_FIELDS: [FieldSpec; 14] = [
    FieldSpec::new("owner", FieldKind::Bytes { max: 32 }, 0),
    FieldSpec::new("targetPublicKeys", FieldKind::Bytes { max: TARGET_KEYS_MAX }, 1),
    FieldSpec::new("config", FieldKind::UInt16Le, 2),
    FieldSpec::new("lockedConfig", FieldKind::UInt32Be, 3),
    FieldSpec::new("creationTime", FieldKind::UInt32Be, 4),
    FieldSpec::new("expireTime", FieldKind::UInt32Be, 5),
    FieldSpec::new("cert", FieldKind::Bytes { max: EMBEDDED_CERT_MAX }, 6),
    FieldSpec::new("constraints", FieldKind::Byte32, 7),
    FieldSpec::new("targetType", FieldKind::Bytes { max: 6 }, 8),
    FieldSpec::new("maxChainLength", FieldKind::UInt8, 9),
    FieldSpec::new("multiSigThreshold", FieldKind::UInt8, 10),
    FieldSpec::new("targetMaxExpireTime", FieldKind::UInt32Be, 11),
    FieldSpec::unhashed("signature", FieldKind::Bytes { max: SIGNATURE_MAX }, 20),
    FieldSpec::transient("onlineStatus", FieldKind::UInt8, 24),
];

const FRIEND_CERT_FIELDS: [FieldSpec; 17] = [
    FieldSpec::new("owner", FieldKind::Bytes { max: 32 }, 0),
    FieldSpec::new("targetPublicKeys", FieldKind::Bytes { max: TARGET_KEYS_MAX }, 1),
    FieldSpec::new("config", FieldKind::UInt16Le, 2),
    FieldSpec::new("lockedConfig", FieldKind::UInt32Be, 3),
    FieldSpec::new("creationTime", FieldKind::UInt32Be, 4),
    FieldSpec::new("expireTime", FieldKind::UInt32Be, 5),
    FieldSpec::new("cert", FieldKind::Bytes { max: EMBEDDED_CERT_MAX }, 6),
    FieldSpec::new("constraints", FieldKind::Byte32, 7),
    FieldSpec::new("targetType", FieldKind::Bytes { max: 6 }, 8),
    FieldSpec::new("maxChainLength", FieldKind::UInt8, 9),
    FieldSpec::new("multiSigThreshold", FieldKind::UInt8, 10),
    FieldSpec::new("targetMaxExpireTime", FieldKind::UInt32Be, 11),
    FieldSpec::new("salt", FieldKind::Bytes { max: 16 }, 12),
    FieldSpec::new("friendLevel", FieldKind::UInt8, 13),
    FieldSpec::new("licenseMaxExpireTime", FieldKind::UInt32Be, 14),
    FieldSpec::unhashed("signature", FieldKind::Bytes { max: SIGNATURE_MAX }, 20),
    FieldSpec::transient("onlineStatus", FieldKind::UInt8, 24),
];

/// Schema of embeddable chain certificates
pub static CHAIN_CERT_SCHEMA: Lazy<ModelSchema> = Lazy::new(|| ModelSchema {
    header: InterfaceHeader::new(PRIMARY_CERT, SECONDARY_CHAIN_CERT, 1, 0),
    fields: &BASE_CERT_FIELDS,
});

/// Schema of data certificates
pub static DATA_CERT_SCHEMA: Lazy<ModelSchema> = Lazy::new(|| ModelSchema {
    header: InterfaceHeader::new(PRIMARY_CERT, SECONDARY_DATA_CERT, 1, 0),
    fields: &BASE_CERT_FIELDS,
});

/// Schema of license certificates
pub static LICENSE_CERT_SCHEMA: Lazy<ModelSchema> = Lazy::new(|| ModelSchema {
    header: InterfaceHeader::new(PRIMARY_CERT, SECONDARY_LICENSE_CERT, 1, 0),
    fields: &BASE_CERT_FIELDS,
});

/// Schema of auth certificates
pub static AUTH_CERT_SCHEMA: Lazy<ModelSchema> = Lazy::new(|| ModelSchema {
    header: InterfaceHeader::new(PRIMARY_CERT, SECONDARY_AUTH_CERT, 1, 0),
    fields: &BASE_CERT_FIELDS,
});

/// Schema of friend certificates
pub static FRIEND_CERT_SCHEMA: Lazy<ModelSchema> = Lazy::new(|| ModelSchema {
    header: InterfaceHeader::new(PRIMARY_CERT, SECONDARY_FRIEND_CERT, 1, 0),
    fields: &FRIEND_CERT_FIELDS,
});
