//! Compile-time constants shared across the workspace

/// Destroy topic: wipe every destructible datamodel of an owner
pub const DESTROY_SELF_TOTAL: &str = "special/destroy/selfTotalDestruct";
/// Destroy topic: a single node by id
pub const DESTROY_NODE: &str = "special/destroy/destroyNode";
/// Destroy topic: a single certificate by id
pub const DESTROY_CERT: &str = "special/destroy/destroyCert";
/// Destroy topic: a friend certificate by id
pub const DESTROY_FRIEND_CERT: &str = "special/destroy/destroyFriendCert";
/// Destroy topic: all licenses referring to a node
pub const DESTROY_LICENSES_FOR_NODE: &str = "special/destroy/destroyLicensesForNode";
/// Destroy topic: all licenses targeting a public key
pub const DESTROY_LICENSES_FOR_TARGET: &str =
    "special/destroy/destroyLicensesForTargetPublicKey";
/// Destroy topic: licenses targeting a public key for one node
pub const DESTROY_LICENSES_FOR_TARGET_AND_NODE: &str =
    "special/destroy/destroyLicensesForTargetPublicKeyAndNode";

/// Minimum difficulty a self-total destroy node must declare
pub const MIN_DIFFICULTY_TOTAL_DESTRUCTION: u8 = 2;

/// Upper bound on embedded-certificate chain depth
pub const MAX_CERT_CHAIN_LENGTH: u8 = 4;

/// Upper bound on multisig signers per certificate
pub const MAX_MULTISIG_SIGNERS: usize = 8;
