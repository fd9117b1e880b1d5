//! Shared signing state machine for certificates and nodes
//!
//! A datamodel is UNSIGNED until its first signature, PARTIAL while the
//! bundle is shorter than the required threshold, and SIGNED once the count
//! matches. The message for signature *n* chains over the previous step:
//!
//! ```text
//! msg_0 = hash()
//! msg_n = H(msg_{n-1}, pk_{n-1}, sig_{n-1}, index_{n-1})
//! ```
//!
//! so partially signed images commit to their signing order. Signatures are
//! stored concatenated as `(key_index:u8 ‖ signature_bytes)` in the
//! `signature` field; the per-entry length is derived from the indexed key's
//! scheme.

use trellis_core::{
    hash_args, HashArg, Id32, KeyPair, PublicKey, Result, TrellisError,
};

use crate::codec::ModelStore;

/// Name of the signature field in every signable schema
pub const SIGNATURE_FIELD: &str = "signature";

/// One parsed entry of a signature bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEntry {
    /// Index into the eligible signing keys
    pub key_index: u8,
    /// Raw signature bytes
    pub signature: Vec<u8>,
}

/// A signable datamodel: field store plus signing authority
pub trait Datamodel {
    /// The underlying field store
    fn store(&self) -> &ModelStore;

    /// Mutable access to the underlying field store
    fn store_mut(&mut self) -> &mut ModelStore;

    /// The keys allowed to sign this model: the owner when no certificate is
    /// embedded, otherwise the innermost embedded certificate's target keys
    fn eligible_signing_keys(&self) -> Result<Vec<PublicKey>>;

    /// Required signature count: the innermost certificate's threshold,
    /// defaulting to one
    fn required_signatures(&self) -> Result<usize>;

    /// Content hash over hashable, non-transient fields
    fn hash(&self) -> [u8; 32] {
        self.store().hash()
    }

    /// Content-addressed id of the signed model: `H(hash, signature_bytes)`
    fn id1(&self) -> Result<Id32> {
        let signature = self
            .store()
            .get_raw(SIGNATURE_FIELD)
            .ok_or_else(|| TrellisError::invalid("id1 requires a signed model"))?;
        Ok(Id32::from_bytes(hash_args(&[
            HashArg::bytes(self.hash().to_vec()),
            HashArg::bytes(signature.to_vec()),
        ])))
    }
}

/// Parse the signature bundle of a model
pub fn extract_signatures(model: &dyn Datamodel) -> Result<Vec<SignatureEntry>> {
    let eligible = model.eligible_signing_keys()?;
    let Some(bundle) = model.store().get_raw(SIGNATURE_FIELD) else {
        return Ok(Vec::new());
    };
    let mut entries = Vec::new();
    let mut cursor = 0usize;
    while cursor < bundle.len() {
        let key_index = bundle[cursor];
        cursor += 1;
        let key = eligible.get(usize::from(key_index)).ok_or_else(|| {
            TrellisError::decode(SIGNATURE_FIELD, format!("key index {key_index} out of range"))
        })?;
        let length = key.signature_length();
        let bytes = bundle.get(cursor..cursor + length).ok_or_else(|| {
            TrellisError::decode(SIGNATURE_FIELD, "truncated signature bundle")
        })?;
        cursor += length;
        entries.push(SignatureEntry {
            key_index,
            signature: bytes.to_vec(),
        });
    }
    Ok(entries)
}

/// The message the `at`-th signature (0-based) signs, given prior entries
fn signing_message(
    model: &dyn Datamodel,
    eligible: &[PublicKey],
    prior: &[SignatureEntry],
) -> Result<[u8; 32]> {
    let mut message = model.hash();
    for entry in prior {
        let key = eligible
            .get(usize::from(entry.key_index))
            .ok_or_else(|| TrellisError::invalid("signature key index out of range"))?;
        message = hash_args(&[
            HashArg::bytes(message.to_vec()),
            HashArg::bytes(key.to_vec()),
            HashArg::bytes(entry.signature.clone()),
            HashArg::uint8(entry.key_index),
        ]);
    }
    Ok(message)
}

/// Append one signature to a model.
///
/// Fails when the model is already fully signed, when the key is not among
/// the eligible signers, or when the key already signed.
pub fn sign(model: &mut dyn Datamodel, key_pair: &KeyPair) -> Result<()> {
    let eligible = model.eligible_signing_keys()?;
    let required = model.required_signatures()?;
    let entries = extract_signatures(model)?;
    if entries.len() >= required {
        return Err(TrellisError::invalid(
            "model is fully signed; further signatures rejected",
        ));
    }

    let key_index = eligible
        .iter()
        .position(|k| k == key_pair.public())
        .ok_or_else(|| TrellisError::invalid("signing key is not an eligible signer"))?;
    let key_index = u8::try_from(key_index)
        .map_err(|_| TrellisError::invalid("signing key index exceeds bundle range"))?;
    if entries.iter().any(|e| e.key_index == key_index) {
        return Err(TrellisError::invalid("key has already signed this model"));
    }

    let message = signing_message(model, &eligible, &entries)?;
    let signature = key_pair.sign(&message)?;

    let mut bundle = model
        .store()
        .get_raw(SIGNATURE_FIELD)
        .map(<[u8]>::to_vec)
        .unwrap_or_default();
    bundle.push(key_index);
    bundle.extend_from_slice(&signature);
    model.store_mut().set_raw(SIGNATURE_FIELD, bundle)
}

/// Verify a model's signature bundle cryptographically.
///
/// Returns `Ok(false)` when the bundle length does not match the required
/// threshold, when a signer repeats, or when any signature fails; errors are
/// reserved for undecodable key material.
pub fn verify(model: &dyn Datamodel) -> Result<bool> {
    let eligible = model.eligible_signing_keys()?;
    let required = model.required_signatures()?;
    let entries = extract_signatures(model)?;
    if entries.len() != required {
        return Ok(false);
    }

    let mut seen = std::collections::HashSet::new();
    for entry in &entries {
        if !seen.insert(entry.key_index) {
            return Ok(false);
        }
    }

    for at in 0..entries.len() {
        let entry = &entries[at];
        let key = eligible
            .get(usize::from(entry.key_index))
            .ok_or_else(|| TrellisError::invalid("signature key index out of range"))?;
        let message = signing_message(model, &eligible, &entries[..at])?;
        if !trellis_core::crypto::verify(&message, &entry.signature, key)? {
            return Ok(false);
        }
    }
    Ok(true)
}
