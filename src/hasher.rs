//! Deterministic hashing and identifier derivation using Blake3

use blake3::Hasher as Blake3Hasher;
use crate::identity::OutPoint;
use crate::types::{Identifier, TransitionHash};

/// Blake3 hash of a byte slice
pub fn hash(bytes: &[u8]) -> [u8; 32] {
    *blake3::hash(bytes).as_bytes()
}

/// Hash of a transition's signable payload
pub fn signable_hash(signable_bytes: &[u8]) -> TransitionHash {
    TransitionHash(hash(signable_bytes))
}

/// Document id derived from its creation parameters
///
/// The id is fixed at creation and never recomputed afterwards.
pub fn derive_document_id(
    data_contract_id: &Identifier,
    owner_id: &Identifier,
    document_type: &str,
    entropy: &[u8],
) -> Identifier {
    let mut hasher = Blake3Hasher::new();
    hasher.update(data_contract_id.as_bytes());
    hasher.update(owner_id.as_bytes());
    hasher.update(document_type.as_bytes());
    hasher.update(entropy);
    Identifier(*hasher.finalize().as_bytes())
}

/// Data contract id derived from its owner and creation entropy
pub fn derive_data_contract_id(owner_id: &Identifier, entropy: &[u8]) -> Identifier {
    let mut hasher = Blake3Hasher::new();
    hasher.update(owner_id.as_bytes());
    hasher.update(entropy);
    Identifier(*hasher.finalize().as_bytes())
}

/// Identity id derived from the funding asset-lock outpoint
pub fn derive_identity_id(out_point: &OutPoint) -> Identifier {
    Identifier(hash(&out_point.to_bytes()))
}

/// Hash a name preorder commits to: Blake3 applied twice over the salt
/// followed by the full domain name
pub fn salted_domain_hash(salt: &[u8], full_domain_name: &str) -> [u8; 32] {
    let mut hasher = Blake3Hasher::new();
    hasher.update(salt);
    hasher.update(full_domain_name.as_bytes());
    hash(hasher.finalize().as_bytes())
}

/// 20-byte hash of public key data
pub fn public_key_hash(data: &[u8]) -> [u8; 20] {
    let digest = hash(data);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[..20]);
    out
}
