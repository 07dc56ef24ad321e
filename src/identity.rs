//! Identities, public keys and asset locks

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;
use crate::hasher;
use crate::types::{BinaryData, Credits, Identifier, KeyId, Revision, TimestampMillis};

/// Raised when an integer doesn't name a variant of a key enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownVariant(pub u8);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum KeyType {
    EcdsaSecp256k1 = 0,
    Bls12_381 = 1,
    EcdsaHash160 = 2,
}

impl KeyType {
    /// Expected length of the key data
    pub fn data_size(&self) -> usize {
        match self {
            KeyType::EcdsaSecp256k1 => 33,
            KeyType::Bls12_381 => 48,
            KeyType::EcdsaHash160 => 20,
        }
    }
}

impl TryFrom<u8> for KeyType {
    type Error = UnknownVariant;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(KeyType::EcdsaSecp256k1),
            1 => Ok(KeyType::Bls12_381),
            2 => Ok(KeyType::EcdsaHash160),
            other => Err(UnknownVariant(other)),
        }
    }
}

impl From<KeyType> for u8 {
    fn from(value: KeyType) -> Self {
        value as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Purpose {
    Authentication = 0,
    Encryption = 1,
    Decryption = 2,
}

impl TryFrom<u8> for Purpose {
    type Error = UnknownVariant;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Purpose::Authentication),
            1 => Ok(Purpose::Encryption),
            2 => Ok(Purpose::Decryption),
            other => Err(UnknownVariant(other)),
        }
    }
}

impl From<Purpose> for u8 {
    fn from(value: Purpose) -> Self {
        value as u8
    }
}

/// Key security level; numerically lower is stricter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SecurityLevel {
    Master = 0,
    Critical = 1,
    High = 2,
    Medium = 3,
}

impl SecurityLevel {
    /// Whether a key of this level may sign where `required` is demanded
    pub fn satisfies(&self, required: SecurityLevel) -> bool {
        *self <= required
    }
}

impl TryFrom<u8> for SecurityLevel {
    type Error = UnknownVariant;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SecurityLevel::Master),
            1 => Ok(SecurityLevel::Critical),
            2 => Ok(SecurityLevel::High),
            3 => Ok(SecurityLevel::Medium),
            other => Err(UnknownVariant(other)),
        }
    }
}

impl From<SecurityLevel> for u8 {
    fn from(value: SecurityLevel) -> Self {
        value as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityPublicKey {
    pub id: KeyId,
    #[serde(rename = "type")]
    pub key_type: KeyType,
    pub purpose: Purpose,
    pub security_level: SecurityLevel,
    pub data: BinaryData,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_at: Option<TimestampMillis>,
}

impl IdentityPublicKey {
    pub fn is_disabled(&self) -> bool {
        self.disabled_at.is_some()
    }

    /// 20-byte hash used for the reverse key lookup
    pub fn hash(&self) -> [u8; 20] {
        match self.key_type {
            KeyType::EcdsaHash160 => {
                let mut out = [0u8; 20];
                let len = self.data.len().min(20);
                out[..len].copy_from_slice(&self.data.as_slice()[..len]);
                out
            }
            _ => hasher::public_key_hash(self.data.as_slice()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub protocol_version: u32,
    pub id: Identifier,
    pub public_keys: Vec<IdentityPublicKey>,
    pub balance: Credits,
    pub revision: Revision,
}

impl Identity {
    pub fn get_public_key_by_id(&self, id: KeyId) -> Option<&IdentityPublicKey> {
        self.public_keys.iter().find(|key| key.id == id)
    }

    pub fn get_public_key_by_id_mut(&mut self, id: KeyId) -> Option<&mut IdentityPublicKey> {
        self.public_keys.iter_mut().find(|key| key.id == id)
    }

    /// Number of keys that are not disabled
    pub fn enabled_key_count(&self) -> usize {
        self.public_keys.iter().filter(|key| !key.is_disabled()).count()
    }
}

/// Reference to a transaction output on the external chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// Transaction hash
    pub txid: Identifier,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Identifier, vout: u32) -> Self {
        Self { txid, vout }
    }

    /// Canonical 36-byte encoding
    pub fn to_bytes(&self) -> [u8; 36] {
        let mut bytes = [0u8; 36];
        bytes[..32].copy_from_slice(self.txid.as_bytes());
        bytes[32..].copy_from_slice(&self.vout.to_le_bytes());
        bytes
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// Locked output funding an identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetLockOutput {
    /// Locked value in duffs
    pub value: u64,
    /// Hash of the key allowed to spend the lock
    pub public_key_hash: BinaryData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetLockProof {
    pub out_point: OutPoint,
    pub output: AssetLockOutput,
}

impl AssetLockProof {
    /// Identity id funded by this lock
    pub fn create_identifier(&self) -> Identifier {
        hasher::derive_identity_id(&self.out_point)
    }
}
