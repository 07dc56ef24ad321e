//! Typed state transitions
//!
//! A closed sum type over the transition type code. Every variant carries the
//! protocol version and signature; the execution context is never part of a
//! transition and is passed to each stage separately.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::TryFrom;
use std::fmt;
use crate::data_contract::DataContract;
use crate::document_transition::DocumentTransition;
use crate::error::{Error, SerializationError};
use crate::hasher;
use crate::identity::{AssetLockProof, IdentityPublicKey};
use crate::serialization;
use crate::types::{BinaryData, Identifier, KeyId, Revision, TimestampMillis, TransitionHash};

pub const PROPERTY_TYPE: &str = "type";
pub const PROPERTY_PROTOCOL_VERSION: &str = "protocolVersion";
pub const PROPERTY_SIGNATURE: &str = "signature";
pub const PROPERTY_SIGNATURE_PUBLIC_KEY_ID: &str = "signaturePublicKeyId";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StateTransitionType {
    DataContractCreate = 0,
    DocumentsBatch = 1,
    IdentityCreate = 2,
    IdentityTopUp = 3,
    DataContractUpdate = 4,
    IdentityUpdate = 5,
}

impl StateTransitionType {
    pub fn code(&self) -> u64 {
        *self as u64
    }
}

impl TryFrom<u64> for StateTransitionType {
    type Error = Error;

    fn try_from(code: u64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(StateTransitionType::DataContractCreate),
            1 => Ok(StateTransitionType::DocumentsBatch),
            2 => Ok(StateTransitionType::IdentityCreate),
            3 => Ok(StateTransitionType::IdentityTopUp),
            4 => Ok(StateTransitionType::DataContractUpdate),
            5 => Ok(StateTransitionType::IdentityUpdate),
            other => Err(Error::InvalidStateTransitionType {
                state_transition_type: other,
            }),
        }
    }
}

impl fmt::Display for StateTransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataContractCreateTransition {
    pub protocol_version: u32,
    pub data_contract: DataContract,
    /// Entropy the contract id was derived from
    pub entropy: BinaryData,
    #[serde(default)]
    pub signature_public_key_id: Option<KeyId>,
    #[serde(default)]
    pub signature: BinaryData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataContractUpdateTransition {
    pub protocol_version: u32,
    pub data_contract: DataContract,
    #[serde(default)]
    pub signature_public_key_id: Option<KeyId>,
    #[serde(default)]
    pub signature: BinaryData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentsBatchTransition {
    pub protocol_version: u32,
    pub owner_id: Identifier,
    pub transitions: Vec<DocumentTransition>,
    #[serde(default)]
    pub signature_public_key_id: Option<KeyId>,
    #[serde(default)]
    pub signature: BinaryData,
}

impl DocumentsBatchTransition {
    /// Referenced data contract ids in order of first appearance
    pub fn data_contract_ids(&self) -> Vec<Identifier> {
        let mut ids: Vec<Identifier> = Vec::new();
        for transition in &self.transitions {
            if !ids.contains(transition.data_contract_id()) {
                ids.push(*transition.data_contract_id());
            }
        }
        ids
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityCreateTransition {
    pub protocol_version: u32,
    pub identity_id: Identifier,
    pub public_keys: Vec<IdentityPublicKey>,
    pub asset_lock_proof: AssetLockProof,
    #[serde(default)]
    pub signature: BinaryData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityTopUpTransition {
    pub protocol_version: u32,
    pub identity_id: Identifier,
    pub asset_lock_proof: AssetLockProof,
    #[serde(default)]
    pub signature: BinaryData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityUpdateTransition {
    pub protocol_version: u32,
    pub identity_id: Identifier,
    /// Identity revision after the update
    pub revision: Revision,
    #[serde(default)]
    pub public_keys_to_add: Vec<IdentityPublicKey>,
    #[serde(default)]
    pub public_key_ids_to_disable: Vec<KeyId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_keys_disabled_at: Option<TimestampMillis>,
    #[serde(default)]
    pub signature_public_key_id: Option<KeyId>,
    #[serde(default)]
    pub signature: BinaryData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateTransition {
    DataContractCreate(DataContractCreateTransition),
    DataContractUpdate(DataContractUpdateTransition),
    DocumentsBatch(DocumentsBatchTransition),
    IdentityCreate(IdentityCreateTransition),
    IdentityTopUp(IdentityTopUpTransition),
    IdentityUpdate(IdentityUpdateTransition),
}

impl StateTransition {
    pub fn transition_type(&self) -> StateTransitionType {
        match self {
            StateTransition::DataContractCreate(_) => StateTransitionType::DataContractCreate,
            StateTransition::DataContractUpdate(_) => StateTransitionType::DataContractUpdate,
            StateTransition::DocumentsBatch(_) => StateTransitionType::DocumentsBatch,
            StateTransition::IdentityCreate(_) => StateTransitionType::IdentityCreate,
            StateTransition::IdentityTopUp(_) => StateTransitionType::IdentityTopUp,
            StateTransition::IdentityUpdate(_) => StateTransitionType::IdentityUpdate,
        }
    }

    pub fn protocol_version(&self) -> u32 {
        match self {
            StateTransition::DataContractCreate(t) => t.protocol_version,
            StateTransition::DataContractUpdate(t) => t.protocol_version,
            StateTransition::DocumentsBatch(t) => t.protocol_version,
            StateTransition::IdentityCreate(t) => t.protocol_version,
            StateTransition::IdentityTopUp(t) => t.protocol_version,
            StateTransition::IdentityUpdate(t) => t.protocol_version,
        }
    }

    pub fn signature(&self) -> &BinaryData {
        match self {
            StateTransition::DataContractCreate(t) => &t.signature,
            StateTransition::DataContractUpdate(t) => &t.signature,
            StateTransition::DocumentsBatch(t) => &t.signature,
            StateTransition::IdentityCreate(t) => &t.signature,
            StateTransition::IdentityTopUp(t) => &t.signature,
            StateTransition::IdentityUpdate(t) => &t.signature,
        }
    }

    pub fn set_signature(&mut self, signature: BinaryData) {
        match self {
            StateTransition::DataContractCreate(t) => t.signature = signature,
            StateTransition::DataContractUpdate(t) => t.signature = signature,
            StateTransition::DocumentsBatch(t) => t.signature = signature,
            StateTransition::IdentityCreate(t) => t.signature = signature,
            StateTransition::IdentityTopUp(t) => t.signature = signature,
            StateTransition::IdentityUpdate(t) => t.signature = signature,
        }
    }

    /// Id of the identity key that signed the transition
    ///
    /// Identity create and top-up are signed by the asset-lock key instead.
    pub fn signature_public_key_id(&self) -> Option<KeyId> {
        match self {
            StateTransition::DataContractCreate(t) => t.signature_public_key_id,
            StateTransition::DataContractUpdate(t) => t.signature_public_key_id,
            StateTransition::DocumentsBatch(t) => t.signature_public_key_id,
            StateTransition::IdentityUpdate(t) => t.signature_public_key_id,
            StateTransition::IdentityCreate(_) | StateTransition::IdentityTopUp(_) => None,
        }
    }

    pub fn set_signature_public_key_id(&mut self, key_id: KeyId) {
        match self {
            StateTransition::DataContractCreate(t) => t.signature_public_key_id = Some(key_id),
            StateTransition::DataContractUpdate(t) => t.signature_public_key_id = Some(key_id),
            StateTransition::DocumentsBatch(t) => t.signature_public_key_id = Some(key_id),
            StateTransition::IdentityUpdate(t) => t.signature_public_key_id = Some(key_id),
            StateTransition::IdentityCreate(_) | StateTransition::IdentityTopUp(_) => {}
        }
    }

    /// Identity that owns the transition and pays its fee
    pub fn owner_id(&self) -> Identifier {
        match self {
            StateTransition::DataContractCreate(t) => t.data_contract.owner_id,
            StateTransition::DataContractUpdate(t) => t.data_contract.owner_id,
            StateTransition::DocumentsBatch(t) => t.owner_id,
            StateTransition::IdentityCreate(t) => t.identity_id,
            StateTransition::IdentityTopUp(t) => t.identity_id,
            StateTransition::IdentityUpdate(t) => t.identity_id,
        }
    }

    /// Raw object including the `type` field
    pub fn to_object(&self) -> Result<Value, SerializationError> {
        let mut object = match self {
            StateTransition::DataContractCreate(t) => serialization::to_object(t)?,
            StateTransition::DataContractUpdate(t) => serialization::to_object(t)?,
            StateTransition::DocumentsBatch(t) => serialization::to_object(t)?,
            StateTransition::IdentityCreate(t) => serialization::to_object(t)?,
            StateTransition::IdentityTopUp(t) => serialization::to_object(t)?,
            StateTransition::IdentityUpdate(t) => serialization::to_object(t)?,
        };
        if let Value::Object(map) = &mut object {
            map.insert(PROPERTY_TYPE.to_string(), Value::from(self.transition_type().code()));
        }
        Ok(object)
    }

    /// Wire encoding
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        serialization::encode_object(&self.to_object()?)
    }

    /// Canonical bytes covered by the signature
    pub fn signable_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        let mut object = self.to_object()?;
        if let Value::Object(map) = &mut object {
            map.remove(PROPERTY_SIGNATURE);
            map.remove(PROPERTY_SIGNATURE_PUBLIC_KEY_ID);
        }
        serialization::encode_canonical(&object)
    }

    pub fn signable_hash(&self) -> Result<TransitionHash, SerializationError> {
        Ok(hasher::signable_hash(&self.signable_bytes()?))
    }

    /// Typed transition of a known type from its raw object, without validation
    pub fn from_object_of_type(
        transition_type: StateTransitionType,
        raw: Value,
    ) -> Result<Self, Error> {
        let transition = match transition_type {
            StateTransitionType::DataContractCreate => {
                StateTransition::DataContractCreate(serialization::from_object(raw)?)
            }
            StateTransitionType::DataContractUpdate => {
                StateTransition::DataContractUpdate(serialization::from_object(raw)?)
            }
            StateTransitionType::DocumentsBatch => {
                StateTransition::DocumentsBatch(serialization::from_object(raw)?)
            }
            StateTransitionType::IdentityCreate => {
                StateTransition::IdentityCreate(serialization::from_object(raw)?)
            }
            StateTransitionType::IdentityTopUp => {
                StateTransition::IdentityTopUp(serialization::from_object(raw)?)
            }
            StateTransitionType::IdentityUpdate => {
                StateTransition::IdentityUpdate(serialization::from_object(raw)?)
            }
        };
        Ok(transition)
    }
}

impl From<DataContractCreateTransition> for StateTransition {
    fn from(transition: DataContractCreateTransition) -> Self {
        StateTransition::DataContractCreate(transition)
    }
}

impl From<DataContractUpdateTransition> for StateTransition {
    fn from(transition: DataContractUpdateTransition) -> Self {
        StateTransition::DataContractUpdate(transition)
    }
}

impl From<DocumentsBatchTransition> for StateTransition {
    fn from(transition: DocumentsBatchTransition) -> Self {
        StateTransition::DocumentsBatch(transition)
    }
}

impl From<IdentityCreateTransition> for StateTransition {
    fn from(transition: IdentityCreateTransition) -> Self {
        StateTransition::IdentityCreate(transition)
    }
}

impl From<IdentityTopUpTransition> for StateTransition {
    fn from(transition: IdentityTopUpTransition) -> Self {
        StateTransition::IdentityTopUp(transition)
    }
}

impl From<IdentityUpdateTransition> for StateTransition {
    fn from(transition: IdentityUpdateTransition) -> Self {
        StateTransition::IdentityUpdate(transition)
    }
}
