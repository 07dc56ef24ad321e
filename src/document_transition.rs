//! Document transitions carried by a documents batch
//!
//! Raw document transitions are flat objects: system fields are prefixed with
//! `$` and every other key is document data.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::convert::TryFrom;
use crate::document::get_data_path;
use crate::error::Error;
use crate::types::{BinaryData, Identifier, Revision, TimestampMillis};

pub const PROPERTY_ACTION: &str = "$action";
pub const PROPERTY_ID: &str = "$id";
pub const PROPERTY_TYPE: &str = "$type";
pub const PROPERTY_DATA_CONTRACT_ID: &str = "$dataContractId";
pub const PROPERTY_ENTROPY: &str = "$entropy";
pub const PROPERTY_REVISION: &str = "$revision";
pub const PROPERTY_CREATED_AT: &str = "$createdAt";
pub const PROPERTY_UPDATED_AT: &str = "$updatedAt";

/// Revision every document starts at
pub const INITIAL_REVISION: Revision = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentTransitionAction {
    Create = 0,
    Replace = 1,
    Delete = 3,
}

impl DocumentTransitionAction {
    pub fn code(&self) -> u64 {
        *self as u64
    }
}

impl TryFrom<u64> for DocumentTransitionAction {
    type Error = Error;

    fn try_from(action: u64) -> Result<Self, Self::Error> {
        match action {
            0 => Ok(DocumentTransitionAction::Create),
            1 => Ok(DocumentTransitionAction::Replace),
            3 => Ok(DocumentTransitionAction::Delete),
            other => Err(Error::InvalidDocumentAction { action: other }),
        }
    }
}

/// Fields shared by every document transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentBaseTransition {
    pub id: Identifier,
    pub document_type: String,
    pub data_contract_id: Identifier,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentCreateTransition {
    pub base: DocumentBaseTransition,
    pub entropy: BinaryData,
    pub created_at: Option<TimestampMillis>,
    pub updated_at: Option<TimestampMillis>,
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentReplaceTransition {
    pub base: DocumentBaseTransition,
    pub revision: Revision,
    pub updated_at: Option<TimestampMillis>,
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentDeleteTransition {
    pub base: DocumentBaseTransition,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentTransition {
    Create(DocumentCreateTransition),
    Replace(DocumentReplaceTransition),
    Delete(DocumentDeleteTransition),
}

impl DocumentTransition {
    pub fn base(&self) -> &DocumentBaseTransition {
        match self {
            DocumentTransition::Create(t) => &t.base,
            DocumentTransition::Replace(t) => &t.base,
            DocumentTransition::Delete(t) => &t.base,
        }
    }

    pub fn id(&self) -> &Identifier {
        &self.base().id
    }

    pub fn document_type(&self) -> &str {
        &self.base().document_type
    }

    pub fn data_contract_id(&self) -> &Identifier {
        &self.base().data_contract_id
    }

    pub fn action(&self) -> DocumentTransitionAction {
        match self {
            DocumentTransition::Create(_) => DocumentTransitionAction::Create,
            DocumentTransition::Replace(_) => DocumentTransitionAction::Replace,
            DocumentTransition::Delete(_) => DocumentTransitionAction::Delete,
        }
    }

    /// Revision the document will have after this transition
    pub fn revision(&self) -> Option<Revision> {
        match self {
            DocumentTransition::Create(_) => Some(INITIAL_REVISION),
            DocumentTransition::Replace(t) => Some(t.revision),
            DocumentTransition::Delete(_) => None,
        }
    }

    pub fn created_at(&self) -> Option<TimestampMillis> {
        match self {
            DocumentTransition::Create(t) => t.created_at,
            _ => None,
        }
    }

    pub fn updated_at(&self) -> Option<TimestampMillis> {
        match self {
            DocumentTransition::Create(t) => t.updated_at,
            DocumentTransition::Replace(t) => t.updated_at,
            DocumentTransition::Delete(_) => None,
        }
    }

    pub fn data(&self) -> Option<&Map<String, Value>> {
        match self {
            DocumentTransition::Create(t) => Some(&t.data),
            DocumentTransition::Replace(t) => Some(&t.data),
            DocumentTransition::Delete(_) => None,
        }
    }

    /// Value of a system field or a dotted data path
    ///
    /// `$ownerId` isn't part of the transition and resolves to `None`.
    pub fn get(&self, path: &str) -> Option<Value> {
        match path {
            PROPERTY_ID => Some(Value::String(self.id().to_hex())),
            PROPERTY_TYPE => Some(Value::String(self.document_type().to_string())),
            PROPERTY_DATA_CONTRACT_ID => Some(Value::String(self.data_contract_id().to_hex())),
            PROPERTY_REVISION => self.revision().map(Value::from),
            PROPERTY_CREATED_AT => self.created_at().map(Value::from),
            PROPERTY_UPDATED_AT => self.updated_at().map(Value::from),
            _ => self.data().and_then(|data| get_data_path(data, path)).cloned(),
        }
    }

    /// Flat raw object of the transition
    pub fn to_object(&self) -> Value {
        let base = self.base();
        let mut object = match self {
            DocumentTransition::Create(t) => t.data.clone(),
            DocumentTransition::Replace(t) => t.data.clone(),
            DocumentTransition::Delete(_) => Map::new(),
        };

        object.insert(PROPERTY_ACTION.to_string(), Value::from(self.action().code()));
        object.insert(PROPERTY_ID.to_string(), Value::String(base.id.to_hex()));
        object.insert(PROPERTY_TYPE.to_string(), Value::String(base.document_type.clone()));
        object.insert(
            PROPERTY_DATA_CONTRACT_ID.to_string(),
            Value::String(base.data_contract_id.to_hex()),
        );

        match self {
            DocumentTransition::Create(t) => {
                object.insert(
                    PROPERTY_ENTROPY.to_string(),
                    Value::String(hex::encode(t.entropy.as_slice())),
                );
                if let Some(created_at) = t.created_at {
                    object.insert(PROPERTY_CREATED_AT.to_string(), Value::from(created_at));
                }
                if let Some(updated_at) = t.updated_at {
                    object.insert(PROPERTY_UPDATED_AT.to_string(), Value::from(updated_at));
                }
            }
            DocumentTransition::Replace(t) => {
                object.insert(PROPERTY_REVISION.to_string(), Value::from(t.revision));
                if let Some(updated_at) = t.updated_at {
                    object.insert(PROPERTY_UPDATED_AT.to_string(), Value::from(updated_at));
                }
            }
            DocumentTransition::Delete(_) => {}
        }

        Value::Object(object)
    }

    /// Build a typed transition from its raw object
    ///
    /// An unknown `$action` is fatal; any other malformed field is a decode error.
    pub fn from_object(raw: &Value) -> Result<Self, Error> {
        let object = raw.as_object().ok_or_else(|| decode_error("document transition must be an object"))?;

        let action = object
            .get(PROPERTY_ACTION)
            .and_then(Value::as_u64)
            .ok_or_else(|| decode_error("$action must be a non-negative integer"))?;
        let action = DocumentTransitionAction::try_from(action)?;

        let base = DocumentBaseTransition {
            id: identifier_field(object, PROPERTY_ID)?,
            document_type: object
                .get(PROPERTY_TYPE)
                .and_then(Value::as_str)
                .ok_or_else(|| decode_error("$type must be a string"))?
                .to_string(),
            data_contract_id: identifier_field(object, PROPERTY_DATA_CONTRACT_ID)?,
        };

        let transition = match action {
            DocumentTransitionAction::Create => {
                let entropy = object
                    .get(PROPERTY_ENTROPY)
                    .and_then(Value::as_str)
                    .and_then(|encoded| hex::decode(encoded).ok())
                    .ok_or_else(|| decode_error("$entropy must be hex encoded bytes"))?;
                DocumentTransition::Create(DocumentCreateTransition {
                    base,
                    entropy: BinaryData::new(entropy),
                    created_at: timestamp_field(object, PROPERTY_CREATED_AT)?,
                    updated_at: timestamp_field(object, PROPERTY_UPDATED_AT)?,
                    data: document_data(object),
                })
            }
            DocumentTransitionAction::Replace => {
                let revision = object
                    .get(PROPERTY_REVISION)
                    .and_then(Value::as_u64)
                    .ok_or_else(|| decode_error("$revision must be a non-negative integer"))?;
                DocumentTransition::Replace(DocumentReplaceTransition {
                    base,
                    revision,
                    updated_at: timestamp_field(object, PROPERTY_UPDATED_AT)?,
                    data: document_data(object),
                })
            }
            DocumentTransitionAction::Delete => {
                DocumentTransition::Delete(DocumentDeleteTransition { base })
            }
        };

        Ok(transition)
    }
}

impl Serialize for DocumentTransition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_object().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DocumentTransition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        DocumentTransition::from_object(&raw).map_err(de::Error::custom)
    }
}

fn decode_error(reason: &str) -> Error {
    Error::Decode {
        reason: reason.to_string(),
    }
}

fn identifier_field(object: &Map<String, Value>, name: &str) -> Result<Identifier, Error> {
    object
        .get(name)
        .and_then(Value::as_str)
        .and_then(Identifier::from_hex)
        .ok_or_else(|| Error::Decode {
            reason: format!("{} must be a hex encoded 32-byte identifier", name),
        })
}

fn timestamp_field(object: &Map<String, Value>, name: &str) -> Result<Option<TimestampMillis>, Error> {
    match object.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| Error::Decode {
            reason: format!("{} must be a non-negative integer", name),
        }),
    }
}

/// Everything that isn't a system field
fn document_data(object: &Map<String, Value>) -> Map<String, Value> {
    object
        .iter()
        .filter(|(key, _)| !key.starts_with('$'))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
