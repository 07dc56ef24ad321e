//! Data contracts and the document-type metadata read from them

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use crate::identity::SecurityLevel;
use crate::types::Identifier;

pub const DATA_CONTRACT_META_SCHEMA: &str =
    "https://schema.dash.org/dpp-0-4-0/meta/data-contract";

/// Keywords of a document type definition that aren't JSON schema
const NON_SCHEMA_KEYWORDS: [&str; 2] = ["indices", "signatureSecurityLevelRequirement"];

fn default_meta_schema() -> String {
    DATA_CONTRACT_META_SCHEMA.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataContract {
    pub protocol_version: u32,
    #[serde(rename = "$id")]
    pub id: Identifier,
    #[serde(rename = "$schema", default = "default_meta_schema")]
    pub schema: String,
    pub version: u32,
    pub owner_id: Identifier,
    /// Document type name to its definition
    pub documents: BTreeMap<String, Value>,
    #[serde(rename = "$defs", default, skip_serializing_if = "Option::is_none")]
    pub defs: Option<Value>,
}

/// One property of an index, in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexProperty {
    pub name: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub name: String,
    pub properties: Vec<IndexProperty>,
    pub unique: bool,
}

#[derive(Deserialize)]
struct RawIndex {
    #[serde(default)]
    name: String,
    properties: Vec<BTreeMap<String, String>>,
    #[serde(default)]
    unique: bool,
}

impl From<RawIndex> for Index {
    fn from(raw: RawIndex) -> Self {
        let properties = raw
            .properties
            .into_iter()
            .flat_map(|entry| entry.into_iter())
            .map(|(name, order)| IndexProperty {
                name,
                ascending: order != "desc",
            })
            .collect();
        Index {
            name: raw.name,
            properties,
            unique: raw.unique,
        }
    }
}

impl DataContract {
    pub fn has_document_type(&self, document_type: &str) -> bool {
        self.documents.contains_key(document_type)
    }

    pub fn document_types(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    /// Raw definition of a document type
    pub fn document_definition(&self, document_type: &str) -> Option<&Value> {
        self.documents.get(document_type)
    }

    /// JSON schema that document data of this type must satisfy
    pub fn document_data_schema(&self, document_type: &str) -> Option<Value> {
        let definition = self.documents.get(document_type)?.as_object()?;
        let schema: Map<String, Value> = definition
            .iter()
            .filter(|(key, _)| !NON_SCHEMA_KEYWORDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Some(Value::Object(schema))
    }

    /// Declared indices of a document type; malformed entries are skipped
    pub fn indices(&self, document_type: &str) -> Vec<Index> {
        self.documents
            .get(document_type)
            .and_then(|definition| definition.get("indices"))
            .and_then(Value::as_array)
            .map(|indices| {
                indices
                    .iter()
                    .filter_map(|raw| serde_json::from_value::<RawIndex>(raw.clone()).ok())
                    .map(Index::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn unique_indices(&self, document_type: &str) -> Vec<Index> {
        self.indices(document_type)
            .into_iter()
            .filter(|index| index.unique)
            .collect()
    }

    /// Security level declared by the document type, if any
    pub fn security_level_requirement(&self, document_type: &str) -> Option<SecurityLevel> {
        self.documents
            .get(document_type)?
            .get("signatureSecurityLevelRequirement")?
            .as_u64()
            .and_then(|level| u8::try_from(level).ok())
            .and_then(|level| SecurityLevel::try_from(level).ok())
    }
}
