//! Stored documents and document queries

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use crate::types::{Identifier, Revision, TimestampMillis};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "$id")]
    pub id: Identifier,
    #[serde(rename = "$type")]
    pub document_type: String,
    #[serde(rename = "$dataContractId")]
    pub data_contract_id: Identifier,
    #[serde(rename = "$ownerId")]
    pub owner_id: Identifier,
    #[serde(rename = "$revision")]
    pub revision: Revision,
    #[serde(rename = "$createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<TimestampMillis>,
    #[serde(rename = "$updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<TimestampMillis>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Document {
    /// Value of a system (`$`-prefixed) field or a dotted data path
    pub fn get(&self, path: &str) -> Option<Value> {
        match path {
            "$id" => Some(Value::String(self.id.to_hex())),
            "$type" => Some(Value::String(self.document_type.clone())),
            "$dataContractId" => Some(Value::String(self.data_contract_id.to_hex())),
            "$ownerId" => Some(Value::String(self.owner_id.to_hex())),
            "$revision" => Some(Value::from(self.revision)),
            "$createdAt" => self.created_at.map(Value::from),
            "$updatedAt" => self.updated_at.map(Value::from),
            _ => get_data_path(&self.data, path).cloned(),
        }
    }
}

/// Resolve a dotted path inside document data
pub fn get_data_path<'a>(data: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = data.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WhereOperator {
    Equal,
    In,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereClause {
    pub field: String,
    pub operator: WhereOperator,
    pub value: Value,
}

impl WhereClause {
    pub fn equal(field: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            operator: WhereOperator::Equal,
            value,
        }
    }

    pub fn one_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            field: field.into(),
            operator: WhereOperator::In,
            value: Value::Array(values),
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        let Some(actual) = document.get(&self.field) else {
            return false;
        };
        match self.operator {
            WhereOperator::Equal => actual == self.value,
            WhereOperator::In => self
                .value
                .as_array()
                .map(|values| values.contains(&actual))
                .unwrap_or(false),
        }
    }
}

/// Conjunction of where clauses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentQuery {
    pub where_clauses: Vec<WhereClause>,
    pub limit: Option<u32>,
}

impl DocumentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_where(mut self, clause: WhereClause) -> Self {
        self.where_clauses.push(clause);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.where_clauses.iter().all(|clause| clause.matches(document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Document {
        let mut data = Map::new();
        data.insert("label".to_string(), json!("alice"));
        data.insert("records".to_string(), json!({ "identity": "abc" }));
        Document {
            id: Identifier([1; 32]),
            document_type: "domain".to_string(),
            data_contract_id: Identifier([2; 32]),
            owner_id: Identifier([3; 32]),
            revision: 1,
            created_at: Some(10),
            updated_at: None,
            data,
        }
    }

    #[test]
    fn test_get_system_and_nested_fields() {
        let document = document();
        assert_eq!(document.get("$ownerId"), Some(json!(hex::encode([3u8; 32]))));
        assert_eq!(document.get("records.identity"), Some(json!("abc")));
        assert_eq!(document.get("$updatedAt"), None);
    }

    #[test]
    fn test_query_matching() {
        let document = document();
        let query = DocumentQuery::new()
            .with_where(WhereClause::equal("label", json!("alice")))
            .with_where(WhereClause::one_of("$revision", vec![json!(1), json!(2)]));
        assert!(query.matches(&document));

        let query = DocumentQuery::new().with_where(WhereClause::equal("label", json!("bob")));
        assert!(!query.matches(&document));
    }
}
