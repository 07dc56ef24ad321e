//! JSON schemas of raw state transitions
//!
//! Every raw transition is validated against the base schema merged with the
//! extension schema of its type.

use serde_json::{json, Map, Value};
use crate::config::ValidationConfig;
use crate::state_transition::StateTransitionType;
use crate::traits::SchemaViolation;

const UNDECLARED_PROPERTY: &str = "must NOT have additional properties";

/// Shared by all transition types
pub fn base_schema() -> Value {
    json!({
        "type": "object",
        "required": ["protocolVersion", "type", "signature"],
        "additionalProperties": false,
        "properties": {
            "protocolVersion": { "type": "integer", "minimum": 0 },
            "type": { "type": "integer", "minimum": 0 },
            // 65 to 96 bytes, hex encoded
            "signature": { "type": "string", "minLength": 130, "maxLength": 192 },
            "signaturePublicKeyId": { "type": ["integer", "null"], "minimum": 0 }
        }
    })
}

fn identifier_schema() -> Value {
    json!({ "type": "string", "minLength": 64, "maxLength": 64 })
}

fn public_key_schema() -> Value {
    json!({
        "type": "object",
        "required": ["id", "type", "purpose", "securityLevel", "data"],
        "additionalProperties": false,
        "properties": {
            "id": { "type": "integer", "minimum": 0 },
            "type": { "type": "integer", "minimum": 0, "maximum": 2 },
            "purpose": { "type": "integer", "minimum": 0, "maximum": 2 },
            "securityLevel": { "type": "integer", "minimum": 0, "maximum": 3 },
            "data": { "type": "string", "minLength": 1 },
            "readOnly": { "type": "boolean" },
            "disabledAt": { "type": "integer", "minimum": 0 }
        }
    })
}

fn asset_lock_proof_schema() -> Value {
    json!({
        "type": "object",
        "required": ["outPoint", "output"],
        "additionalProperties": false,
        "properties": {
            "outPoint": {
                "type": "object",
                "required": ["txid", "vout"],
                "additionalProperties": false,
                "properties": {
                    "txid": identifier_schema(),
                    "vout": { "type": "integer", "minimum": 0 }
                }
            },
            "output": {
                "type": "object",
                "required": ["value", "publicKeyHash"],
                "additionalProperties": false,
                "properties": {
                    "value": { "type": "integer", "minimum": 0 },
                    "publicKeyHash": { "type": "string", "minLength": 40, "maxLength": 40 }
                }
            }
        }
    })
}

fn data_contract_schema() -> Value {
    json!({
        "type": "object",
        "required": ["protocolVersion", "$id", "version", "ownerId", "documents"],
        "additionalProperties": false,
        "properties": {
            "protocolVersion": { "type": "integer", "minimum": 0 },
            "$id": identifier_schema(),
            "$schema": { "type": "string" },
            "version": { "type": "integer", "minimum": 1 },
            "ownerId": identifier_schema(),
            "documents": { "type": "object" },
            "$defs": { "type": "object" }
        }
    })
}

/// Type-specific part of the schema
pub fn extension_schema(transition_type: StateTransitionType, config: &ValidationConfig) -> Value {
    match transition_type {
        StateTransitionType::DataContractCreate => json!({
            "required": ["dataContract", "entropy"],
            "properties": {
                "dataContract": data_contract_schema(),
                "entropy": identifier_schema()
            }
        }),
        StateTransitionType::DataContractUpdate => json!({
            "required": ["dataContract"],
            "properties": {
                "dataContract": data_contract_schema()
            }
        }),
        StateTransitionType::DocumentsBatch => json!({
            "required": ["ownerId", "transitions"],
            "properties": {
                "ownerId": identifier_schema(),
                "transitions": {
                    "type": "array",
                    "minItems": 1,
                    "maxItems": config.max_document_transitions,
                    "items": { "type": "object" }
                }
            }
        }),
        StateTransitionType::IdentityCreate => json!({
            "required": ["identityId", "publicKeys", "assetLockProof"],
            "properties": {
                "identityId": identifier_schema(),
                "publicKeys": {
                    "type": "array",
                    "minItems": 1,
                    "maxItems": config.max_identity_public_keys,
                    "items": public_key_schema()
                },
                "assetLockProof": asset_lock_proof_schema()
            }
        }),
        StateTransitionType::IdentityTopUp => json!({
            "required": ["identityId", "assetLockProof"],
            "properties": {
                "identityId": identifier_schema(),
                "assetLockProof": asset_lock_proof_schema()
            }
        }),
        StateTransitionType::IdentityUpdate => json!({
            "required": ["identityId", "revision"],
            "properties": {
                "identityId": identifier_schema(),
                "revision": { "type": "integer", "minimum": 0 },
                "publicKeysToAdd": {
                    "type": "array",
                    "maxItems": config.max_identity_public_keys,
                    "items": public_key_schema()
                },
                "publicKeyIdsToDisable": {
                    "type": "array",
                    "maxItems": config.max_identity_public_keys,
                    "items": { "type": "integer", "minimum": 0 }
                },
                "publicKeysDisabledAt": { "type": "integer", "minimum": 0 }
            }
        }),
    }
}

/// Complete schema of a transition type
pub fn transition_schema(transition_type: StateTransitionType, config: &ValidationConfig) -> Value {
    merge_schemas(&base_schema(), &extension_schema(transition_type, config))
}

/// Merge `extension` into `base`
///
/// Objects merge key by key and arrays are unioned, so an extension adds to
/// `required` instead of replacing it. Other values are overridden.
pub fn merge_schemas(base: &Value, extension: &Value) -> Value {
    match (base, extension) {
        (Value::Object(base), Value::Object(extension)) => {
            let mut merged: Map<String, Value> = base.clone();
            for (key, value) in extension {
                let entry = match merged.get(key) {
                    Some(existing) => merge_schemas(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), entry);
            }
            Value::Object(merged)
        }
        (Value::Array(base), Value::Array(extension)) => {
            let mut merged = base.clone();
            for item in extension {
                if !merged.contains(item) {
                    merged.push(item.clone());
                }
            }
            Value::Array(merged)
        }
        (_, extension) => extension.clone(),
    }
}

/// Object members that a closed schema (`additionalProperties: false`) does
/// not declare
///
/// Typed decoding drops such members, so they would travel unsigned if they
/// were let through.
pub fn undeclared_properties(schema: &Value, value: &Value) -> Vec<SchemaViolation> {
    let mut violations = Vec::new();
    collect_undeclared(schema, value, "", &mut violations);
    violations
}

fn collect_undeclared(schema: &Value, value: &Value, path: &str, violations: &mut Vec<SchemaViolation>) {
    if let Some(object) = value.as_object() {
        let properties = schema.get("properties").and_then(Value::as_object);
        let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));
        for (name, property) in object {
            let property_path = format!("{}/{}", path, name);
            match properties.and_then(|properties| properties.get(name)) {
                Some(property_schema) => collect_undeclared(property_schema, property, &property_path, violations),
                None if closed => violations.push(SchemaViolation::new(property_path, UNDECLARED_PROPERTY)),
                None => {}
            }
        }
    }

    if let (Some(items), Some(array)) = (schema.get("items"), value.as_array()) {
        for (index, item) in array.iter().enumerate() {
            collect_undeclared(items, item, &format!("{}/{}", path, index), violations);
        }
    }
}
