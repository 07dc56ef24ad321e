//! Shared fixtures for integration tests
#![allow(dead_code)]

use serde_json::{json, Map, Value};
use std::sync::Arc;
use stengine::data_trigger::DataTriggerRegistry;
use stengine::fee::FeeCalculator;
use stengine::hasher;
use stengine::{
    AssetLockOutput, AssetLockProof, BinaryData, BlockHeader, DataContract, DocumentBaseTransition,
    DocumentCreateTransition, DocumentDeleteTransition, DocumentReplaceTransition,
    DocumentTransition, DocumentsBatchTransition, Identifier, Identity, IdentityPublicKey,
    InMemoryStateRepository, JsonSchemaValidator, KeyType, OutPoint, Purpose, SchemaViolation,
    SecurityLevel, SignatureVerifier, StateTransition, StateTransitionProcessor, TimestampMillis,
    PROTOCOL_VERSION,
};

/// Block time of the fixture ledger
pub const NOW: TimestampMillis = 1_700_000_000_000;
pub const MINUTE: TimestampMillis = 60_000;

pub const MASTER_KEY_ID: u32 = 0;
pub const HIGH_KEY_ID: u32 = 1;
pub const BLS_KEY_ID: u32 = 2;
pub const MEDIUM_KEY_ID: u32 = 3;

pub const RICH_BALANCE: u64 = 1_000_000_000_000;

/// Deterministic stand-in for a real signature scheme
pub fn sign_payload(key: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(key);
    hasher.update(payload);
    let mut signature = vec![0u8; 65];
    hasher.finalize_xof().fill(&mut signature);
    signature
}

pub struct TestSignatureVerifier;

impl SignatureVerifier for TestSignatureVerifier {
    fn verify(&self, _key_type: KeyType, public_key: &[u8], signature: &[u8], payload: &[u8]) -> bool {
        sign_payload(public_key, payload) == signature
    }

    fn verify_by_public_key_hash(&self, public_key_hash: &[u8], signature: &[u8], payload: &[u8]) -> bool {
        sign_payload(public_key_hash, payload) == signature
    }
}

/// Validator for the subset of JSON schema the engine's schemas use
pub struct StubSchemaValidator;

impl StubSchemaValidator {
    fn type_matches(expected: &str, value: &Value) -> bool {
        match expected {
            "object" => value.is_object(),
            "array" => value.is_array(),
            "string" => value.is_string(),
            "integer" => value.is_u64() || value.is_i64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "null" => value.is_null(),
            _ => true,
        }
    }

    fn check(schema: &Value, value: &Value, path: &str, violations: &mut Vec<SchemaViolation>) {
        if let Some(expected) = schema.get("type") {
            let matches = match expected {
                Value::String(name) => Self::type_matches(name, value),
                Value::Array(names) => names
                    .iter()
                    .filter_map(Value::as_str)
                    .any(|name| Self::type_matches(name, value)),
                _ => true,
            };
            if !matches {
                violations.push(SchemaViolation::new(path, format!("must be {}", expected)));
                return;
            }
        }

        if let (Some(required), Some(object)) = (schema.get("required").and_then(Value::as_array), value.as_object()) {
            for name in required.iter().filter_map(Value::as_str) {
                if !object.contains_key(name) {
                    violations.push(SchemaViolation::new(path, format!("must have required property '{}'", name)));
                }
            }
        }

        if let (Some(properties), Some(object)) = (schema.get("properties").and_then(Value::as_object), value.as_object()) {
            for (name, property_schema) in properties {
                if let Some(property) = object.get(name) {
                    Self::check(property_schema, property, &format!("{}/{}", path, name), violations);
                }
            }
        }

        if let (Some(items), Some(array)) = (schema.get("items"), value.as_array()) {
            for (index, item) in array.iter().enumerate() {
                Self::check(items, item, &format!("{}/{}", path, index), violations);
            }
        }

        if let Some(number) = value.as_f64() {
            if let Some(minimum) = schema.get("minimum").and_then(Value::as_f64) {
                if number < minimum {
                    violations.push(SchemaViolation::new(path, format!("must be >= {}", minimum)));
                }
            }
            if let Some(maximum) = schema.get("maximum").and_then(Value::as_f64) {
                if number > maximum {
                    violations.push(SchemaViolation::new(path, format!("must be <= {}", maximum)));
                }
            }
        }

        if let Some(text) = value.as_str() {
            let length = text.chars().count() as u64;
            if let Some(min) = schema.get("minLength").and_then(Value::as_u64) {
                if length < min {
                    violations.push(SchemaViolation::new(path, format!("must NOT have fewer than {} characters", min)));
                }
            }
            if let Some(max) = schema.get("maxLength").and_then(Value::as_u64) {
                if length > max {
                    violations.push(SchemaViolation::new(path, format!("must NOT have more than {} characters", max)));
                }
            }
        }

        if let Some(array) = value.as_array() {
            let length = array.len() as u64;
            if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
                if length < min {
                    violations.push(SchemaViolation::new(path, format!("must NOT have fewer than {} items", min)));
                }
            }
            if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
                if length > max {
                    violations.push(SchemaViolation::new(path, format!("must NOT have more than {} items", max)));
                }
            }
        }
    }
}

impl JsonSchemaValidator for StubSchemaValidator {
    fn validate(&self, schema: &Value, object: &Value) -> Vec<SchemaViolation> {
        let mut violations = Vec::new();
        Self::check(schema, object, "", &mut violations);
        violations
    }
}

pub fn key(id: u32, key_type: KeyType, security_level: SecurityLevel, fill: u8) -> IdentityPublicKey {
    IdentityPublicKey {
        id,
        key_type,
        purpose: Purpose::Authentication,
        security_level,
        data: BinaryData::new(vec![fill; key_type.data_size()]),
        read_only: false,
        disabled_at: None,
    }
}

pub fn owner_keys() -> Vec<IdentityPublicKey> {
    vec![
        key(MASTER_KEY_ID, KeyType::EcdsaSecp256k1, SecurityLevel::Master, 0x02),
        key(HIGH_KEY_ID, KeyType::EcdsaSecp256k1, SecurityLevel::High, 0x03),
        key(BLS_KEY_ID, KeyType::Bls12_381, SecurityLevel::High, 0x04),
        key(MEDIUM_KEY_ID, KeyType::EcdsaSecp256k1, SecurityLevel::Medium, 0x05),
    ]
}

pub fn owner_id() -> Identifier {
    Identifier([0x11; 32])
}

pub fn other_owner_id() -> Identifier {
    Identifier([0x22; 32])
}

pub fn identity(id: Identifier, balance: u64) -> Identity {
    Identity {
        protocol_version: PROTOCOL_VERSION,
        id,
        public_keys: owner_keys(),
        balance,
        revision: 0,
    }
}

pub fn owner_key(key_id: u32) -> IdentityPublicKey {
    owner_keys()
        .into_iter()
        .find(|key| key.id == key_id)
        .expect("fixture key")
}

/// Contract with a free-form `note` type and a `profile` type unique by handle
pub fn note_contract() -> DataContract {
    let owner = owner_id();
    let id = hasher::derive_data_contract_id(&owner, &[0x07; 32]);
    serde_json::from_value(json!({
        "protocolVersion": PROTOCOL_VERSION,
        "$id": id.to_hex(),
        "version": 1,
        "ownerId": owner.to_hex(),
        "documents": {
            "note": {
                "type": "object",
                "properties": {
                    "message": { "type": "string", "maxLength": 100 }
                },
                "required": ["message"]
            },
            "profile": {
                "type": "object",
                "properties": {
                    "handle": { "type": "string", "minLength": 1, "maxLength": 32 }
                },
                "required": ["handle"],
                "indices": [
                    { "name": "handle", "properties": [{ "handle": "asc" }], "unique": true }
                ]
            }
        }
    }))
    .expect("fixture contract")
}

pub fn repository() -> Arc<InMemoryStateRepository> {
    let repository = InMemoryStateRepository::new(BlockHeader::from_millis(100, NOW));
    repository.insert_identity(identity(owner_id(), RICH_BALANCE)).expect("identity");
    repository.insert_identity(identity(other_owner_id(), RICH_BALANCE)).expect("identity");
    repository.insert_data_contract(note_contract()).expect("contract");
    Arc::new(repository)
}

pub fn processor(repository: &Arc<InMemoryStateRepository>) -> StateTransitionProcessor<InMemoryStateRepository> {
    processor_with(repository, DataTriggerRegistry::new(), None)
}

pub fn processor_with(
    repository: &Arc<InMemoryStateRepository>,
    registry: DataTriggerRegistry,
    fee_calculator: Option<FeeCalculator>,
) -> StateTransitionProcessor<InMemoryStateRepository> {
    let mut builder = StateTransitionProcessor::builder()
        .with_state_repository(repository.clone())
        .with_schema_validator(Arc::new(StubSchemaValidator))
        .with_signature_verifier(Arc::new(TestSignatureVerifier))
        .with_data_trigger_registry(registry);
    if let Some(fee_calculator) = fee_calculator {
        builder = builder.with_fee_calculator(fee_calculator);
    }
    builder.build().expect("processor")
}

fn base(data_contract: &DataContract, document_type: &str, id: Identifier) -> DocumentBaseTransition {
    DocumentBaseTransition {
        id,
        document_type: document_type.to_string(),
        data_contract_id: data_contract.id,
    }
}

/// Create transition whose id is derived from `entropy_seed`
pub fn create_document(
    owner: &Identifier,
    document_type: &str,
    entropy_seed: u8,
    data: Value,
    created_at: TimestampMillis,
) -> DocumentTransition {
    let data_contract = note_contract();
    let entropy = vec![entropy_seed; 32];
    let id = hasher::derive_document_id(&data_contract.id, owner, document_type, &entropy);
    DocumentTransition::Create(DocumentCreateTransition {
        base: base(&data_contract, document_type, id),
        entropy: BinaryData::new(entropy),
        created_at: Some(created_at),
        updated_at: Some(created_at),
        data: into_map(data),
    })
}

pub fn create_note(owner: &Identifier, entropy_seed: u8, message: &str) -> DocumentTransition {
    create_document(owner, "note", entropy_seed, json!({ "message": message }), NOW)
}

pub fn replace_note(id: Identifier, revision: u64, message: &str) -> DocumentTransition {
    DocumentTransition::Replace(DocumentReplaceTransition {
        base: base(&note_contract(), "note", id),
        revision,
        updated_at: Some(NOW),
        data: into_map(json!({ "message": message })),
    })
}

pub fn delete_note(id: Identifier) -> DocumentTransition {
    DocumentTransition::Delete(DocumentDeleteTransition {
        base: base(&note_contract(), "note", id),
    })
}

pub fn into_map(data: Value) -> Map<String, Value> {
    match data {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Unsigned documents batch
pub fn batch(owner: &Identifier, transitions: Vec<DocumentTransition>) -> StateTransition {
    StateTransition::DocumentsBatch(DocumentsBatchTransition {
        protocol_version: PROTOCOL_VERSION,
        owner_id: *owner,
        transitions,
        signature_public_key_id: None,
        signature: BinaryData::default(),
    })
}

/// Sign with an identity key
pub fn sign(transition: &mut StateTransition, key: &IdentityPublicKey) {
    transition.set_signature_public_key_id(key.id);
    let payload = transition.signable_hash().expect("signable hash");
    transition.set_signature(BinaryData::new(sign_payload(key.data.as_slice(), &payload.0)));
}

/// Sign with the key controlling an asset lock
pub fn sign_with_asset_lock(transition: &mut StateTransition, proof: &AssetLockProof) {
    let payload = transition.signable_hash().expect("signable hash");
    transition.set_signature(BinaryData::new(sign_payload(
        proof.output.public_key_hash.as_slice(),
        &payload.0,
    )));
}

pub fn signed_batch(owner: &Identifier, transitions: Vec<DocumentTransition>) -> StateTransition {
    let mut transition = batch(owner, transitions);
    sign(&mut transition, &owner_key(HIGH_KEY_ID));
    transition
}

pub fn asset_lock_proof(seed: u8, value: u64) -> AssetLockProof {
    AssetLockProof {
        out_point: OutPoint::new(Identifier([seed; 32]), 0),
        output: AssetLockOutput {
            value,
            public_key_hash: BinaryData::new(vec![seed; 20]),
        },
    }
}
