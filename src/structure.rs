//! Structural validation of raw state transitions
//!
//! Runs before a transition is trusted enough to be typed: type code, schema,
//! protocol version, per-type structural rules and the size bound.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::sync::Arc;
use crate::config::ValidationConfig;
use crate::consensus::ConsensusError;
use crate::context::ExecutionContext;
use crate::data_contract::DataContract;
use crate::document_transition::{
    DocumentTransitionAction, PROPERTY_ACTION, PROPERTY_CREATED_AT, PROPERTY_DATA_CONTRACT_ID,
    PROPERTY_ENTROPY, PROPERTY_ID, PROPERTY_REVISION, PROPERTY_TYPE, PROPERTY_UPDATED_AT,
};
use crate::error::Error;
use crate::hasher;
use crate::identity::{AssetLockProof, IdentityPublicKey, Purpose, SecurityLevel};
use crate::schema;
use crate::serialization;
use crate::state_transition::{
    DataContractCreateTransition, DataContractUpdateTransition, DocumentsBatchTransition,
    IdentityCreateTransition, IdentityTopUpTransition, IdentityUpdateTransition, StateTransition,
    StateTransitionType,
};
use crate::traits::{JsonSchemaValidator, SchemaViolation, StateRepository};
use crate::types::{Identifier, PROTOCOL_VERSION};
use crate::uniqueness;
use crate::validation::{SimpleValidationResult, ValidationResult};

const ENTROPY_SIZE: usize = 32;

/// Structural validation result; carries the data contracts a documents batch
/// resolved so later stages don't fetch them again
pub type StructureValidationResult = ValidationResult<Vec<DataContract>>;

pub struct StructureValidator<SR: StateRepository> {
    state_repository: Arc<SR>,
    schema_validator: Arc<dyn JsonSchemaValidator>,
    config: ValidationConfig,
}

impl<SR: StateRepository> StructureValidator<SR> {
    pub fn new(
        state_repository: Arc<SR>,
        schema_validator: Arc<dyn JsonSchemaValidator>,
        config: ValidationConfig,
    ) -> Self {
        Self {
            state_repository,
            schema_validator,
            config,
        }
    }

    pub fn validate(
        &self,
        raw: &Value,
        execution_context: &mut ExecutionContext,
    ) -> Result<StructureValidationResult, Error> {
        let Some(type_value) = raw.get(crate::state_transition::PROPERTY_TYPE) else {
            return Ok(ConsensusError::MissingStateTransitionType.into());
        };
        let Some(type_code) = type_value.as_u64() else {
            return Ok(schema_error("/type", "must be a non-negative integer").into());
        };
        let Ok(transition_type) = StateTransitionType::try_from(type_code) else {
            return Ok(ConsensusError::InvalidStateTransitionType {
                state_transition_type: type_code,
            }
            .into());
        };

        let schema = schema::transition_schema(transition_type, &self.config);
        let mut violations = self.schema_validator.validate(&schema, raw);
        if violations.is_empty() {
            violations = schema::undeclared_properties(&schema, raw);
        }
        if !violations.is_empty() {
            return Ok(ValidationResult::new_with_errors(
                violations.into_iter().map(into_consensus_error).collect(),
            ));
        }

        let protocol_version = raw
            .get(crate::state_transition::PROPERTY_PROTOCOL_VERSION)
            .and_then(Value::as_u64)
            .unwrap_or_default();
        if protocol_version == 0 || protocol_version > u64::from(PROTOCOL_VERSION) {
            return Ok(ConsensusError::UnsupportedProtocolVersion {
                parsed_protocol_version: protocol_version,
                latest_version: PROTOCOL_VERSION,
            }
            .into());
        }

        let mut result = match transition_type {
            StateTransitionType::DocumentsBatch => {
                self.validate_raw_documents_batch(raw, execution_context)?
            }
            _ => StructureValidationResult::new(),
        };
        if !result.is_valid() {
            return Ok(result);
        }

        let transition = match StateTransition::from_object_of_type(transition_type, raw.clone()) {
            Ok(transition) => transition,
            Err(error) => {
                result.add_error(schema_error("", &error.to_string()));
                return Ok(result);
            }
        };

        let data_contracts = result.data().cloned().unwrap_or_default();
        result.merge(self.validate_typed(&transition, &data_contracts));
        if !result.is_valid() {
            return Ok(result);
        }

        let size = serialization::encode_object(raw)?.len();
        result.merge(self.validate_size(size));

        Ok(result)
    }

    /// Size bound on the encoded transition, in bytes
    pub fn validate_size(&self, size: usize) -> SimpleValidationResult {
        let mut result = SimpleValidationResult::new();
        if size > self.config.max_state_transition_size {
            result.add_error(ConsensusError::StateTransitionMaxSizeExceeded {
                actual_size: size,
                max_size: self.config.max_state_transition_size,
            });
        }
        result
    }

    fn validate_typed(
        &self,
        transition: &StateTransition,
        data_contracts: &[DataContract],
    ) -> SimpleValidationResult {
        match transition {
            StateTransition::DataContractCreate(t) => validate_data_contract_create(t),
            StateTransition::DataContractUpdate(t) => validate_data_contract_update(t),
            StateTransition::DocumentsBatch(t) => validate_documents_batch(t, data_contracts),
            StateTransition::IdentityCreate(t) => self.validate_identity_create(t),
            StateTransition::IdentityTopUp(t) => self.validate_identity_top_up(t),
            StateTransition::IdentityUpdate(t) => validate_identity_update(t),
        }
    }

    /// Per-item checks that must pass before document transitions can be typed
    fn validate_raw_documents_batch(
        &self,
        raw: &Value,
        execution_context: &mut ExecutionContext,
    ) -> Result<StructureValidationResult, Error> {
        let mut result = StructureValidationResult::new();

        let Some(owner_id) = raw.get("ownerId").and_then(Value::as_str).and_then(Identifier::from_hex) else {
            result.add_error(ConsensusError::InvalidIdentifier {
                name: "ownerId".to_string(),
                message: "must be a hex encoded 32-byte identifier".to_string(),
            });
            return Ok(result);
        };
        let items = raw
            .get("transitions")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut groups: Vec<(Identifier, Vec<(usize, &Map<String, Value>)>)> = Vec::new();
        for (position, item) in items.iter().enumerate() {
            let Some(object) = item.as_object() else {
                result.add_error(schema_error(&format!("/transitions/{}", position), "must be an object"));
                continue;
            };

            let Some(contract_value) = object.get(PROPERTY_DATA_CONTRACT_ID) else {
                result.add_error(ConsensusError::MissingDataContractId);
                continue;
            };
            let Some(data_contract_id) = contract_value.as_str().and_then(Identifier::from_hex) else {
                result.add_error(ConsensusError::InvalidIdentifier {
                    name: PROPERTY_DATA_CONTRACT_ID.to_string(),
                    message: "must be a hex encoded 32-byte identifier".to_string(),
                });
                continue;
            };

            if object.get(PROPERTY_TYPE).and_then(Value::as_str).is_none() {
                result.add_error(ConsensusError::MissingDocumentTransitionType);
                continue;
            }

            let Some(action) = object.get(PROPERTY_ACTION).and_then(Value::as_u64) else {
                result.add_error(ConsensusError::MissingDocumentTransitionAction);
                continue;
            };
            if DocumentTransitionAction::try_from(action).is_err() {
                result.add_error(ConsensusError::InvalidDocumentTransitionAction { action });
                continue;
            }

            match groups.iter_mut().find(|(id, _)| *id == data_contract_id) {
                Some((_, group)) => group.push((position, object)),
                None => groups.push((data_contract_id, vec![(position, object)])),
            }
        }

        if !result.is_valid() {
            return Ok(result);
        }

        let mut data_contracts = Vec::with_capacity(groups.len());
        for (data_contract_id, group) in groups {
            let Some(data_contract) = self
                .state_repository
                .fetch_data_contract(&data_contract_id, execution_context)?
            else {
                result.add_error(ConsensusError::DataContractNotPresent { data_contract_id });
                continue;
            };

            for (position, object) in group {
                result.merge(self.validate_raw_document_transition(
                    position,
                    object,
                    &owner_id,
                    &data_contract,
                ));
            }
            data_contracts.push(data_contract);
        }

        result.set_data(data_contracts);
        Ok(result)
    }

    fn validate_raw_document_transition(
        &self,
        position: usize,
        object: &Map<String, Value>,
        owner_id: &Identifier,
        data_contract: &DataContract,
    ) -> SimpleValidationResult {
        let mut result = SimpleValidationResult::new();
        let path = format!("/transitions/{}", position);

        let document_type = object.get(PROPERTY_TYPE).and_then(Value::as_str).unwrap_or_default();
        let Some(data_schema) = data_contract.document_data_schema(document_type) else {
            result.add_error(ConsensusError::InvalidDocumentType {
                document_type: document_type.to_string(),
                data_contract_id: data_contract.id,
            });
            return result;
        };

        let action = object.get(PROPERTY_ACTION).and_then(Value::as_u64).unwrap_or_default();
        let Ok(action) = DocumentTransitionAction::try_from(action) else {
            return result;
        };

        for name in object.keys() {
            let declared = if name.starts_with('$') {
                system_properties(action).contains(&name.as_str())
            } else {
                action != DocumentTransitionAction::Delete
            };
            if !declared {
                result.add_error(schema_error(
                    &format!("{}/{}", path, name),
                    "must NOT have additional properties",
                ));
            }
        }
        if !result.is_valid() {
            return result;
        }

        let Some(id) = object.get(PROPERTY_ID).and_then(Value::as_str).and_then(Identifier::from_hex) else {
            result.add_error(ConsensusError::InvalidIdentifier {
                name: PROPERTY_ID.to_string(),
                message: "must be a hex encoded 32-byte identifier".to_string(),
            });
            return result;
        };

        if action == DocumentTransitionAction::Create {
            let entropy = object
                .get(PROPERTY_ENTROPY)
                .and_then(Value::as_str)
                .and_then(|encoded| hex::decode(encoded).ok())
                .filter(|entropy| entropy.len() == ENTROPY_SIZE);
            match entropy {
                None => result.add_error(schema_error(
                    &format!("{}/{}", path, PROPERTY_ENTROPY),
                    "must be 32 hex encoded bytes",
                )),
                Some(entropy) => {
                    let expected =
                        hasher::derive_document_id(&data_contract.id, owner_id, document_type, &entropy);
                    if expected != id {
                        result.add_error(ConsensusError::InvalidDocumentTransitionId {
                            expected,
                            actual: id,
                        });
                    }
                }
            }
        }

        if action != DocumentTransitionAction::Delete {
            let data: Map<String, Value> = object
                .iter()
                .filter(|(key, _)| !key.starts_with('$'))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            let violations = self.schema_validator.validate(&data_schema, &Value::Object(data));
            result.add_errors(violations.into_iter().map(|violation| {
                into_consensus_error(SchemaViolation {
                    instance_path: format!("{}{}", path, violation.instance_path),
                    message: violation.message,
                })
            }));
        }

        result
    }

    fn validate_identity_create(&self, transition: &IdentityCreateTransition) -> SimpleValidationResult {
        let mut result = validate_public_keys(&transition.public_keys);

        let has_master_key = transition.public_keys.iter().any(|key| {
            key.purpose == Purpose::Authentication
                && key.security_level == SecurityLevel::Master
                && !key.is_disabled()
        });
        if !has_master_key {
            result.add_error(ConsensusError::MissingMasterPublicKey);
        }

        result.merge(self.validate_asset_lock_proof(&transition.asset_lock_proof));

        let expected = transition.asset_lock_proof.create_identifier();
        if expected != transition.identity_id {
            result.add_error(ConsensusError::InvalidIdentifier {
                name: "identityId".to_string(),
                message: format!("expected identity id {} derived from the asset lock", expected),
            });
        }

        result
    }

    fn validate_identity_top_up(&self, transition: &IdentityTopUpTransition) -> SimpleValidationResult {
        self.validate_asset_lock_proof(&transition.asset_lock_proof)
    }

    fn validate_asset_lock_proof(&self, proof: &AssetLockProof) -> SimpleValidationResult {
        let mut result = SimpleValidationResult::new();
        if proof.output.value < self.config.min_asset_lock_value_duffs {
            result.add_error(ConsensusError::InvalidIdentityAssetLockTransactionOutput {
                value: proof.output.value,
                min_value: self.config.min_asset_lock_value_duffs,
            });
        }
        result
    }
}

/// `$`-prefixed members a document transition may carry for its action
fn system_properties(action: DocumentTransitionAction) -> &'static [&'static str] {
    match action {
        DocumentTransitionAction::Create => &[
            PROPERTY_ACTION,
            PROPERTY_ID,
            PROPERTY_TYPE,
            PROPERTY_DATA_CONTRACT_ID,
            PROPERTY_ENTROPY,
            PROPERTY_CREATED_AT,
            PROPERTY_UPDATED_AT,
        ],
        DocumentTransitionAction::Replace => &[
            PROPERTY_ACTION,
            PROPERTY_ID,
            PROPERTY_TYPE,
            PROPERTY_DATA_CONTRACT_ID,
            PROPERTY_REVISION,
            PROPERTY_UPDATED_AT,
        ],
        DocumentTransitionAction::Delete => &[PROPERTY_ACTION, PROPERTY_ID, PROPERTY_TYPE, PROPERTY_DATA_CONTRACT_ID],
    }
}

fn schema_error(instance_path: &str, message: &str) -> ConsensusError {
    ConsensusError::JsonSchema {
        instance_path: instance_path.to_string(),
        message: message.to_string(),
    }
}

fn into_consensus_error(violation: SchemaViolation) -> ConsensusError {
    ConsensusError::JsonSchema {
        instance_path: violation.instance_path,
        message: violation.message,
    }
}

fn validate_data_contract_documents(data_contract: &DataContract) -> SimpleValidationResult {
    let mut result = SimpleValidationResult::new();
    if data_contract.documents.is_empty() {
        result.add_error(schema_error(
            "/dataContract/documents",
            "must define at least one document type",
        ));
    }
    for (document_type, definition) in &data_contract.documents {
        if !definition.is_object() {
            result.add_error(schema_error(
                &format!("/dataContract/documents/{}", document_type),
                "must be an object",
            ));
        }
    }
    result
}

fn validate_data_contract_create(transition: &DataContractCreateTransition) -> SimpleValidationResult {
    let data_contract = &transition.data_contract;
    let mut result = validate_data_contract_documents(data_contract);

    let expected = hasher::derive_data_contract_id(&data_contract.owner_id, transition.entropy.as_slice());
    if expected != data_contract.id {
        result.add_error(ConsensusError::InvalidDataContractId {
            expected,
            actual: data_contract.id,
        });
    }

    if data_contract.version != 1 {
        result.add_error(ConsensusError::InvalidDataContractVersion {
            expected: 1,
            actual: data_contract.version,
        });
    }

    result
}

fn validate_data_contract_update(transition: &DataContractUpdateTransition) -> SimpleValidationResult {
    validate_data_contract_documents(&transition.data_contract)
}

/// Duplicate detection inside one batch
fn validate_documents_batch(
    transition: &DocumentsBatchTransition,
    data_contracts: &[DataContract],
) -> SimpleValidationResult {
    let mut result = SimpleValidationResult::new();

    let mut by_id: BTreeMap<(String, Identifier), usize> = BTreeMap::new();
    for document_transition in &transition.transitions {
        *by_id
            .entry((document_transition.document_type().to_string(), *document_transition.id()))
            .or_default() += 1;
    }
    let duplicates: Vec<(String, Identifier)> = by_id
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(reference, _)| reference)
        .collect();
    if !duplicates.is_empty() {
        result.add_error(ConsensusError::DuplicateDocumentTransitionsWithIds {
            references: duplicates,
        });
    }

    result.merge(validate_batch_unique_indices(transition, data_contracts));
    result
}

/// Two transitions of a batch may not claim the same unique index entry
fn validate_batch_unique_indices(
    batch: &DocumentsBatchTransition,
    data_contracts: &[DataContract],
) -> SimpleValidationResult {
    let mut result = SimpleValidationResult::new();
    let mut seen: BTreeMap<(Identifier, String, String, Vec<String>), Identifier> = BTreeMap::new();
    let mut duplicates: Vec<(String, Identifier)> = Vec::new();

    for transition in &batch.transitions {
        if transition.action() == DocumentTransitionAction::Delete {
            continue;
        }
        let Some(data_contract) = data_contracts
            .iter()
            .find(|data_contract| data_contract.id == *transition.data_contract_id())
        else {
            continue;
        };

        for index in data_contract.unique_indices(transition.document_type()) {
            let Some(values) = uniqueness::index_values(transition, &batch.owner_id, &index) else {
                continue;
            };
            let key = (
                data_contract.id,
                transition.document_type().to_string(),
                index.name.clone(),
                values.iter().map(Value::to_string).collect(),
            );

            match seen.get(&key) {
                Some(id) if id != transition.id() => {
                    let reference = (transition.document_type().to_string(), *transition.id());
                    if !duplicates.contains(&reference) {
                        duplicates.push(reference);
                    }
                }
                Some(_) => {}
                None => {
                    seen.insert(key, *transition.id());
                }
            }
        }
    }

    if !duplicates.is_empty() {
        result.add_error(ConsensusError::DuplicateDocumentTransitionsWithIndices {
            references: duplicates,
        });
    }
    result
}

/// Rules shared by every list of new public keys
fn validate_public_keys(public_keys: &[IdentityPublicKey]) -> SimpleValidationResult {
    let mut result = SimpleValidationResult::new();

    let mut duplicated_ids = Vec::new();
    let mut duplicated_data = Vec::new();
    for (position, key) in public_keys.iter().enumerate() {
        let earlier = &public_keys[..position];
        if earlier.iter().any(|other| other.id == key.id) {
            duplicated_ids.push(key.id);
        }
        if earlier.iter().any(|other| other.data == key.data) {
            duplicated_data.push(key.id);
        }
    }
    if !duplicated_ids.is_empty() {
        result.add_error(ConsensusError::DuplicatedIdentityPublicKeyId { ids: duplicated_ids });
    }
    if !duplicated_data.is_empty() {
        result.add_error(ConsensusError::DuplicatedIdentityPublicKey { ids: duplicated_data });
    }

    for key in public_keys {
        let expected = key.key_type.data_size();
        if key.data.len() != expected {
            result.add_error(ConsensusError::InvalidIdentityPublicKeyData {
                public_key_id: key.id,
                message: format!("expected {} bytes of key data, got {}", expected, key.data.len()),
            });
        }
    }

    result
}

fn validate_identity_update(transition: &IdentityUpdateTransition) -> SimpleValidationResult {
    let mut result = SimpleValidationResult::new();

    if transition.public_keys_to_add.is_empty() && transition.public_key_ids_to_disable.is_empty() {
        result.add_error(ConsensusError::InvalidIdentityUpdateTransitionEmpty);
        return result;
    }

    let disables_keys = !transition.public_key_ids_to_disable.is_empty();
    if disables_keys != transition.public_keys_disabled_at.is_some() {
        result.add_error(ConsensusError::InvalidIdentityUpdateTransitionDisableKeys);
    }

    result.merge(validate_public_keys(&transition.public_keys_to_add));
    result
}
