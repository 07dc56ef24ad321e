//! State transition factory
//!
//! Decodes wire bytes or raw objects into typed transitions. Structural
//! validation runs first unless the caller opts out; an invalid transition is
//! returned as [`Error::InvalidStateTransition`] with its consensus errors.

use serde_json::Value;
use std::convert::TryFrom;
use std::sync::Arc;
use crate::context::ExecutionContext;
use crate::data_contract::DataContract;
use crate::error::Error;
use crate::serialization;
use crate::state_transition::{
    DocumentsBatchTransition, StateTransition, StateTransitionType, PROPERTY_TYPE,
};
use crate::structure::StructureValidator;
use crate::traits::StateRepository;
use crate::types::Identifier;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateOptions {
    /// Trust the raw object and skip structural validation
    pub skip_validation: bool,
}

impl CreateOptions {
    pub fn skip_validation() -> Self {
        Self {
            skip_validation: true,
        }
    }
}

/// A decoded transition with the data contracts its documents reference
///
/// Later stages read contracts from here instead of fetching them again.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStateTransition {
    pub transition: StateTransition,
    pub data_contracts: Vec<DataContract>,
}

pub struct StateTransitionFactory<SR: StateRepository> {
    state_repository: Arc<SR>,
    structure_validator: StructureValidator<SR>,
}

impl<SR: StateRepository> StateTransitionFactory<SR> {
    pub fn new(state_repository: Arc<SR>, structure_validator: StructureValidator<SR>) -> Self {
        Self {
            state_repository,
            structure_validator,
        }
    }

    pub fn structure_validator(&self) -> &StructureValidator<SR> {
        &self.structure_validator
    }

    pub fn create_from_bytes(
        &self,
        bytes: &[u8],
        options: CreateOptions,
        execution_context: &mut ExecutionContext,
    ) -> Result<StateTransition, Error> {
        self.resolve_from_bytes(bytes, options, execution_context)
            .map(|resolved| resolved.transition)
    }

    pub fn create_from_object(
        &self,
        raw: Value,
        options: CreateOptions,
        execution_context: &mut ExecutionContext,
    ) -> Result<StateTransition, Error> {
        self.resolve_from_object(raw, options, execution_context)
            .map(|resolved| resolved.transition)
    }

    /// Decode wire bytes, keeping the contracts structural validation resolved
    ///
    /// The size bound applies to the bytes as received, before anything is
    /// decoded or dropped.
    pub fn resolve_from_bytes(
        &self,
        bytes: &[u8],
        options: CreateOptions,
        execution_context: &mut ExecutionContext,
    ) -> Result<ResolvedStateTransition, Error> {
        if !options.skip_validation {
            let result = self.structure_validator.validate_size(bytes.len());
            if !result.is_valid() {
                tracing::debug!(size = bytes.len(), "state transition bytes rejected");
                return Err(Error::InvalidStateTransition {
                    errors: result.into_errors(),
                });
            }
        }

        let raw = serialization::decode_object(bytes).map_err(|e| Error::Decode {
            reason: e.to_string(),
        })?;
        self.resolve_from_object(raw, options, execution_context)
    }

    pub fn resolve_from_object(
        &self,
        raw: Value,
        options: CreateOptions,
        execution_context: &mut ExecutionContext,
    ) -> Result<ResolvedStateTransition, Error> {
        let mut data_contracts = Vec::new();
        if !options.skip_validation {
            let result = self.structure_validator.validate(&raw, execution_context)?;
            if !result.is_valid() {
                tracing::debug!(errors = ?result.error_codes(), "raw state transition rejected");
                return Err(Error::InvalidStateTransition {
                    errors: result.into_errors(),
                });
            }
            data_contracts = result.into_data().unwrap_or_default();
        }

        self.create_unchecked(raw, &data_contracts, execution_context)
    }

    /// Construct without structural validation, reusing contracts already resolved
    pub fn create_unchecked(
        &self,
        raw: Value,
        known: &[DataContract],
        execution_context: &mut ExecutionContext,
    ) -> Result<ResolvedStateTransition, Error> {
        let transition_type = transition_type_of(&raw)?;
        let transition = StateTransition::from_object_of_type(transition_type, raw)?;
        let data_contracts = self.resolve_data_contracts(&transition, known, execution_context)?;
        Ok(ResolvedStateTransition {
            transition,
            data_contracts,
        })
    }

    /// Contracts referenced by a documents batch, in order of first appearance
    ///
    /// Contracts in `known` are reused; only the rest are fetched. Every
    /// contract must exist and define the document types used with it. Other
    /// transition types reference no contract.
    pub fn resolve_data_contracts(
        &self,
        transition: &StateTransition,
        known: &[DataContract],
        execution_context: &mut ExecutionContext,
    ) -> Result<Vec<DataContract>, Error> {
        let StateTransition::DocumentsBatch(batch) = transition else {
            return Ok(Vec::new());
        };

        let mut resolved: Vec<DataContract> = Vec::new();
        for data_contract_id in batch.data_contract_ids() {
            let data_contract = match known.iter().find(|contract| contract.id == data_contract_id) {
                Some(data_contract) => data_contract.clone(),
                None => self
                    .state_repository
                    .fetch_data_contract(&data_contract_id, execution_context)?
                    .ok_or(Error::DataContractNotPresent { data_contract_id })?,
            };
            resolved.push(data_contract);
        }

        validate_document_types(batch, &resolved)?;
        Ok(resolved)
    }
}

fn validate_document_types(batch: &DocumentsBatchTransition, data_contracts: &[DataContract]) -> Result<(), Error> {
    for document_transition in &batch.transitions {
        let data_contract = find_data_contract(data_contracts, document_transition.data_contract_id())?;
        if !data_contract.has_document_type(document_transition.document_type()) {
            return Err(Error::InvalidDocumentType {
                document_type: document_transition.document_type().to_string(),
                data_contract_id: data_contract.id,
            });
        }
    }
    Ok(())
}

/// Look up a resolved contract; a miss means resolution was skipped
pub fn find_data_contract<'a>(
    data_contracts: &'a [DataContract],
    data_contract_id: &Identifier,
) -> Result<&'a DataContract, Error> {
    data_contracts
        .iter()
        .find(|data_contract| data_contract.id == *data_contract_id)
        .ok_or(Error::DataContractNotPresent {
            data_contract_id: *data_contract_id,
        })
}

fn transition_type_of(raw: &Value) -> Result<StateTransitionType, Error> {
    let code = raw
        .get(PROPERTY_TYPE)
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::Decode {
            reason: "type must be a non-negative integer".to_string(),
        })?;
    StateTransitionType::try_from(code)
}
