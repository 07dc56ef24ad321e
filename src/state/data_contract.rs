use std::sync::Arc;
use crate::consensus::ConsensusError;
use crate::context::ExecutionContext;
use crate::error::Error;
use crate::state_transition::{DataContractCreateTransition, DataContractUpdateTransition};
use crate::traits::StateRepository;
use crate::validation::SimpleValidationResult;

pub struct DataContractStateValidator<SR: StateRepository> {
    state_repository: Arc<SR>,
}

impl<SR: StateRepository> DataContractStateValidator<SR> {
    pub fn new(state_repository: Arc<SR>) -> Self {
        Self { state_repository }
    }

    /// The contract id must be free
    pub fn validate_create(
        &self,
        transition: &DataContractCreateTransition,
        execution_context: &mut ExecutionContext,
    ) -> Result<SimpleValidationResult, Error> {
        let mut result = SimpleValidationResult::new();
        let data_contract_id = transition.data_contract.id;

        if self
            .state_repository
            .fetch_data_contract(&data_contract_id, execution_context)?
            .is_some()
        {
            result.add_error(ConsensusError::DataContractAlreadyPresent { data_contract_id });
        }

        Ok(result)
    }

    /// The contract must exist and the version must advance by exactly one
    pub fn validate_update(
        &self,
        transition: &DataContractUpdateTransition,
        execution_context: &mut ExecutionContext,
    ) -> Result<SimpleValidationResult, Error> {
        let mut result = SimpleValidationResult::new();
        let data_contract_id = transition.data_contract.id;

        let Some(existing) = self
            .state_repository
            .fetch_data_contract(&data_contract_id, execution_context)?
        else {
            result.add_error(ConsensusError::DataContractNotPresent { data_contract_id });
            return Ok(result);
        };

        let expected = existing.version.saturating_add(1);
        if transition.data_contract.version != expected {
            result.add_error(ConsensusError::InvalidDataContractVersion {
                expected,
                actual: transition.data_contract.version,
            });
        }

        Ok(result)
    }
}
