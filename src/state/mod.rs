//! State validation
//!
//! Checks a structurally valid, correctly signed transition against the
//! current ledger state. One validator per transition family.

mod data_contract;
mod documents_batch;
mod identity;

pub use data_contract::DataContractStateValidator;
pub use documents_batch::DocumentsBatchStateValidator;
pub use identity::IdentityStateValidator;

use std::sync::Arc;
use crate::config::ValidationConfig;
use crate::context::ExecutionContext;
use crate::data_contract::DataContract;
use crate::data_trigger::DataTriggerEngine;
use crate::error::Error;
use crate::state_transition::StateTransition;
use crate::traits::StateRepository;
use crate::validation::SimpleValidationResult;

pub struct StateValidator<SR: StateRepository> {
    data_contract: DataContractStateValidator<SR>,
    documents_batch: DocumentsBatchStateValidator<SR>,
    identity: IdentityStateValidator<SR>,
}

impl<SR: StateRepository> StateValidator<SR> {
    pub fn new(
        state_repository: Arc<SR>,
        data_trigger_engine: DataTriggerEngine,
        config: ValidationConfig,
    ) -> Self {
        Self {
            data_contract: DataContractStateValidator::new(state_repository.clone()),
            documents_batch: DocumentsBatchStateValidator::new(
                state_repository.clone(),
                data_trigger_engine,
                config.clone(),
            ),
            identity: IdentityStateValidator::new(state_repository, config),
        }
    }

    /// `data_contracts` must hold every contract a documents batch references
    pub fn validate(
        &self,
        transition: &StateTransition,
        data_contracts: &[DataContract],
        execution_context: &mut ExecutionContext,
    ) -> Result<SimpleValidationResult, Error> {
        match transition {
            StateTransition::DataContractCreate(t) => self.data_contract.validate_create(t, execution_context),
            StateTransition::DataContractUpdate(t) => self.data_contract.validate_update(t, execution_context),
            StateTransition::DocumentsBatch(t) => self.documents_batch.validate(t, data_contracts, execution_context),
            StateTransition::IdentityCreate(t) => self.identity.validate_create(t, execution_context),
            StateTransition::IdentityTopUp(t) => self.identity.validate_top_up(t, execution_context),
            StateTransition::IdentityUpdate(t) => self.identity.validate_update(t, execution_context),
        }
    }
}
