use std::sync::Arc;
use crate::config::ValidationConfig;
use crate::consensus::ConsensusError;
use crate::context::ExecutionContext;
use crate::error::Error;
use crate::identity::OutPoint;
use crate::state_transition::{
    IdentityCreateTransition, IdentityTopUpTransition, IdentityUpdateTransition,
};
use crate::traits::StateRepository;
use crate::types::TimeWindow;
use crate::validation::SimpleValidationResult;

pub struct IdentityStateValidator<SR: StateRepository> {
    state_repository: Arc<SR>,
    config: ValidationConfig,
}

impl<SR: StateRepository> IdentityStateValidator<SR> {
    pub fn new(state_repository: Arc<SR>, config: ValidationConfig) -> Self {
        Self {
            state_repository,
            config,
        }
    }

    pub fn validate_create(
        &self,
        transition: &IdentityCreateTransition,
        execution_context: &mut ExecutionContext,
    ) -> Result<SimpleValidationResult, Error> {
        let mut result = SimpleValidationResult::new();

        if self
            .state_repository
            .fetch_identity(&transition.identity_id, execution_context)?
            .is_some()
        {
            result.add_error(ConsensusError::IdentityAlreadyExists {
                identity_id: transition.identity_id,
            });
        }

        result.merge(self.validate_out_point(&transition.asset_lock_proof.out_point, execution_context)?);
        Ok(result)
    }

    pub fn validate_top_up(
        &self,
        transition: &IdentityTopUpTransition,
        execution_context: &mut ExecutionContext,
    ) -> Result<SimpleValidationResult, Error> {
        let mut result = SimpleValidationResult::new();

        if self
            .state_repository
            .fetch_identity(&transition.identity_id, execution_context)?
            .is_none()
        {
            result.add_error(ConsensusError::IdentityNotFound {
                identity_id: transition.identity_id,
            });
            return Ok(result);
        }

        result.merge(self.validate_out_point(&transition.asset_lock_proof.out_point, execution_context)?);
        Ok(result)
    }

    fn validate_out_point(
        &self,
        out_point: &OutPoint,
        execution_context: &mut ExecutionContext,
    ) -> Result<SimpleValidationResult, Error> {
        let mut result = SimpleValidationResult::new();
        if self
            .state_repository
            .is_asset_lock_transaction_out_point_already_used(out_point, execution_context)?
        {
            result.add_error(ConsensusError::IdentityAssetLockTransactionOutPointAlreadyExists {
                out_point: *out_point,
            });
        }
        Ok(result)
    }

    pub fn validate_update(
        &self,
        transition: &IdentityUpdateTransition,
        execution_context: &mut ExecutionContext,
    ) -> Result<SimpleValidationResult, Error> {
        let mut result = SimpleValidationResult::new();

        let Some(identity) = self
            .state_repository
            .fetch_identity(&transition.identity_id, execution_context)?
        else {
            result.add_error(ConsensusError::IdentityNotFound {
                identity_id: transition.identity_id,
            });
            return Ok(result);
        };

        if transition.revision != identity.revision.saturating_add(1) {
            result.add_error(ConsensusError::InvalidIdentityRevision {
                identity_id: identity.id,
                current_revision: identity.revision,
            });
            return Ok(result);
        }

        for key_id in &transition.public_key_ids_to_disable {
            match identity.get_public_key_by_id(*key_id) {
                None => result.add_error(ConsensusError::InvalidIdentityPublicKeyId { id: *key_id }),
                Some(key) if key.read_only => {
                    result.add_error(ConsensusError::IdentityPublicKeyIsReadOnly {
                        public_key_index: *key_id,
                    })
                }
                Some(key) if key.is_disabled() => {
                    result.add_error(ConsensusError::IdentityPublicKeyIsDisabled {
                        public_key_index: *key_id,
                    })
                }
                Some(_) => {}
            }
        }
        if !result.is_valid() {
            return Ok(result);
        }

        if let Some(disabled_at) = transition.public_keys_disabled_at {
            if !execution_context.is_dry_run() {
                let header = self
                    .state_repository
                    .fetch_latest_platform_block_header(execution_context)?;
                let window = TimeWindow::around(header.time_ms(), self.config.block_time_window_ms);
                if !window.contains(disabled_at) {
                    result.add_error(ConsensusError::IdentityPublicKeyDisabledAtWindowViolation {
                        disabled_at,
                        time_window_start: window.start,
                        time_window_end: window.end,
                    });
                    return Ok(result);
                }
            }
        }

        let duplicated_ids: Vec<_> = transition
            .public_keys_to_add
            .iter()
            .filter(|key| identity.get_public_key_by_id(key.id).is_some())
            .map(|key| key.id)
            .collect();
        if !duplicated_ids.is_empty() {
            result.add_error(ConsensusError::DuplicatedIdentityPublicKeyIdState { ids: duplicated_ids });
            return Ok(result);
        }

        let enabled_after = identity
            .enabled_key_count()
            .saturating_sub(transition.public_key_ids_to_disable.len())
            .saturating_add(transition.public_keys_to_add.len());
        if enabled_after > self.config.max_identity_public_keys {
            result.add_error(ConsensusError::MaxIdentityPublicKeyLimitReached {
                max_items: self.config.max_identity_public_keys,
            });
        }

        Ok(result)
    }
}
