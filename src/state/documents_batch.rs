use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use crate::config::ValidationConfig;
use crate::consensus::ConsensusError;
use crate::context::ExecutionContext;
use crate::data_contract::DataContract;
use crate::data_trigger::{DataTriggerEngine, DataTriggerExecutionContext};
use crate::document::{Document, DocumentQuery, WhereClause};
use crate::document_transition::{
    DocumentCreateTransition, DocumentTransition, PROPERTY_ID,
};
use crate::error::Error;
use crate::factory::find_data_contract;
use crate::state_transition::DocumentsBatchTransition;
use crate::traits::StateRepository;
use crate::types::{Identifier, TimeWindow, TimestampMillis};
use crate::uniqueness;
use crate::validation::SimpleValidationResult;

pub struct DocumentsBatchStateValidator<SR: StateRepository> {
    state_repository: Arc<SR>,
    data_trigger_engine: DataTriggerEngine,
    config: ValidationConfig,
}

impl<SR: StateRepository> DocumentsBatchStateValidator<SR> {
    pub fn new(
        state_repository: Arc<SR>,
        data_trigger_engine: DataTriggerEngine,
        config: ValidationConfig,
    ) -> Self {
        Self {
            state_repository,
            data_trigger_engine,
            config,
        }
    }

    /// Validate every contract group of the batch and merge the results
    pub fn validate(
        &self,
        batch: &DocumentsBatchTransition,
        data_contracts: &[DataContract],
        execution_context: &mut ExecutionContext,
    ) -> Result<SimpleValidationResult, Error> {
        let mut result = SimpleValidationResult::new();

        for data_contract_id in batch.data_contract_ids() {
            let data_contract = find_data_contract(data_contracts, &data_contract_id)?;
            let group: Vec<&DocumentTransition> = batch
                .transitions
                .iter()
                .filter(|transition| *transition.data_contract_id() == data_contract_id)
                .collect();
            result.merge(self.validate_group(&batch.owner_id, data_contract, &group, execution_context)?);
        }

        Ok(result)
    }

    fn validate_group(
        &self,
        owner_id: &Identifier,
        data_contract: &DataContract,
        transitions: &[&DocumentTransition],
        execution_context: &mut ExecutionContext,
    ) -> Result<SimpleValidationResult, Error> {
        let mut result = SimpleValidationResult::new();

        let fetched_documents = self.fetch_documents(&data_contract.id, transitions, execution_context)?;

        if !execution_context.is_dry_run() {
            let header = self
                .state_repository
                .fetch_latest_platform_block_header(execution_context)?;
            let window = TimeWindow::around(header.time_ms(), self.config.block_time_window_ms);

            for transition in transitions {
                result.merge(validate_transition(transition, owner_id, &fetched_documents, &window));
            }
            if !result.is_valid() {
                return Ok(result);
            }
        }

        result.merge(uniqueness::validate_documents_uniqueness_by_indices(
            &*self.state_repository,
            owner_id,
            transitions,
            data_contract,
            execution_context,
        )?);
        if !result.is_valid() {
            return Ok(result);
        }

        let mut trigger_context = DataTriggerExecutionContext {
            state_repository: &*self.state_repository,
            owner_id: *owner_id,
            data_contract,
            execution_context,
        };
        for trigger_result in self.data_trigger_engine.execute(transitions, &mut trigger_context)? {
            result.add_errors(trigger_result.into_errors());
        }

        Ok(result)
    }

    /// Stored documents matching the transitions, fetched once per document type
    fn fetch_documents(
        &self,
        data_contract_id: &Identifier,
        transitions: &[&DocumentTransition],
        execution_context: &mut ExecutionContext,
    ) -> Result<Vec<Document>, Error> {
        let mut ids_by_type: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
        for transition in transitions {
            ids_by_type
                .entry(transition.document_type())
                .or_default()
                .push(Value::String(transition.id().to_hex()));
        }

        let mut documents = Vec::new();
        for (document_type, ids) in ids_by_type {
            let query = DocumentQuery::new().with_where(WhereClause::one_of(PROPERTY_ID, ids));
            documents.extend(self.state_repository.fetch_documents(
                data_contract_id,
                document_type,
                &query,
                execution_context,
            )?);
        }
        Ok(documents)
    }
}

/// Action-specific rules against the stored document, if any
///
/// Replace and delete share the existence and ownership checks.
fn validate_transition(
    transition: &DocumentTransition,
    owner_id: &Identifier,
    fetched_documents: &[Document],
    window: &TimeWindow,
) -> SimpleValidationResult {
    let mut result = SimpleValidationResult::new();
    let existing = fetched_documents.iter().find(|document| {
        document.id == *transition.id() && document.document_type == transition.document_type()
    });

    match transition {
        DocumentTransition::Create(create) => {
            validate_create_timestamps(create, window, &mut result);
            if existing.is_some() {
                result.add_error(ConsensusError::DocumentAlreadyPresent {
                    document_id: create.base.id,
                });
            }
        }
        DocumentTransition::Replace(replace) => {
            if let Some(updated_at) = replace.updated_at {
                check_window(&replace.base.id, "updatedAt", updated_at, window, &mut result);
            }
            let Some(existing) = existing else {
                result.add_error(ConsensusError::DocumentNotFound {
                    document_id: replace.base.id,
                });
                return result;
            };
            if replace.revision != existing.revision.saturating_add(1) {
                result.add_error(ConsensusError::InvalidDocumentRevision {
                    document_id: replace.base.id,
                    current_revision: existing.revision,
                });
            }
            check_ownership(existing, owner_id, &mut result);
        }
        DocumentTransition::Delete(delete) => {
            let Some(existing) = existing else {
                result.add_error(ConsensusError::DocumentNotFound {
                    document_id: delete.base.id,
                });
                return result;
            };
            check_ownership(existing, owner_id, &mut result);
        }
    }

    result
}

fn validate_create_timestamps(
    create: &DocumentCreateTransition,
    window: &TimeWindow,
    result: &mut SimpleValidationResult,
) {
    if let (Some(created_at), Some(updated_at)) = (create.created_at, create.updated_at) {
        if created_at != updated_at {
            result.add_error(ConsensusError::DocumentTimestampsMismatch {
                document_id: create.base.id,
            });
        }
    }
    if let Some(created_at) = create.created_at {
        check_window(&create.base.id, "createdAt", created_at, window, result);
    }
    if let Some(updated_at) = create.updated_at {
        check_window(&create.base.id, "updatedAt", updated_at, window, result);
    }
}

fn check_window(
    document_id: &Identifier,
    timestamp_name: &str,
    timestamp: TimestampMillis,
    window: &TimeWindow,
    result: &mut SimpleValidationResult,
) {
    if !window.contains(timestamp) {
        result.add_error(ConsensusError::DocumentTimestampWindowViolation {
            timestamp_name: timestamp_name.to_string(),
            document_id: *document_id,
            timestamp,
            time_window_start: window.start,
            time_window_end: window.end,
        });
    }
}

fn check_ownership(existing: &Document, owner_id: &Identifier, result: &mut SimpleValidationResult) {
    if existing.owner_id != *owner_id {
        result.add_error(ConsensusError::DocumentOwnerIdMismatch {
            document_id: existing.id,
            document_owner_id: *owner_id,
            existing_document_owner_id: existing.owner_id,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_transition::{
        DocumentBaseTransition, DocumentDeleteTransition, DocumentReplaceTransition,
    };
    use serde_json::Map;

    const NOW: TimestampMillis = 1_700_000_000_000;

    fn base() -> DocumentBaseTransition {
        DocumentBaseTransition {
            id: Identifier([1; 32]),
            document_type: "note".to_string(),
            data_contract_id: Identifier([2; 32]),
        }
    }

    fn stored(owner: u8, revision: u64) -> Document {
        Document {
            id: Identifier([1; 32]),
            document_type: "note".to_string(),
            data_contract_id: Identifier([2; 32]),
            owner_id: Identifier([owner; 32]),
            revision,
            created_at: Some(NOW),
            updated_at: Some(NOW),
            data: Map::new(),
        }
    }

    fn replace(revision: u64) -> DocumentTransition {
        DocumentTransition::Replace(DocumentReplaceTransition {
            base: base(),
            revision,
            updated_at: Some(NOW),
            data: Map::new(),
        })
    }

    fn window() -> TimeWindow {
        TimeWindow::around(NOW, 300_000)
    }

    #[test]
    fn test_replace_reports_revision_and_ownership_together() {
        let owner = Identifier([3; 32]);
        let result = validate_transition(&replace(3), &owner, &[stored(4, 1)], &window());
        assert_eq!(result.error_codes(), vec![4010, 4006]);
    }

    #[test]
    fn test_replace_of_missing_document_stops_at_existence() {
        let owner = Identifier([3; 32]);
        let result = validate_transition(&replace(2), &owner, &[], &window());
        assert_eq!(result.error_codes(), vec![4005]);
    }

    #[test]
    fn test_delete_shares_ownership_check() {
        let owner = Identifier([3; 32]);
        let delete = DocumentTransition::Delete(DocumentDeleteTransition { base: base() });

        let result = validate_transition(&delete, &owner, &[stored(4, 1)], &window());
        assert_eq!(result.error_codes(), vec![4006]);

        let result = validate_transition(&delete, &owner, &[stored(3, 1)], &window());
        assert!(result.is_valid());
    }
}
