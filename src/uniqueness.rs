//! Unique index checks for document transitions

use serde_json::Value;
use crate::consensus::ConsensusError;
use crate::context::ExecutionContext;
use crate::data_contract::{DataContract, Index};
use crate::document::{DocumentQuery, WhereClause};
use crate::document_transition::{DocumentTransition, DocumentTransitionAction};
use crate::error::Error;
use crate::traits::StateRepository;
use crate::types::Identifier;
use crate::validation::SimpleValidationResult;

const PROPERTY_OWNER_ID: &str = "$ownerId";

/// Value a transition contributes to an index property
///
/// The owner isn't part of the transition itself, so `$ownerId` resolves to
/// the batch owner.
pub fn index_property_value(
    transition: &DocumentTransition,
    owner_id: &Identifier,
    property: &str,
) -> Option<Value> {
    if property == PROPERTY_OWNER_ID {
        Some(Value::String(owner_id.to_hex()))
    } else {
        transition.get(property)
    }
}

/// Values of every property of `index`, or `None` if any is missing
///
/// Sparse entries aren't indexed and can't collide.
pub fn index_values(
    transition: &DocumentTransition,
    owner_id: &Identifier,
    index: &Index,
) -> Option<Vec<Value>> {
    index
        .properties
        .iter()
        .map(|property| index_property_value(transition, owner_id, &property.name))
        .collect()
}

/// Check non-delete transitions against stored documents sharing a unique index
pub fn validate_documents_uniqueness_by_indices(
    state_repository: &dyn StateRepository,
    owner_id: &Identifier,
    transitions: &[&DocumentTransition],
    data_contract: &DataContract,
    execution_context: &mut ExecutionContext,
) -> Result<SimpleValidationResult, Error> {
    let mut result = SimpleValidationResult::new();

    for transition in transitions {
        if transition.action() == DocumentTransitionAction::Delete {
            continue;
        }

        for index in data_contract.unique_indices(transition.document_type()) {
            let Some(values) = index_values(transition, owner_id, &index) else {
                continue;
            };

            let query = index
                .properties
                .iter()
                .zip(values)
                .fold(DocumentQuery::new(), |query, (property, value)| {
                    query.with_where(WhereClause::equal(property.name.clone(), value))
                });

            let documents = state_repository.fetch_documents(
                &data_contract.id,
                transition.document_type(),
                &query,
                execution_context,
            )?;

            if documents.iter().any(|document| document.id != *transition.id()) {
                result.add_error(ConsensusError::DuplicateUniqueIndex {
                    document_id: *transition.id(),
                    duplicating_properties: index
                        .properties
                        .iter()
                        .map(|property| property.name.clone())
                        .collect(),
                });
            }
        }
    }

    Ok(result)
}
