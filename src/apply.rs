//! Apply validated transitions to ledger state
//!
//! Appliers assume every validation stage has passed and never re-validate.
//! Repository failures propagate; partial writes are left to the storage layer.

use std::sync::Arc;
use crate::config::ValidationConfig;
use crate::context::ExecutionContext;
use crate::document::{Document, DocumentQuery, WhereClause};
use crate::document_transition::{
    DocumentCreateTransition, DocumentReplaceTransition, DocumentTransition, INITIAL_REVISION,
    PROPERTY_ID,
};
use crate::error::Error;
use crate::identity::{Identity, IdentityPublicKey};
use crate::state_transition::{
    DocumentsBatchTransition, IdentityCreateTransition, IdentityTopUpTransition,
    IdentityUpdateTransition, StateTransition,
};
use crate::traits::StateRepository;
use crate::types::{Credits, Identifier, PROTOCOL_VERSION};

pub struct StateTransitionApplier<SR: StateRepository> {
    state_repository: Arc<SR>,
    config: ValidationConfig,
}

impl<SR: StateRepository> StateTransitionApplier<SR> {
    pub fn new(state_repository: Arc<SR>, config: ValidationConfig) -> Self {
        Self {
            state_repository,
            config,
        }
    }

    pub fn apply(
        &self,
        transition: &StateTransition,
        execution_context: &mut ExecutionContext,
    ) -> Result<(), Error> {
        tracing::debug!(transition_type = %transition.transition_type(), "applying state transition");

        match transition {
            StateTransition::DataContractCreate(t) => Ok(self
                .state_repository
                .store_data_contract(&t.data_contract, execution_context)?),
            StateTransition::DataContractUpdate(t) => Ok(self
                .state_repository
                .store_data_contract(&t.data_contract, execution_context)?),
            StateTransition::DocumentsBatch(t) => self.apply_documents_batch(t, execution_context),
            StateTransition::IdentityCreate(t) => self.apply_identity_create(t, execution_context),
            StateTransition::IdentityTopUp(t) => self.apply_identity_top_up(t, execution_context),
            StateTransition::IdentityUpdate(t) => self.apply_identity_update(t, execution_context),
        }
    }

    fn asset_lock_credits(&self, duffs: u64) -> Result<Credits, Error> {
        self.config
            .duffs_to_credits(duffs)
            .ok_or(Error::Overflow("asset lock value"))
    }

    fn apply_identity_create(
        &self,
        transition: &IdentityCreateTransition,
        execution_context: &mut ExecutionContext,
    ) -> Result<(), Error> {
        let credits = self.asset_lock_credits(transition.asset_lock_proof.output.value)?;

        let identity = Identity {
            protocol_version: PROTOCOL_VERSION,
            id: transition.identity_id,
            public_keys: transition.public_keys.clone(),
            balance: credits,
            revision: 0,
        };
        self.state_repository.store_identity(&identity, execution_context)?;

        let hashes: Vec<[u8; 20]> = identity.public_keys.iter().map(IdentityPublicKey::hash).collect();
        self.state_repository
            .store_identity_public_key_hashes(&identity.id, &hashes, execution_context)?;

        self.state_repository.mark_asset_lock_transaction_out_point_as_used(
            &transition.asset_lock_proof.out_point,
            execution_context,
        )?;
        self.state_repository.add_to_system_credits(credits, execution_context)?;
        Ok(())
    }

    fn apply_identity_top_up(
        &self,
        transition: &IdentityTopUpTransition,
        execution_context: &mut ExecutionContext,
    ) -> Result<(), Error> {
        let credits = self.asset_lock_credits(transition.asset_lock_proof.output.value)?;

        self.state_repository
            .add_to_identity_balance(&transition.identity_id, credits, execution_context)?;
        self.state_repository.add_to_system_credits(credits, execution_context)?;
        self.state_repository.mark_asset_lock_transaction_out_point_as_used(
            &transition.asset_lock_proof.out_point,
            execution_context,
        )?;
        Ok(())
    }

    fn apply_identity_update(
        &self,
        transition: &IdentityUpdateTransition,
        execution_context: &mut ExecutionContext,
    ) -> Result<(), Error> {
        let Some(mut identity) = self
            .state_repository
            .fetch_identity(&transition.identity_id, execution_context)?
        else {
            if execution_context.is_dry_run() {
                return Ok(());
            }
            return Err(Error::IdentityNotPresent {
                identity_id: transition.identity_id,
            });
        };

        identity.revision = transition.revision;

        if !transition.public_key_ids_to_disable.is_empty() {
            let disabled_at = match transition.public_keys_disabled_at {
                Some(disabled_at) => disabled_at,
                None => self
                    .state_repository
                    .fetch_latest_platform_block_header(execution_context)?
                    .time_ms(),
            };
            for key_id in &transition.public_key_ids_to_disable {
                if let Some(key) = identity.get_public_key_by_id_mut(*key_id) {
                    key.disabled_at = Some(disabled_at);
                }
            }
        }

        identity.public_keys.extend(transition.public_keys_to_add.iter().cloned());
        self.state_repository.store_identity(&identity, execution_context)?;

        if !transition.public_keys_to_add.is_empty() {
            let hashes: Vec<[u8; 20]> = transition
                .public_keys_to_add
                .iter()
                .map(IdentityPublicKey::hash)
                .collect();
            self.state_repository
                .store_identity_public_key_hashes(&identity.id, &hashes, execution_context)?;
        }
        Ok(())
    }

    fn apply_documents_batch(
        &self,
        batch: &DocumentsBatchTransition,
        execution_context: &mut ExecutionContext,
    ) -> Result<(), Error> {
        for transition in &batch.transitions {
            match transition {
                DocumentTransition::Create(create) => {
                    let document = document_from_create(create, &batch.owner_id);
                    self.state_repository.store_document(&document, execution_context)?;
                }
                DocumentTransition::Replace(replace) => {
                    let document = self.document_from_replace(replace, &batch.owner_id, execution_context)?;
                    self.state_repository.update_document(&document, execution_context)?;
                }
                DocumentTransition::Delete(delete) => {
                    self.state_repository.remove_document(
                        &delete.base.data_contract_id,
                        &delete.base.document_type,
                        &delete.base.id,
                        execution_context,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Replacement keeps identity, ownership and creation time of the stored document
    fn document_from_replace(
        &self,
        replace: &DocumentReplaceTransition,
        owner_id: &Identifier,
        execution_context: &mut ExecutionContext,
    ) -> Result<Document, Error> {
        let query = DocumentQuery::new()
            .with_where(WhereClause::equal(
                PROPERTY_ID,
                serde_json::Value::String(replace.base.id.to_hex()),
            ))
            .with_limit(1);
        let existing = self
            .state_repository
            .fetch_documents(
                &replace.base.data_contract_id,
                &replace.base.document_type,
                &query,
                execution_context,
            )?
            .into_iter()
            .next();

        let (owner_id, created_at) = match existing {
            Some(existing) => (existing.owner_id, existing.created_at),
            None if execution_context.is_dry_run() => (*owner_id, None),
            None => {
                return Err(Error::DocumentNotPresent {
                    document_id: replace.base.id,
                })
            }
        };

        Ok(Document {
            id: replace.base.id,
            document_type: replace.base.document_type.clone(),
            data_contract_id: replace.base.data_contract_id,
            owner_id,
            revision: replace.revision,
            created_at,
            updated_at: replace.updated_at,
            data: replace.data.clone(),
        })
    }
}

fn document_from_create(create: &DocumentCreateTransition, owner_id: &Identifier) -> Document {
    Document {
        id: create.base.id,
        document_type: create.base.document_type.clone(),
        data_contract_id: create.base.data_contract_id,
        owner_id: *owner_id,
        revision: INITIAL_REVISION,
        created_at: create.created_at,
        updated_at: create.updated_at,
        data: create.data.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_transition::DocumentBaseTransition;
    use crate::types::BinaryData;
    use serde_json::{json, Map};

    #[test]
    fn test_created_document_starts_at_initial_revision() {
        let mut data = Map::new();
        data.insert("message".to_string(), json!("hello"));
        let create = DocumentCreateTransition {
            base: DocumentBaseTransition {
                id: Identifier([1; 32]),
                document_type: "note".to_string(),
                data_contract_id: Identifier([2; 32]),
            },
            entropy: BinaryData::new(vec![0; 32]),
            created_at: Some(10),
            updated_at: Some(10),
            data,
        };

        let document = document_from_create(&create, &Identifier([3; 32]));
        assert_eq!(document.revision, 1);
        assert_eq!(document.owner_id, Identifier([3; 32]));
        assert_eq!(document.get("message"), Some(json!("hello")));
    }
}
