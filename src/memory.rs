//! In-memory state repository
//!
//! Reference implementation of [`StateRepository`] backed by ordered maps. Every
//! call records the fee operation it represents, and writes are dropped while
//! the execution context is in dry run. Checkpoints let a host roll back a
//! block's worth of applied transitions.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use crate::context::{ExecutionContext, Operation};
use crate::data_contract::DataContract;
use crate::document::{Document, DocumentQuery};
use crate::error::RepositoryError;
use crate::identity::{Identity, OutPoint};
use crate::traits::StateRepository;
use crate::types::{BlockHeader, Credits, Identifier, SignedCredits};

const ID_KEY_SIZE: usize = 32;
const OUT_POINT_KEY_SIZE: usize = 36;
const PUBLIC_KEY_HASH_SIZE: usize = 20;
const CREDITS_VALUE_SIZE: usize = 8;

type DocumentKey = (Identifier, String, Identifier);

#[derive(Debug, Clone, Default)]
struct Inner {
    identities: BTreeMap<Identifier, Identity>,
    debts: BTreeMap<Identifier, Credits>,
    data_contracts: BTreeMap<Identifier, DataContract>,
    documents: BTreeMap<DocumentKey, Document>,
    used_out_points: BTreeSet<OutPoint>,
    public_key_hashes: BTreeMap<[u8; 20], Identifier>,
    system_credits: Credits,
    block_header: BlockHeader,
}

/// Saved repository contents
#[derive(Debug, Clone)]
pub struct Checkpoint {
    inner: Inner,
}

#[derive(Debug, Default)]
pub struct InMemoryStateRepository {
    inner: RwLock<Inner>,
}

fn value_size<T: Serialize>(value: &T) -> Result<usize, RepositoryError> {
    serde_json::to_vec(value)
        .map(|bytes| bytes.len())
        .map_err(|e| RepositoryError::Storage {
            reason: format!("Failed to measure stored value: {}", e),
        })
}

fn document_key_size(document_type: &str) -> usize {
    ID_KEY_SIZE * 2 + document_type.len()
}

impl InMemoryStateRepository {
    pub fn new(block_header: BlockHeader) -> Self {
        Self {
            inner: RwLock::new(Inner {
                block_header,
                ..Inner::default()
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, RepositoryError> {
        self.inner.read().map_err(|_| RepositoryError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, RepositoryError> {
        self.inner.write().map_err(|_| RepositoryError::Poisoned)
    }

    pub fn insert_identity(&self, identity: Identity) -> Result<(), RepositoryError> {
        let mut inner = self.write()?;
        for key in &identity.public_keys {
            inner.public_key_hashes.insert(key.hash(), identity.id);
        }
        inner.identities.insert(identity.id, identity);
        Ok(())
    }

    pub fn insert_data_contract(&self, data_contract: DataContract) -> Result<(), RepositoryError> {
        self.write()?.data_contracts.insert(data_contract.id, data_contract);
        Ok(())
    }

    pub fn insert_document(&self, document: Document) -> Result<(), RepositoryError> {
        let key = (document.data_contract_id, document.document_type.clone(), document.id);
        self.write()?.documents.insert(key, document);
        Ok(())
    }

    /// Outstanding debt subtracted from the identity's spendable balance
    pub fn set_identity_debt(&self, identity_id: Identifier, debt: Credits) -> Result<(), RepositoryError> {
        self.write()?.debts.insert(identity_id, debt);
        Ok(())
    }

    pub fn set_block_header(&self, block_header: BlockHeader) -> Result<(), RepositoryError> {
        self.write()?.block_header = block_header;
        Ok(())
    }

    pub fn identity(&self, id: &Identifier) -> Result<Option<Identity>, RepositoryError> {
        Ok(self.read()?.identities.get(id).cloned())
    }

    pub fn data_contract(&self, id: &Identifier) -> Result<Option<DataContract>, RepositoryError> {
        Ok(self.read()?.data_contracts.get(id).cloned())
    }

    pub fn document(
        &self,
        data_contract_id: &Identifier,
        document_type: &str,
        id: &Identifier,
    ) -> Result<Option<Document>, RepositoryError> {
        let key = (*data_contract_id, document_type.to_string(), *id);
        Ok(self.read()?.documents.get(&key).cloned())
    }

    pub fn document_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.read()?.documents.len())
    }

    pub fn system_credits(&self) -> Result<Credits, RepositoryError> {
        Ok(self.read()?.system_credits)
    }

    pub fn is_out_point_used(&self, out_point: &OutPoint) -> Result<bool, RepositoryError> {
        Ok(self.read()?.used_out_points.contains(out_point))
    }

    /// Reverse lookup of an identity by one of its key hashes
    pub fn identity_by_public_key_hash(&self, hash: &[u8; 20]) -> Result<Option<Identifier>, RepositoryError> {
        Ok(self.read()?.public_key_hashes.get(hash).copied())
    }

    pub fn create_checkpoint(&self) -> Result<Checkpoint, RepositoryError> {
        Ok(Checkpoint {
            inner: self.read()?.clone(),
        })
    }

    pub fn restore_checkpoint(&self, checkpoint: Checkpoint) -> Result<(), RepositoryError> {
        *self.write()? = checkpoint.inner;
        Ok(())
    }
}

impl StateRepository for InMemoryStateRepository {
    fn fetch_identity(
        &self,
        id: &Identifier,
        context: &mut ExecutionContext,
    ) -> Result<Option<Identity>, RepositoryError> {
        let identity = self.read()?.identities.get(id).cloned();
        let size = match &identity {
            Some(identity) => value_size(identity)?,
            None => 0,
        };
        context.add_operation(Operation::Read {
            key_size: ID_KEY_SIZE,
            value_size: size,
        });
        Ok(identity)
    }

    fn fetch_identity_balance(
        &self,
        id: &Identifier,
        context: &mut ExecutionContext,
    ) -> Result<Option<Credits>, RepositoryError> {
        let balance = self.read()?.identities.get(id).map(|identity| identity.balance);
        context.add_operation(Operation::Read {
            key_size: ID_KEY_SIZE,
            value_size: CREDITS_VALUE_SIZE,
        });
        Ok(balance)
    }

    fn fetch_identity_balance_with_debt(
        &self,
        id: &Identifier,
        context: &mut ExecutionContext,
    ) -> Result<Option<SignedCredits>, RepositoryError> {
        let inner = self.read()?;
        let balance = match inner.identities.get(id) {
            Some(identity) => {
                let debt = inner.debts.get(id).copied().unwrap_or_default();
                let signed = i128::from(identity.balance) - i128::from(debt);
                Some(SignedCredits::try_from(signed).map_err(|_| RepositoryError::Corrupted {
                    key: id.to_hex(),
                })?)
            }
            None => None,
        };
        context.add_operation(Operation::Read {
            key_size: ID_KEY_SIZE,
            value_size: CREDITS_VALUE_SIZE * 2,
        });
        Ok(balance)
    }

    fn fetch_data_contract(
        &self,
        id: &Identifier,
        context: &mut ExecutionContext,
    ) -> Result<Option<DataContract>, RepositoryError> {
        let data_contract = self.read()?.data_contracts.get(id).cloned();
        let size = match &data_contract {
            Some(data_contract) => value_size(data_contract)?,
            None => 0,
        };
        context.add_operation(Operation::Read {
            key_size: ID_KEY_SIZE,
            value_size: size,
        });
        Ok(data_contract)
    }

    fn fetch_documents(
        &self,
        data_contract_id: &Identifier,
        document_type: &str,
        query: &DocumentQuery,
        context: &mut ExecutionContext,
    ) -> Result<Vec<Document>, RepositoryError> {
        let inner = self.read()?;
        let limit = query.limit.map_or(usize::MAX, |limit| limit as usize);
        let documents: Vec<Document> = inner
            .documents
            .values()
            .filter(|document| {
                document.data_contract_id == *data_contract_id
                    && document.document_type == document_type
                    && query.matches(document)
            })
            .take(limit)
            .cloned()
            .collect();

        let mut size = 0;
        for document in &documents {
            size += value_size(document)?;
        }
        context.add_operation(Operation::Read {
            key_size: document_key_size(document_type),
            value_size: size,
        });
        Ok(documents)
    }

    fn fetch_latest_platform_block_header(
        &self,
        _context: &mut ExecutionContext,
    ) -> Result<BlockHeader, RepositoryError> {
        Ok(self.read()?.block_header.clone())
    }

    fn is_asset_lock_transaction_out_point_already_used(
        &self,
        out_point: &OutPoint,
        context: &mut ExecutionContext,
    ) -> Result<bool, RepositoryError> {
        let used = self.read()?.used_out_points.contains(out_point);
        context.add_operation(Operation::Read {
            key_size: OUT_POINT_KEY_SIZE,
            value_size: 0,
        });
        Ok(used)
    }

    fn store_identity(
        &self,
        identity: &Identity,
        context: &mut ExecutionContext,
    ) -> Result<(), RepositoryError> {
        let size = value_size(identity)?;
        if context.is_dry_run() {
            context.add_operation(Operation::Create {
                key_size: ID_KEY_SIZE,
                value_size: size,
            });
            return Ok(());
        }

        let mut inner = self.write()?;
        let operation = if inner.identities.contains_key(&identity.id) {
            Operation::Update {
                key_size: ID_KEY_SIZE,
                value_size: size,
            }
        } else {
            Operation::Create {
                key_size: ID_KEY_SIZE,
                value_size: size,
            }
        };
        inner.identities.insert(identity.id, identity.clone());
        context.add_operation(operation);
        Ok(())
    }

    fn store_identity_public_key_hashes(
        &self,
        identity_id: &Identifier,
        public_key_hashes: &[[u8; 20]],
        context: &mut ExecutionContext,
    ) -> Result<(), RepositoryError> {
        context.add_operations(public_key_hashes.iter().map(|_| Operation::Create {
            key_size: PUBLIC_KEY_HASH_SIZE,
            value_size: ID_KEY_SIZE,
        }));
        if context.is_dry_run() {
            return Ok(());
        }

        let mut inner = self.write()?;
        for hash in public_key_hashes {
            inner.public_key_hashes.insert(*hash, *identity_id);
        }
        Ok(())
    }

    fn add_to_identity_balance(
        &self,
        identity_id: &Identifier,
        amount: Credits,
        context: &mut ExecutionContext,
    ) -> Result<(), RepositoryError> {
        context.add_operation(Operation::Update {
            key_size: ID_KEY_SIZE,
            value_size: CREDITS_VALUE_SIZE,
        });
        if context.is_dry_run() {
            return Ok(());
        }

        let mut inner = self.write()?;
        let identity = inner
            .identities
            .get_mut(identity_id)
            .ok_or_else(|| RepositoryError::Storage {
                reason: format!("Identity {} is not stored", identity_id),
            })?;
        identity.balance = identity
            .balance
            .checked_add(amount)
            .ok_or_else(|| RepositoryError::Corrupted {
                key: identity_id.to_hex(),
            })?;
        Ok(())
    }

    fn add_to_system_credits(
        &self,
        amount: Credits,
        context: &mut ExecutionContext,
    ) -> Result<(), RepositoryError> {
        context.add_operation(Operation::Update {
            key_size: ID_KEY_SIZE,
            value_size: CREDITS_VALUE_SIZE,
        });
        if context.is_dry_run() {
            return Ok(());
        }

        let mut inner = self.write()?;
        inner.system_credits = inner
            .system_credits
            .checked_add(amount)
            .ok_or_else(|| RepositoryError::Corrupted {
                key: "system_credits".to_string(),
            })?;
        Ok(())
    }

    fn mark_asset_lock_transaction_out_point_as_used(
        &self,
        out_point: &OutPoint,
        context: &mut ExecutionContext,
    ) -> Result<(), RepositoryError> {
        context.add_operation(Operation::Create {
            key_size: OUT_POINT_KEY_SIZE,
            value_size: 0,
        });
        if context.is_dry_run() {
            return Ok(());
        }

        self.write()?.used_out_points.insert(*out_point);
        Ok(())
    }

    fn store_data_contract(
        &self,
        data_contract: &DataContract,
        context: &mut ExecutionContext,
    ) -> Result<(), RepositoryError> {
        let size = value_size(data_contract)?;
        if context.is_dry_run() {
            context.add_operation(Operation::Create {
                key_size: ID_KEY_SIZE,
                value_size: size,
            });
            return Ok(());
        }

        let mut inner = self.write()?;
        let operation = if inner.data_contracts.contains_key(&data_contract.id) {
            Operation::Update {
                key_size: ID_KEY_SIZE,
                value_size: size,
            }
        } else {
            Operation::Create {
                key_size: ID_KEY_SIZE,
                value_size: size,
            }
        };
        inner.data_contracts.insert(data_contract.id, data_contract.clone());
        context.add_operation(operation);
        Ok(())
    }

    fn store_document(
        &self,
        document: &Document,
        context: &mut ExecutionContext,
    ) -> Result<(), RepositoryError> {
        context.add_operation(Operation::Create {
            key_size: document_key_size(&document.document_type),
            value_size: value_size(document)?,
        });
        if context.is_dry_run() {
            return Ok(());
        }

        let key = (document.data_contract_id, document.document_type.clone(), document.id);
        self.write()?.documents.insert(key, document.clone());
        Ok(())
    }

    fn update_document(
        &self,
        document: &Document,
        context: &mut ExecutionContext,
    ) -> Result<(), RepositoryError> {
        context.add_operation(Operation::Update {
            key_size: document_key_size(&document.document_type),
            value_size: value_size(document)?,
        });
        if context.is_dry_run() {
            return Ok(());
        }

        let key = (document.data_contract_id, document.document_type.clone(), document.id);
        self.write()?.documents.insert(key, document.clone());
        Ok(())
    }

    fn remove_document(
        &self,
        data_contract_id: &Identifier,
        document_type: &str,
        document_id: &Identifier,
        context: &mut ExecutionContext,
    ) -> Result<(), RepositoryError> {
        context.add_operation(Operation::Delete {
            key_size: document_key_size(document_type),
            value_size: 0,
        });
        if context.is_dry_run() {
            return Ok(());
        }

        let key = (*data_contract_id, document_type.to_string(), *document_id);
        self.write()?.documents.remove(&key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn document() -> Document {
        Document {
            id: Identifier([1; 32]),
            document_type: "note".to_string(),
            data_contract_id: Identifier([2; 32]),
            owner_id: Identifier([3; 32]),
            revision: 1,
            created_at: None,
            updated_at: None,
            data: Map::new(),
        }
    }

    #[test]
    fn test_dry_run_records_but_does_not_write() {
        let repository = InMemoryStateRepository::new(BlockHeader::from_millis(1, 0));
        let mut context = ExecutionContext::dry_run();

        repository.store_document(&document(), &mut context).unwrap();

        assert_eq!(repository.document_count().unwrap(), 0);
        assert!(matches!(context.operations()[0], Operation::Create { .. }));
    }

    #[test]
    fn test_checkpoint_restores_previous_contents() {
        let repository = InMemoryStateRepository::new(BlockHeader::from_millis(1, 0));
        let checkpoint = repository.create_checkpoint().unwrap();

        repository
            .store_document(&document(), &mut ExecutionContext::new())
            .unwrap();
        assert_eq!(repository.document_count().unwrap(), 1);

        repository.restore_checkpoint(checkpoint).unwrap();
        assert_eq!(repository.document_count().unwrap(), 0);
    }

    #[test]
    fn test_balance_with_debt_can_be_negative() {
        let repository = InMemoryStateRepository::new(BlockHeader::from_millis(1, 0));
        let id = Identifier([9; 32]);
        repository
            .insert_identity(Identity {
                protocol_version: 1,
                id,
                public_keys: Vec::new(),
                balance: 10,
                revision: 0,
            })
            .unwrap();
        repository.set_identity_debt(id, 25).unwrap();

        let mut context = ExecutionContext::new();
        let balance = repository
            .fetch_identity_balance_with_debt(&id, &mut context)
            .unwrap();
        assert_eq!(balance, Some(-15));
    }
}
