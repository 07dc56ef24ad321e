//! Capabilities consumed by the engine
//!
//! Storage, schema validation and signature verification live outside this
//! crate. Every repository call receives the transition's execution context so
//! the implementation can record fee operations and honour dry run.

use serde_json::Value;
use crate::context::ExecutionContext;
use crate::data_contract::DataContract;
use crate::document::{Document, DocumentQuery};
use crate::error::RepositoryError;
use crate::identity::{Identity, KeyType, OutPoint};
use crate::types::{BlockHeader, Credits, Identifier, SignedCredits};

/// Access to ledger state
///
/// The engine never starts or commits storage transactions; it reads and
/// writes against whatever transaction the host has open.
pub trait StateRepository: Send + Sync {
    fn fetch_identity(
        &self,
        id: &Identifier,
        context: &mut ExecutionContext,
    ) -> Result<Option<Identity>, RepositoryError>;

    fn fetch_identity_balance(
        &self,
        id: &Identifier,
        context: &mut ExecutionContext,
    ) -> Result<Option<Credits>, RepositoryError>;

    /// Balance minus outstanding debt; negative when the identity owes credits
    fn fetch_identity_balance_with_debt(
        &self,
        id: &Identifier,
        context: &mut ExecutionContext,
    ) -> Result<Option<SignedCredits>, RepositoryError>;

    fn fetch_data_contract(
        &self,
        id: &Identifier,
        context: &mut ExecutionContext,
    ) -> Result<Option<DataContract>, RepositoryError>;

    fn fetch_documents(
        &self,
        data_contract_id: &Identifier,
        document_type: &str,
        query: &DocumentQuery,
        context: &mut ExecutionContext,
    ) -> Result<Vec<Document>, RepositoryError>;

    fn fetch_latest_platform_block_header(
        &self,
        context: &mut ExecutionContext,
    ) -> Result<BlockHeader, RepositoryError>;

    fn is_asset_lock_transaction_out_point_already_used(
        &self,
        out_point: &OutPoint,
        context: &mut ExecutionContext,
    ) -> Result<bool, RepositoryError>;

    fn store_identity(
        &self,
        identity: &Identity,
        context: &mut ExecutionContext,
    ) -> Result<(), RepositoryError>;

    fn store_identity_public_key_hashes(
        &self,
        identity_id: &Identifier,
        public_key_hashes: &[[u8; 20]],
        context: &mut ExecutionContext,
    ) -> Result<(), RepositoryError>;

    fn add_to_identity_balance(
        &self,
        identity_id: &Identifier,
        amount: Credits,
        context: &mut ExecutionContext,
    ) -> Result<(), RepositoryError>;

    fn add_to_system_credits(
        &self,
        amount: Credits,
        context: &mut ExecutionContext,
    ) -> Result<(), RepositoryError>;

    fn mark_asset_lock_transaction_out_point_as_used(
        &self,
        out_point: &OutPoint,
        context: &mut ExecutionContext,
    ) -> Result<(), RepositoryError>;

    fn store_data_contract(
        &self,
        data_contract: &DataContract,
        context: &mut ExecutionContext,
    ) -> Result<(), RepositoryError>;

    fn store_document(
        &self,
        document: &Document,
        context: &mut ExecutionContext,
    ) -> Result<(), RepositoryError>;

    fn update_document(
        &self,
        document: &Document,
        context: &mut ExecutionContext,
    ) -> Result<(), RepositoryError>;

    fn remove_document(
        &self,
        data_contract_id: &Identifier,
        document_type: &str,
        document_id: &Identifier,
        context: &mut ExecutionContext,
    ) -> Result<(), RepositoryError>;
}

/// One violation reported by a schema validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub instance_path: String,
    pub message: String,
}

impl SchemaViolation {
    pub fn new(instance_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            instance_path: instance_path.into(),
            message: message.into(),
        }
    }
}

/// JSON schema validation capability
pub trait JsonSchemaValidator: Send + Sync {
    /// Validate `object` against `schema`; an empty list means valid
    fn validate(&self, schema: &Value, object: &Value) -> Vec<SchemaViolation>;
}

/// Cryptographic signature verification capability
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, key_type: KeyType, public_key: &[u8], signature: &[u8], payload: &[u8]) -> bool;

    /// Verify against the hash of the signing key rather than the key itself
    fn verify_by_public_key_hash(
        &self,
        public_key_hash: &[u8],
        signature: &[u8],
        payload: &[u8],
    ) -> bool;
}
