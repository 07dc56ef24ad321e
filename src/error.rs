//! Fatal error types
//!
//! Recoverable validation failures are [`ConsensusError`] values collected into a
//! [`ValidationResult`](crate::validation::ValidationResult). The types here are
//! raised as `Err` and mean the transition could not be processed at all.

use thiserror::Error;
use crate::consensus::ConsensusError;
use crate::types::Identifier;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to decode state transition: {reason}")]
    Decode { reason: String },

    #[error("Invalid state transition: {} consensus error(s)", errors.len())]
    InvalidStateTransition { errors: Vec<ConsensusError> },

    #[error("Invalid state transition type: {state_transition_type}")]
    InvalidStateTransitionType { state_transition_type: u64 },

    #[error("Data contract {data_contract_id} is not present")]
    DataContractNotPresent { data_contract_id: Identifier },

    #[error("Invalid document action: {action}")]
    InvalidDocumentAction { action: u64 },

    #[error("Document type {document_type} is not defined in data contract {data_contract_id}")]
    InvalidDocumentType { document_type: String, data_contract_id: Identifier },

    #[error("Identity {identity_id} is not present")]
    IdentityNotPresent { identity_id: Identifier },

    #[error("Document {document_id} is not present")]
    DocumentNotPresent { document_id: Identifier },

    #[error("Data trigger failed: {reason}")]
    DataTrigger { reason: String },

    #[error("Invalid configuration: {reason}")]
    Configuration { reason: String },

    #[error("Arithmetic overflow: {0}")]
    Overflow(&'static str),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),
}

/// Failure reported by a [`StateRepository`](crate::traits::StateRepository) implementation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Storage failure: {reason}")]
    Storage { reason: String },

    #[error("Repository state is poisoned")]
    Poisoned,

    #[error("Stored entity is corrupted: {key}")]
    Corrupted { key: String },
}

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Serialization failed: {reason}")]
    SerializationFailed { reason: String },

    #[error("Deserialization failed: {reason}")]
    DeserializationFailed { reason: String },
}
