//! State transition validation and apply engine
//!
//! A state transition is a signed request to change ledger state: create or
//! update a data contract, create, top up or update an identity, or create,
//! replace and delete documents in a batch. The engine decodes transitions,
//! validates them in stages (structure, signature, state, fee) and applies the
//! accepted ones through a [`StateRepository`].
//!
//! Recoverable failures are [`ConsensusError`] values with stable codes.
//! Conditions the pipeline cannot represent are returned as [`Error`].

pub mod apply;
pub mod config;
pub mod consensus;
pub mod context;
pub mod data_contract;
pub mod data_trigger;
pub mod document;
pub mod document_transition;
pub mod error;
pub mod factory;
pub mod fee;
pub mod hasher;
pub mod identity;
pub mod logging;
pub mod memory;
pub mod processor;
pub mod schema;
pub mod serialization;
pub mod signature;
pub mod state;
pub mod state_transition;
pub mod structure;
pub mod traits;
pub mod types;
pub mod uniqueness;
pub mod validation;

pub use apply::StateTransitionApplier;
pub use config::ValidationConfig;
pub use consensus::{ConsensusError, ConsensusErrorKind};
pub use context::{ExecutionContext, ExecutionContextBuilder, Operation};
pub use data_contract::{DataContract, Index, IndexProperty};
pub use data_trigger::{
    DataTrigger, DataTriggerEngine, DataTriggerExecutionContext, DataTriggerExecutionResult,
    DataTriggerRegistry,
};
pub use document::{Document, DocumentQuery, WhereClause};
pub use document_transition::{
    DocumentBaseTransition, DocumentCreateTransition, DocumentDeleteTransition,
    DocumentReplaceTransition, DocumentTransition, DocumentTransitionAction,
};
pub use error::{Error, RepositoryError, SerializationError};
pub use factory::{CreateOptions, ResolvedStateTransition, StateTransitionFactory};
pub use fee::{FeeCalculator, FeeResult, FeeValidator};
pub use identity::{
    AssetLockOutput, AssetLockProof, Identity, IdentityPublicKey, KeyType, OutPoint, Purpose,
    SecurityLevel,
};
pub use logging::{LogLevel, Outcome, Stage, StageRecord, ValidationLog};
pub use memory::InMemoryStateRepository;
pub use processor::{ProcessingOutcome, StateTransitionProcessor, StateTransitionProcessorBuilder};
pub use signature::SignatureValidator;
pub use state::StateValidator;
pub use state_transition::{
    DataContractCreateTransition, DataContractUpdateTransition, DocumentsBatchTransition,
    IdentityCreateTransition, IdentityTopUpTransition, IdentityUpdateTransition, StateTransition,
    StateTransitionType,
};
pub use structure::StructureValidator;
pub use traits::{JsonSchemaValidator, SchemaViolation, SignatureVerifier, StateRepository};
pub use types::{
    BinaryData, BlockHeader, Credits, Identifier, KeyId, Revision, SignedCredits, TimeWindow,
    TimestampMillis, TransitionHash, PROTOCOL_VERSION,
};
pub use validation::{SimpleValidationResult, ValidationResult};
