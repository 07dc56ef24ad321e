//! Consensus errors
//!
//! Every variant carries a stable numeric code shared by all nodes and clients:
//! basic (structural) errors are `10xx`, signature errors `20xx`, fee errors
//! `3000` and state errors `40xx`. Codes must never be renumbered.

use serde::Serialize;
use thiserror::Error;
use crate::identity::{KeyType, OutPoint, Purpose, SecurityLevel};
use crate::types::{Credits, Identifier, KeyId, Revision, TimestampMillis};

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ConsensusError {
    // Basic

    #[error("Protocol version {parsed_protocol_version} is not supported, latest is {latest_version}")]
    UnsupportedProtocolVersion { parsed_protocol_version: u64, latest_version: u32 },

    #[error("JSON schema violation at '{instance_path}': {message}")]
    JsonSchema { instance_path: String, message: String },

    #[error("Invalid {name}: {message}")]
    InvalidIdentifier { name: String, message: String },

    #[error("Data contract id {actual} doesn't match expected {expected}")]
    InvalidDataContractId { expected: Identifier, actual: Identifier },

    #[error("Data contract {data_contract_id} is not present")]
    DataContractNotPresent { data_contract_id: Identifier },

    #[error("Document transitions with duplicate ids: {references:?}")]
    DuplicateDocumentTransitionsWithIds { references: Vec<(String, Identifier)> },

    #[error("Document transitions with duplicate unique indices: {references:?}")]
    DuplicateDocumentTransitionsWithIndices { references: Vec<(String, Identifier)> },

    #[error("Document transition action {action} is not supported")]
    InvalidDocumentTransitionAction { action: u64 },

    #[error("Document transition id {actual} doesn't match expected {expected}")]
    InvalidDocumentTransitionId { expected: Identifier, actual: Identifier },

    #[error("Data contract {data_contract_id} doesn't define document type {document_type}")]
    InvalidDocumentType { document_type: String, data_contract_id: Identifier },

    #[error("$dataContractId is not present")]
    MissingDataContractId,

    #[error("$action is not present")]
    MissingDocumentTransitionAction,

    #[error("$type is not present")]
    MissingDocumentTransitionType,

    #[error("Duplicated public keys found: {ids:?}")]
    DuplicatedIdentityPublicKey { ids: Vec<KeyId> },

    #[error("Duplicated public key ids found: {ids:?}")]
    DuplicatedIdentityPublicKeyId { ids: Vec<KeyId> },

    #[error("Asset lock transaction output {out_point} was already used")]
    IdentityAssetLockTransactionOutPointAlreadyExists { out_point: OutPoint },

    #[error("Asset lock output value {value} is below the minimum of {min_value}")]
    InvalidIdentityAssetLockTransactionOutput { value: u64, min_value: u64 },

    #[error("Invalid data for public key {public_key_id}: {message}")]
    InvalidIdentityPublicKeyData { public_key_id: KeyId, message: String },

    #[error("Invalid state transition type {state_transition_type}")]
    InvalidStateTransitionType { state_transition_type: u64 },

    #[error("State transition type is not present")]
    MissingStateTransitionType,

    #[error("State transition size {actual_size} bytes exceeds the maximum of {max_size} bytes")]
    StateTransitionMaxSizeExceeded { actual_size: usize, max_size: usize },

    #[error("Identity doesn't contain a master authentication key")]
    MissingMasterPublicKey,

    #[error("publicKeysDisabledAt must be present if and only if keys are disabled")]
    InvalidIdentityUpdateTransitionDisableKeys,

    #[error("Identity update transition must add or disable at least one key")]
    InvalidIdentityUpdateTransitionEmpty,

    #[error("Data contract version {actual} is invalid, expected {expected}")]
    InvalidDataContractVersion { expected: u32, actual: u32 },

    // Signature

    #[error("Identity {identity_id} not found")]
    IdentityNotFound { identity_id: Identifier },

    #[error("Public key type {key_type:?} is not supported for signing")]
    InvalidIdentityPublicKeyType { key_type: KeyType },

    #[error("Invalid state transition signature")]
    InvalidStateTransitionSignature,

    #[error("Public key {public_key_id} doesn't exist")]
    MissingPublicKey { public_key_id: KeyId },

    #[error("Public key purpose {purpose:?} is not allowed, expected {allowed_purpose:?}")]
    WrongPublicKeyPurpose { purpose: Purpose, allowed_purpose: Purpose },

    #[error("Public key {public_key_id} is disabled")]
    PublicKeyIsDisabled { public_key_id: KeyId },

    #[error("Public key security level {public_key_security_level:?} doesn't meet required {required_security_level:?}")]
    PublicKeySecurityLevelNotMet {
        public_key_security_level: SecurityLevel,
        required_security_level: SecurityLevel,
    },

    // Fee

    #[error("Balance {balance} is not enough to pay fee {fee}")]
    BalanceIsNotEnough { balance: Credits, fee: Credits },

    // State

    #[error("Data contract {data_contract_id} is already present")]
    DataContractAlreadyPresent { data_contract_id: Identifier },

    #[error("Data trigger condition failed for document {document_id}: {message}")]
    DataTriggerCondition { data_contract_id: Identifier, document_id: Identifier, message: String },

    #[error("Data trigger execution failed for document {document_id}: {message}")]
    DataTriggerExecution { data_contract_id: Identifier, document_id: Identifier, message: String },

    #[error("Document {document_id} is already present")]
    DocumentAlreadyPresent { document_id: Identifier },

    #[error("Document {document_id} not found")]
    DocumentNotFound { document_id: Identifier },

    #[error("Document {document_id} owner {document_owner_id} doesn't match existing owner {existing_document_owner_id}")]
    DocumentOwnerIdMismatch {
        document_id: Identifier,
        document_owner_id: Identifier,
        existing_document_owner_id: Identifier,
    },

    #[error("Document {document_id} createdAt and updatedAt timestamps are not equal")]
    DocumentTimestampsMismatch { document_id: Identifier },

    #[error("Document {document_id} {timestamp_name} {timestamp} is outside of the block time window [{time_window_start}, {time_window_end}]")]
    DocumentTimestampWindowViolation {
        timestamp_name: String,
        document_id: Identifier,
        timestamp: TimestampMillis,
        time_window_start: TimestampMillis,
        time_window_end: TimestampMillis,
    },

    #[error("Document {document_id} duplicates unique index over {duplicating_properties:?}")]
    DuplicateUniqueIndex { document_id: Identifier, duplicating_properties: Vec<String> },

    #[error("Document {document_id} has invalid revision, current revision is {current_revision}")]
    InvalidDocumentRevision { document_id: Identifier, current_revision: Revision },

    #[error("Identity {identity_id} already exists")]
    IdentityAlreadyExists { identity_id: Identifier },

    #[error("Keys disabled at {disabled_at} is outside of the block time window [{time_window_start}, {time_window_end}]")]
    IdentityPublicKeyDisabledAtWindowViolation {
        disabled_at: TimestampMillis,
        time_window_start: TimestampMillis,
        time_window_end: TimestampMillis,
    },

    #[error("Public key {public_key_index} is read only")]
    IdentityPublicKeyIsReadOnly { public_key_index: KeyId },

    #[error("Public key id {id} doesn't exist")]
    InvalidIdentityPublicKeyId { id: KeyId },

    #[error("Identity {identity_id} has invalid revision, current revision is {current_revision}")]
    InvalidIdentityRevision { identity_id: Identifier, current_revision: Revision },

    #[error("Identity cannot contain more than {max_items} public keys")]
    MaxIdentityPublicKeyLimitReached { max_items: usize },

    #[error("Public key ids {ids:?} are already used by the identity")]
    DuplicatedIdentityPublicKeyIdState { ids: Vec<KeyId> },

    #[error("Public key {public_key_index} is already disabled")]
    IdentityPublicKeyIsDisabled { public_key_index: KeyId },
}

impl ConsensusError {
    /// Stable numeric code of the error
    pub fn code(&self) -> u32 {
        use ConsensusError::*;
        match self {
            UnsupportedProtocolVersion { .. } => 1002,
            JsonSchema { .. } => 1005,
            InvalidIdentifier { .. } => 1006,
            InvalidDataContractId { .. } => 1011,
            DataContractNotPresent { .. } => 1018,
            DuplicateDocumentTransitionsWithIds { .. } => 1019,
            DuplicateDocumentTransitionsWithIndices { .. } => 1020,
            InvalidDocumentTransitionAction { .. } => 1022,
            InvalidDocumentTransitionId { .. } => 1023,
            InvalidDocumentType { .. } => 1024,
            MissingDataContractId => 1025,
            MissingDocumentTransitionAction => 1026,
            MissingDocumentTransitionType => 1027,
            DuplicatedIdentityPublicKey { .. } => 1029,
            DuplicatedIdentityPublicKeyId { .. } => 1030,
            IdentityAssetLockTransactionOutPointAlreadyExists { .. } => 1033,
            InvalidIdentityAssetLockTransactionOutput { .. } => 1034,
            InvalidIdentityPublicKeyData { .. } => 1040,
            InvalidStateTransitionType { .. } => 1043,
            MissingStateTransitionType => 1044,
            StateTransitionMaxSizeExceeded { .. } => 1045,
            MissingMasterPublicKey => 1046,
            InvalidIdentityUpdateTransitionDisableKeys => 1047,
            InvalidIdentityUpdateTransitionEmpty => 1048,
            InvalidDataContractVersion { .. } => 1050,

            IdentityNotFound { .. } => 2000,
            InvalidIdentityPublicKeyType { .. } => 2001,
            InvalidStateTransitionSignature => 2002,
            MissingPublicKey { .. } => 2003,
            WrongPublicKeyPurpose { .. } => 2005,
            PublicKeyIsDisabled { .. } => 2006,
            PublicKeySecurityLevelNotMet { .. } => 2007,

            BalanceIsNotEnough { .. } => 3000,

            DataContractAlreadyPresent { .. } => 4000,
            DataTriggerCondition { .. } => 4001,
            DataTriggerExecution { .. } => 4002,
            DocumentAlreadyPresent { .. } => 4004,
            DocumentNotFound { .. } => 4005,
            DocumentOwnerIdMismatch { .. } => 4006,
            DocumentTimestampsMismatch { .. } => 4007,
            DocumentTimestampWindowViolation { .. } => 4008,
            DuplicateUniqueIndex { .. } => 4009,
            InvalidDocumentRevision { .. } => 4010,
            IdentityAlreadyExists { .. } => 4011,
            IdentityPublicKeyDisabledAtWindowViolation { .. } => 4012,
            IdentityPublicKeyIsReadOnly { .. } => 4013,
            InvalidIdentityPublicKeyId { .. } => 4014,
            InvalidIdentityRevision { .. } => 4015,
            MaxIdentityPublicKeyLimitReached { .. } => 4016,
            DuplicatedIdentityPublicKeyIdState { .. } => 4018,
            IdentityPublicKeyIsDisabled { .. } => 4019,
        }
    }

    /// Error class derived from the code range
    pub fn kind(&self) -> ConsensusErrorKind {
        match self.code() {
            1000..=1999 => ConsensusErrorKind::Basic,
            2000..=2999 => ConsensusErrorKind::Signature,
            3000..=3999 => ConsensusErrorKind::Fee,
            _ => ConsensusErrorKind::State,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConsensusErrorKind {
    Basic,
    Signature,
    Fee,
    State,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let id = Identifier::default();
        assert_eq!(ConsensusError::BalanceIsNotEnough { balance: 1, fee: 2 }.code(), 3000);
        assert_eq!(ConsensusError::DataContractAlreadyPresent { data_contract_id: id }.code(), 4000);
        assert_eq!(
            ConsensusError::DataTriggerExecution {
                data_contract_id: id,
                document_id: id,
                message: String::new(),
            }
            .code(),
            4002
        );
        assert_eq!(ConsensusError::DocumentAlreadyPresent { document_id: id }.code(), 4004);
        assert_eq!(ConsensusError::DocumentNotFound { document_id: id }.code(), 4005);
        assert_eq!(
            ConsensusError::DocumentOwnerIdMismatch {
                document_id: id,
                document_owner_id: id,
                existing_document_owner_id: id,
            }
            .code(),
            4006
        );
        assert_eq!(ConsensusError::DocumentTimestampsMismatch { document_id: id }.code(), 4007);
        assert_eq!(
            ConsensusError::InvalidDocumentRevision { document_id: id, current_revision: 1 }.code(),
            4010
        );
    }

    #[test]
    fn test_size_is_reported_in_bytes() {
        let error = ConsensusError::StateTransitionMaxSizeExceeded {
            actual_size: 16_385,
            max_size: 16_384,
        };
        assert_eq!(error.code(), 1045);
        assert_eq!(
            error.to_string(),
            "State transition size 16385 bytes exceeds the maximum of 16384 bytes"
        );
    }

    #[test]
    fn test_kind_follows_code_range() {
        assert_eq!(ConsensusError::MissingStateTransitionType.kind(), ConsensusErrorKind::Basic);
        assert_eq!(ConsensusError::InvalidStateTransitionSignature.kind(), ConsensusErrorKind::Signature);
        assert_eq!(ConsensusError::BalanceIsNotEnough { balance: 0, fee: 1 }.kind(), ConsensusErrorKind::Fee);
        assert_eq!(
            ConsensusError::DocumentNotFound { document_id: Identifier::default() }.kind(),
            ConsensusErrorKind::State
        );
    }
}
