//! Signature validation
//!
//! Identity-signed transitions are checked against the signing key of the
//! owning identity. Identity create and top-up have no identity key yet and are
//! checked against the asset-lock output key hash instead.

use std::sync::Arc;
use crate::config::ValidationConfig;
use crate::consensus::ConsensusError;
use crate::context::{ExecutionContext, Operation};
use crate::data_contract::DataContract;
use crate::error::Error;
use crate::factory::find_data_contract;
use crate::identity::{AssetLockProof, KeyType, Purpose, SecurityLevel};
use crate::state_transition::{DocumentsBatchTransition, StateTransition};
use crate::traits::{SignatureVerifier, StateRepository};
use crate::types::Identifier;
use crate::validation::SimpleValidationResult;

/// Only key type accepted for identity signatures
pub const SUPPORTED_SIGNATURE_KEY_TYPE: KeyType = KeyType::EcdsaSecp256k1;

pub struct SignatureValidator<SR: StateRepository> {
    state_repository: Arc<SR>,
    signature_verifier: Arc<dyn SignatureVerifier>,
    config: ValidationConfig,
}

impl<SR: StateRepository> SignatureValidator<SR> {
    pub fn new(
        state_repository: Arc<SR>,
        signature_verifier: Arc<dyn SignatureVerifier>,
        config: ValidationConfig,
    ) -> Self {
        Self {
            state_repository,
            signature_verifier,
            config,
        }
    }

    /// `data_contracts` must hold every contract a documents batch references
    pub fn validate(
        &self,
        transition: &StateTransition,
        data_contracts: &[DataContract],
        execution_context: &mut ExecutionContext,
    ) -> Result<SimpleValidationResult, Error> {
        let required_level = match transition {
            StateTransition::IdentityCreate(t) => {
                return self.validate_asset_lock_signature(transition, &t.asset_lock_proof, execution_context)
            }
            StateTransition::IdentityTopUp(t) => {
                return self.validate_asset_lock_signature(transition, &t.asset_lock_proof, execution_context)
            }
            StateTransition::IdentityUpdate(_) => SecurityLevel::Master,
            StateTransition::DataContractCreate(_) | StateTransition::DataContractUpdate(_) => {
                SecurityLevel::High
            }
            StateTransition::DocumentsBatch(batch) => self.batch_security_level(batch, data_contracts)?,
        };

        self.validate_identity_signature(
            transition,
            &transition.owner_id(),
            required_level,
            execution_context,
        )
    }

    /// Strictest level required by any document type the batch touches
    pub fn batch_security_level(
        &self,
        batch: &DocumentsBatchTransition,
        data_contracts: &[DataContract],
    ) -> Result<SecurityLevel, Error> {
        let mut strictest: Option<SecurityLevel> = None;

        for transition in &batch.transitions {
            let data_contract = find_data_contract(data_contracts, transition.data_contract_id())?;
            let level = data_contract
                .security_level_requirement(transition.document_type())
                .unwrap_or(self.config.default_security_level);
            strictest = Some(strictest.map_or(level, |current| current.min(level)));
        }

        Ok(strictest.unwrap_or(self.config.default_security_level))
    }

    pub fn validate_identity_signature(
        &self,
        transition: &StateTransition,
        owner_id: &Identifier,
        required_level: SecurityLevel,
        execution_context: &mut ExecutionContext,
    ) -> Result<SimpleValidationResult, Error> {
        let mut result = SimpleValidationResult::new();

        let Some(identity) = self.state_repository.fetch_identity(owner_id, execution_context)? else {
            result.add_error(ConsensusError::IdentityNotFound { identity_id: *owner_id });
            return Ok(result);
        };

        let Some(key_id) = transition.signature_public_key_id() else {
            result.add_error(ConsensusError::InvalidStateTransitionSignature);
            return Ok(result);
        };

        let Some(public_key) = identity.get_public_key_by_id(key_id) else {
            result.add_error(ConsensusError::MissingPublicKey { public_key_id: key_id });
            return Ok(result);
        };

        if public_key.key_type != SUPPORTED_SIGNATURE_KEY_TYPE {
            result.add_error(ConsensusError::InvalidIdentityPublicKeyType {
                key_type: public_key.key_type,
            });
            return Ok(result);
        }

        if public_key.purpose != Purpose::Authentication {
            result.add_error(ConsensusError::WrongPublicKeyPurpose {
                purpose: public_key.purpose,
                allowed_purpose: Purpose::Authentication,
            });
        }

        if public_key.is_disabled() {
            result.add_error(ConsensusError::PublicKeyIsDisabled { public_key_id: key_id });
        }

        if !public_key.security_level.satisfies(required_level) {
            result.add_error(ConsensusError::PublicKeySecurityLevelNotMet {
                public_key_security_level: public_key.security_level,
                required_security_level: required_level,
            });
        }

        if !result.is_valid() {
            return Ok(result);
        }

        execution_context.add_operation(Operation::SignatureVerification {
            key_type: public_key.key_type,
        });
        if execution_context.is_dry_run() {
            return Ok(result);
        }

        let payload = transition.signable_hash()?;
        let verified = self.signature_verifier.verify(
            public_key.key_type,
            public_key.data.as_slice(),
            transition.signature().as_slice(),
            &payload.0,
        );
        if !verified {
            result.add_error(ConsensusError::InvalidStateTransitionSignature);
        }

        Ok(result)
    }

    fn validate_asset_lock_signature(
        &self,
        transition: &StateTransition,
        proof: &AssetLockProof,
        execution_context: &mut ExecutionContext,
    ) -> Result<SimpleValidationResult, Error> {
        let mut result = SimpleValidationResult::new();

        execution_context.add_operation(Operation::SignatureVerification {
            key_type: KeyType::EcdsaHash160,
        });
        if execution_context.is_dry_run() {
            return Ok(result);
        }

        let payload = transition.signable_hash()?;
        let verified = self.signature_verifier.verify_by_public_key_hash(
            proof.output.public_key_hash.as_slice(),
            transition.signature().as_slice(),
            &payload.0,
        );
        if !verified {
            result.add_error(ConsensusError::InvalidStateTransitionSignature);
        }

        Ok(result)
    }
}
