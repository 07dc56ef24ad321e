//! Fee calculation and solvency validation
//!
//! Operations recorded in the execution context are priced into a storage fee
//! and a processing fee. The validator compares the total against the balance
//! available to the transition's payer.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::config::ValidationConfig;
use crate::consensus::ConsensusError;
use crate::context::{ExecutionContext, Operation};
use crate::error::Error;
use crate::identity::KeyType;
use crate::state_transition::StateTransition;
use crate::traits::StateRepository;
use crate::types::Credits;
use crate::validation::ValidationResult;

pub const STORAGE_CREDIT_PER_BYTE: Credits = 5000;
pub const PROCESSING_CREDIT_PER_BYTE: Credits = 12;

pub const SIGNATURE_VERIFY_COST_ECDSA_SECP256K1: Credits = 3000;
pub const SIGNATURE_VERIFY_COST_BLS12_381: Credits = 6000;
pub const SIGNATURE_VERIFY_COST_ECDSA_HASH160: Credits = 4000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeResult {
    pub storage_fee: Credits,
    pub processing_fee: Credits,
}

impl FeeResult {
    pub fn new(storage_fee: Credits, processing_fee: Credits) -> Self {
        Self {
            storage_fee,
            processing_fee,
        }
    }

    /// Amount the payer must hold
    pub fn desired_amount(&self) -> Result<Credits, Error> {
        self.storage_fee
            .checked_add(self.processing_fee)
            .ok_or(Error::Overflow("fee total"))
    }

    fn add(&mut self, other: FeeResult) -> Result<(), Error> {
        self.storage_fee = self
            .storage_fee
            .checked_add(other.storage_fee)
            .ok_or(Error::Overflow("storage fee"))?;
        self.processing_fee = self
            .processing_fee
            .checked_add(other.processing_fee)
            .ok_or(Error::Overflow("processing fee"))?;
        Ok(())
    }
}

/// Pluggable fee formula
pub type FeeCalculator =
    Arc<dyn Fn(&StateTransition, &[Operation]) -> Result<FeeResult, Error> + Send + Sync>;

pub fn default_fee_calculator() -> FeeCalculator {
    Arc::new(calculate_state_transition_fee)
}

fn per_byte(bytes: usize, price: Credits, what: &'static str) -> Result<Credits, Error> {
    (bytes as Credits).checked_mul(price).ok_or(Error::Overflow(what))
}

pub fn signature_verify_cost(key_type: KeyType) -> Credits {
    match key_type {
        KeyType::EcdsaSecp256k1 => SIGNATURE_VERIFY_COST_ECDSA_SECP256K1,
        KeyType::Bls12_381 => SIGNATURE_VERIFY_COST_BLS12_381,
        KeyType::EcdsaHash160 => SIGNATURE_VERIFY_COST_ECDSA_HASH160,
    }
}

pub fn calculate_operation_fee(operation: &Operation) -> Result<FeeResult, Error> {
    let fee = match operation {
        Operation::Read {
            key_size,
            value_size,
        } => FeeResult::new(
            0,
            per_byte(key_size + value_size, PROCESSING_CREDIT_PER_BYTE, "read fee")?,
        ),
        Operation::Create {
            key_size,
            value_size,
        } => FeeResult::new(
            per_byte(key_size + value_size, STORAGE_CREDIT_PER_BYTE, "create fee")?,
            per_byte(key_size + value_size, PROCESSING_CREDIT_PER_BYTE, "create fee")?,
        ),
        Operation::Update {
            key_size,
            value_size,
        } => FeeResult::new(
            per_byte(*value_size, STORAGE_CREDIT_PER_BYTE, "update fee")?,
            per_byte(key_size + value_size, PROCESSING_CREDIT_PER_BYTE, "update fee")?,
        ),
        Operation::Delete { key_size, .. } => {
            FeeResult::new(0, per_byte(*key_size, PROCESSING_CREDIT_PER_BYTE, "delete fee")?)
        }
        Operation::SignatureVerification { key_type } => {
            FeeResult::new(0, signature_verify_cost(*key_type))
        }
        Operation::PreCalculated {
            storage_cost,
            processing_cost,
        } => FeeResult::new(*storage_cost, *processing_cost),
    };
    Ok(fee)
}

/// Sum of all operation fees plus processing of the serialized transition
pub fn calculate_state_transition_fee(
    transition: &StateTransition,
    operations: &[Operation],
) -> Result<FeeResult, Error> {
    let mut total = FeeResult::default();
    for operation in operations {
        total.add(calculate_operation_fee(operation)?)?;
    }

    let size = transition.to_bytes()?.len();
    total.add(FeeResult::new(
        0,
        per_byte(size, PROCESSING_CREDIT_PER_BYTE, "transition size fee")?,
    ))?;

    Ok(total)
}

pub struct FeeValidator<SR: StateRepository> {
    state_repository: Arc<SR>,
    config: ValidationConfig,
    calculator: FeeCalculator,
}

impl<SR: StateRepository> FeeValidator<SR> {
    pub fn new(state_repository: Arc<SR>, config: ValidationConfig, calculator: FeeCalculator) -> Self {
        Self {
            state_repository,
            config,
            calculator,
        }
    }

    pub fn calculate(
        &self,
        transition: &StateTransition,
        execution_context: &ExecutionContext,
    ) -> Result<FeeResult, Error> {
        (self.calculator)(transition, execution_context.operations())
    }

    /// Check the payer can cover the fee
    ///
    /// On dry run only the balance reads happen and the result is always valid.
    pub fn validate(
        &self,
        transition: &StateTransition,
        execution_context: &mut ExecutionContext,
    ) -> Result<ValidationResult<FeeResult>, Error> {
        if execution_context.is_dry_run() {
            self.fetch_balance(transition, execution_context)?;
            return Ok(ValidationResult::new());
        }

        let fee = self.calculate(transition, execution_context)?;
        let desired_amount = fee.desired_amount()?;

        let balance = self
            .fetch_balance(transition, execution_context)?
            .ok_or(Error::IdentityNotPresent {
                identity_id: transition.owner_id(),
            })?;

        let mut result = ValidationResult::new_with_data(fee);
        if balance < desired_amount {
            result.add_error(ConsensusError::BalanceIsNotEnough {
                balance,
                fee: desired_amount,
            });
        }
        Ok(result)
    }

    /// Balance available to the payer, `None` when the paying identity is unknown
    fn fetch_balance(
        &self,
        transition: &StateTransition,
        execution_context: &mut ExecutionContext,
    ) -> Result<Option<Credits>, Error> {
        match transition {
            StateTransition::IdentityCreate(t) => self
                .config
                .duffs_to_credits(t.asset_lock_proof.output.value)
                .map(Some)
                .ok_or(Error::Overflow("asset lock value")),
            StateTransition::IdentityTopUp(t) => {
                let credits = self
                    .config
                    .duffs_to_credits(t.asset_lock_proof.output.value)
                    .ok_or(Error::Overflow("asset lock value"))?;
                let Some(balance) = self
                    .state_repository
                    .fetch_identity_balance_with_debt(&t.identity_id, execution_context)?
                else {
                    return Ok(None);
                };
                let available = i128::from(balance) + i128::from(credits);
                Ok(Some(Credits::try_from(available.max(0)).unwrap_or(Credits::MAX)))
            }
            _ => Ok(self
                .state_repository
                .fetch_identity_balance(&transition.owner_id(), execution_context)?),
        }
    }
}
