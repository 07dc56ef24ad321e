//! State transition processor
//!
//! Wires the stages together: structure (inside the factory), signature,
//! state, fee and apply. Stages run strictly in that order and the pipeline
//! stops at the first invalid stage. Fatal errors abort processing and are
//! returned as `Err`.

use std::sync::Arc;
use crate::apply::StateTransitionApplier;
use crate::config::ValidationConfig;
use crate::context::ExecutionContext;
use crate::data_contract::DataContract;
use crate::data_trigger::{DataTriggerEngine, DataTriggerRegistry};
use crate::error::Error;
use crate::factory::{CreateOptions, StateTransitionFactory};
use crate::fee::{default_fee_calculator, FeeCalculator, FeeResult, FeeValidator};
use crate::logging::{Stage, ValidationLog};
use crate::signature::SignatureValidator;
use crate::state::StateValidator;
use crate::state_transition::StateTransition;
use crate::structure::StructureValidator;
use crate::traits::{JsonSchemaValidator, SignatureVerifier, StateRepository};
use crate::validation::{SimpleValidationResult, ValidationResult};

/// What happened to one transition
#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    pub result: SimpleValidationResult,
    /// First stage that rejected the transition
    pub failed_stage: Option<Stage>,
    pub fee: Option<FeeResult>,
    pub applied: bool,
    pub log: ValidationLog,
}

impl ProcessingOutcome {
    fn new(log: ValidationLog) -> Self {
        Self {
            result: SimpleValidationResult::new(),
            failed_stage: None,
            fee: None,
            applied: false,
            log,
        }
    }

    fn reject<T>(mut self, stage: Stage, result: ValidationResult<T>) -> Self {
        self.failed_stage = Some(stage);
        self.result.merge(result);
        self
    }

    pub fn is_valid(&self) -> bool {
        self.result.is_valid()
    }

    pub fn error_codes(&self) -> Vec<u32> {
        self.result.error_codes()
    }
}

pub struct StateTransitionProcessor<SR: StateRepository> {
    factory: StateTransitionFactory<SR>,
    signature_validator: SignatureValidator<SR>,
    state_validator: StateValidator<SR>,
    fee_validator: FeeValidator<SR>,
    applier: StateTransitionApplier<SR>,
}

impl<SR: StateRepository> StateTransitionProcessor<SR> {
    pub fn builder() -> StateTransitionProcessorBuilder<SR> {
        StateTransitionProcessorBuilder::new()
    }

    pub fn factory(&self) -> &StateTransitionFactory<SR> {
        &self.factory
    }

    pub fn fee_validator(&self) -> &FeeValidator<SR> {
        &self.fee_validator
    }

    /// Decode, validate and apply wire bytes
    ///
    /// A structurally invalid transition is reported in the outcome; only
    /// undecodable input and fatal conditions are errors.
    pub fn process_bytes(
        &self,
        bytes: &[u8],
        execution_context: &mut ExecutionContext,
    ) -> Result<ProcessingOutcome, Error> {
        let mut log = ValidationLog::default();
        match self
            .factory
            .resolve_from_bytes(bytes, CreateOptions::default(), execution_context)
        {
            Ok(resolved) => {
                log.record_result(
                    Stage::Structure,
                    &SimpleValidationResult::new(),
                    execution_context.operations().len(),
                );
                self.process_logged(&resolved.transition, &resolved.data_contracts, execution_context, log)
            }
            Err(Error::InvalidStateTransition { errors }) => {
                let result = SimpleValidationResult::new_with_errors(errors);
                log.record_result(Stage::Structure, &result, execution_context.operations().len());
                Ok(ProcessingOutcome::new(log).reject(Stage::Structure, result))
            }
            Err(e) => {
                log.record_failure(Stage::Structure, e.to_string(), execution_context.operations().len());
                Err(e)
            }
        }
    }

    /// Run signature, state and fee validation on a decoded transition
    pub fn validate(
        &self,
        transition: &StateTransition,
        execution_context: &mut ExecutionContext,
    ) -> Result<ProcessingOutcome, Error> {
        self.validate_logged(transition, &[], execution_context, ValidationLog::default())
    }

    /// Contracts in `known` are reused; the rest are fetched once and shared
    /// by the signature and state stages
    fn validate_logged(
        &self,
        transition: &StateTransition,
        known: &[DataContract],
        execution_context: &mut ExecutionContext,
        mut log: ValidationLog,
    ) -> Result<ProcessingOutcome, Error> {
        tracing::debug!(
            transition_type = %transition.transition_type(),
            dry_run = execution_context.is_dry_run(),
            "validating state transition"
        );

        let mut data_contracts = Vec::new();
        let result = self.run_stage(Stage::Signature, &mut log, execution_context, |ctx| {
            data_contracts = self.factory.resolve_data_contracts(transition, known, ctx)?;
            self.signature_validator.validate(transition, &data_contracts, ctx)
        })?;
        if !result.is_valid() {
            return Ok(ProcessingOutcome::new(log).reject(Stage::Signature, result));
        }

        let result = self.run_stage(Stage::State, &mut log, execution_context, |ctx| {
            self.state_validator.validate(transition, &data_contracts, ctx)
        })?;
        if !result.is_valid() {
            return Ok(ProcessingOutcome::new(log).reject(Stage::State, result));
        }

        let result = self.run_stage(Stage::Fee, &mut log, execution_context, |ctx| {
            self.fee_validator.validate(transition, ctx)
        })?;
        let fee = result.data().copied();
        if !result.is_valid() {
            let mut outcome = ProcessingOutcome::new(log).reject(Stage::Fee, result.without_data());
            outcome.fee = fee;
            return Ok(outcome);
        }

        let mut outcome = ProcessingOutcome::new(log);
        outcome.fee = fee;
        Ok(outcome)
    }

    /// Validate and, when every stage passes, apply
    pub fn process(
        &self,
        transition: &StateTransition,
        execution_context: &mut ExecutionContext,
    ) -> Result<ProcessingOutcome, Error> {
        self.process_logged(transition, &[], execution_context, ValidationLog::default())
    }

    fn process_logged(
        &self,
        transition: &StateTransition,
        known: &[DataContract],
        execution_context: &mut ExecutionContext,
        log: ValidationLog,
    ) -> Result<ProcessingOutcome, Error> {
        let mut outcome = self.validate_logged(transition, known, execution_context, log)?;
        if !outcome.is_valid() {
            return Ok(outcome);
        }

        if let Err(e) = self.applier.apply(transition, execution_context) {
            outcome
                .log
                .record_failure(Stage::Apply, e.to_string(), execution_context.operations().len());
            return Err(e);
        }
        outcome
            .log
            .record_result(Stage::Apply, &SimpleValidationResult::new(), execution_context.operations().len());
        outcome.applied = true;
        Ok(outcome)
    }

    /// Process transitions in order, each with its own execution context
    pub fn process_all(&self, transitions: &[StateTransition]) -> Result<Vec<ProcessingOutcome>, Error> {
        transitions
            .iter()
            .map(|transition| self.process(transition, &mut ExecutionContext::new()))
            .collect()
    }

    /// Fee the transition would cost, computed without touching ledger state
    ///
    /// Validation and apply both run against a dry-run context so the
    /// recorded operations match a real execution.
    pub fn estimate_fee(&self, transition: &StateTransition) -> Result<FeeResult, Error> {
        let mut execution_context = ExecutionContext::dry_run();

        let data_contracts = self
            .factory
            .resolve_data_contracts(transition, &[], &mut execution_context)?;
        self.signature_validator
            .validate(transition, &data_contracts, &mut execution_context)?;
        self.state_validator
            .validate(transition, &data_contracts, &mut execution_context)?;
        self.fee_validator.validate(transition, &mut execution_context)?;
        self.applier.apply(transition, &mut execution_context)?;

        self.fee_validator.calculate(transition, &execution_context)
    }

    fn run_stage<T>(
        &self,
        stage: Stage,
        log: &mut ValidationLog,
        execution_context: &mut ExecutionContext,
        run: impl FnOnce(&mut ExecutionContext) -> Result<ValidationResult<T>, Error>,
    ) -> Result<ValidationResult<T>, Error> {
        match run(execution_context) {
            Ok(result) => {
                log.record_result(stage, &result, execution_context.operations().len());
                Ok(result)
            }
            Err(e) => {
                log.record_failure(stage, e.to_string(), execution_context.operations().len());
                Err(e)
            }
        }
    }
}

pub struct StateTransitionProcessorBuilder<SR: StateRepository> {
    state_repository: Option<Arc<SR>>,
    schema_validator: Option<Arc<dyn JsonSchemaValidator>>,
    signature_verifier: Option<Arc<dyn SignatureVerifier>>,
    data_trigger_registry: DataTriggerRegistry,
    fee_calculator: Option<FeeCalculator>,
    config: ValidationConfig,
}

impl<SR: StateRepository> StateTransitionProcessorBuilder<SR> {
    pub fn new() -> Self {
        Self {
            state_repository: None,
            schema_validator: None,
            signature_verifier: None,
            data_trigger_registry: DataTriggerRegistry::new(),
            fee_calculator: None,
            config: ValidationConfig::default(),
        }
    }

    pub fn with_state_repository(mut self, state_repository: Arc<SR>) -> Self {
        self.state_repository = Some(state_repository);
        self
    }

    pub fn with_schema_validator(mut self, schema_validator: Arc<dyn JsonSchemaValidator>) -> Self {
        self.schema_validator = Some(schema_validator);
        self
    }

    pub fn with_signature_verifier(mut self, signature_verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.signature_verifier = Some(signature_verifier);
        self
    }

    pub fn with_data_trigger_registry(mut self, registry: DataTriggerRegistry) -> Self {
        self.data_trigger_registry = registry;
        self
    }

    pub fn with_fee_calculator(mut self, fee_calculator: FeeCalculator) -> Self {
        self.fee_calculator = Some(fee_calculator);
        self
    }

    pub fn with_config(mut self, config: ValidationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<StateTransitionProcessor<SR>, Error> {
        let state_repository = self.state_repository.ok_or_else(|| Error::Configuration {
            reason: "State repository not set".to_string(),
        })?;
        let schema_validator = self.schema_validator.ok_or_else(|| Error::Configuration {
            reason: "Schema validator not set".to_string(),
        })?;
        let signature_verifier = self.signature_verifier.ok_or_else(|| Error::Configuration {
            reason: "Signature verifier not set".to_string(),
        })?;
        let fee_calculator = self.fee_calculator.unwrap_or_else(default_fee_calculator);
        let config = self.config;

        let structure_validator =
            StructureValidator::new(state_repository.clone(), schema_validator, config.clone());
        let data_trigger_engine = DataTriggerEngine::new(Arc::new(self.data_trigger_registry));

        Ok(StateTransitionProcessor {
            factory: StateTransitionFactory::new(state_repository.clone(), structure_validator),
            signature_validator: SignatureValidator::new(
                state_repository.clone(),
                signature_verifier,
                config.clone(),
            ),
            state_validator: StateValidator::new(state_repository.clone(), data_trigger_engine, config.clone()),
            fee_validator: FeeValidator::new(state_repository.clone(), config.clone(), fee_calculator),
            applier: StateTransitionApplier::new(state_repository, config),
        })
    }
}

impl<SR: StateRepository> Default for StateTransitionProcessorBuilder<SR> {
    fn default() -> Self {
        Self::new()
    }
}
