//! Deterministic validation log
//!
//! Each processed transition gets a [`ValidationLog`] recording what every
//! stage concluded. Entries depend only on the transition and ledger state, so
//! two nodes processing the same input produce identical logs. Records are
//! mirrored to `tracing` for operators.

use serde::{Deserialize, Serialize};
use std::fmt;
use crate::validation::ValidationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Pipeline stage a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Structure,
    Signature,
    State,
    Fee,
    Apply,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Structure => "structure",
            Stage::Signature => "signature",
            Stage::State => "state",
            Stage::Fee => "fee",
            Stage::Apply => "apply",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Accepted,
    Rejected,
    /// Fatal error, the pipeline stopped
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    pub stage: Stage,
    pub level: LogLevel,
    pub outcome: Outcome,
    pub error_codes: Vec<u32>,
    /// Operations recorded in the execution context when the stage finished
    pub operation_count: usize,
    pub message: Option<String>,
}

impl StageRecord {
    pub fn new(stage: Stage, outcome: Outcome, operation_count: usize) -> Self {
        let level = match outcome {
            Outcome::Accepted => LogLevel::Info,
            Outcome::Rejected => LogLevel::Warn,
            Outcome::Failed => LogLevel::Error,
        };
        Self {
            stage,
            level,
            outcome,
            error_codes: Vec::new(),
            operation_count,
            message: None,
        }
    }

    pub fn with_error_codes(mut self, error_codes: Vec<u32>) -> Self {
        self.error_codes = error_codes;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationLog {
    records: Vec<StageRecord>,
    min_level: LogLevel,
}

impl ValidationLog {
    pub fn new(min_level: LogLevel) -> Self {
        Self {
            records: Vec::new(),
            min_level,
        }
    }

    pub fn all() -> Self {
        Self::new(LogLevel::Trace)
    }

    pub fn log(&mut self, record: StageRecord) {
        match record.outcome {
            Outcome::Accepted => tracing::info!(stage = %record.stage, operations = record.operation_count, "stage accepted"),
            Outcome::Rejected => tracing::warn!(stage = %record.stage, errors = ?record.error_codes, "stage rejected"),
            Outcome::Failed => tracing::error!(stage = %record.stage, message = ?record.message, "stage failed"),
        }
        if record.level >= self.min_level {
            self.records.push(record);
        }
    }

    /// Record the outcome of a stage that produced a validation result
    pub fn record_result<T>(&mut self, stage: Stage, result: &ValidationResult<T>, operation_count: usize) {
        let record = if result.is_valid() {
            StageRecord::new(stage, Outcome::Accepted, operation_count)
        } else {
            StageRecord::new(stage, Outcome::Rejected, operation_count).with_error_codes(result.error_codes())
        };
        self.log(record);
    }

    pub fn record_failure(&mut self, stage: Stage, message: impl Into<String>, operation_count: usize) {
        self.log(StageRecord::new(stage, Outcome::Failed, operation_count).with_message(message));
    }

    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&StageRecord> {
        self.records.last()
    }

    pub fn filter_by_stage(&self, stage: Stage) -> Vec<&StageRecord> {
        self.records.iter().filter(|record| record.stage == stage).collect()
    }

    pub fn filter_by_level(&self, level: LogLevel) -> Vec<&StageRecord> {
        self.records.iter().filter(|record| record.level == level).collect()
    }
}

impl Default for ValidationLog {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}
