//! Per-transition execution context
//!
//! One context is created for each validated transition and threaded by
//! mutable reference through every stage and repository call. It is never
//! stored globally, so several transitions can validate concurrently.

use serde::{Deserialize, Serialize};
use crate::identity::KeyType;
use crate::types::Credits;

/// Fee-relevant operation performed while validating or applying
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Read { key_size: usize, value_size: usize },
    Create { key_size: usize, value_size: usize },
    Update { key_size: usize, value_size: usize },
    Delete { key_size: usize, value_size: usize },
    SignatureVerification { key_type: KeyType },
    /// Costs computed outside the engine
    PreCalculated { storage_cost: Credits, processing_cost: Credits },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    operations: Vec<Operation>,
    dry_run: bool,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for fee estimation: ledger-dependent checks are skipped and
    /// repositories must not persist writes
    pub fn dry_run() -> Self {
        Self {
            operations: Vec::new(),
            dry_run: true,
        }
    }

    pub fn builder() -> ExecutionContextBuilder {
        ExecutionContextBuilder::new()
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn add_operation(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    pub fn add_operations(&mut self, operations: impl IntoIterator<Item = Operation>) {
        self.operations.extend(operations);
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn take_operations(&mut self) -> Vec<Operation> {
        std::mem::take(&mut self.operations)
    }
}

/// Builder for execution contexts
#[derive(Debug, Default)]
pub struct ExecutionContextBuilder {
    operations: Vec<Operation>,
    dry_run: bool,
}

impl ExecutionContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Seed the context with already-known operations
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn build(self) -> ExecutionContext {
        ExecutionContext {
            operations: self.operations,
            dry_run: self.dry_run,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let context = ExecutionContext::builder()
            .with_dry_run(true)
            .with_operation(Operation::PreCalculated { storage_cost: 1, processing_cost: 2 })
            .build();

        assert!(context.is_dry_run());
        assert_eq!(context.operations().len(), 1);
    }

    #[test]
    fn test_dry_run_is_fixed_at_construction() {
        assert!(ExecutionContext::dry_run().is_dry_run());
        assert!(!ExecutionContext::new().is_dry_run());
        assert!(!ExecutionContext::builder().build().is_dry_run());
    }

    #[test]
    fn test_take_operations_empties_context() {
        let mut context = ExecutionContext::new();
        context.add_operation(Operation::Read { key_size: 32, value_size: 10 });
        let taken = context.take_operations();

        assert_eq!(taken.len(), 1);
        assert!(context.operations().is_empty());
    }
}
