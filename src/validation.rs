//! Validation results

use crate::consensus::ConsensusError;

/// Ordered list of consensus errors with an optional payload for later stages
///
/// A result is valid if and only if it carries no errors. The payload lets a
/// stage hand resolved data (for example a fetched data contract) to the next
/// stage without refetching it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult<T = ()> {
    errors: Vec<ConsensusError>,
    data: Option<T>,
}

pub type SimpleValidationResult = ValidationResult<()>;

impl<T> Default for ValidationResult<T> {
    fn default() -> Self {
        Self {
            errors: Vec::new(),
            data: None,
        }
    }
}

impl<T> ValidationResult<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_data(data: T) -> Self {
        Self {
            errors: Vec::new(),
            data: Some(data),
        }
    }

    pub fn new_with_errors(errors: Vec<ConsensusError>) -> Self {
        Self { errors, data: None }
    }

    pub fn new_with_error(error: ConsensusError) -> Self {
        Self::new_with_errors(vec![error])
    }

    pub fn add_error(&mut self, error: ConsensusError) {
        self.errors.push(error);
    }

    pub fn add_errors(&mut self, errors: impl IntoIterator<Item = ConsensusError>) {
        self.errors.extend(errors);
    }

    /// Append the errors of another result, keeping this result's payload
    pub fn merge<U>(&mut self, other: ValidationResult<U>) {
        self.errors.extend(other.errors);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ConsensusError] {
        &self.errors
    }

    pub fn first_error(&self) -> Option<&ConsensusError> {
        self.errors.first()
    }

    /// Codes of all errors, in order
    pub fn error_codes(&self) -> Vec<u32> {
        self.errors.iter().map(ConsensusError::code).collect()
    }

    pub fn into_errors(self) -> Vec<ConsensusError> {
        self.errors
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn set_data(&mut self, data: T) {
        self.data = Some(data);
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    /// Drop the payload, keeping the errors
    pub fn without_data(self) -> SimpleValidationResult {
        ValidationResult {
            errors: self.errors,
            data: None,
        }
    }
}

impl<T> From<ConsensusError> for ValidationResult<T> {
    fn from(error: ConsensusError) -> Self {
        Self::new_with_error(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Identifier;

    #[test]
    fn test_empty_result_is_valid() {
        let result = SimpleValidationResult::new();
        assert!(result.is_valid());
        assert!(result.first_error().is_none());
    }

    #[test]
    fn test_merge_preserves_order_and_payload() {
        let mut result = ValidationResult::new_with_data(5u32);
        result.add_error(ConsensusError::MissingDataContractId);

        let mut other = SimpleValidationResult::new();
        other.add_error(ConsensusError::DocumentNotFound { document_id: Identifier::default() });
        result.merge(other);

        assert!(!result.is_valid());
        assert_eq!(result.error_codes(), vec![1025, 4005]);
        assert_eq!(result.data(), Some(&5));
    }
}
