//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be at most {max} bytes, got {actual}")]
    TooLong {
        field: String,
        max: usize,
        actual: usize,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates a length validation error.
    pub fn too_long(field: impl Into<String>, max: usize, actual: usize) -> Self {
        ValidationError::TooLong {
            field: field.into(),
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid state transition error.
    pub fn invalid_transition(from: impl fmt::Debug, to: impl fmt::Debug) -> Self {
        ValidationError::InvalidTransition {
            from: format!("{:?}", from),
            to: format!("{:?}", to),
        }
    }
}

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,

    // Not found errors
    DocumentNotFound,
    RelationNotFound,
    EntityNotFound,

    // Invariant / conflict errors
    DuplicateActiveDocument,
    RelationConflict,
    TransactionAborted,

    // Lineage errors
    ChainCycleDetected,
    ChainDepthExceeded,

    // Infrastructure errors
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    /// Returns true if a caller may retry after re-reading state.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::DuplicateActiveDocument
                | ErrorCode::RelationConflict
                | ErrorCode::TransactionAborted
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::DocumentNotFound => "DOCUMENT_NOT_FOUND",
            ErrorCode::RelationNotFound => "RELATION_NOT_FOUND",
            ErrorCode::EntityNotFound => "ENTITY_NOT_FOUND",
            ErrorCode::DuplicateActiveDocument => "DUPLICATE_ACTIVE_DOCUMENT",
            ErrorCode::RelationConflict => "RELATION_CONFLICT",
            ErrorCode::TransactionAborted => "TRANSACTION_ABORTED",
            ErrorCode::ChainCycleDetected => "CHAIN_CYCLE_DETECTED",
            ErrorCode::ChainDepthExceeded => "CHAIN_DEPTH_EXCEEDED",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
///
/// This is the shape the API layer renders; module errors such as
/// `DocumentError` convert into it.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::ValidationFailed,
            message: message.into(),
            details: HashMap::new(),
        }
        .with_detail("field", field.into())
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Returns true if the caller may retry.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        DomainError::new(ErrorCode::ValidationFailed, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_empty_field_displays_correctly() {
        let err = ValidationError::empty_field("file_ref");
        assert_eq!(format!("{}", err), "Field 'file_ref' cannot be empty");
    }

    #[test]
    fn validation_error_too_long_displays_correctly() {
        let err = ValidationError::too_long("file_ref", 1024, 2000);
        assert_eq!(
            format!("{}", err),
            "Field 'file_ref' must be at most 1024 bytes, got 2000"
        );
    }

    #[test]
    fn invalid_transition_uses_debug_names() {
        #[derive(Debug)]
        enum S {
            Pending,
            Superseded,
        }
        let err = ValidationError::invalid_transition(S::Superseded, S::Pending);
        assert_eq!(format!("{}", err), "Cannot transition from Superseded to Pending");
    }

    #[test]
    fn domain_error_displays_code_and_message() {
        let err = DomainError::new(ErrorCode::DocumentNotFound, "Document not found");
        assert_eq!(format!("{}", err), "[DOCUMENT_NOT_FOUND] Document not found");
    }

    #[test]
    fn domain_error_with_detail_adds_detail() {
        let err = DomainError::validation("owner", "unknown owner").with_detail("kind", "applicant");

        assert_eq!(err.details.get("field"), Some(&"owner".to_string()));
        assert_eq!(err.details.get("kind"), Some(&"applicant".to_string()));
    }

    #[test]
    fn conflict_codes_are_retryable_validation_is_not() {
        assert!(ErrorCode::DuplicateActiveDocument.is_retryable());
        assert!(ErrorCode::RelationConflict.is_retryable());
        assert!(ErrorCode::TransactionAborted.is_retryable());
        assert!(!ErrorCode::ValidationFailed.is_retryable());
        assert!(!ErrorCode::ChainDepthExceeded.is_retryable());
    }
}
