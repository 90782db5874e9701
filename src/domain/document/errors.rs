//! Document lifecycle error types.

use thiserror::Error;

use crate::domain::foundation::{DocumentId, DomainError, EntityRef, ErrorCode, ValidationError};

use super::DocumentType;

/// Errors surfaced by every document lifecycle operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// Malformed owner, type, file reference, or an illegal status move.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Another document is already active for the same slot.
    #[error("an active {document_type} document already exists for {owner}")]
    DuplicateActiveDocument {
        owner: EntityRef,
        document_type: DocumentType,
    },

    #[error("supersession chain revisits document {document_id}")]
    ChainCycleDetected { document_id: DocumentId },

    #[error("supersession chain from {start} exceeds {max_depth} links")]
    ChainDepthExceeded { start: DocumentId, max_depth: u32 },

    /// Transient constraint violation on a relation upsert. Retry.
    #[error("relation upsert conflicted for document {document_id}: {reason}")]
    RelationConflict {
        document_id: DocumentId,
        reason: String,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A step of a multi-step operation failed and everything was rolled back.
    #[error("{operation} aborted and rolled back: {reason}")]
    TransactionAborted {
        operation: &'static str,
        reason: String,
    },

    #[error("storage failure: {0}")]
    Storage(String),
}

impl DocumentError {
    pub fn duplicate_active(owner: &EntityRef, document_type: DocumentType) -> Self {
        DocumentError::DuplicateActiveDocument {
            owner: owner.clone(),
            document_type,
        }
    }

    pub fn document_not_found(id: DocumentId) -> Self {
        DocumentError::NotFound {
            entity: "document",
            id: id.to_string(),
        }
    }

    pub fn relation_not_found(id: impl ToString) -> Self {
        DocumentError::NotFound {
            entity: "relation",
            id: id.to_string(),
        }
    }

    pub fn entity_not_found(reference: &EntityRef) -> Self {
        DocumentError::NotFound {
            entity: "entity",
            id: reference.to_string(),
        }
    }

    pub fn relation_conflict(document_id: DocumentId, reason: impl Into<String>) -> Self {
        DocumentError::RelationConflict {
            document_id,
            reason: reason.into(),
        }
    }

    pub fn aborted(operation: &'static str, reason: impl Into<String>) -> Self {
        DocumentError::TransactionAborted {
            operation,
            reason: reason.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        DocumentError::Storage(message.into())
    }

    /// Rewraps a failed step of `operation` as `TransactionAborted`.
    ///
    /// Errors that already describe the outcome precisely (validation,
    /// missing rows, uniqueness races, existing aborts) pass through.
    pub fn abort_step(self, operation: &'static str) -> Self {
        match self {
            DocumentError::Storage(reason) => DocumentError::aborted(operation, reason),
            DocumentError::RelationConflict { reason, .. } => {
                DocumentError::aborted(operation, format!("relation conflict: {}", reason))
            }
            other => other,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            DocumentError::Validation(_) => ErrorCode::ValidationFailed,
            DocumentError::DuplicateActiveDocument { .. } => ErrorCode::DuplicateActiveDocument,
            DocumentError::ChainCycleDetected { .. } => ErrorCode::ChainCycleDetected,
            DocumentError::ChainDepthExceeded { .. } => ErrorCode::ChainDepthExceeded,
            DocumentError::RelationConflict { .. } => ErrorCode::RelationConflict,
            DocumentError::NotFound { entity, .. } => match *entity {
                "document" => ErrorCode::DocumentNotFound,
                "relation" => ErrorCode::RelationNotFound,
                _ => ErrorCode::EntityNotFound,
            },
            DocumentError::TransactionAborted { .. } => ErrorCode::TransactionAborted,
            DocumentError::Storage(_) => ErrorCode::DatabaseError,
        }
    }

    /// Conflict-class errors may be retried after re-reading state.
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

impl From<DocumentError> for DomainError {
    fn from(err: DocumentError) -> Self {
        let code = err.code();
        let base = DomainError::new(code, err.to_string());
        match err {
            DocumentError::DuplicateActiveDocument {
                owner,
                document_type,
            } => base
                .with_detail("owner", owner.to_string())
                .with_detail("document_type", document_type.as_str()),
            DocumentError::ChainCycleDetected { document_id } => {
                base.with_detail("document_id", document_id.to_string())
            }
            DocumentError::ChainDepthExceeded { start, max_depth } => base
                .with_detail("document_id", start.to_string())
                .with_detail("max_depth", max_depth.to_string()),
            DocumentError::TransactionAborted { operation, .. } => {
                base.with_detail("operation", operation)
            }
            _ => base,
        }
    }
}
