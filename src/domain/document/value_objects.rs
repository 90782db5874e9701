//! Value objects for the document aggregate.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{EntityRef, TenantId, ValidationError};

use super::DocumentType;

/// Opaque pointer into the file-storage layer. Never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileRef(String);

impl FileRef {
    pub const MAX_LEN: usize = 1024;

    /// Creates a file reference, rejecting empty, overlong, or control-character values.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(ValidationError::empty_field("file_ref"));
        }
        if value.len() > Self::MAX_LEN {
            return Err(ValidationError::too_long("file_ref", Self::MAX_LEN, value.len()));
        }
        if value.chars().any(char::is_control) {
            return Err(ValidationError::invalid_format(
                "file_ref",
                "contains control characters",
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything needed to create a document row: who owns it, what it is,
/// and where its bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDraft {
    pub owner: EntityRef,
    pub document_type: DocumentType,
    pub file_ref: FileRef,
}

impl DocumentDraft {
    pub fn new(owner: EntityRef, document_type: DocumentType, file_ref: FileRef) -> Self {
        Self {
            owner,
            document_type,
            file_ref,
        }
    }
}

/// The (tenant, owner, type) key under which at most one document is active.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentSlot {
    pub tenant_id: TenantId,
    pub owner: EntityRef,
    pub document_type: DocumentType,
}

impl fmt::Display for DocumentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.tenant_id, self.owner, self.document_type)
    }
}
