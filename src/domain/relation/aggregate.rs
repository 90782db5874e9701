//! DocumentRelation - a soft-deletable link between a document and an entity.
//!
//! Relations are append-only history. Revoking sets `revoked_at` and the row
//! stays forever; every read path filters revoked rows explicitly.

use serde::{Deserialize, Serialize};

use crate::domain::document::Document;
use crate::domain::foundation::{
    ActorId, DocumentId, EntityRef, RelationId, TenantId, Timestamp, ValidationError,
};

use super::RelationContext;

/// Maximum length for relation notes.
pub const MAX_NOTES_LENGTH: usize = 2000;

/// Uniqueness key among non-revoked relations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationKey {
    pub document_id: DocumentId,
    pub related: EntityRef,
    pub context: RelationContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRelation {
    id: RelationId,
    tenant_id: TenantId,
    document_id: DocumentId,
    related: EntityRef,
    context: RelationContext,
    created_by: Option<ActorId>,
    notes: Option<String>,
    created_at: Timestamp,
    revoked_at: Option<Timestamp>,
    revoked_by: Option<ActorId>,
}

impl DocumentRelation {
    /// Creates a live relation.
    pub fn new(
        tenant_id: TenantId,
        document_id: DocumentId,
        related: EntityRef,
        context: RelationContext,
        created_by: Option<ActorId>,
        notes: Option<String>,
        at: Timestamp,
    ) -> Result<Self, ValidationError> {
        let notes = match notes {
            Some(n) if n.len() > MAX_NOTES_LENGTH => {
                return Err(ValidationError::too_long("notes", MAX_NOTES_LENGTH, n.len()))
            }
            Some(n) if n.trim().is_empty() => None,
            other => other,
        };
        Ok(Self {
            id: RelationId::new(),
            tenant_id,
            document_id,
            related,
            context,
            created_by,
            notes,
            created_at: at,
            revoked_at: None,
            revoked_by: None,
        })
    }

    /// Reconstitute a relation from persistence (no validation).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: RelationId,
        tenant_id: TenantId,
        document_id: DocumentId,
        related: EntityRef,
        context: RelationContext,
        created_by: Option<ActorId>,
        notes: Option<String>,
        created_at: Timestamp,
        revoked_at: Option<Timestamp>,
        revoked_by: Option<ActorId>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            document_id,
            related,
            context,
            created_by,
            notes,
            created_at,
            revoked_at,
            revoked_by,
        }
    }

    pub fn id(&self) -> RelationId {
        self.id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn related(&self) -> &EntityRef {
        &self.related
    }

    pub fn context(&self) -> RelationContext {
        self.context
    }

    pub fn created_by(&self) -> Option<&ActorId> {
        self.created_by.as_ref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn revoked_at(&self) -> Option<Timestamp> {
        self.revoked_at
    }

    pub fn revoked_by(&self) -> Option<&ActorId> {
        self.revoked_by.as_ref()
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn key(&self) -> RelationKey {
        RelationKey {
            document_id: self.document_id,
            related: self.related.clone(),
            context: self.context,
        }
    }

    /// Soft-deletes the relation. Returns false if it was already revoked.
    pub fn revoke(&mut self, by: ActorId, at: Timestamp) -> bool {
        if self.is_revoked() {
            return false;
        }
        self.revoked_at = Some(at);
        self.revoked_by = Some(by);
        true
    }
}

/// A live relation paired with the document it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedDocument {
    pub relation: DocumentRelation,
    pub document: Document,
}
