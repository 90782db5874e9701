//! RelationLinker - typed links between documents and the entities that
//! own, consume or cite them.
//!
//! Links are idempotent on (document, related entity, context): asking for a
//! link that is already live returns the existing row. Revocation is a soft
//! delete and nothing is ever removed physically.

use std::collections::HashSet;
use std::sync::Arc;

use crate::application::audit::AuditEmitter;
use crate::application::transaction::{finish, release};
use crate::domain::audit::{AuditAction, DocumentAuditEvent};
use crate::domain::document::{Document, DocumentError, DocumentType};
use crate::domain::foundation::{
    ActorId, CommandMetadata, DocumentId, EntityKindRegistry, EntityRef, RelationId, TenantId,
    Timestamp, ValidationError,
};
use crate::domain::relation::{DocumentRelation, LinkedDocument, RelationContext};
use crate::ports::{DocumentLedger, EventPublisher, LedgerTransaction, RelationUpsert};

/// A link that lost a commit race is retried once; the retry sees the
/// winner's row and returns it.
const LINK_ATTEMPTS: u32 = 2;

/// Inserts a relation for `document` unless an identical live one exists.
pub(crate) async fn upsert_link(
    tx: &mut dyn LedgerTransaction,
    document: &Document,
    related: &EntityRef,
    context: RelationContext,
    created_by: Option<ActorId>,
    notes: Option<String>,
    at: Timestamp,
) -> Result<RelationUpsert, DocumentError> {
    if context == RelationContext::Ownership && related != document.owner() {
        return Err(ValidationError::invalid_format(
            "related",
            format!("ownership target {} is not the owner {}", related, document.owner()),
        )
        .into());
    }
    let relation = DocumentRelation::new(
        document.tenant_id().clone(),
        document.id(),
        related.clone(),
        context,
        created_by,
        notes,
        at,
    )?;
    tx.upsert_relation(&relation).await
}

/// Audit event for a link that was actually created.
pub(crate) fn linked_event(
    meta: &CommandMetadata,
    upsert: &RelationUpsert,
) -> Option<DocumentAuditEvent> {
    if !upsert.created {
        return None;
    }
    let relation = &upsert.relation;
    Some(
        DocumentAuditEvent::for_document(
            AuditAction::RelationLinked,
            meta.tenant_id.clone(),
            relation.document_id(),
            meta.actor.clone(),
            relation.created_at(),
        )
        .with_entity(relation.related().clone())
        .with_related(relation.id())
        .with_reason(relation.context().as_str()),
    )
}

async fn load_document(
    tx: &mut dyn LedgerTransaction,
    tenant: &TenantId,
    id: DocumentId,
) -> Result<Document, DocumentError> {
    tx.find_document(tenant, id)
        .await?
        .ok_or_else(|| DocumentError::document_not_found(id))
}

#[derive(Clone)]
pub struct RelationLinker {
    ledger: Arc<dyn DocumentLedger>,
    registry: EntityKindRegistry,
    audit: AuditEmitter,
}

impl RelationLinker {
    pub fn new(ledger: Arc<dyn DocumentLedger>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            ledger,
            registry: EntityKindRegistry::default(),
            audit: AuditEmitter::new(publisher),
        }
    }

    pub fn with_registry(mut self, registry: EntityKindRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Links a document to its owner. The target must be the document's owner.
    pub async fn link_ownership(
        &self,
        meta: &CommandMetadata,
        document_id: DocumentId,
        owner: EntityRef,
    ) -> Result<DocumentRelation, DocumentError> {
        self.link(meta, document_id, owner, RelationContext::Ownership, Some(meta.actor.clone()), None)
            .await
    }

    /// Records that `consumer` relies on the document. `created_by` defaults
    /// to the acting identity.
    pub async fn link_usage(
        &self,
        meta: &CommandMetadata,
        document_id: DocumentId,
        consumer: EntityRef,
        created_by: Option<ActorId>,
    ) -> Result<DocumentRelation, DocumentError> {
        let created_by = created_by.unwrap_or_else(|| meta.actor.clone());
        self.link(meta, document_id, consumer, RelationContext::Usage, Some(created_by), None)
            .await
    }

    pub async fn link_reference(
        &self,
        meta: &CommandMetadata,
        document_id: DocumentId,
        related: EntityRef,
        notes: Option<String>,
    ) -> Result<DocumentRelation, DocumentError> {
        self.link(meta, document_id, related, RelationContext::Reference, Some(meta.actor.clone()), notes)
            .await
    }

    async fn link(
        &self,
        meta: &CommandMetadata,
        document_id: DocumentId,
        related: EntityRef,
        context: RelationContext,
        created_by: Option<ActorId>,
        notes: Option<String>,
    ) -> Result<DocumentRelation, DocumentError> {
        self.registry.validate(&related)?;

        let mut attempt = 1;
        let upsert = loop {
            let mut tx = self.ledger.begin().await?;
            let result = link_in(
                tx.as_mut(),
                meta,
                document_id,
                &related,
                context,
                created_by.clone(),
                notes.clone(),
            )
            .await;
            match finish(tx, result).await {
                Err(DocumentError::RelationConflict { .. }) if attempt < LINK_ATTEMPTS => {
                    tracing::debug!(document_id = %document_id, attempt, "relation link lost a race, retrying");
                    attempt += 1;
                }
                outcome => break outcome?,
            }
        };

        tracing::debug!(
            document_id = %document_id,
            related = %related,
            context = %context,
            created = upsert.created,
            "relation linked"
        );
        if let Some(event) = linked_event(meta, &upsert) {
            self.audit.emit(meta, vec![event]).await;
        }
        Ok(upsert.relation)
    }

    /// Soft-deletes a relation. Revoking an already revoked relation is a no-op.
    pub async fn revoke(
        &self,
        meta: &CommandMetadata,
        relation_id: RelationId,
    ) -> Result<DocumentRelation, DocumentError> {
        let mut tx = self.ledger.begin().await?;
        let result = revoke_in(tx.as_mut(), meta, relation_id).await;
        let (relation, revoked) = finish(tx, result).await?;

        if revoked {
            tracing::info!(relation_id = %relation_id, document_id = %relation.document_id(), "relation revoked");
            let event = DocumentAuditEvent::for_document(
                AuditAction::RelationRevoked,
                meta.tenant_id.clone(),
                relation.document_id(),
                meta.actor.clone(),
                relation.revoked_at().unwrap_or_else(Timestamp::now),
            )
            .with_entity(relation.related().clone())
            .with_related(relation.id());
            self.audit.emit(meta, vec![event]).await;
        }
        Ok(relation)
    }

    /// True iff every required type has a live USAGE link from `consumer`.
    pub async fn has_all_required(
        &self,
        meta: &CommandMetadata,
        consumer: &EntityRef,
        required_types: &[DocumentType],
    ) -> Result<bool, DocumentError> {
        Ok(self.missing_types(meta, consumer, required_types).await?.is_empty())
    }

    /// Required types with no live USAGE link from `consumer`, in the order
    /// given and without repeats.
    pub async fn missing_types(
        &self,
        meta: &CommandMetadata,
        consumer: &EntityRef,
        required_types: &[DocumentType],
    ) -> Result<Vec<DocumentType>, DocumentError> {
        let linked = self
            .linked_documents(meta, consumer, RelationContext::Usage)
            .await?;
        let covered: HashSet<DocumentType> =
            linked.iter().map(|l| l.document.document_type()).collect();

        let mut seen = HashSet::new();
        Ok(required_types
            .iter()
            .copied()
            .filter(|t| !covered.contains(t) && seen.insert(*t))
            .collect())
    }

    /// Live links from `entity` in `context`, with the documents they point at.
    pub async fn linked_documents(
        &self,
        meta: &CommandMetadata,
        entity: &EntityRef,
        context: RelationContext,
    ) -> Result<Vec<LinkedDocument>, DocumentError> {
        let mut tx = self.ledger.begin().await?;
        let result = tx
            .live_links_for_entity(&meta.tenant_id, entity, context)
            .await;
        release(tx, result).await
    }

    /// Every relation of a document, revoked ones included.
    pub async fn relations_for_document(
        &self,
        meta: &CommandMetadata,
        document_id: DocumentId,
    ) -> Result<Vec<DocumentRelation>, DocumentError> {
        let mut tx = self.ledger.begin().await?;
        let result = tx.relations_for_document(&meta.tenant_id, document_id).await;
        release(tx, result).await
    }
}

async fn link_in(
    tx: &mut dyn LedgerTransaction,
    meta: &CommandMetadata,
    document_id: DocumentId,
    related: &EntityRef,
    context: RelationContext,
    created_by: Option<ActorId>,
    notes: Option<String>,
) -> Result<RelationUpsert, DocumentError> {
    let document = load_document(tx, &meta.tenant_id, document_id).await?;
    upsert_link(tx, &document, related, context, created_by, notes, Timestamp::now()).await
}

async fn revoke_in(
    tx: &mut dyn LedgerTransaction,
    meta: &CommandMetadata,
    relation_id: RelationId,
) -> Result<(DocumentRelation, bool), DocumentError> {
    let mut relation = tx
        .lock_relation(&meta.tenant_id, relation_id)
        .await?
        .ok_or_else(|| DocumentError::relation_not_found(relation_id))?;
    let revoked = relation.revoke(meta.actor.clone(), Timestamp::now());
    if revoked {
        tx.update_relation(&relation).await?;
    }
    Ok((relation, revoked))
}
