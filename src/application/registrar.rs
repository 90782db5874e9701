//! DocumentRegistrar - creation, review and activation of documents.
//!
//! Every write keeps at most one active document per (tenant, owner, type).
//! The registrar checks that inside its transaction; the ledger re-checks it
//! at commit, so a concurrent writer that got there first still wins.

use std::sync::Arc;

use crate::application::audit::AuditEmitter;
use crate::application::linker::{linked_event, upsert_link};
use crate::application::transaction::{finish, release};
use crate::domain::audit::{AuditAction, DocumentAuditEvent};
use crate::domain::document::{Document, DocumentDraft, DocumentError, DocumentType, FileRef};
use crate::domain::foundation::{
    ActorId, CommandMetadata, DocumentId, EntityKindRegistry, EntityRef, TenantId, Timestamp,
};
use crate::domain::relation::RelationContext;
use crate::ports::{DocumentLedger, EntityDirectory, EventPublisher, LedgerTransaction, RelationUpsert};

/// Inserts a fresh active document and its OWNERSHIP relation.
///
/// Fails with `DuplicateActiveDocument` if the slot already has an active
/// document visible to this transaction.
pub(crate) async fn register_in(
    tx: &mut dyn LedgerTransaction,
    document: &Document,
    actor: &ActorId,
) -> Result<RelationUpsert, DocumentError> {
    let slot = document.slot();
    if !tx.lock_active_in_slot(&slot).await?.is_empty() {
        return Err(DocumentError::duplicate_active(&slot.owner, slot.document_type));
    }
    tx.insert_document(document).await?;
    upsert_link(
        tx,
        document,
        document.owner(),
        RelationContext::Ownership,
        Some(actor.clone()),
        None,
        document.created_at(),
    )
    .await
}

pub(crate) async fn lock_existing(
    tx: &mut dyn LedgerTransaction,
    tenant: &TenantId,
    id: DocumentId,
) -> Result<Document, DocumentError> {
    tx.lock_document(tenant, id)
        .await?
        .ok_or_else(|| DocumentError::document_not_found(id))
}

fn document_event(meta: &CommandMetadata, action: AuditAction, document: &Document) -> DocumentAuditEvent {
    DocumentAuditEvent::for_document(
        action,
        meta.tenant_id.clone(),
        document.id(),
        meta.actor.clone(),
        document.updated_at(),
    )
}

#[derive(Clone)]
pub struct DocumentRegistrar {
    ledger: Arc<dyn DocumentLedger>,
    directory: Arc<dyn EntityDirectory>,
    registry: EntityKindRegistry,
    audit: AuditEmitter,
}

impl DocumentRegistrar {
    pub fn new(
        ledger: Arc<dyn DocumentLedger>,
        directory: Arc<dyn EntityDirectory>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            ledger,
            directory,
            registry: EntityKindRegistry::default(),
            audit: AuditEmitter::new(publisher),
        }
    }

    pub fn with_registry(mut self, registry: EntityKindRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Registers a new pending, active document for `owner`.
    pub async fn create(
        &self,
        meta: &CommandMetadata,
        owner: EntityRef,
        document_type: DocumentType,
        file_ref: FileRef,
    ) -> Result<Document, DocumentError> {
        self.registry.validate(&owner)?;
        if !self.directory.exists(&meta.tenant_id, &owner).await? {
            return Err(DocumentError::entity_not_found(&owner));
        }

        let document = Document::new(
            meta.tenant_id.clone(),
            DocumentDraft::new(owner, document_type, file_ref),
            Timestamp::now(),
        );

        let mut tx = self.ledger.begin().await?;
        let result = register_in(tx.as_mut(), &document, &meta.actor).await;
        let ownership = finish(tx, result).await?;

        tracing::info!(
            document_id = %document.id(),
            slot = %document.slot(),
            "document created"
        );

        let mut events = vec![
            document_event(meta, AuditAction::Created, &document).with_entity(document.owner().clone()),
        ];
        events.extend(linked_event(meta, &ownership));
        self.audit.emit(meta, events).await;
        Ok(document)
    }

    pub async fn approve(&self, meta: &CommandMetadata, id: DocumentId) -> Result<Document, DocumentError> {
        let mut tx = self.ledger.begin().await?;
        let result = approve_in(tx.as_mut(), meta, id).await;
        let document = finish(tx, result).await?;

        tracing::info!(document_id = %id, reviewer = %meta.actor, "document approved");
        self.audit
            .emit(meta, vec![document_event(meta, AuditAction::Approved, &document)])
            .await;
        Ok(document)
    }

    pub async fn reject(
        &self,
        meta: &CommandMetadata,
        id: DocumentId,
        reason: &str,
    ) -> Result<Document, DocumentError> {
        let mut tx = self.ledger.begin().await?;
        let result = reject_in(tx.as_mut(), meta, id, reason).await;
        let document = finish(tx, result).await?;

        tracing::info!(document_id = %id, reviewer = %meta.actor, "document rejected");
        let mut event = document_event(meta, AuditAction::Rejected, &document);
        if let Some(reason) = document.rejection_reason() {
            event = event.with_reason(reason);
        }
        self.audit.emit(meta, vec![event]).await;
        Ok(document)
    }

    /// Makes `id` the active document of its slot, deactivating whichever
    /// document held the slot. A no-op if `id` is already active.
    pub async fn activate(&self, meta: &CommandMetadata, id: DocumentId) -> Result<Document, DocumentError> {
        let mut tx = self.ledger.begin().await?;
        let result = activate_in(tx.as_mut(), meta, id).await;
        let (document, displaced) = finish(tx, result).await?;

        let Some(displaced) = displaced else {
            tracing::debug!(document_id = %id, "document already active");
            return Ok(document);
        };

        tracing::info!(
            document_id = %id,
            displaced = displaced.len(),
            "document activated"
        );
        let mut activated = document_event(meta, AuditAction::Activated, &document);
        for other in &displaced {
            activated = activated.with_related(other.id());
        }
        let mut events: Vec<_> = displaced
            .iter()
            .map(|other| document_event(meta, AuditAction::Deactivated, other).with_related(id))
            .collect();
        events.push(activated);
        self.audit.emit(meta, events).await;
        Ok(document)
    }

    /// Closes the document's validity window. A no-op if already inactive.
    pub async fn deactivate(&self, meta: &CommandMetadata, id: DocumentId) -> Result<Document, DocumentError> {
        let mut tx = self.ledger.begin().await?;
        let result = deactivate_in(tx.as_mut(), meta, id).await;
        let (document, changed) = finish(tx, result).await?;

        if changed {
            tracing::info!(document_id = %id, "document deactivated");
            self.audit
                .emit(meta, vec![document_event(meta, AuditAction::Deactivated, &document)])
                .await;
        }
        Ok(document)
    }

    pub async fn find(&self, meta: &CommandMetadata, id: DocumentId) -> Result<Document, DocumentError> {
        let mut tx = self.ledger.begin().await?;
        let result = tx
            .find_document(&meta.tenant_id, id)
            .await
            .and_then(|found| found.ok_or_else(|| DocumentError::document_not_found(id)));
        release(tx, result).await
    }

    /// The active document for (owner, type), if any.
    pub async fn active_document(
        &self,
        meta: &CommandMetadata,
        owner: &EntityRef,
        document_type: DocumentType,
    ) -> Result<Option<Document>, DocumentError> {
        let documents = self.documents_for_owner(meta, owner).await?;
        Ok(documents
            .into_iter()
            .find(|d| d.is_active() && d.document_type() == document_type))
    }

    /// Every document of `owner`, newest first.
    pub async fn documents_for_owner(
        &self,
        meta: &CommandMetadata,
        owner: &EntityRef,
    ) -> Result<Vec<Document>, DocumentError> {
        let mut tx = self.ledger.begin().await?;
        let result = tx.documents_for_owner(&meta.tenant_id, owner).await;
        release(tx, result).await
    }
}

async fn approve_in(
    tx: &mut dyn LedgerTransaction,
    meta: &CommandMetadata,
    id: DocumentId,
) -> Result<Document, DocumentError> {
    let mut document = lock_existing(tx, &meta.tenant_id, id).await?;
    document.approve(meta.actor.clone(), Timestamp::now())?;
    tx.update_document(&document).await?;
    Ok(document)
}

async fn reject_in(
    tx: &mut dyn LedgerTransaction,
    meta: &CommandMetadata,
    id: DocumentId,
    reason: &str,
) -> Result<Document, DocumentError> {
    let mut document = lock_existing(tx, &meta.tenant_id, id).await?;
    document.reject(meta.actor.clone(), reason, Timestamp::now())?;
    tx.update_document(&document).await?;
    Ok(document)
}

/// Returns the activated document and the documents it displaced, or `None`
/// for the displaced list when nothing changed.
async fn activate_in(
    tx: &mut dyn LedgerTransaction,
    meta: &CommandMetadata,
    id: DocumentId,
) -> Result<(Document, Option<Vec<Document>>), DocumentError> {
    let now = Timestamp::now();
    let mut document = lock_existing(tx, &meta.tenant_id, id).await?;
    if !document.activate(now)? {
        return Ok((document, None));
    }

    let mut displaced = Vec::new();
    for mut other in tx.lock_active_in_slot(&document.slot()).await? {
        if other.id() == id {
            continue;
        }
        other.deactivate(now);
        tx.update_document(&other).await?;
        displaced.push(other);
    }
    tx.update_document(&document).await?;
    Ok((document, Some(displaced)))
}

async fn deactivate_in(
    tx: &mut dyn LedgerTransaction,
    meta: &CommandMetadata,
    id: DocumentId,
) -> Result<(Document, bool), DocumentError> {
    let mut document = lock_existing(tx, &meta.tenant_id, id).await?;
    let changed = document.deactivate(Timestamp::now());
    if changed {
        tx.update_document(&document).await?;
    }
    Ok((document, changed))
}
