//! SupersessionEngine - replaces documents and walks their lineage.
//!
//! `supersede` retires the old row and activates its replacement in one
//! transaction. Chain queries fetch a bounded neighbourhood of the start
//! document in a single ledger call and walk it in memory.

use std::sync::Arc;

use crate::application::audit::AuditEmitter;
use crate::application::linker::linked_event;
use crate::application::registrar::{lock_existing, register_in};
use crate::application::transaction::{finish, release};
use crate::config::LineageConfig;
use crate::domain::audit::{AuditAction, DocumentAuditEvent};
use crate::domain::document::{Document, DocumentDraft, DocumentError};
use crate::domain::foundation::{CommandMetadata, DocumentId, Timestamp, ValidationError};
use crate::domain::lineage::SupersessionGraph;
use crate::ports::{DocumentLedger, EventPublisher, LedgerTransaction, RelationUpsert};

const OPERATION: &str = "supersede";

#[derive(Clone)]
pub struct SupersessionEngine {
    ledger: Arc<dyn DocumentLedger>,
    audit: AuditEmitter,
    max_chain_depth: u32,
}

impl SupersessionEngine {
    pub fn new(
        ledger: Arc<dyn DocumentLedger>,
        publisher: Arc<dyn EventPublisher>,
        config: &LineageConfig,
    ) -> Self {
        Self {
            ledger,
            audit: AuditEmitter::new(publisher),
            max_chain_depth: config.max_chain_depth,
        }
    }

    pub fn max_chain_depth(&self) -> u32 {
        self.max_chain_depth
    }

    /// Replaces `old_id` with a new document built from `replacement`.
    ///
    /// The old row is deactivated, marked Superseded and pointed at the new
    /// row; the new row is inserted active with its OWNERSHIP relation. A
    /// failure in any step rolls back all of them.
    pub async fn supersede(
        &self,
        meta: &CommandMetadata,
        old_id: DocumentId,
        replacement: DocumentDraft,
        reason: &str,
    ) -> Result<Document, DocumentError> {
        let mut tx = self.ledger.begin().await?;
        let result = supersede_in(tx.as_mut(), meta, old_id, replacement, reason).await;
        let (old, new, ownership) = finish(tx, result).await?;

        tracing::info!(
            old_id = %old_id,
            new_id = %new.id(),
            slot = %new.slot(),
            "document superseded"
        );

        let mut superseded = DocumentAuditEvent::for_document(
            AuditAction::Superseded,
            meta.tenant_id.clone(),
            old.id(),
            meta.actor.clone(),
            old.updated_at(),
        )
        .with_related(new.id());
        if let Some(reason) = old.supersession_reason() {
            superseded = superseded.with_reason(reason);
        }
        let created = DocumentAuditEvent::for_document(
            AuditAction::Created,
            meta.tenant_id.clone(),
            new.id(),
            meta.actor.clone(),
            new.created_at(),
        )
        .with_entity(new.owner().clone())
        .with_related(old.id());

        let mut events = vec![superseded, created];
        events.extend(linked_event(meta, &ownership));
        self.audit.emit(meta, events).await;
        Ok(new)
    }

    /// `id` followed by each successor, oldest to newest.
    pub async fn forward_chain(
        &self,
        meta: &CommandMetadata,
        id: DocumentId,
    ) -> Result<Vec<Document>, DocumentError> {
        self.graph(meta, id).await?.forward(id, self.max_chain_depth)
    }

    /// `id` followed by each predecessor, newest to oldest.
    pub async fn backward_chain(
        &self,
        meta: &CommandMetadata,
        id: DocumentId,
    ) -> Result<Vec<Document>, DocumentError> {
        self.graph(meta, id).await?.backward(id, self.max_chain_depth)
    }

    /// The whole lineage through `id`, oldest to newest.
    pub async fn complete_chain(
        &self,
        meta: &CommandMetadata,
        id: DocumentId,
    ) -> Result<Vec<Document>, DocumentError> {
        self.graph(meta, id).await?.complete(id, self.max_chain_depth)
    }

    /// The newest document in the lineage that starts at `id`.
    pub async fn current_version(
        &self,
        meta: &CommandMetadata,
        id: DocumentId,
    ) -> Result<Document, DocumentError> {
        self.forward_chain(meta, id)
            .await?
            .pop()
            .ok_or_else(|| DocumentError::document_not_found(id))
    }

    async fn graph(&self, meta: &CommandMetadata, id: DocumentId) -> Result<SupersessionGraph, DocumentError> {
        let mut tx = self.ledger.begin().await?;
        let result = tx
            .supersession_neighbourhood(&meta.tenant_id, id, self.max_chain_depth)
            .await;
        let documents = release(tx, result).await?;
        tracing::debug!(document_id = %id, fetched = documents.len(), "lineage neighbourhood loaded");
        Ok(SupersessionGraph::from_documents(documents))
    }
}

async fn supersede_in(
    tx: &mut dyn LedgerTransaction,
    meta: &CommandMetadata,
    old_id: DocumentId,
    replacement: DocumentDraft,
    reason: &str,
) -> Result<(Document, Document, RelationUpsert), DocumentError> {
    let now = Timestamp::now();
    let mut old = lock_existing(tx, &meta.tenant_id, old_id)
        .await
        .map_err(|e| e.abort_step(OPERATION))?;

    if replacement.owner != *old.owner() || replacement.document_type != old.document_type() {
        return Err(ValidationError::invalid_format(
            "replacement",
            format!("replacement must be a {} for {}", old.document_type(), old.owner()),
        )
        .into());
    }

    let new = Document::new(meta.tenant_id.clone(), replacement, now);
    old.mark_superseded(new.id(), reason, now)?;

    tx.update_document(&old)
        .await
        .map_err(|e| e.abort_step(OPERATION))?;
    let ownership = register_in(tx, &new, &meta.actor)
        .await
        .map_err(|e| e.abort_step(OPERATION))?;

    Ok((old, new, ownership))
}
