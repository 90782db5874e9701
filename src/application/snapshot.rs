//! SnapshotService - freezes the documents a consumer relies on.
//!
//! A snapshot links every document of the consumer's owner that is active
//! and valid at the chosen instant to the consumer through a USAGE relation.
//! Those rows point at the exact document versions and are not touched when
//! the documents are later superseded.

use std::sync::Arc;

use crate::application::audit::AuditEmitter;
use crate::application::linker::{linked_event, upsert_link};
use crate::application::transaction::finish;
use crate::domain::audit::{AuditAction, DocumentAuditEvent};
use crate::domain::document::{Document, DocumentError};
use crate::domain::foundation::{CommandMetadata, EntityKindRegistry, EntityRef, Timestamp};
use crate::domain::relation::RelationContext;
use crate::ports::{DocumentLedger, EntityDirectory, EventPublisher, LedgerTransaction, RelationUpsert};

const OPERATION: &str = "create_snapshot";

#[derive(Clone)]
pub struct SnapshotService {
    ledger: Arc<dyn DocumentLedger>,
    directory: Arc<dyn EntityDirectory>,
    registry: EntityKindRegistry,
    audit: AuditEmitter,
}

impl SnapshotService {
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

    /// Links the owner's documents valid at `as_of` (default now) to
    /// `consumer` and returns how many were linked. All or nothing.
    pub async fn create_snapshot(
        &self,
        meta: &CommandMetadata,
        consumer: &EntityRef,
        as_of: Option<Timestamp>,
    ) -> Result<usize, DocumentError> {
        self.registry.validate(consumer)?;
        let owner = self
            .directory
            .owner_of(&meta.tenant_id, consumer)
            .await?
            .ok_or_else(|| DocumentError::entity_not_found(consumer))?;
        let as_of = as_of.unwrap_or_else(Timestamp::now);

        // A concurrent supersede must not leave the slot with neither version.
        let mut tx = self.ledger.begin_consistent().await?;
        let result = snapshot_in(tx.as_mut(), meta, &owner, consumer, as_of).await;
        let (documents, upserts) = finish(tx, result).await?;

        tracing::info!(
            consumer = %consumer,
            owner = %owner,
            documents = documents.len(),
            "snapshot created"
        );

        let summary = documents.iter().fold(
            DocumentAuditEvent::for_entity(
                AuditAction::SnapshotCreated,
                meta.tenant_id.clone(),
                consumer.clone(),
                meta.actor.clone(),
                Timestamp::now(),
            )
            .with_reason(format!("as of {as_of}")),
            |event, document| event.with_related(document.id()),
        );
        let mut events: Vec<_> = upserts.iter().filter_map(|u| linked_event(meta, u)).collect();
        events.push(summary);
        self.audit.emit(meta, events).await;

        Ok(documents.len())
    }
}

async fn snapshot_in(
    tx: &mut dyn LedgerTransaction,
    meta: &CommandMetadata,
    owner: &EntityRef,
    consumer: &EntityRef,
    as_of: Timestamp,
) -> Result<(Vec<Document>, Vec<RelationUpsert>), DocumentError> {
    let documents: Vec<Document> = tx
        .share_active_for_owner(&meta.tenant_id, owner)
        .await
        .map_err(|e| e.abort_step(OPERATION))?
        .into_iter()
        .filter(|d| d.is_valid_at(as_of))
        .collect();

    let now = Timestamp::now();
    let notes = format!("snapshot as of {as_of}");
    let mut upserts = Vec::with_capacity(documents.len() * 2);
    for document in &documents {
        let ownership = upsert_link(
            tx,
            document,
            owner,
            RelationContext::Ownership,
            Some(meta.actor.clone()),
            None,
            now,
        )
        .await
        .map_err(|e| e.abort_step(OPERATION))?;
        let usage = upsert_link(
            tx,
            document,
            consumer,
            RelationContext::Usage,
            Some(meta.actor.clone()),
            Some(notes.clone()),
            now,
        )
        .await
        .map_err(|e| e.abort_step(OPERATION))?;
        upserts.push(ownership);
        upserts.push(usage);
    }
    Ok((documents, upserts))
}
