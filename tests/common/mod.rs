//! Shared fixtures for the lifecycle integration tests.
//!
//! `ScriptedLedger` wraps the in-memory ledger so tests can line up
//! concurrent transactions deterministically and inject storage failures
//! at a chosen step.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Barrier;

use doc_lineage::adapters::{InMemoryDocumentLedger, InMemoryEntityDirectory, InMemoryEventBus};
use doc_lineage::application::DocumentLifecycle;
use doc_lineage::config::LineageConfig;
use doc_lineage::domain::document::{Document, DocumentDraft, DocumentError, DocumentSlot, DocumentType, FileRef};
use doc_lineage::domain::foundation::{
    ActorId, CommandMetadata, DocumentId, EntityRef, RelationId, TenantId,
};
use doc_lineage::domain::relation::{DocumentRelation, LinkedDocument, RelationContext};
use doc_lineage::ports::{DocumentLedger, LedgerTransaction, RelationUpsert};

// =============================================================================
// Scripted ledger
// =============================================================================

#[derive(Default)]
struct Script {
    barrier: Option<(Arc<Barrier>, usize)>,
    begins: AtomicUsize,
    fail_upsert_number: Option<usize>,
    fail_update_number: Option<usize>,
    upserts: AtomicUsize,
    updates: AtomicUsize,
}

/// In-memory ledger with hooks for ordering and fault injection.
#[derive(Clone)]
pub struct ScriptedLedger {
    inner: InMemoryDocumentLedger,
    script: Arc<Script>,
}

impl ScriptedLedger {
    pub fn new(inner: InMemoryDocumentLedger) -> Self {
        Self {
            inner,
            script: Arc::new(Script::default()),
        }
    }

    /// The first `parties` calls to `begin` wait for each other, so they all
    /// read the same committed state. Later transactions, such as retries,
    /// start immediately.
    pub fn with_barrier(mut self, parties: usize) -> Self {
        self.script_mut().barrier = Some((Arc::new(Barrier::new(parties)), parties));
        self
    }

    /// The `n`th relation upsert (1-based, across transactions) fails with a
    /// storage error.
    pub fn failing_upsert(mut self, n: usize) -> Self {
        self.script_mut().fail_upsert_number = Some(n);
        self
    }

    /// The `n`th document update (1-based, across transactions) fails with a
    /// storage error.
    pub fn failing_update(mut self, n: usize) -> Self {
        self.script_mut().fail_update_number = Some(n);
        self
    }

    fn script_mut(&mut self) -> &mut Script {
        Arc::get_mut(&mut self.script).expect("configure before cloning")
    }
}

#[async_trait]
impl DocumentLedger for ScriptedLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, DocumentError> {
        let inner = self.inner.begin().await?;
        let n = self.script.begins.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((barrier, parties)) = &self.script.barrier {
            if n <= *parties {
                barrier.wait().await;
            }
        }
        Ok(Box::new(ScriptedTransaction {
            inner,
            script: self.script.clone(),
        }))
    }
}

struct ScriptedTransaction {
    inner: Box<dyn LedgerTransaction>,
    script: Arc<Script>,
}

fn tick(counter: &AtomicUsize, fail_at: Option<usize>, what: &str) -> Result<(), DocumentError> {
    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
    if fail_at == Some(n) {
        return Err(DocumentError::storage(format!("injected failure on {what} #{n}")));
    }
    Ok(())
}

#[async_trait]
impl LedgerTransaction for ScriptedTransaction {
    async fn find_document(&mut self, tenant: &TenantId, id: DocumentId) -> Result<Option<Document>, DocumentError> {
        self.inner.find_document(tenant, id).await
    }

    async fn lock_document(&mut self, tenant: &TenantId, id: DocumentId) -> Result<Option<Document>, DocumentError> {
        self.inner.lock_document(tenant, id).await
    }

    async fn lock_active_in_slot(&mut self, slot: &DocumentSlot) -> Result<Vec<Document>, DocumentError> {
        self.inner.lock_active_in_slot(slot).await
    }

    async fn documents_for_owner(
        &mut self,
        tenant: &TenantId,
        owner: &EntityRef,
    ) -> Result<Vec<Document>, DocumentError> {
        self.inner.documents_for_owner(tenant, owner).await
    }

    async fn share_active_for_owner(
        &mut self,
        tenant: &TenantId,
        owner: &EntityRef,
    ) -> Result<Vec<Document>, DocumentError> {
        self.inner.share_active_for_owner(tenant, owner).await
    }

    async fn supersession_neighbourhood(
        &mut self,
        tenant: &TenantId,
        id: DocumentId,
        max_depth: u32,
    ) -> Result<Vec<Document>, DocumentError> {
        self.inner.supersession_neighbourhood(tenant, id, max_depth).await
    }

    async fn insert_document(&mut self, document: &Document) -> Result<(), DocumentError> {
        self.inner.insert_document(document).await
    }

    async fn update_document(&mut self, document: &Document) -> Result<(), DocumentError> {
        tick(&self.script.updates, self.script.fail_update_number, "update")?;
        self.inner.update_document(document).await
    }

    async fn upsert_relation(&mut self, relation: &DocumentRelation) -> Result<RelationUpsert, DocumentError> {
        tick(&self.script.upserts, self.script.fail_upsert_number, "upsert")?;
        self.inner.upsert_relation(relation).await
    }

    async fn lock_relation(
        &mut self,
        tenant: &TenantId,
        id: RelationId,
    ) -> Result<Option<DocumentRelation>, DocumentError> {
        self.inner.lock_relation(tenant, id).await
    }

    async fn update_relation(&mut self, relation: &DocumentRelation) -> Result<(), DocumentError> {
        self.inner.update_relation(relation).await
    }

    async fn relations_for_document(
        &mut self,
        tenant: &TenantId,
        document_id: DocumentId,
    ) -> Result<Vec<DocumentRelation>, DocumentError> {
        self.inner.relations_for_document(tenant, document_id).await
    }

    async fn live_links_for_entity(
        &mut self,
        tenant: &TenantId,
        entity: &EntityRef,
        context: RelationContext,
    ) -> Result<Vec<LinkedDocument>, DocumentError> {
        self.inner.live_links_for_entity(tenant, entity, context).await
    }

    async fn commit(self: Box<Self>) -> Result<(), DocumentError> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), DocumentError> {
        self.inner.rollback().await
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub struct Harness {
    pub ledger: InMemoryDocumentLedger,
    pub directory: Arc<InMemoryEntityDirectory>,
    pub bus: Arc<InMemoryEventBus>,
    pub lifecycle: DocumentLifecycle,
    pub meta: CommandMetadata,
    pub applicant: EntityRef,
    pub application: EntityRef,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_ledger(|ledger| Arc::new(ledger) as Arc<dyn DocumentLedger>, LineageConfig::default())
    }

    pub fn with_config(lineage: LineageConfig) -> Self {
        Self::with_ledger(|ledger| Arc::new(ledger) as Arc<dyn DocumentLedger>, lineage)
    }

    /// Builds the services on top of whatever `wrap` makes of the base ledger.
    pub fn with_ledger<F>(wrap: F, lineage: LineageConfig) -> Self
    where
        F: FnOnce(InMemoryDocumentLedger) -> Arc<dyn DocumentLedger>,
    {
        let meta = metadata("acme", "officer-1");
        let applicant = EntityRef::applicant("P1").unwrap();
        let application = EntityRef::application("APP1").unwrap();

        let directory = Arc::new(InMemoryEntityDirectory::new());
        directory.register(&meta.tenant_id, applicant.clone());
        directory.register_consumer(&meta.tenant_id, application.clone(), applicant.clone());

        let ledger = InMemoryDocumentLedger::new();
        let bus = Arc::new(InMemoryEventBus::new());
        let lifecycle = DocumentLifecycle::new(wrap(ledger.clone()), directory.clone(), bus.clone(), lineage);

        Self {
            ledger,
            directory,
            bus,
            lifecycle,
            meta,
            applicant,
            application,
        }
    }

    pub async fn create(&self, document_type: DocumentType, name: &str) -> Document {
        self.lifecycle
            .registrar()
            .create(&self.meta, self.applicant.clone(), document_type, file(name))
            .await
            .unwrap()
    }

    pub fn draft(&self, document_type: DocumentType, name: &str) -> DocumentDraft {
        DocumentDraft::new(self.applicant.clone(), document_type, file(name))
    }

    pub async fn stored(&self, id: DocumentId) -> Document {
        self.ledger
            .documents()
            .await
            .into_iter()
            .find(|d| d.id() == id)
            .unwrap()
    }

    /// Every committed slot with more than one active document.
    pub async fn overfull_slots(&self) -> Vec<DocumentSlot> {
        let mut counts = std::collections::HashMap::<DocumentSlot, usize>::new();
        for doc in self.ledger.documents().await {
            if doc.is_active() {
                *counts.entry(doc.slot()).or_default() += 1;
            }
        }
        counts.into_iter().filter(|(_, n)| *n > 1).map(|(s, _)| s).collect()
    }
}

pub fn metadata(tenant: &str, actor: &str) -> CommandMetadata {
    CommandMetadata::new(TenantId::new(tenant).unwrap(), ActorId::new(actor).unwrap())
        .with_correlation_id(format!("{tenant}-{actor}"))
}

pub fn file(name: &str) -> FileRef {
    FileRef::new(format!("s3://acme-evidence/{name}.pdf")).unwrap()
}

pub fn ids(docs: &[Document]) -> Vec<DocumentId> {
    docs.iter().map(Document::id).collect()
}
