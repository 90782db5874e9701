//! In-memory implementation of the DocumentLedger port.
//!
//! Each transaction works on a private copy of the committed state taken at
//! `begin` (snapshot isolation). At commit the ledger re-checks the one
//! active document per slot rule against the latest committed state, so the
//! first committer wins and a racing loser gets `DuplicateActiveDocument`.
//! Rows also carry a version; a transaction that updates a row someone else
//! changed since its snapshot aborts with `TransactionAborted`. A relation
//! inserted while another transaction committed the same live key fails the
//! commit with `RelationConflict`.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::document::{Document, DocumentError, DocumentSlot};
use crate::domain::foundation::{DocumentId, EntityRef, RelationId, TenantId};
use crate::domain::relation::{DocumentRelation, LinkedDocument, RelationContext, RelationKey};
use crate::ports::{DocumentLedger, LedgerTransaction, RelationUpsert};

#[derive(Debug, Clone)]
struct Versioned<T> {
    row: T,
    version: u64,
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
    documents: HashMap<DocumentId, Versioned<Document>>,
    relations: HashMap<RelationId, Versioned<DocumentRelation>>,
}

impl LedgerState {
    fn live_relation(&self, key: &RelationKey) -> Option<&DocumentRelation> {
        self.relations
            .values()
            .map(|v| &v.row)
            .find(|r| !r.is_revoked() && r.key() == *key)
    }

    fn active_in_slot<'a>(&'a self, slot: &'a DocumentSlot) -> impl Iterator<Item = &'a Document> {
        self.documents
            .values()
            .map(|v| &v.row)
            .filter(move |d| d.is_active() && d.slot() == *slot)
    }
}

#[derive(Debug, Clone, Copy)]
enum PendingWrite {
    Insert,
    Update { base_version: u64 },
}

/// Document ledger held entirely in process memory.
#[derive(Clone, Default)]
pub struct InMemoryDocumentLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl std::fmt::Debug for InMemoryDocumentLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDocumentLedger").finish_non_exhaustive()
    }
}

impl InMemoryDocumentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed documents, ordered by creation time.
    pub async fn documents(&self) -> Vec<Document> {
        let state = self.state.lock().await;
        let mut docs: Vec<Document> = state.documents.values().map(|v| v.row.clone()).collect();
        docs.sort_by_key(|d| (d.created_at(), d.id()));
        docs
    }

    /// Committed relations, revoked ones included, ordered by creation time.
    pub async fn relations(&self) -> Vec<DocumentRelation> {
        let state = self.state.lock().await;
        let mut rels: Vec<DocumentRelation> =
            state.relations.values().map(|v| v.row.clone()).collect();
        rels.sort_by_key(|r| r.created_at());
        rels
    }
}

#[async_trait]
impl DocumentLedger for InMemoryDocumentLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, DocumentError> {
        let snapshot = self.state.lock().await.clone();
        Ok(Box::new(InMemoryTransaction {
            shared: Arc::clone(&self.state),
            view: snapshot,
            document_writes: HashMap::new(),
            relation_writes: HashMap::new(),
        }))
    }
}

struct InMemoryTransaction {
    shared: Arc<Mutex<LedgerState>>,
    /// Snapshot taken at `begin` with this transaction's own writes applied.
    view: LedgerState,
    document_writes: HashMap<DocumentId, PendingWrite>,
    relation_writes: HashMap<RelationId, PendingWrite>,
}

impl InMemoryTransaction {
    fn document_in_tenant(&self, tenant: &TenantId, id: DocumentId) -> Option<Document> {
        self.view
            .documents
            .get(&id)
            .map(|v| &v.row)
            .filter(|d| d.tenant_id() == tenant)
            .cloned()
    }

    fn record_document_write(&mut self, id: DocumentId) -> Result<(), DocumentError> {
        let write = match self.document_writes.get(&id) {
            Some(existing) => *existing,
            None => {
                let base_version = self
                    .view
                    .documents
                    .get(&id)
                    .map(|v| v.version)
                    .ok_or_else(|| DocumentError::document_not_found(id))?;
                PendingWrite::Update { base_version }
            }
        };
        self.document_writes.insert(id, write);
        Ok(())
    }

    fn check_single_active(&self, committed: &LedgerState) -> Result<(), DocumentError> {
        let mut touched_slots: HashSet<DocumentSlot> = HashSet::new();
        for id in self.document_writes.keys() {
            if let Some(v) = self.view.documents.get(id) {
                if v.row.is_active() {
                    touched_slots.insert(v.row.slot());
                }
            }
        }

        for slot in touched_slots {
            let ours = self
                .view
                .active_in_slot(&slot)
                .filter(|d| self.document_writes.contains_key(&d.id()))
                .count();
            let theirs = committed
                .active_in_slot(&slot)
                .filter(|d| !self.document_writes.contains_key(&d.id()))
                .count();
            if ours + theirs > 1 {
                return Err(DocumentError::duplicate_active(&slot.owner, slot.document_type));
            }
        }
        Ok(())
    }

    fn check_row_versions(&self, committed: &LedgerState) -> Result<(), DocumentError> {
        for (id, write) in &self.document_writes {
            let current = committed.documents.get(id).map(|v| v.version);
            match (write, current) {
                (PendingWrite::Insert, Some(_)) => {
                    return Err(DocumentError::storage(format!("document {} already exists", id)))
                }
                (PendingWrite::Update { base_version }, Some(v)) if v != *base_version => {
                    return Err(DocumentError::aborted(
                        "commit",
                        format!("document {} was modified concurrently", id),
                    ))
                }
                (PendingWrite::Update { .. }, None) => {
                    return Err(DocumentError::document_not_found(*id));
                }
                _ => {}
            }
        }
        for (id, write) in &self.relation_writes {
            if let PendingWrite::Update { base_version } = write {
                let current = committed.relations.get(id).map(|v| v.version);
                if current != Some(*base_version) {
                    return Err(DocumentError::aborted(
                        "commit",
                        format!("relation {} was modified concurrently", id),
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_relation_targets(&self, committed: &LedgerState) -> Result<(), DocumentError> {
        for (id, write) in &self.relation_writes {
            if !matches!(write, PendingWrite::Insert) {
                continue;
            }
            if let Some(v) = self.view.relations.get(id) {
                let target = v.row.document_id();
                if !committed.documents.contains_key(&target)
                    && !self.document_writes.contains_key(&target)
                {
                    return Err(DocumentError::document_not_found(target));
                }
            }
        }
        Ok(())
    }

    fn check_relation_keys(&self, committed: &LedgerState) -> Result<(), DocumentError> {
        for (id, write) in &self.relation_writes {
            if !matches!(write, PendingWrite::Insert) {
                continue;
            }
            let Some(ours) = self.view.relations.get(id) else {
                continue;
            };
            let clash = committed.live_relation(&ours.row.key()).filter(|theirs| {
                // Revoking it in this transaction frees the key.
                !self
                    .view
                    .relations
                    .get(&theirs.id())
                    .is_some_and(|v| v.row.is_revoked())
            });
            if let Some(theirs) = clash {
                return Err(DocumentError::relation_conflict(
                    ours.row.document_id(),
                    format!(
                        "live {} link {} to {} was committed concurrently",
                        ours.row.context(),
                        theirs.id(),
                        ours.row.related()
                    ),
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn find_document(
        &mut self,
        tenant: &TenantId,
        id: DocumentId,
    ) -> Result<Option<Document>, DocumentError> {
        Ok(self.document_in_tenant(tenant, id))
    }

    async fn lock_document(
        &mut self,
        tenant: &TenantId,
        id: DocumentId,
    ) -> Result<Option<Document>, DocumentError> {
        Ok(self.document_in_tenant(tenant, id))
    }

    async fn lock_active_in_slot(
        &mut self,
        slot: &DocumentSlot,
    ) -> Result<Vec<Document>, DocumentError> {
        Ok(self.view.active_in_slot(slot).cloned().collect())
    }

    async fn documents_for_owner(
        &mut self,
        tenant: &TenantId,
        owner: &EntityRef,
    ) -> Result<Vec<Document>, DocumentError> {
        let mut docs: Vec<Document> = self
            .view
            .documents
            .values()
            .map(|v| &v.row)
            .filter(|d| d.tenant_id() == tenant && d.owner() == owner)
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then(b.id().cmp(&a.id())));
        Ok(docs)
    }

    async fn share_active_for_owner(
        &mut self,
        tenant: &TenantId,
        owner: &EntityRef,
    ) -> Result<Vec<Document>, DocumentError> {
        let mut docs: Vec<Document> = self
            .view
            .documents
            .values()
            .map(|v| &v.row)
            .filter(|d| d.tenant_id() == tenant && d.owner() == owner && d.is_active())
            .cloned()
            .collect();
        docs.sort_by_key(|d| (d.document_type(), d.created_at()));
        Ok(docs)
    }

    async fn supersession_neighbourhood(
        &mut self,
        tenant: &TenantId,
        id: DocumentId,
        max_depth: u32,
    ) -> Result<Vec<Document>, DocumentError> {
        let mut predecessors: HashMap<DocumentId, Vec<DocumentId>> = HashMap::new();
        for v in self.view.documents.values() {
            if v.row.tenant_id() != tenant {
                continue;
            }
            if let Some(next) = v.row.superseded_by() {
                predecessors.entry(next).or_default().push(v.row.id());
            }
        }

        let hop_limit = max_depth.saturating_add(1);
        let mut found: HashMap<DocumentId, Document> = HashMap::new();
        let mut queue = VecDeque::from([(id, 0u32)]);
        while let Some((current, hops)) = queue.pop_front() {
            if found.contains_key(&current) {
                continue;
            }
            let Some(doc) = self.document_in_tenant(tenant, current) else {
                continue;
            };
            if hops < hop_limit {
                if let Some(next) = doc.superseded_by() {
                    queue.push_back((next, hops + 1));
                }
                for prev in predecessors.get(&current).into_iter().flatten() {
                    queue.push_back((*prev, hops + 1));
                }
            }
            found.insert(current, doc);
        }
        Ok(found.into_values().collect())
    }

    async fn insert_document(&mut self, document: &Document) -> Result<(), DocumentError> {
        document.check_invariants()?;
        if self.view.documents.contains_key(&document.id()) {
            return Err(DocumentError::storage(format!(
                "document {} already exists",
                document.id()
            )));
        }
        // Mirrors the storage constraint: fail at the write, not only at commit.
        if document.is_active() && self.view.active_in_slot(&document.slot()).next().is_some() {
            return Err(DocumentError::duplicate_active(
                document.owner(),
                document.document_type(),
            ));
        }
        self.view.documents.insert(
            document.id(),
            Versioned {
                row: document.clone(),
                version: 0,
            },
        );
        self.document_writes.insert(document.id(), PendingWrite::Insert);
        Ok(())
    }

    async fn update_document(&mut self, document: &Document) -> Result<(), DocumentError> {
        document.check_invariants()?;
        if document.is_active()
            && self
                .view
                .active_in_slot(&document.slot())
                .any(|d| d.id() != document.id())
        {
            return Err(DocumentError::duplicate_active(
                document.owner(),
                document.document_type(),
            ));
        }
        self.record_document_write(document.id())?;
        if let Some(v) = self.view.documents.get_mut(&document.id()) {
            v.row = document.clone();
        }
        Ok(())
    }

    async fn upsert_relation(
        &mut self,
        relation: &DocumentRelation,
    ) -> Result<RelationUpsert, DocumentError> {
        if self
            .document_in_tenant(relation.tenant_id(), relation.document_id())
            .is_none()
        {
            return Err(DocumentError::document_not_found(relation.document_id()));
        }
        if let Some(existing) = self.view.live_relation(&relation.key()) {
            return Ok(RelationUpsert {
                relation: existing.clone(),
                created: false,
            });
        }
        self.view.relations.insert(
            relation.id(),
            Versioned {
                row: relation.clone(),
                version: 0,
            },
        );
        self.relation_writes.insert(relation.id(), PendingWrite::Insert);
        Ok(RelationUpsert {
            relation: relation.clone(),
            created: true,
        })
    }

    async fn lock_relation(
        &mut self,
        tenant: &TenantId,
        id: RelationId,
    ) -> Result<Option<DocumentRelation>, DocumentError> {
        Ok(self
            .view
            .relations
            .get(&id)
            .map(|v| &v.row)
            .filter(|r| r.tenant_id() == tenant)
            .cloned())
    }

    async fn update_relation(
        &mut self,
        relation: &DocumentRelation,
    ) -> Result<(), DocumentError> {
        let Some(current) = self.view.relations.get_mut(&relation.id()) else {
            return Err(DocumentError::relation_not_found(relation.id()));
        };
        if current.row.key() != relation.key() {
            return Err(DocumentError::storage(format!(
                "relation {} key fields are immutable",
                relation.id()
            )));
        }
        let base_version = current.version;
        current.row = relation.clone();
        self.relation_writes
            .entry(relation.id())
            .or_insert(PendingWrite::Update { base_version });
        Ok(())
    }

    async fn relations_for_document(
        &mut self,
        tenant: &TenantId,
        document_id: DocumentId,
    ) -> Result<Vec<DocumentRelation>, DocumentError> {
        let mut rels: Vec<DocumentRelation> = self
            .view
            .relations
            .values()
            .map(|v| &v.row)
            .filter(|r| r.tenant_id() == tenant && r.document_id() == document_id)
            .cloned()
            .collect();
        rels.sort_by_key(|r| r.created_at());
        Ok(rels)
    }

    async fn live_links_for_entity(
        &mut self,
        tenant: &TenantId,
        entity: &EntityRef,
        context: RelationContext,
    ) -> Result<Vec<LinkedDocument>, DocumentError> {
        let mut links: Vec<LinkedDocument> = self
            .view
            .relations
            .values()
            .map(|v| &v.row)
            .filter(|r| {
                !r.is_revoked()
                    && r.tenant_id() == tenant
                    && r.related() == entity
                    && r.context() == context
            })
            .filter_map(|r| {
                self.document_in_tenant(tenant, r.document_id())
                    .map(|document| LinkedDocument {
                        relation: r.clone(),
                        document,
                    })
            })
            .collect();
        links.sort_by_key(|l| (l.relation.created_at(), l.document.document_type()));
        Ok(links)
    }

    async fn commit(self: Box<Self>) -> Result<(), DocumentError> {
        let mut committed = self.shared.lock().await;

        self.check_single_active(&committed)?;
        self.check_row_versions(&committed)?;
        self.check_relation_targets(&committed)?;
        self.check_relation_keys(&committed)?;

        for (id, write) in &self.document_writes {
            if let Some(v) = self.view.documents.get(id) {
                let version = match write {
                    PendingWrite::Insert => 0,
                    PendingWrite::Update { base_version } => base_version + 1,
                };
                committed.documents.insert(
                    *id,
                    Versioned {
                        row: v.row.clone(),
                        version,
                    },
                );
            }
        }

        for (id, write) in &self.relation_writes {
            let Some(v) = self.view.relations.get(id) else {
                continue;
            };
            match write {
                PendingWrite::Insert => {
                    committed.relations.insert(
                        *id,
                        Versioned {
                            row: v.row.clone(),
                            version: 0,
                        },
                    );
                }
                PendingWrite::Update { base_version } => {
                    committed.relations.insert(
                        *id,
                        Versioned {
                            row: v.row.clone(),
                            version: base_version + 1,
                        },
                    );
                }
            }
        }

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DocumentError> {
        Ok(())
    }
}
