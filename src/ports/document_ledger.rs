//! DocumentLedger port - transactional storage for documents and relations.
//!
//! Every lifecycle write runs inside one `LedgerTransaction`. Services read
//! what they need, mutate aggregates, write them back and commit; nothing
//! becomes visible to other transactions before `commit` returns.

use async_trait::async_trait;

use crate::domain::document::{Document, DocumentError, DocumentSlot};
use crate::domain::foundation::{DocumentId, EntityRef, RelationId, TenantId};
use crate::domain::relation::{DocumentRelation, LinkedDocument, RelationContext};

/// Factory for ledger transactions.
///
/// # Contract
///
/// Implementations must:
/// - Enforce at most one active document per slot in every committed state,
///   at the storage layer, rejecting the losing commit with
///   `DocumentError::DuplicateActiveDocument`
/// - Keep relations append-only (no physical deletes)
/// - Confine every read and write to the tenant passed in
#[async_trait]
pub trait DocumentLedger: Send + Sync {
    /// Opens a transaction. Dropping it without `commit` rolls it back.
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, DocumentError>;

    /// Opens a transaction in which every read sees the same committed
    /// state. A row changed by a concurrent commit after that state was
    /// taken makes its locking read fail with `TransactionAborted` instead of
    /// silently dropping out of the result.
    ///
    /// Defaults to `begin` for ledgers whose transactions are already
    /// snapshot-isolated.
    async fn begin_consistent(&self) -> Result<Box<dyn LedgerTransaction>, DocumentError> {
        self.begin().await
    }
}

/// Outcome of an idempotent relation upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationUpsert {
    /// The live relation for the key, new or pre-existing.
    pub relation: DocumentRelation,
    /// False when an identical live relation already existed.
    pub created: bool,
}

/// One unit of work against the ledger.
///
/// `lock_*` methods read rows with the intent to modify them; adapters take
/// row locks where the backend supports it.
#[async_trait]
pub trait LedgerTransaction: Send {
    async fn find_document(
        &mut self,
        tenant: &TenantId,
        id: DocumentId,
    ) -> Result<Option<Document>, DocumentError>;

    async fn lock_document(
        &mut self,
        tenant: &TenantId,
        id: DocumentId,
    ) -> Result<Option<Document>, DocumentError>;

    /// Every active document in the slot. More than one only in a corrupted store.
    async fn lock_active_in_slot(
        &mut self,
        slot: &DocumentSlot,
    ) -> Result<Vec<Document>, DocumentError>;

    /// All documents of an owner, newest first.
    async fn documents_for_owner(
        &mut self,
        tenant: &TenantId,
        owner: &EntityRef,
    ) -> Result<Vec<Document>, DocumentError>;

    /// Active documents of an owner, held stable until the transaction ends.
    async fn share_active_for_owner(
        &mut self,
        tenant: &TenantId,
        owner: &EntityRef,
    ) -> Result<Vec<Document>, DocumentError>;

    /// Documents reachable from `id` through `superseded_by` in either
    /// direction, within `max_depth + 1` hops. Traversal checks happen in
    /// the domain; this only bounds how much is fetched.
    async fn supersession_neighbourhood(
        &mut self,
        tenant: &TenantId,
        id: DocumentId,
        max_depth: u32,
    ) -> Result<Vec<Document>, DocumentError>;

    async fn insert_document(&mut self, document: &Document) -> Result<(), DocumentError>;

    async fn update_document(&mut self, document: &Document) -> Result<(), DocumentError>;

    /// Inserts the relation unless a live one with the same key exists.
    async fn upsert_relation(
        &mut self,
        relation: &DocumentRelation,
    ) -> Result<RelationUpsert, DocumentError>;

    async fn lock_relation(
        &mut self,
        tenant: &TenantId,
        id: RelationId,
    ) -> Result<Option<DocumentRelation>, DocumentError>;

    /// Persists revocation fields. Key fields never change.
    async fn update_relation(&mut self, relation: &DocumentRelation)
        -> Result<(), DocumentError>;

    /// All relations of a document, revoked ones included, oldest first.
    async fn relations_for_document(
        &mut self,
        tenant: &TenantId,
        document_id: DocumentId,
    ) -> Result<Vec<DocumentRelation>, DocumentError>;

    /// Live relations pointing at `entity` in `context`, with their documents.
    async fn live_links_for_entity(
        &mut self,
        tenant: &TenantId,
        entity: &EntityRef,
        context: RelationContext,
    ) -> Result<Vec<LinkedDocument>, DocumentError>;

    async fn commit(self: Box<Self>) -> Result<(), DocumentError>;

    async fn rollback(self: Box<Self>) -> Result<(), DocumentError>;
}
