//! PostgreSQL implementation of the DocumentLedger port.
//!
//! The one-active-per-slot rule lives in the partial unique index
//! `documents_one_active_per_slot`; this adapter only translates its
//! violations into `DuplicateActiveDocument`. Rows about to change are read
//! `FOR UPDATE`, the snapshot read set `FOR SHARE`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::document::{Document, DocumentError, DocumentSlot, DocumentStatus, FileRef};
use crate::domain::foundation::{
    ActorId, DocumentId, EntityKind, EntityRef, RelationId, TenantId, Timestamp, ValidationError,
};
use crate::domain::relation::{DocumentRelation, LinkedDocument, RelationContext};
use crate::ports::{DocumentLedger, LedgerTransaction, RelationUpsert};

/// Must be the first statement of the transaction.
const SET_REPEATABLE_READ: &str = "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ";

const ACTIVE_SLOT_INDEX: &str = "documents_one_active_per_slot";

const DOCUMENT_COLUMNS: &str = "id, tenant_id, owner_kind, owner_id, document_type, file_ref, \
     status, valid_from, valid_to, is_active, superseded_by, supersession_reason, \
     rejection_reason, reviewed_by, reviewed_at, created_at, updated_at";

const RELATION_COLUMNS: &str = "id, tenant_id, document_id, related_kind, related_id, context, \
     created_by, notes, created_at, revoked_at, revoked_by";

static SELECT_DOCUMENT: Lazy<String> = Lazy::new(|| {
    format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE tenant_id = $1 AND id = $2")
});

static LOCK_DOCUMENT: Lazy<String> = Lazy::new(|| format!("{} FOR UPDATE", *SELECT_DOCUMENT));

static LOCK_ACTIVE_IN_SLOT: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents \
         WHERE tenant_id = $1 AND owner_kind = $2 AND owner_id = $3 AND document_type = $4 \
         AND is_active FOR UPDATE"
    )
});

static DOCUMENTS_FOR_OWNER: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents \
         WHERE tenant_id = $1 AND owner_kind = $2 AND owner_id = $3 \
         ORDER BY created_at DESC, id DESC"
    )
});

static SHARE_ACTIVE_FOR_OWNER: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents \
         WHERE tenant_id = $1 AND owner_kind = $2 AND owner_id = $3 AND is_active \
         ORDER BY document_type, created_at FOR SHARE"
    )
});

static DOCUMENTS_BY_IDS: Lazy<String> = Lazy::new(|| {
    format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE tenant_id = $1 AND id = ANY($2)")
});

/// Walks `superseded_by` in both directions from $2, at most $3 hops,
/// stopping a branch as soon as it revisits a row.
static SUPERSESSION_NEIGHBOURHOOD: Lazy<String> = Lazy::new(|| {
    format!(
        r#"
        WITH RECURSIVE walk (id, superseded_by, depth, path, is_cycle) AS (
            SELECT d.id, d.superseded_by, 0, ARRAY[d.id], false
            FROM documents d
            WHERE d.tenant_id = $1 AND d.id = $2

            UNION ALL

            SELECT n.id, n.superseded_by, w.depth + 1, w.path || n.id, n.id = ANY(w.path)
            FROM walk w
            JOIN documents n
              ON n.tenant_id = $1
             AND (n.id = w.superseded_by OR n.superseded_by = w.id)
            WHERE NOT w.is_cycle AND w.depth < $3
        )
        SELECT {DOCUMENT_COLUMNS} FROM documents
        WHERE tenant_id = $1 AND id IN (SELECT id FROM walk)
        "#
    )
});

static INSERT_DOCUMENT: Lazy<String> = Lazy::new(|| {
    format!(
        "INSERT INTO documents ({DOCUMENT_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
    )
});

const UPDATE_DOCUMENT: &str = r#"
    UPDATE documents
    SET status = $3, valid_from = $4, valid_to = $5, is_active = $6,
        superseded_by = $7, supersession_reason = $8, rejection_reason = $9,
        reviewed_by = $10, reviewed_at = $11, updated_at = $12
    WHERE tenant_id = $1 AND id = $2
"#;

static INSERT_RELATION: Lazy<String> = Lazy::new(|| {
    format!(
        "INSERT INTO document_relations ({RELATION_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         ON CONFLICT (document_id, related_kind, related_id, context) \
         WHERE revoked_at IS NULL DO NOTHING"
    )
});

static LIVE_RELATION_BY_KEY: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT {RELATION_COLUMNS} FROM document_relations \
         WHERE tenant_id = $1 AND document_id = $2 AND related_kind = $3 AND related_id = $4 \
         AND context = $5 AND revoked_at IS NULL"
    )
});

static LOCK_RELATION: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT {RELATION_COLUMNS} FROM document_relations \
         WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
    )
});

const UPDATE_RELATION: &str = r#"
    UPDATE document_relations
    SET revoked_at = $3, revoked_by = $4
    WHERE tenant_id = $1 AND id = $2
"#;

static RELATIONS_FOR_DOCUMENT: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT {RELATION_COLUMNS} FROM document_relations \
         WHERE tenant_id = $1 AND document_id = $2 ORDER BY created_at, id"
    )
});

static LIVE_RELATIONS_FOR_ENTITY: Lazy<String> = Lazy::new(|| {
    format!(
        "SELECT {RELATION_COLUMNS} FROM document_relations \
         WHERE tenant_id = $1 AND related_kind = $2 AND related_id = $3 AND context = $4 \
         AND revoked_at IS NULL ORDER BY created_at, id"
    )
});

/// PostgreSQL-backed ledger.
#[derive(Clone)]
pub struct PostgresDocumentLedger {
    pool: PgPool,
}

impl std::fmt::Debug for PostgresDocumentLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDocumentLedger")
            .field("pool", &"PgPool")
            .finish()
    }
}

impl PostgresDocumentLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentLedger for PostgresDocumentLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, DocumentError> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(PostgresTransaction { tx }))
    }

    /// REPEATABLE READ: a `FOR SHARE` read of a row that a concurrent
    /// transaction updated and committed fails with 40001 instead of
    /// re-evaluating the row against the newer version.
    async fn begin_consistent(&self) -> Result<Box<dyn LedgerTransaction>, DocumentError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        sqlx::query(SET_REPEATABLE_READ)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PostgresTransaction {
    async fn fetch_documents(
        &mut self,
        sql: &str,
        tenant: &TenantId,
        owner: &EntityRef,
    ) -> Result<Vec<Document>, DocumentError> {
        let rows = sqlx::query_as::<_, DocumentRow>(sql)
            .bind(tenant.as_str())
            .bind(owner.kind().as_str())
            .bind(owner.id())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        rows.into_iter().map(Document::try_from).collect()
    }

    async fn fetch_document(
        &mut self,
        sql: &str,
        tenant: &TenantId,
        id: DocumentId,
    ) -> Result<Option<Document>, DocumentError> {
        let row = sqlx::query_as::<_, DocumentRow>(sql)
            .bind(tenant.as_str())
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        row.map(Document::try_from).transpose()
    }
}

#[async_trait]
impl LedgerTransaction for PostgresTransaction {
    async fn find_document(
        &mut self,
        tenant: &TenantId,
        id: DocumentId,
    ) -> Result<Option<Document>, DocumentError> {
        self.fetch_document(SELECT_DOCUMENT.as_str(), tenant, id).await
    }

    async fn lock_document(
        &mut self,
        tenant: &TenantId,
        id: DocumentId,
    ) -> Result<Option<Document>, DocumentError> {
        self.fetch_document(LOCK_DOCUMENT.as_str(), tenant, id).await
    }

    async fn lock_active_in_slot(
        &mut self,
        slot: &DocumentSlot,
    ) -> Result<Vec<Document>, DocumentError> {
        let rows = sqlx::query_as::<_, DocumentRow>(LOCK_ACTIVE_IN_SLOT.as_str())
            .bind(slot.tenant_id.as_str())
            .bind(slot.owner.kind().as_str())
            .bind(slot.owner.id())
            .bind(slot.document_type.as_str())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        rows.into_iter().map(Document::try_from).collect()
    }

    async fn documents_for_owner(
        &mut self,
        tenant: &TenantId,
        owner: &EntityRef,
    ) -> Result<Vec<Document>, DocumentError> {
        self.fetch_documents(DOCUMENTS_FOR_OWNER.as_str(), tenant, owner)
            .await
    }

    async fn share_active_for_owner(
        &mut self,
        tenant: &TenantId,
        owner: &EntityRef,
    ) -> Result<Vec<Document>, DocumentError> {
        self.fetch_documents(SHARE_ACTIVE_FOR_OWNER.as_str(), tenant, owner)
            .await
    }

    async fn supersession_neighbourhood(
        &mut self,
        tenant: &TenantId,
        id: DocumentId,
        max_depth: u32,
    ) -> Result<Vec<Document>, DocumentError> {
        let hop_limit = i32::try_from(max_depth.saturating_add(1)).unwrap_or(i32::MAX);
        let rows = sqlx::query_as::<_, DocumentRow>(SUPERSESSION_NEIGHBOURHOOD.as_str())
            .bind(tenant.as_str())
            .bind(id.as_uuid())
            .bind(hop_limit)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        rows.into_iter().map(Document::try_from).collect()
    }

    async fn insert_document(&mut self, document: &Document) -> Result<(), DocumentError> {
        document.check_invariants()?;
        let result = sqlx::query(INSERT_DOCUMENT.as_str())
            .bind(document.id().as_uuid())
            .bind(document.tenant_id().as_str())
            .bind(document.owner().kind().as_str())
            .bind(document.owner().id())
            .bind(document.document_type().as_str())
            .bind(document.file_ref().as_str())
            .bind(document.status().as_str())
            .bind(*document.valid_from().as_datetime())
            .bind(document.valid_to().map(|t| *t.as_datetime()))
            .bind(document.is_active())
            .bind(document.superseded_by().map(|id| *id.as_uuid()))
            .bind(document.supersession_reason())
            .bind(document.rejection_reason())
            .bind(document.reviewed_by().map(|a| a.as_str().to_string()))
            .bind(document.reviewed_at().map(|t| *t.as_datetime()))
            .bind(*document.created_at().as_datetime())
            .bind(*document.updated_at().as_datetime())
            .execute(&mut *self.tx)
            .await;

        map_document_write(result, document)?;
        Ok(())
    }

    async fn update_document(&mut self, document: &Document) -> Result<(), DocumentError> {
        document.check_invariants()?;
        let result = sqlx::query(UPDATE_DOCUMENT)
            .bind(document.tenant_id().as_str())
            .bind(document.id().as_uuid())
            .bind(document.status().as_str())
            .bind(*document.valid_from().as_datetime())
            .bind(document.valid_to().map(|t| *t.as_datetime()))
            .bind(document.is_active())
            .bind(document.superseded_by().map(|id| *id.as_uuid()))
            .bind(document.supersession_reason())
            .bind(document.rejection_reason())
            .bind(document.reviewed_by().map(|a| a.as_str().to_string()))
            .bind(document.reviewed_at().map(|t| *t.as_datetime()))
            .bind(*document.updated_at().as_datetime())
            .execute(&mut *self.tx)
            .await;

        map_document_write(result, document)?;
        Ok(())
    }

    async fn upsert_relation(
        &mut self,
        relation: &DocumentRelation,
    ) -> Result<RelationUpsert, DocumentError> {
        let result = sqlx::query(INSERT_RELATION.as_str())
            .bind(relation.id().as_uuid())
            .bind(relation.tenant_id().as_str())
            .bind(relation.document_id().as_uuid())
            .bind(relation.related().kind().as_str())
            .bind(relation.related().id())
            .bind(relation.context().as_str())
            .bind(relation.created_by().map(|a| a.as_str().to_string()))
            .bind(relation.notes())
            .bind(*relation.created_at().as_datetime())
            .bind(relation.revoked_at().map(|t| *t.as_datetime()))
            .bind(relation.revoked_by().map(|a| a.as_str().to_string()))
            .execute(&mut *self.tx)
            .await;

        let inserted = match result {
            Ok(done) => done.rows_affected() == 1,
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
                return Err(DocumentError::document_not_found(relation.document_id()));
            }
            Err(e) => return Err(map_sqlx_error(e)),
        };
        if inserted {
            return Ok(RelationUpsert {
                relation: relation.clone(),
                created: true,
            });
        }

        let existing = sqlx::query_as::<_, RelationRow>(LIVE_RELATION_BY_KEY.as_str())
            .bind(relation.tenant_id().as_str())
            .bind(relation.document_id().as_uuid())
            .bind(relation.related().kind().as_str())
            .bind(relation.related().id())
            .bind(relation.context().as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        match existing {
            Some(row) => Ok(RelationUpsert {
                relation: DocumentRelation::try_from(row)?,
                created: false,
            }),
            // The conflicting row was revoked between our insert and re-read.
            None => Err(DocumentError::relation_conflict(
                relation.document_id(),
                format!("live {} link vanished during upsert", relation.context()),
            )),
        }
    }

    async fn lock_relation(
        &mut self,
        tenant: &TenantId,
        id: RelationId,
    ) -> Result<Option<DocumentRelation>, DocumentError> {
        let row = sqlx::query_as::<_, RelationRow>(LOCK_RELATION.as_str())
            .bind(tenant.as_str())
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        row.map(DocumentRelation::try_from).transpose()
    }

    async fn update_relation(
        &mut self,
        relation: &DocumentRelation,
    ) -> Result<(), DocumentError> {
        let done = sqlx::query(UPDATE_RELATION)
            .bind(relation.tenant_id().as_str())
            .bind(relation.id().as_uuid())
            .bind(relation.revoked_at().map(|t| *t.as_datetime()))
            .bind(relation.revoked_by().map(|a| a.as_str().to_string()))
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        if done.rows_affected() == 0 {
            return Err(DocumentError::relation_not_found(relation.id()));
        }
        Ok(())
    }

    async fn relations_for_document(
        &mut self,
        tenant: &TenantId,
        document_id: DocumentId,
    ) -> Result<Vec<DocumentRelation>, DocumentError> {
        let rows = sqlx::query_as::<_, RelationRow>(RELATIONS_FOR_DOCUMENT.as_str())
            .bind(tenant.as_str())
            .bind(document_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        rows.into_iter().map(DocumentRelation::try_from).collect()
    }

    async fn live_links_for_entity(
        &mut self,
        tenant: &TenantId,
        entity: &EntityRef,
        context: RelationContext,
    ) -> Result<Vec<LinkedDocument>, DocumentError> {
        let relations = sqlx::query_as::<_, RelationRow>(LIVE_RELATIONS_FOR_ENTITY.as_str())
            .bind(tenant.as_str())
            .bind(entity.kind().as_str())
            .bind(entity.id())
            .bind(context.as_str())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?
            .into_iter()
            .map(DocumentRelation::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let ids: Vec<Uuid> = relations.iter().map(|r| *r.document_id().as_uuid()).collect();
        let documents = sqlx::query_as::<_, DocumentRow>(DOCUMENTS_BY_IDS.as_str())
            .bind(tenant.as_str())
            .bind(&ids)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?
            .into_iter()
            .map(|row| Document::try_from(row).map(|d| (d.id(), d)))
            .collect::<Result<std::collections::HashMap<_, _>, _>>()?;

        Ok(relations
            .into_iter()
            .filter_map(|relation| {
                documents
                    .get(&relation.document_id())
                    .cloned()
                    .map(|document| LinkedDocument { relation, document })
            })
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), DocumentError> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), DocumentError> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}

/// Maps the outcome of a document INSERT/UPDATE, turning a hit on the
/// active-slot index into `DuplicateActiveDocument`.
fn map_document_write(
    result: Result<sqlx::postgres::PgQueryResult, sqlx::Error>,
    document: &Document,
) -> Result<u64, DocumentError> {
    match result {
        Ok(done) if done.rows_affected() == 0 => {
            Err(DocumentError::document_not_found(document.id()))
        }
        Ok(done) => Ok(done.rows_affected()),
        Err(sqlx::Error::Database(db_err))
            if db_err.is_unique_violation() && db_err.constraint() == Some(ACTIVE_SLOT_INDEX) =>
        {
            Err(DocumentError::duplicate_active(
                document.owner(),
                document.document_type(),
            ))
        }
        Err(e) => Err(map_sqlx_error(e)),
    }
}

/// Serialization failures and deadlocks abort the transaction; anything
/// else is a storage failure.
fn map_sqlx_error(err: sqlx::Error) -> DocumentError {
    if let sqlx::Error::Database(db_err) = &err {
        if let Some(code) = db_err.code() {
            if code == "40001" || code == "40P01" {
                return DocumentError::aborted("transaction", db_err.message().to_string());
            }
        }
    }
    DocumentError::storage(err.to_string())
}

// ════════════════════════════════════════════════════════════════════════════
// Row mapping
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    tenant_id: String,
    owner_kind: String,
    owner_id: String,
    document_type: String,
    file_ref: String,
    status: String,
    valid_from: DateTime<Utc>,
    valid_to: Option<DateTime<Utc>>,
    is_active: bool,
    superseded_by: Option<Uuid>,
    supersession_reason: Option<String>,
    rejection_reason: Option<String>,
    reviewed_by: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DocumentRow> for Document {
    type Error = DocumentError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        let corrupt = |e: ValidationError| {
            DocumentError::storage(format!("corrupt document row {}: {}", row.id, e))
        };
        let owner_kind: EntityKind = row.owner_kind.parse().map_err(corrupt)?;
        let owner = EntityRef::new(owner_kind, row.owner_id.clone()).map_err(corrupt)?;
        let tenant_id = TenantId::new(row.tenant_id.clone()).map_err(corrupt)?;
        let document_type = row.document_type.parse().map_err(corrupt)?;
        let file_ref = FileRef::new(row.file_ref.clone()).map_err(corrupt)?;
        let status: DocumentStatus = row.status.parse().map_err(corrupt)?;
        let reviewed_by = row
            .reviewed_by
            .clone()
            .map(ActorId::new)
            .transpose()
            .map_err(corrupt)?;

        Ok(Document::reconstitute(
            DocumentId::from_uuid(row.id),
            tenant_id,
            owner,
            document_type,
            file_ref,
            status,
            Timestamp::from_datetime(row.valid_from),
            row.valid_to.map(Timestamp::from_datetime),
            row.is_active,
            row.superseded_by.map(DocumentId::from_uuid),
            row.supersession_reason,
            row.rejection_reason,
            reviewed_by,
            row.reviewed_at.map(Timestamp::from_datetime),
            Timestamp::from_datetime(row.created_at),
            Timestamp::from_datetime(row.updated_at),
        ))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RelationRow {
    id: Uuid,
    tenant_id: String,
    document_id: Uuid,
    related_kind: String,
    related_id: String,
    context: String,
    created_by: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    revoked_by: Option<String>,
}

impl TryFrom<RelationRow> for DocumentRelation {
    type Error = DocumentError;

    fn try_from(row: RelationRow) -> Result<Self, Self::Error> {
        let corrupt = |e: ValidationError| {
            DocumentError::storage(format!("corrupt relation row {}: {}", row.id, e))
        };
        let kind: EntityKind = row.related_kind.parse().map_err(corrupt)?;
        let related = EntityRef::new(kind, row.related_id.clone()).map_err(corrupt)?;
        let context: RelationContext = row.context.parse().map_err(corrupt)?;
        let tenant_id = TenantId::new(row.tenant_id.clone()).map_err(corrupt)?;
        let created_by = row
            .created_by
            .clone()
            .map(ActorId::new)
            .transpose()
            .map_err(corrupt)?;
        let revoked_by = row
            .revoked_by
            .clone()
            .map(ActorId::new)
            .transpose()
            .map_err(corrupt)?;

        Ok(DocumentRelation::reconstitute(
            RelationId::from_uuid(row.id),
            tenant_id,
            DocumentId::from_uuid(row.document_id),
            related,
            context,
            created_by,
            row.notes,
            Timestamp::from_datetime(row.created_at),
            row.revoked_at.map(Timestamp::from_datetime),
            revoked_by,
        ))
    }
}
