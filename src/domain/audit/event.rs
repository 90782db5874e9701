//! Audit events emitted for every activity and relation change.
//!
//! One struct covers every action so the sink sees a single stable shape:
//! `{event, document_id, related_ids, actor, occurred_at, reason}`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{
    ActorId, DocumentId, DomainEvent, EntityRef, EventId, TenantId, Timestamp,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Activated,
    Deactivated,
    Superseded,
    Approved,
    Rejected,
    RelationLinked,
    RelationRevoked,
    SnapshotCreated,
}

impl AuditAction {
    /// Routing key used on the event bus.
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditAction::Created => "document.created.v1",
            AuditAction::Activated => "document.activated.v1",
            AuditAction::Deactivated => "document.deactivated.v1",
            AuditAction::Superseded => "document.superseded.v1",
            AuditAction::Approved => "document.approved.v1",
            AuditAction::Rejected => "document.rejected.v1",
            AuditAction::RelationLinked => "document.relation_linked.v1",
            AuditAction::RelationRevoked => "document.relation_revoked.v1",
            AuditAction::SnapshotCreated => "document.snapshot_created.v1",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.event_type())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAuditEvent {
    pub event_id: EventId,
    pub event: AuditAction,
    pub tenant_id: TenantId,

    /// Document the action applied to. Unset for snapshot summaries.
    pub document_id: Option<DocumentId>,

    /// Owner, consumer or related entity involved, when there is one.
    pub entity: Option<EntityRef>,

    /// Other rows touched by the same action (replacement, relation ids).
    pub related_ids: Vec<String>,
    pub actor: ActorId,
    pub occurred_at: Timestamp,
    pub reason: Option<String>,
}

impl DocumentAuditEvent {
    pub fn for_document(
        event: AuditAction,
        tenant_id: TenantId,
        document_id: DocumentId,
        actor: ActorId,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            event,
            tenant_id,
            document_id: Some(document_id),
            entity: None,
            related_ids: Vec::new(),
            actor,
            occurred_at,
            reason: None,
        }
    }

    pub fn for_entity(
        event: AuditAction,
        tenant_id: TenantId,
        entity: EntityRef,
        actor: ActorId,
        occurred_at: Timestamp,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            event,
            tenant_id,
            document_id: None,
            entity: Some(entity),
            related_ids: Vec::new(),
            actor,
            occurred_at,
            reason: None,
        }
    }

    pub fn with_entity(mut self, entity: EntityRef) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn with_related(mut self, id: impl ToString) -> Self {
        self.related_ids.push(id.to_string());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl DomainEvent for DocumentAuditEvent {
    fn event_type(&self) -> &'static str {
        self.event.event_type()
    }

    fn aggregate_id(&self) -> String {
        match (&self.document_id, &self.entity) {
            (Some(id), _) => id.to_string(),
            (None, Some(entity)) => entity.to_string(),
            (None, None) => String::new(),
        }
    }

    fn aggregate_type(&self) -> &'static str {
        if self.document_id.is_some() {
            "Document"
        } else {
            "Snapshot"
        }
    }

    fn occurred_at(&self) -> Timestamp {
        self.occurred_at
    }

    fn event_id(&self) -> EventId {
        self.event_id.clone()
    }
}
