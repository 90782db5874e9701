//! EventSubscriber port - in-process consumers of the audit stream.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Handler for audit events.
///
/// Handlers must tolerate duplicates: the same `event_id` may arrive twice.
///
/// # Example
///
/// ```ignore
/// #[async_trait]
/// impl EventHandler for ComplianceLog {
///     async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError> {
///         let audit: DocumentAuditEvent = event.payload_as()?;
///         self.append(audit).await
///     }
///
///     fn name(&self) -> &'static str {
///         "ComplianceLog"
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Handler name used in log lines.
    fn name(&self) -> &'static str;
}

/// Registers handlers by event type (e.g. "document.superseded.v1").
pub trait EventSubscriber: Send + Sync {
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>);

    fn subscribe_all(&self, event_types: &[&str], handler: Arc<dyn EventHandler>);
}
