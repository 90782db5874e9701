//! EventPublisher port - the audit sink.
//!
//! Lifecycle services hand committed audit events to this port. Where they
//! end up (log pipeline, queue, audit table) is the adapter's business.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Port for publishing audit events.
///
/// Publishing happens after the ledger transaction has committed, so a
/// failure here never undoes a lifecycle change. Callers log and move on.
///
/// # Example
///
/// ```ignore
/// let envelope = audit_event.to_envelope()?;
/// publisher.publish(envelope).await?;
/// ```
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Publish several events, in order.
    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError>;
}
