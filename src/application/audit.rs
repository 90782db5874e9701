//! Audit emission.
//!
//! Events go out only after the transaction that produced them committed.
//! The lifecycle change is already durable at that point, so a sink failure
//! is logged and does not fail the operation.

use std::sync::Arc;

use crate::domain::audit::DocumentAuditEvent;
use crate::domain::foundation::{CommandMetadata, SerializableDomainEvent};
use crate::ports::EventPublisher;

#[derive(Clone)]
pub(crate) struct AuditEmitter {
    publisher: Arc<dyn EventPublisher>,
}

impl AuditEmitter {
    pub(crate) fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    pub(crate) async fn emit(&self, meta: &CommandMetadata, events: Vec<DocumentAuditEvent>) {
        for event in events {
            let mut envelope = match event.to_envelope() {
                Ok(envelope) => envelope
                    .with_tenant_id(meta.tenant_id.as_str())
                    .with_user_id(meta.actor.as_str()),
                Err(err) => {
                    tracing::warn!(event_type = event.event.event_type(), error = %err, "audit event not serializable");
                    continue;
                }
            };
            if let Some(correlation_id) = meta.correlation_id_opt() {
                envelope = envelope.with_correlation_id(correlation_id);
            }
            if let Some(trace_id) = meta.trace_id() {
                envelope = envelope.with_trace_id(trace_id);
            }

            tracing::info!(
                event_type = %envelope.event_type,
                aggregate_id = %envelope.aggregate_id,
                tenant = %meta.tenant_id,
                actor = %meta.actor,
                "audit"
            );

            if let Err(err) = self.publisher.publish(envelope).await {
                tracing::warn!(error = %err, "audit publish failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryEventBus;
    use crate::domain::audit::AuditAction;
    use crate::domain::foundation::{DocumentId, Timestamp};

    #[tokio::test]
    async fn envelopes_carry_command_context() {
        let bus = Arc::new(InMemoryEventBus::new());
        let emitter = AuditEmitter::new(bus.clone());
        let meta = CommandMetadata::test_fixture();

        let event = DocumentAuditEvent::for_document(
            AuditAction::Approved,
            meta.tenant_id.clone(),
            DocumentId::new(),
            meta.actor.clone(),
            Timestamp::now(),
        );
        emitter.emit(&meta, vec![event]).await;

        let published = bus.published_events();
        assert_eq!(published.len(), 1);
        let metadata = &published[0].metadata;
        assert_eq!(metadata.tenant_id.as_deref(), Some("test-tenant"));
        assert_eq!(metadata.user_id.as_deref(), Some("test-officer"));
        assert_eq!(metadata.correlation_id.as_deref(), Some("test-correlation-id"));
    }
}
