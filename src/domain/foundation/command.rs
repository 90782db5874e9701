//! Command infrastructure for application services.
//!
//! Every service call takes a `CommandMetadata` that carries the tenant
//! scope and the acting identity explicitly. Nothing in this crate reads
//! tenant or actor from ambient request state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ActorId, TenantId};

/// Metadata context for service calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMetadata {
    /// Tenant every read and write is confined to.
    pub tenant_id: TenantId,

    /// Who is performing the operation (recorded on audit events).
    pub actor: ActorId,

    /// Links related operations across a single request.
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,

    /// Distributed tracing span/trace ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    trace_id: Option<String>,

    /// Source of this command (e.g., "api", "kyc-pipeline", "scheduler").
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

impl CommandMetadata {
    /// Creates new command metadata with required tenant and actor.
    pub fn new(tenant_id: TenantId, actor: ActorId) -> Self {
        Self {
            tenant_id,
            actor,
            correlation_id: None,
            trace_id: None,
            source: None,
        }
    }

    /// Builder: Add correlation ID for request tracing.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Builder: Add trace ID for distributed tracing.
    pub fn with_trace_id(mut self, id: impl Into<String>) -> Self {
        self.trace_id = Some(id.into());
        self
    }

    /// Builder: Add source identifier.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns the correlation ID, generating one if not set.
    pub fn correlation_id(&self) -> String {
        self.correlation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }

    /// Returns the correlation ID only if explicitly set.
    pub fn correlation_id_opt(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Returns the trace ID if set.
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Returns the source if set.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

#[cfg(test)]
impl CommandMetadata {
    /// Creates a test fixture scoped to tenant "test-tenant".
    pub fn test_fixture() -> Self {
        Self::new(
            TenantId::new("test-tenant").unwrap(),
            ActorId::new("test-officer").unwrap(),
        )
        .with_correlation_id("test-correlation-id")
        .with_source("test")
    }
}
