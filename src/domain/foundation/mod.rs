//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, polymorphic entity references,
//! events and error types that form the vocabulary of the document core.

mod command;
mod entity_ref;
mod errors;
mod events;
mod ids;
mod state_machine;
mod timestamp;

pub use command::CommandMetadata;
pub use entity_ref::{
    EntityKind, EntityKindRegistry, EntityRef, OpaqueIdentifier, ReferenceValidator,
    UuidIdentifier,
};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{DomainEvent, EventEnvelope, EventId, EventMetadata, SerializableDomainEvent};
pub use ids::{ActorId, DocumentId, RelationId, TenantId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
