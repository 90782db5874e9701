//! Audit module - the structured event stream for lifecycle changes.

mod event;

pub use event::{AuditAction, DocumentAuditEvent};
