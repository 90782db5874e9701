//! Document module - evidence rows and their review and activity lifecycle.
//!
//! A `Document` is one version of one piece of evidence held by an owner.
//! Per (tenant, owner, type) slot at most one document is active at a time;
//! replacing it goes through supersession, never through in-place edits.

mod aggregate;
mod document_type;
mod errors;
mod status;
mod value_objects;

pub use aggregate::{Document, MAX_REASON_LENGTH};
pub use document_type::DocumentType;
pub use errors::DocumentError;
pub use status::DocumentStatus;
pub use value_objects::{DocumentDraft, DocumentSlot, FileRef};
