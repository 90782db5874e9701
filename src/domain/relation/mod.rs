//! Relation module - links between documents and the entities that own,
//! use, or reference them.

mod aggregate;
mod context;

pub use aggregate::{DocumentRelation, LinkedDocument, RelationKey, MAX_NOTES_LENGTH};
pub use context::RelationContext;
