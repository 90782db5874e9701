//! Domain layer containing the document lifecycle rules.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, entity references, events, errors)
//! - `document` - Document aggregate, status and slot uniqueness key
//! - `relation` - Soft-deletable links between documents and entities
//! - `lineage` - Bounded supersession chain traversal
//! - `audit` - Audit event shape

pub mod audit;
pub mod document;
pub mod foundation;
pub mod lineage;
pub mod relation;
