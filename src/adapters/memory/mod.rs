//! In-memory adapters for the storage and directory ports.
//!
//! - `InMemoryDocumentLedger` - snapshot-isolated ledger with commit-time uniqueness checks
//! - `InMemoryEntityDirectory` - registered owners and consumer-to-owner mapping

mod directory;
mod ledger;

pub use directory::InMemoryEntityDirectory;
pub use ledger::InMemoryDocumentLedger;
