//! Adapters - Implementations of port interfaces.
//!
//! - `memory` - In-process ledger and entity directory
//! - `postgres` - PostgreSQL ledger and pool setup
//! - `events` - Audit event bus

pub mod events;
pub mod memory;
pub mod postgres;

pub use events::InMemoryEventBus;
pub use memory::{InMemoryDocumentLedger, InMemoryEntityDirectory};
pub use postgres::PostgresDocumentLedger;
