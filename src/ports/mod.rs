//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the lifecycle services and the outside world. Adapters implement them.
//!
//! ## Storage
//!
//! - `DocumentLedger` / `LedgerTransaction` - transactional document and relation storage
//!
//! ## Directory
//!
//! - `EntityDirectory` - owner existence and consumer-to-owner resolution
//!
//! ## Events
//!
//! - `EventPublisher` - audit sink
//! - `EventSubscriber` / `EventHandler` - in-process audit consumers

mod document_ledger;
mod entity_directory;
mod event_publisher;
mod event_subscriber;

pub use document_ledger::{DocumentLedger, LedgerTransaction, RelationUpsert};
pub use entity_directory::EntityDirectory;
pub use event_publisher::EventPublisher;
pub use event_subscriber::{EventHandler, EventSubscriber};
