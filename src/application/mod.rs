//! Application layer - lifecycle services over the ledger ports.
//!
//! Each service owns one concern and runs every write in a single ledger
//! transaction. `DocumentLifecycle` wires them against shared adapters.

mod audit;
mod linker;
mod registrar;
mod snapshot;
mod supersession;
mod transaction;

use std::sync::Arc;

pub use linker::RelationLinker;
pub use registrar::DocumentRegistrar;
pub use snapshot::SnapshotService;
pub use supersession::SupersessionEngine;

use crate::config::LineageConfig;
use crate::domain::foundation::EntityKindRegistry;
use crate::ports::{DocumentLedger, EntityDirectory, EventPublisher};

/// The four lifecycle services sharing one ledger, directory and audit sink.
///
/// # Example
///
/// ```ignore
/// let lifecycle = DocumentLifecycle::new(ledger, directory, bus, LineageConfig::default());
///
/// let d1 = lifecycle.registrar().create(&meta, owner, DocumentType::ProofOfAddress, file).await?;
/// lifecycle.snapshots().create_snapshot(&meta, &application, None).await?;
/// let d2 = lifecycle.supersession().supersede(&meta, d1.id(), draft, "address changed").await?;
/// ```
#[derive(Clone)]
pub struct DocumentLifecycle {
    registrar: DocumentRegistrar,
    supersession: SupersessionEngine,
    linker: RelationLinker,
    snapshots: SnapshotService,
}

impl DocumentLifecycle {
    pub fn new(
        ledger: Arc<dyn DocumentLedger>,
        directory: Arc<dyn EntityDirectory>,
        publisher: Arc<dyn EventPublisher>,
        lineage: LineageConfig,
    ) -> Self {
        Self {
            registrar: DocumentRegistrar::new(ledger.clone(), directory.clone(), publisher.clone()),
            supersession: SupersessionEngine::new(ledger.clone(), publisher.clone(), &lineage),
            linker: RelationLinker::new(ledger.clone(), publisher.clone()),
            snapshots: SnapshotService::new(ledger, directory, publisher),
        }
    }

    /// Replaces the reference validators used by every service.
    pub fn with_registry(self, registry: EntityKindRegistry) -> Self {
        Self {
            registrar: self.registrar.with_registry(registry.clone()),
            supersession: self.supersession,
            linker: self.linker.with_registry(registry.clone()),
            snapshots: self.snapshots.with_registry(registry),
        }
    }

    pub fn registrar(&self) -> &DocumentRegistrar {
        &self.registrar
    }

    pub fn supersession(&self) -> &SupersessionEngine {
        &self.supersession
    }

    pub fn linker(&self) -> &RelationLinker {
        &self.linker
    }

    pub fn snapshots(&self) -> &SnapshotService {
        &self.snapshots
    }
}
