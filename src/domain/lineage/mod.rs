//! Lineage module - supersession chain traversal.

mod chain;

pub use chain::SupersessionGraph;
