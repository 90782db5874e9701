//! doc-lineage - document lifecycle and supersession engine
//!
//! Tracks the evidence files attached to applicants and companies, keeps at
//! most one document of each type authoritative per owner, preserves the
//! lineage when a document is replaced, and freezes point-in-time references
//! for consumers such as submitted applications.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
