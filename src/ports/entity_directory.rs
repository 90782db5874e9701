//! EntityDirectory port - lookups into the systems that own applicants,
//! companies and applications.
//!
//! This crate never stores those entities. It only asks whether an owner
//! exists and which owner a consuming entity belongs to.

use async_trait::async_trait;

use crate::domain::document::DocumentError;
use crate::domain::foundation::{EntityRef, TenantId};

#[async_trait]
pub trait EntityDirectory: Send + Sync {
    /// Returns true if the entity exists in the tenant.
    async fn exists(&self, tenant: &TenantId, entity: &EntityRef) -> Result<bool, DocumentError>;

    /// Resolves the entity whose documents `consumer` relies on
    /// (e.g. the applicant behind an application).
    async fn owner_of(
        &self,
        tenant: &TenantId,
        consumer: &EntityRef,
    ) -> Result<Option<EntityRef>, DocumentError>;
}
