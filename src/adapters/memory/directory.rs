//! In-memory EntityDirectory.
//!
//! Holds the applicants, companies and applications a deployment (or a test)
//! has registered, plus which owner each consuming entity belongs to.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use crate::domain::document::DocumentError;
use crate::domain::foundation::{EntityRef, TenantId};
use crate::ports::EntityDirectory;

#[derive(Debug, Default)]
pub struct InMemoryEntityDirectory {
    entities: RwLock<HashSet<(TenantId, EntityRef)>>,
    owners: RwLock<HashMap<(TenantId, EntityRef), EntityRef>>,
}

impl InMemoryEntityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity that can own documents.
    pub fn register(&self, tenant: &TenantId, entity: EntityRef) {
        self.entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((tenant.clone(), entity));
    }

    /// Registers a consuming entity and the owner whose documents it uses.
    /// Both ends become known entities.
    pub fn register_consumer(&self, tenant: &TenantId, consumer: EntityRef, owner: EntityRef) {
        self.register(tenant, owner.clone());
        self.register(tenant, consumer.clone());
        self.owners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((tenant.clone(), consumer), owner);
    }
}

#[async_trait]
impl EntityDirectory for InMemoryEntityDirectory {
    async fn exists(&self, tenant: &TenantId, entity: &EntityRef) -> Result<bool, DocumentError> {
        Ok(self
            .entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&(tenant.clone(), entity.clone())))
    }

    async fn owner_of(
        &self,
        tenant: &TenantId,
        consumer: &EntityRef,
    ) -> Result<Option<EntityRef>, DocumentError> {
        Ok(self
            .owners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(tenant.clone(), consumer.clone()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registered_entities_exist_per_tenant() {
        let dir = InMemoryEntityDirectory::new();
        let acme = TenantId::new("acme").unwrap();
        let globex = TenantId::new("globex").unwrap();
        let p1 = EntityRef::applicant("P1").unwrap();

        dir.register(&acme, p1.clone());

        assert!(dir.exists(&acme, &p1).await.unwrap());
        assert!(!dir.exists(&globex, &p1).await.unwrap());
    }

    #[tokio::test]
    async fn consumer_resolves_to_owner() {
        let dir = InMemoryEntityDirectory::new();
        let acme = TenantId::new("acme").unwrap();
        let app = EntityRef::application("A-1").unwrap();
        let p1 = EntityRef::applicant("P1").unwrap();

        dir.register_consumer(&acme, app.clone(), p1.clone());

        assert_eq!(dir.owner_of(&acme, &app).await.unwrap(), Some(p1.clone()));
        assert!(dir.exists(&acme, &p1).await.unwrap());
        assert_eq!(dir.owner_of(&acme, &p1).await.unwrap(), None);
    }
}
