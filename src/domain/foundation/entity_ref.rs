//! Polymorphic references to entities this core does not own.
//!
//! Documents belong to applicants or companies and are consumed by
//! applications. Instead of a free-form `(type, id)` string pair, a reference
//! is a tagged value: an [`EntityKind`] plus an opaque identifier. Which
//! identifier shapes are acceptable for each kind is decided by an
//! [`EntityKindRegistry`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use super::ValidationError;

/// Kind of entity a document can be owned by or linked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Applicant,
    Company,
    Application,
    Guarantor,
}

impl EntityKind {
    /// All kinds, in declaration order.
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Applicant,
        EntityKind::Company,
        EntityKind::Application,
        EntityKind::Guarantor,
    ];

    /// Returns the storage string for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Applicant => "applicant",
            EntityKind::Company => "company",
            EntityKind::Application => "application",
            EntityKind::Guarantor => "guarantor",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                ValidationError::invalid_format("entity_kind", format!("unknown kind '{}'", s))
            })
    }
}

/// Reference to an external entity: kind plus opaque identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    kind: EntityKind,
    id: String,
}

impl EntityRef {
    /// Creates a reference. The identifier must be non-empty; kind-specific
    /// shape checks are done by [`EntityKindRegistry::validate`].
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::empty_field(format!("{}_id", kind)));
        }
        Ok(Self { kind, id })
    }

    pub fn applicant(id: impl Into<String>) -> Result<Self, ValidationError> {
        Self::new(EntityKind::Applicant, id)
    }

    pub fn company(id: impl Into<String>) -> Result<Self, ValidationError> {
        Self::new(EntityKind::Company, id)
    }

    pub fn application(id: impl Into<String>) -> Result<Self, ValidationError> {
        Self::new(EntityKind::Application, id)
    }

    /// Returns the entity kind.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Returns the opaque identifier.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Checks that an identifier has an acceptable shape for its kind.
pub trait ReferenceValidator: Send + Sync {
    fn validate(&self, id: &str) -> Result<(), ValidationError>;
}

/// Accepts any printable identifier up to `max_len` bytes.
///
/// Identifiers are treated as opaque: partially user-entered values (for
/// example registry numbers whose check digit is still a placeholder) are
/// accepted as-is.
#[derive(Debug, Clone, Copy)]
pub struct OpaqueIdentifier {
    pub max_len: usize,
}

impl Default for OpaqueIdentifier {
    fn default() -> Self {
        Self { max_len: 128 }
    }
}

impl ReferenceValidator for OpaqueIdentifier {
    fn validate(&self, id: &str) -> Result<(), ValidationError> {
        if id.len() > self.max_len {
            return Err(ValidationError::invalid_format(
                "entity_id",
                format!("longer than {} bytes", self.max_len),
            ));
        }
        if id.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(ValidationError::invalid_format(
                "entity_id",
                "contains whitespace or control characters",
            ));
        }
        Ok(())
    }
}

/// Accepts only hyphenated UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdentifier;

impl ReferenceValidator for UuidIdentifier {
    fn validate(&self, id: &str) -> Result<(), ValidationError> {
        Uuid::parse_str(id)
            .map(|_| ())
            .map_err(|e| ValidationError::invalid_format("entity_id", e.to_string()))
    }
}

/// Maps each [`EntityKind`] to the validator for its identifiers.
///
/// Kinds without a registered validator are rejected, so a new kind cannot
/// slip through before someone decides what its identifiers look like.
#[derive(Clone)]
pub struct EntityKindRegistry {
    validators: HashMap<EntityKind, Arc<dyn ReferenceValidator>>,
}

impl EntityKindRegistry {
    /// Creates a registry with no kinds registered.
    pub fn empty() -> Self {
        Self {
            validators: HashMap::new(),
        }
    }

    /// Registers (or replaces) the validator for a kind.
    pub fn register(mut self, kind: EntityKind, validator: impl ReferenceValidator + 'static) -> Self {
        self.validators.insert(kind, Arc::new(validator));
        self
    }

    /// Returns true if the kind has a validator.
    pub fn is_registered(&self, kind: EntityKind) -> bool {
        self.validators.contains_key(&kind)
    }

    /// Validates a reference against its kind's validator.
    pub fn validate(&self, reference: &EntityRef) -> Result<(), ValidationError> {
        let validator = self.validators.get(&reference.kind()).ok_or_else(|| {
            ValidationError::invalid_format(
                "entity_kind",
                format!("kind '{}' is not registered", reference.kind()),
            )
        })?;
        validator.validate(reference.id())
    }
}

impl Default for EntityKindRegistry {
    /// Every kind accepts opaque identifiers.
    fn default() -> Self {
        EntityKind::ALL
            .into_iter()
            .fold(Self::empty(), |registry, kind| {
                registry.register(kind, OpaqueIdentifier::default())
            })
    }
}

impl fmt::Debug for EntityKindRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.validators.keys().collect();
        kinds.sort();
        f.debug_struct("EntityKindRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}
