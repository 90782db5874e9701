//! RelationContext - why a document is linked to an entity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationContext {
    /// The entity holds the document. Always the document's owner.
    Ownership,
    /// A consumer (e.g. a submitted application) relied on the document.
    Usage,
    /// Informational cross-reference.
    Reference,
}

impl RelationContext {
    pub const ALL: [RelationContext; 3] = [
        RelationContext::Ownership,
        RelationContext::Usage,
        RelationContext::Reference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationContext::Ownership => "OWNERSHIP",
            RelationContext::Usage => "USAGE",
            RelationContext::Reference => "REFERENCE",
        }
    }
}

impl fmt::Display for RelationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RelationContext {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationContext::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| {
                ValidationError::invalid_format("context", format!("unknown context '{}'", s))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_string_round_trips() {
        for c in RelationContext::ALL {
            assert_eq!(c.as_str().parse::<RelationContext>().unwrap(), c);
        }
    }

    #[test]
    fn unknown_context_is_rejected() {
        assert!("OWNER".parse::<RelationContext>().is_err());
    }
}
