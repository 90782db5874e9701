//! DocumentStatus - review outcome of a document row.
//!
//! Status is orthogonal to activity: approving or rejecting a document never
//! changes whether it is the active one for its slot. Only supersession moves
//! a row to `Superseded`, and that is terminal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Superseded,
}

impl DocumentStatus {
    /// Returns the storage string for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "PENDING",
            DocumentStatus::Approved => "APPROVED",
            DocumentStatus::Rejected => "REJECTED",
            DocumentStatus::Superseded => "SUPERSEDED",
        }
    }

    /// Returns true once a reviewer has decided.
    pub fn is_reviewed(&self) -> bool {
        matches!(self, DocumentStatus::Approved | DocumentStatus::Rejected)
    }
}

impl StateMachine for DocumentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use DocumentStatus::*;
        matches!(
            (self, target),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Superseded)
                | (Approved, Superseded)
                | (Rejected, Superseded)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use DocumentStatus::*;
        match self {
            Pending => vec![Approved, Rejected, Superseded],
            Approved | Rejected => vec![Superseded],
            Superseded => vec![],
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(DocumentStatus::Pending),
            "APPROVED" => Ok(DocumentStatus::Approved),
            "REJECTED" => Ok(DocumentStatus::Rejected),
            "SUPERSEDED" => Ok(DocumentStatus::Superseded),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_pending() {
        assert_eq!(DocumentStatus::default(), DocumentStatus::Pending);
    }

    #[test]
    fn pending_can_be_reviewed_either_way() {
        assert!(DocumentStatus::Pending.can_transition_to(&DocumentStatus::Approved));
        assert!(DocumentStatus::Pending.can_transition_to(&DocumentStatus::Rejected));
    }

    #[test]
    fn review_outcomes_are_final_except_for_supersession() {
        assert!(!DocumentStatus::Approved.can_transition_to(&DocumentStatus::Rejected));
        assert!(!DocumentStatus::Rejected.can_transition_to(&DocumentStatus::Approved));
        assert!(DocumentStatus::Approved.can_transition_to(&DocumentStatus::Superseded));
        assert!(DocumentStatus::Rejected.can_transition_to(&DocumentStatus::Superseded));
    }

    #[test]
    fn superseded_is_terminal() {
        assert!(DocumentStatus::Superseded.is_terminal());
        assert!(DocumentStatus::Superseded
            .transition_to(DocumentStatus::Approved)
            .is_err());
    }

    #[test]
    fn can_transition_to_is_consistent_with_valid_transitions() {
        for status in [
            DocumentStatus::Pending,
            DocumentStatus::Approved,
            DocumentStatus::Rejected,
            DocumentStatus::Superseded,
        ] {
            for target in status.valid_transitions() {
                assert!(status.can_transition_to(&target));
            }
        }
    }

    #[test]
    fn storage_string_round_trips() {
        for status in [
            DocumentStatus::Pending,
            DocumentStatus::Approved,
            DocumentStatus::Rejected,
            DocumentStatus::Superseded,
        ] {
            assert_eq!(status.as_str().parse::<DocumentStatus>().unwrap(), status);
        }
    }
}
