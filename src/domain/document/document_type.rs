//! DocumentType enum - the evidence categories an owner can hold.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Category of evidence. At most one document per type is active per owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    ProofOfIdentity,
    ProofOfAddress,
    ProofOfIncome,
    BankStatement,
    TaxReturn,
    CompanyRegistration,
}

impl DocumentType {
    /// All document types, in declaration order.
    pub const ALL: [DocumentType; 6] = [
        DocumentType::ProofOfIdentity,
        DocumentType::ProofOfAddress,
        DocumentType::ProofOfIncome,
        DocumentType::BankStatement,
        DocumentType::TaxReturn,
        DocumentType::CompanyRegistration,
    ];

    /// Returns the storage string for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::ProofOfIdentity => "PROOF_OF_IDENTITY",
            DocumentType::ProofOfAddress => "PROOF_OF_ADDRESS",
            DocumentType::ProofOfIncome => "PROOF_OF_INCOME",
            DocumentType::BankStatement => "BANK_STATEMENT",
            DocumentType::TaxReturn => "TAX_RETURN",
            DocumentType::CompanyRegistration => "COMPANY_REGISTRATION",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                ValidationError::invalid_format("document_type", format!("unknown type '{}'", s))
            })
    }
}
