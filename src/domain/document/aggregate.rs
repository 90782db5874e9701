//! Document aggregate.
//!
//! A document row is one version of one piece of evidence. Rows are never
//! edited in place to replace their file; replacement creates a new row and
//! links the old one to it through `superseded_by`.
//!
//! # Invariants
//!
//! - `is_active` holds exactly when `valid_to` is `None`
//! - a `Superseded` row is inactive and has `superseded_by` set
//! - review fields are set together, and only on reviewed rows

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    ActorId, DocumentId, EntityRef, StateMachine, TenantId, Timestamp, ValidationError,
};

use super::{DocumentDraft, DocumentSlot, DocumentStatus, DocumentType, FileRef};

/// Maximum length for rejection and supersession reasons.
pub const MAX_REASON_LENGTH: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    id: DocumentId,
    tenant_id: TenantId,
    owner: EntityRef,
    document_type: DocumentType,
    file_ref: FileRef,
    status: DocumentStatus,

    /// Start of the current validity window.
    valid_from: Timestamp,

    /// End of the validity window; `None` while active.
    valid_to: Option<Timestamp>,
    is_active: bool,

    superseded_by: Option<DocumentId>,
    supersession_reason: Option<String>,
    rejection_reason: Option<String>,
    reviewed_by: Option<ActorId>,
    reviewed_at: Option<Timestamp>,

    created_at: Timestamp,
    updated_at: Timestamp,
}

impl Document {
    /// Creates a new pending, active document whose validity starts at `at`.
    pub fn new(tenant_id: TenantId, draft: DocumentDraft, at: Timestamp) -> Self {
        Self {
            id: DocumentId::new(),
            tenant_id,
            owner: draft.owner,
            document_type: draft.document_type,
            file_ref: draft.file_ref,
            status: DocumentStatus::Pending,
            valid_from: at,
            valid_to: None,
            is_active: true,
            superseded_by: None,
            supersession_reason: None,
            rejection_reason: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: at,
            updated_at: at,
        }
    }

    /// Reconstitute a document from persistence (no validation).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: DocumentId,
        tenant_id: TenantId,
        owner: EntityRef,
        document_type: DocumentType,
        file_ref: FileRef,
        status: DocumentStatus,
        valid_from: Timestamp,
        valid_to: Option<Timestamp>,
        is_active: bool,
        superseded_by: Option<DocumentId>,
        supersession_reason: Option<String>,
        rejection_reason: Option<String>,
        reviewed_by: Option<ActorId>,
        reviewed_at: Option<Timestamp>,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            id,
            tenant_id,
            owner,
            document_type,
            file_ref,
            status,
            valid_from,
            valid_to,
            is_active,
            superseded_by,
            supersession_reason,
            rejection_reason,
            reviewed_by,
            reviewed_at,
            created_at,
            updated_at,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn owner(&self) -> &EntityRef {
        &self.owner
    }

    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    pub fn file_ref(&self) -> &FileRef {
        &self.file_ref
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    pub fn valid_from(&self) -> Timestamp {
        self.valid_from
    }

    pub fn valid_to(&self) -> Option<Timestamp> {
        self.valid_to
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn superseded_by(&self) -> Option<DocumentId> {
        self.superseded_by
    }

    pub fn supersession_reason(&self) -> Option<&str> {
        self.supersession_reason.as_deref()
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn reviewed_by(&self) -> Option<&ActorId> {
        self.reviewed_by.as_ref()
    }

    pub fn reviewed_at(&self) -> Option<Timestamp> {
        self.reviewed_at
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Returns the uniqueness slot this document competes in.
    pub fn slot(&self) -> DocumentSlot {
        DocumentSlot {
            tenant_id: self.tenant_id.clone(),
            owner: self.owner.clone(),
            document_type: self.document_type,
        }
    }

    /// Returns true if `instant` falls inside `[valid_from, valid_to]`.
    /// An open window extends forever.
    pub fn is_valid_at(&self, instant: Timestamp) -> bool {
        if instant.is_before(&self.valid_from) {
            return false;
        }
        match self.valid_to {
            Some(end) => !instant.is_after(&end),
            None => true,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Review
    // ─────────────────────────────────────────────────────────────────────────

    /// Marks the document approved. Activity is unchanged.
    pub fn approve(&mut self, reviewer: ActorId, at: Timestamp) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(DocumentStatus::Approved)?;
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(at);
        self.updated_at = at;
        Ok(())
    }

    /// Marks the document rejected with a reviewer-supplied reason.
    pub fn reject(
        &mut self,
        reviewer: ActorId,
        reason: &str,
        at: Timestamp,
    ) -> Result<(), ValidationError> {
        let reason = validate_reason("rejection_reason", reason)?;
        self.status = self.status.transition_to(DocumentStatus::Rejected)?;
        self.rejection_reason = Some(reason);
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(at);
        self.updated_at = at;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Activity
    // ─────────────────────────────────────────────────────────────────────────

    /// Opens a fresh validity window at `at`.
    ///
    /// Returns `Ok(false)` when the document was already active. Superseded
    /// rows can never become active again.
    pub fn activate(&mut self, at: Timestamp) -> Result<bool, ValidationError> {
        if self.status == DocumentStatus::Superseded {
            return Err(ValidationError::invalid_format(
                "status",
                format!("document {} is superseded and cannot be activated", self.id),
            ));
        }
        if self.is_active {
            return Ok(false);
        }
        self.is_active = true;
        self.valid_from = at;
        self.valid_to = None;
        self.updated_at = at;
        Ok(true)
    }

    /// Closes the validity window at `at`. Returns false if already inactive.
    pub fn deactivate(&mut self, at: Timestamp) -> bool {
        if !self.is_active {
            return false;
        }
        self.is_active = false;
        self.valid_to = Some(at);
        self.updated_at = at;
        true
    }

    /// Retires this row in favour of `replacement`.
    ///
    /// The row must still be active and not yet superseded.
    pub fn mark_superseded(
        &mut self,
        replacement: DocumentId,
        reason: &str,
        at: Timestamp,
    ) -> Result<(), ValidationError> {
        if replacement == self.id {
            return Err(ValidationError::invalid_format(
                "superseded_by",
                "a document cannot supersede itself",
            ));
        }
        if !self.is_active {
            return Err(ValidationError::invalid_format(
                "is_active",
                format!("document {} is not active and cannot be superseded", self.id),
            ));
        }
        let reason = validate_reason("supersession_reason", reason)?;
        self.status = self.status.transition_to(DocumentStatus::Superseded)?;
        self.deactivate(at);
        self.superseded_by = Some(replacement);
        self.supersession_reason = Some(reason);
        Ok(())
    }

    /// Checks the row-local invariants. Storage adapters call this before
    /// writing so a corrupted aggregate never reaches a committed state.
    pub fn check_invariants(&self) -> Result<(), ValidationError> {
        if self.is_active != self.valid_to.is_none() {
            return Err(ValidationError::invalid_format(
                "valid_to",
                "must be unset exactly while the document is active",
            ));
        }
        if self.status == DocumentStatus::Superseded
            && (self.is_active || self.superseded_by.is_none())
        {
            return Err(ValidationError::invalid_format(
                "superseded_by",
                "a superseded document must be inactive and point at its replacement",
            ));
        }
        if let Some(end) = self.valid_to {
            if end.is_before(&self.valid_from) {
                return Err(ValidationError::invalid_format(
                    "valid_to",
                    "validity window ends before it starts",
                ));
            }
        }
        Ok(())
    }
}

fn validate_reason(field: &str, reason: &str) -> Result<String, ValidationError> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::empty_field(field));
    }
    if trimmed.len() > MAX_REASON_LENGTH {
        return Err(ValidationError::too_long(field, MAX_REASON_LENGTH, trimmed.len()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> DocumentDraft {
        DocumentDraft::new(
            EntityRef::applicant("P1").unwrap(),
            DocumentType::ProofOfAddress,
            FileRef::new("files/p1/bill.pdf").unwrap(),
        )
    }

    fn new_doc(at: Timestamp) -> Document {
        Document::new(TenantId::new("acme").unwrap(), draft(), at)
    }

    fn reviewer() -> ActorId {
        ActorId::new("officer-7").unwrap()
    }

    #[test]
    fn new_document_is_pending_and_active() {
        let at = Timestamp::now();
        let doc = new_doc(at);

        assert_eq!(doc.status(), DocumentStatus::Pending);
        assert!(doc.is_active());
        assert_eq!(doc.valid_from(), at);
        assert!(doc.valid_to().is_none());
        assert!(doc.check_invariants().is_ok());
    }

    #[test]
    fn approval_keeps_activity_and_records_reviewer() {
        let at = Timestamp::now();
        let mut doc = new_doc(at);
        doc.approve(reviewer(), at.plus_secs(5)).unwrap();

        assert_eq!(doc.status(), DocumentStatus::Approved);
        assert!(doc.is_active());
        assert_eq!(doc.reviewed_by(), Some(&reviewer()));
        assert_eq!(doc.reviewed_at(), Some(at.plus_secs(5)));
    }

    #[test]
    fn rejection_requires_reason() {
        let mut doc = new_doc(Timestamp::now());
        assert_eq!(
            doc.reject(reviewer(), "   ", Timestamp::now()),
            Err(ValidationError::empty_field("rejection_reason"))
        );
        assert_eq!(doc.status(), DocumentStatus::Pending);
    }

    #[test]
    fn approved_document_cannot_be_rejected() {
        let mut doc = new_doc(Timestamp::now());
        doc.approve(reviewer(), Timestamp::now()).unwrap();
        assert!(doc.reject(reviewer(), "blurry", Timestamp::now()).is_err());
    }

    #[test]
    fn deactivate_closes_window_once() {
        let at = Timestamp::now();
        let mut doc = new_doc(at);

        assert!(doc.deactivate(at.plus_secs(10)));
        assert!(!doc.is_active());
        assert_eq!(doc.valid_to(), Some(at.plus_secs(10)));
        assert!(!doc.deactivate(at.plus_secs(20)));
        assert_eq!(doc.valid_to(), Some(at.plus_secs(10)));
        assert!(doc.check_invariants().is_ok());
    }

    #[test]
    fn reactivation_opens_fresh_window() {
        let at = Timestamp::now();
        let mut doc = new_doc(at);
        doc.deactivate(at.plus_secs(10));

        assert_eq!(doc.activate(at.plus_secs(30)), Ok(true));
        assert_eq!(doc.valid_from(), at.plus_secs(30));
        assert!(doc.valid_to().is_none());
        assert_eq!(doc.activate(at.plus_secs(40)), Ok(false));
    }

    #[test]
    fn mark_superseded_retires_row() {
        let at = Timestamp::now();
        let mut doc = new_doc(at);
        let replacement = DocumentId::new();

        doc.mark_superseded(replacement, "address changed", at.plus_secs(60))
            .unwrap();

        assert_eq!(doc.status(), DocumentStatus::Superseded);
        assert!(!doc.is_active());
        assert_eq!(doc.valid_to(), Some(at.plus_secs(60)));
        assert_eq!(doc.superseded_by(), Some(replacement));
        assert_eq!(doc.supersession_reason(), Some("address changed"));
        assert!(doc.check_invariants().is_ok());
    }

    #[test]
    fn superseded_row_cannot_be_activated_or_superseded_again() {
        let at = Timestamp::now();
        let mut doc = new_doc(at);
        doc.mark_superseded(DocumentId::new(), "newer copy", at).unwrap();

        assert!(doc.activate(at.plus_secs(1)).is_err());
        assert!(doc
            .mark_superseded(DocumentId::new(), "again", at.plus_secs(2))
            .is_err());
    }

    #[test]
    fn inactive_row_cannot_be_superseded() {
        let at = Timestamp::now();
        let mut doc = new_doc(at);
        doc.deactivate(at);
        assert!(doc.mark_superseded(DocumentId::new(), "late", at).is_err());
        assert_eq!(doc.status(), DocumentStatus::Pending);
    }

    #[test]
    fn document_cannot_supersede_itself() {
        let mut doc = new_doc(Timestamp::now());
        let own_id = doc.id();
        assert!(doc.mark_superseded(own_id, "loop", Timestamp::now()).is_err());
    }

    #[test]
    fn validity_window_is_inclusive_on_both_ends() {
        let at = Timestamp::now();
        let mut doc = new_doc(at);

        assert!(!doc.is_valid_at(at.minus_secs(1)));
        assert!(doc.is_valid_at(at));
        assert!(doc.is_valid_at(at.add_days(365)));

        doc.deactivate(at.plus_secs(100));
        assert!(doc.is_valid_at(at.plus_secs(100)));
        assert!(!doc.is_valid_at(at.plus_secs(101)));
    }

    #[test]
    fn check_invariants_rejects_active_row_with_end_date() {
        let at = Timestamp::now();
        let doc = Document::reconstitute(
            DocumentId::new(),
            TenantId::new("acme").unwrap(),
            EntityRef::applicant("P1").unwrap(),
            DocumentType::ProofOfAddress,
            FileRef::new("f").unwrap(),
            DocumentStatus::Pending,
            at,
            Some(at),
            true,
            None,
            None,
            None,
            None,
            None,
            at,
            at,
        );
        assert!(doc.check_invariants().is_err());
    }
}
