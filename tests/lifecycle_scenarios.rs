//! End-to-end lifecycle scenarios against the in-memory adapters.
//!
//! Covers replacement of a document, snapshot freezing, chain traversal and
//! rollback of multi-step operations when a storage step fails.

mod common;

use std::sync::Arc;

use common::{ids, Harness, ScriptedLedger};
use doc_lineage::application::DocumentLifecycle;
use doc_lineage::config::LineageConfig;
use doc_lineage::domain::audit::AuditAction;
use doc_lineage::domain::document::{DocumentError, DocumentStatus, DocumentType};
use doc_lineage::domain::foundation::{EntityRef, ErrorCode, Timestamp};
use doc_lineage::domain::relation::RelationContext;

// =============================================================================
// Replacement
// =============================================================================

#[tokio::test]
async fn replacing_a_document_requires_supersede() {
    let h = Harness::new();
    let d1 = h.create(DocumentType::ProofOfAddress, "bill-2025").await;
    assert!(d1.is_active());

    let direct = h
        .lifecycle
        .registrar()
        .create(&h.meta, h.applicant.clone(), DocumentType::ProofOfAddress, common::file("bill-2026"))
        .await;
    assert!(matches!(direct, Err(DocumentError::DuplicateActiveDocument { .. })));

    let d2 = h
        .lifecycle
        .supersession()
        .supersede(&h.meta, d1.id(), h.draft(DocumentType::ProofOfAddress, "bill-2026"), "moved house")
        .await
        .unwrap();

    let d1 = h.stored(d1.id()).await;
    assert_eq!(d1.status(), DocumentStatus::Superseded);
    assert!(d2.is_active());

    let chain = h.lifecycle.supersession().complete_chain(&h.meta, d1.id()).await.unwrap();
    assert_eq!(ids(&chain), vec![d1.id(), d2.id()]);
}

#[tokio::test]
async fn supersede_postconditions_hold_together() {
    let h = Harness::new();
    let a = h.create(DocumentType::ProofOfIdentity, "passport").await;
    h.lifecycle.registrar().approve(&h.meta, a.id()).await.unwrap();

    let b = h
        .lifecycle
        .supersession()
        .supersede(&h.meta, a.id(), h.draft(DocumentType::ProofOfIdentity, "passport-renewed"), "renewed")
        .await
        .unwrap();

    let a = h.stored(a.id()).await;
    let b = h.stored(b.id()).await;
    assert!(!a.is_active());
    assert!(a.valid_to().is_some());
    assert_eq!(a.superseded_by(), Some(b.id()));
    assert_eq!(a.status(), DocumentStatus::Superseded);
    assert!(b.is_active());
    assert!(b.valid_to().is_none());
    assert!(h.overfull_slots().await.is_empty());

    let owned: Vec<_> = h
        .lifecycle
        .linker()
        .relations_for_document(&h.meta, b.id())
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.context() == RelationContext::Ownership)
        .collect();
    assert_eq!(owned.len(), 1);
}

#[tokio::test]
async fn supersede_emits_audit_trail_for_both_rows() {
    let h = Harness::new();
    let d1 = h.create(DocumentType::BankStatement, "march").await;
    h.bus.clear();

    let d2 = h
        .lifecycle
        .supersession()
        .supersede(&h.meta, d1.id(), h.draft(DocumentType::BankStatement, "april"), "newer statement")
        .await
        .unwrap();

    assert_eq!(h.bus.actions_for(&d1.id().to_string()), vec![AuditAction::Superseded]);
    assert_eq!(
        h.bus.actions_for(&d2.id().to_string()),
        vec![AuditAction::Created, AuditAction::RelationLinked]
    );

    let superseded = h
        .bus
        .audit_events()
        .into_iter()
        .find(|e| e.event == AuditAction::Superseded)
        .unwrap();
    assert_eq!(superseded.related_ids, vec![d2.id().to_string()]);
    assert_eq!(superseded.reason.as_deref(), Some("newer statement"));
    assert_eq!(superseded.actor, h.meta.actor);
}

// =============================================================================
// Snapshots
// =============================================================================

#[tokio::test]
async fn snapshot_keeps_pointing_at_superseded_document() {
    let h = Harness::new();
    let d1 = h.create(DocumentType::ProofOfAddress, "bill-2025").await;

    let linked = h
        .lifecycle
        .snapshots()
        .create_snapshot(&h.meta, &h.application, None)
        .await
        .unwrap();
    assert_eq!(linked, 1);

    let d2 = h
        .lifecycle
        .supersession()
        .supersede(&h.meta, d1.id(), h.draft(DocumentType::ProofOfAddress, "bill-2026"), "moved house")
        .await
        .unwrap();

    let linker = h.lifecycle.linker();
    assert!(linker
        .has_all_required(&h.meta, &h.application, &[DocumentType::ProofOfAddress])
        .await
        .unwrap());

    let usage = linker
        .linked_documents(&h.meta, &h.application, RelationContext::Usage)
        .await
        .unwrap();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].document.id(), d1.id());
    assert_ne!(usage[0].document.id(), d2.id());
    assert!(!usage[0].relation.is_revoked());
}

#[tokio::test]
async fn snapshot_reports_missing_types() {
    let h = Harness::new();
    h.create(DocumentType::ProofOfIdentity, "passport").await;
    h.lifecycle
        .snapshots()
        .create_snapshot(&h.meta, &h.application, None)
        .await
        .unwrap();

    let missing = h
        .lifecycle
        .linker()
        .missing_types(
            &h.meta,
            &h.application,
            &[DocumentType::ProofOfIdentity, DocumentType::ProofOfIncome],
        )
        .await
        .unwrap();
    assert_eq!(missing, vec![DocumentType::ProofOfIncome]);
}

#[tokio::test]
async fn failed_link_aborts_whole_snapshot() {
    let h = Harness::new();
    h.create(DocumentType::ProofOfIdentity, "passport").await;
    h.create(DocumentType::ProofOfAddress, "bill").await;
    let relations_before = h.ledger.relations().await.len();

    // Upserts run ownership then usage per document; the third is the
    // second document's ownership link.
    let failing = DocumentLifecycle::new(
        Arc::new(ScriptedLedger::new(h.ledger.clone()).failing_upsert(3)),
        h.directory.clone(),
        h.bus.clone(),
        LineageConfig::default(),
    );
    let result = failing
        .snapshots()
        .create_snapshot(&h.meta, &h.application, None)
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, DocumentError::TransactionAborted { operation: "create_snapshot", .. }));
    assert!(err.is_retryable());
    assert_eq!(h.ledger.relations().await.len(), relations_before);
    assert!(!h.bus.has_event("document.snapshot_created.v1"));
}

#[tokio::test]
async fn snapshot_in_the_past_ignores_later_uploads() {
    let h = Harness::new();
    h.create(DocumentType::ProofOfIdentity, "passport").await;
    let before_upload = Timestamp::now().minus_secs(3600);

    let linked = h
        .lifecycle
        .snapshots()
        .create_snapshot(&h.meta, &h.application, Some(before_upload))
        .await
        .unwrap();

    assert_eq!(linked, 0);
}

#[tokio::test]
async fn repeated_links_leave_one_live_row() {
    let h = Harness::new();
    let doc = h.create(DocumentType::TaxReturn, "sa302").await;
    let linker = h.lifecycle.linker();

    for _ in 0..2 {
        linker
            .link_ownership(&h.meta, doc.id(), h.applicant.clone())
            .await
            .unwrap();
        linker
            .link_usage(&h.meta, doc.id(), h.application.clone(), None)
            .await
            .unwrap();
    }

    let relations = linker.relations_for_document(&h.meta, doc.id()).await.unwrap();
    let live = |context: RelationContext| {
        relations
            .iter()
            .filter(|r| r.context() == context && !r.is_revoked())
            .count()
    };
    assert_eq!(live(RelationContext::Ownership), 1);
    assert_eq!(live(RelationContext::Usage), 1);
}

#[tokio::test]
async fn revoked_link_can_be_recreated() {
    let h = Harness::new();
    let doc = h.create(DocumentType::TaxReturn, "sa302").await;
    let linker = h.lifecycle.linker();
    let guarantor = EntityRef::new(doc_lineage::domain::foundation::EntityKind::Guarantor, "G1").unwrap();

    let first = linker
        .link_reference(&h.meta, doc.id(), guarantor.clone(), Some("guarantor income".into()))
        .await
        .unwrap();
    linker.revoke(&h.meta, first.id()).await.unwrap();
    let second = linker
        .link_reference(&h.meta, doc.id(), guarantor, None)
        .await
        .unwrap();

    assert_ne!(first.id(), second.id());
    let all = linker.relations_for_document(&h.meta, doc.id()).await.unwrap();
    assert_eq!(all.iter().filter(|r| r.context() == RelationContext::Reference).count(), 2);
    assert_eq!(all.iter().filter(|r| r.is_revoked()).count(), 1);
}

// =============================================================================
// Chains
// =============================================================================

#[tokio::test]
async fn chain_queries_agree_from_every_member() {
    let h = Harness::new();
    let mut chain = vec![h.create(DocumentType::ProofOfIncome, "payslip-0").await];
    for i in 1..5 {
        let previous = chain[i - 1].id();
        let next = h
            .lifecycle
            .supersession()
            .supersede(&h.meta, previous, h.draft(DocumentType::ProofOfIncome, &format!("payslip-{i}")), "monthly")
            .await
            .unwrap();
        chain.push(next);
    }
    let expected = ids(&chain);
    let engine = h.lifecycle.supersession();

    assert_eq!(ids(&engine.forward_chain(&h.meta, expected[0]).await.unwrap()), expected);

    let mut reversed = expected.clone();
    reversed.reverse();
    assert_eq!(ids(&engine.backward_chain(&h.meta, expected[4]).await.unwrap()), reversed);

    for id in &expected {
        assert_eq!(ids(&engine.complete_chain(&h.meta, *id).await.unwrap()), expected);
        assert_eq!(engine.current_version(&h.meta, *id).await.unwrap().id(), expected[4]);
    }
}

#[tokio::test]
async fn long_chain_fails_instead_of_truncating() {
    let h = Harness::new();
    let first = h.create(DocumentType::ProofOfAddress, "v0").await;
    let mut current = first.id();
    for i in 1..=150 {
        current = h
            .lifecycle
            .supersession()
            .supersede(&h.meta, current, h.draft(DocumentType::ProofOfAddress, &format!("v{i}")), "resubmitted")
            .await
            .unwrap()
            .id();
    }

    let engine = h.lifecycle.supersession();
    let forward = engine.forward_chain(&h.meta, first.id()).await;
    assert!(matches!(
        forward,
        Err(DocumentError::ChainDepthExceeded { max_depth: 100, .. })
    ));
    let backward = engine.backward_chain(&h.meta, current).await;
    assert!(matches!(backward, Err(DocumentError::ChainDepthExceeded { .. })));

    let err = forward.unwrap_err();
    assert_eq!(err.code(), ErrorCode::ChainDepthExceeded);
}

#[tokio::test]
async fn chain_depth_follows_configuration() {
    let h = Harness::with_config(LineageConfig { max_chain_depth: 3 });
    let first = h.create(DocumentType::ProofOfAddress, "v0").await;
    let mut current = first.id();
    for i in 1..=3 {
        current = h
            .lifecycle
            .supersession()
            .supersede(&h.meta, current, h.draft(DocumentType::ProofOfAddress, &format!("v{i}")), "resubmitted")
            .await
            .unwrap()
            .id();
    }

    let chain = h.lifecycle.supersession().forward_chain(&h.meta, first.id()).await.unwrap();
    assert_eq!(chain.len(), 4);
    assert_eq!(chain[3].id(), current);
}

// =============================================================================
// Rollback
// =============================================================================

#[tokio::test]
async fn supersede_rolls_back_when_ownership_link_fails() {
    let h = Harness::new();
    let d1 = h.create(DocumentType::ProofOfAddress, "bill").await;
    let documents_before = h.ledger.documents().await.len();

    let failing = DocumentLifecycle::new(
        Arc::new(ScriptedLedger::new(h.ledger.clone()).failing_upsert(1)),
        h.directory.clone(),
        h.bus.clone(),
        LineageConfig::default(),
    );
    let result = failing
        .supersession()
        .supersede(&h.meta, d1.id(), h.draft(DocumentType::ProofOfAddress, "bill-2"), "moved")
        .await;

    assert!(matches!(
        result,
        Err(DocumentError::TransactionAborted { operation: "supersede", .. })
    ));
    let d1 = h.stored(d1.id()).await;
    assert!(d1.is_active());
    assert_eq!(d1.status(), DocumentStatus::Pending);
    assert!(d1.superseded_by().is_none());
    assert_eq!(h.ledger.documents().await.len(), documents_before);
}

#[tokio::test]
async fn supersede_rolls_back_when_retiring_old_row_fails() {
    let h = Harness::new();
    let d1 = h.create(DocumentType::ProofOfAddress, "bill").await;

    let failing = DocumentLifecycle::new(
        Arc::new(ScriptedLedger::new(h.ledger.clone()).failing_update(1)),
        h.directory.clone(),
        h.bus.clone(),
        LineageConfig::default(),
    );
    let result = failing
        .supersession()
        .supersede(&h.meta, d1.id(), h.draft(DocumentType::ProofOfAddress, "bill-2"), "moved")
        .await;

    assert!(matches!(result, Err(DocumentError::TransactionAborted { .. })));
    assert!(h.stored(d1.id()).await.is_active());
    assert_eq!(h.ledger.documents().await.len(), 1);
}

// =============================================================================
// Tenancy
// =============================================================================

#[tokio::test]
async fn other_tenant_cannot_see_or_supersede_documents() {
    let h = Harness::new();
    let d1 = h.create(DocumentType::ProofOfAddress, "bill").await;
    let intruder = common::metadata("globex", "officer-9");

    let found = h.lifecycle.registrar().find(&intruder, d1.id()).await;
    assert!(matches!(found, Err(DocumentError::NotFound { .. })));

    let superseded = h
        .lifecycle
        .supersession()
        .supersede(&intruder, d1.id(), h.draft(DocumentType::ProofOfAddress, "bill-2"), "takeover")
        .await;
    assert!(superseded.is_err());
    assert!(h.stored(d1.id()).await.is_active());
}
