//! Random lifecycle operation sequences must never leave a committed state
//! with two active documents in a slot, or an active flag that disagrees
//! with the validity window.

mod common;

use proptest::prelude::*;

use common::Harness;
use doc_lineage::domain::document::{Document, DocumentStatus, DocumentType};
use doc_lineage::domain::foundation::DocumentId;

const TYPES: [DocumentType; 2] = [DocumentType::ProofOfAddress, DocumentType::ProofOfIncome];

#[derive(Debug, Clone)]
enum Op {
    Create(usize),
    Activate(usize),
    Deactivate(usize),
    Supersede(usize),
    Approve(usize),
    Reject(usize),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..TYPES.len()).prop_map(Op::Create),
        any::<usize>().prop_map(Op::Activate),
        any::<usize>().prop_map(Op::Deactivate),
        any::<usize>().prop_map(Op::Supersede),
        any::<usize>().prop_map(Op::Approve),
        any::<usize>().prop_map(Op::Reject),
    ]
}

fn pick(known: &[Document], i: usize) -> Option<DocumentId> {
    known.get(i % known.len().max(1)).map(Document::id)
}

async fn apply(h: &Harness, known: &mut Vec<Document>, step: usize, op: &Op) {
    let registrar = h.lifecycle.registrar();

    // Failures are expected (duplicates, bad transitions); only the
    // committed state matters.
    match *op {
        Op::Create(t) => {
            if let Ok(doc) = registrar
                .create(&h.meta, h.applicant.clone(), TYPES[t], common::file(&format!("c{step}")))
                .await
            {
                known.push(doc);
            }
        }
        Op::Activate(i) => {
            if let Some(id) = pick(known, i) {
                let _ = registrar.activate(&h.meta, id).await;
            }
        }
        Op::Deactivate(i) => {
            if let Some(id) = pick(known, i) {
                let _ = registrar.deactivate(&h.meta, id).await;
            }
        }
        Op::Supersede(i) => {
            if let Some(id) = pick(known, i) {
                let document_type = h.stored(id).await.document_type();
                if let Ok(doc) = h
                    .lifecycle
                    .supersession()
                    .supersede(&h.meta, id, h.draft(document_type, &format!("s{step}")), "replaced")
                    .await
                {
                    known.push(doc);
                }
            }
        }
        Op::Approve(i) => {
            if let Some(id) = pick(known, i) {
                let _ = registrar.approve(&h.meta, id).await;
            }
        }
        Op::Reject(i) => {
            if let Some(id) = pick(known, i) {
                let _ = registrar.reject(&h.meta, id, "illegible").await;
            }
        }
    }
}

async fn check_invariants(h: &Harness) -> Result<(), String> {
    let overfull = h.overfull_slots().await;
    if !overfull.is_empty() {
        return Err(format!("slots with several active documents: {overfull:?}"));
    }
    for doc in h.ledger.documents().await {
        if doc.is_active() != doc.valid_to().is_none() {
            return Err(format!("document {} active flag disagrees with window", doc.id()));
        }
        if doc.status() == DocumentStatus::Superseded && (doc.is_active() || doc.superseded_by().is_none()) {
            return Err(format!("document {} superseded inconsistently", doc.id()));
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn single_active_and_window_invariants_hold(ops in prop::collection::vec(arb_op(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let outcome = runtime.block_on(async {
            let h = Harness::new();
            let mut known = Vec::new();
            for (step, op) in ops.iter().enumerate() {
                apply(&h, &mut known, step, op).await;
                check_invariants(&h).await.map_err(|e| format!("after step {step} {op:?}: {e}"))?;
            }
            Ok::<(), String>(())
        });

        prop_assert_eq!(outcome, Ok(()));
    }
}
