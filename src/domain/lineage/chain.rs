//! Bounded walks over `superseded_by` pointers.
//!
//! Storage hands over the documents around a starting row; the walk itself
//! happens here so that cycle and depth protection do not depend on the
//! adapter. Each walk keeps an explicit hop counter and a visited set, and
//! fails instead of truncating.

use std::collections::{HashMap, HashSet};

use crate::domain::document::{Document, DocumentError};
use crate::domain::foundation::DocumentId;

/// The slice of the supersession graph surrounding one document.
#[derive(Debug, Clone, Default)]
pub struct SupersessionGraph {
    by_id: HashMap<DocumentId, Document>,
    predecessors: HashMap<DocumentId, Vec<DocumentId>>,
}

impl SupersessionGraph {
    pub fn from_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let mut by_id = HashMap::new();
        for doc in documents {
            by_id.insert(doc.id(), doc);
        }

        let mut predecessors: HashMap<DocumentId, Vec<DocumentId>> = HashMap::new();
        for doc in by_id.values() {
            if let Some(next) = doc.superseded_by() {
                predecessors.entry(next).or_default().push(doc.id());
            }
        }
        // Forks resolve to the earliest-created predecessor.
        for preds in predecessors.values_mut() {
            preds.sort_by_key(|id| by_id.get(id).map(|d| (d.created_at(), *id)));
        }

        Self {
            by_id,
            predecessors,
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: DocumentId) -> Option<&Document> {
        self.by_id.get(&id)
    }

    /// Documents from `start` to the newest version, oldest first.
    pub fn forward(&self, start: DocumentId, max_depth: u32) -> Result<Vec<Document>, DocumentError> {
        self.walk(start, max_depth, |doc| doc.superseded_by())
    }

    /// Documents from `start` back to the original upload, `start` first.
    pub fn backward(&self, start: DocumentId, max_depth: u32) -> Result<Vec<Document>, DocumentError> {
        self.walk(start, max_depth, |doc| {
            self.predecessors
                .get(&doc.id())
                .and_then(|preds| preds.first().copied())
        })
    }

    /// Whole lineage through `start`, oldest first, each document once.
    pub fn complete(&self, start: DocumentId, max_depth: u32) -> Result<Vec<Document>, DocumentError> {
        let mut chain = self.backward(start, max_depth)?;
        chain.reverse();
        let forward = self.forward(start, max_depth)?;

        let mut seen: HashSet<DocumentId> = chain.iter().map(Document::id).collect();
        for doc in forward.into_iter().skip(1) {
            if seen.insert(doc.id()) {
                chain.push(doc);
            }
        }
        Ok(chain)
    }

    fn walk<F>(&self, start: DocumentId, max_depth: u32, next: F) -> Result<Vec<Document>, DocumentError>
    where
        F: Fn(&Document) -> Option<DocumentId>,
    {
        let first = self
            .by_id
            .get(&start)
            .ok_or_else(|| DocumentError::document_not_found(start))?;

        let mut visited = HashSet::from([start]);
        let mut chain = vec![first.clone()];
        let mut current = first;
        let mut depth: u32 = 0;

        while let Some(next_id) = next(current) {
            if !visited.insert(next_id) {
                return Err(DocumentError::ChainCycleDetected {
                    document_id: next_id,
                });
            }
            depth += 1;
            if depth > max_depth {
                return Err(DocumentError::ChainDepthExceeded { start, max_depth });
            }
            current = self
                .by_id
                .get(&next_id)
                .ok_or_else(|| DocumentError::document_not_found(next_id))?;
            chain.push(current.clone());
        }

        Ok(chain)
    }
}
