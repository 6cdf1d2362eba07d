//! In-memory coordinate store.
//!
//! Coordinates are written once per processed document under a freshly
//! generated id and queried by viewers for text highlighting. The store is
//! process-lifetime state: nothing survives a restart, and that is the
//! contract (a non-durable cache, not a store of record). The backing is
//! behind a trait so deployments can swap in an external store.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{DocumentCoordinates, PageCoordinates};

/// Summary of a stored document, used in stats output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredDocumentInfo {
    pub doc_id: String,
    pub created_at: DateTime<Utc>,
}

/// Store statistics for monitoring.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub document_count: usize,
    pub total_word_count: usize,
    pub oldest_doc: Option<StoredDocumentInfo>,
    pub newest_doc: Option<StoredDocumentInfo>,
}

/// Write-once, queryable coordinate index.
///
/// Put never overwrites: document ids are generated fresh per request and
/// never reused. Implementations must be safe for concurrent puts from
/// in-flight requests and concurrent reads.
pub trait CoordinateStore: Send + Sync {
    /// Register the coordinates of a finished document under a new id.
    /// Returns the generated document id.
    fn put(&self, pages: Vec<PageCoordinates>) -> String;

    /// Fetch a document's coordinates, or None if the id is unknown.
    fn get(&self, doc_id: &str) -> Option<DocumentCoordinates>;

    fn stats(&self) -> StoreStats;
}

struct StoreInner {
    documents: HashMap<String, DocumentCoordinates>,
    /// Insertion order, oldest first, for stats and eviction.
    order: VecDeque<String>,
}

/// Map-backed store with an optional document capacity.
pub struct InMemoryCoordinateStore {
    inner: RwLock<StoreInner>,
    max_documents: Option<usize>,
}

impl InMemoryCoordinateStore {
    /// Unbounded store.
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Store that evicts its oldest document beyond `max_documents`.
    pub fn with_capacity(max_documents: Option<usize>) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                documents: HashMap::new(),
                order: VecDeque::new(),
            }),
            max_documents,
        }
    }
}

impl Default for InMemoryCoordinateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinateStore for InMemoryCoordinateStore {
    fn put(&self, pages: Vec<PageCoordinates>) -> String {
        let doc_id = uuid::Uuid::new_v4().to_string();
        let document = DocumentCoordinates {
            doc_id: doc_id.clone(),
            created_at: Utc::now(),
            pages,
        };

        let mut inner = self.inner.write().expect("coordinate store poisoned");
        if let Some(max) = self.max_documents {
            while inner.order.len() >= max.max(1) {
                if let Some(evicted) = inner.order.pop_front() {
                    inner.documents.remove(&evicted);
                    tracing::debug!(doc_id = %evicted, "Evicted oldest coordinate record");
                }
            }
        }
        inner.order.push_back(doc_id.clone());
        inner.documents.insert(doc_id.clone(), document);
        tracing::info!(
            doc_id = %doc_id,
            stored = inner.order.len(),
            "Registered document coordinates"
        );

        doc_id
    }

    fn get(&self, doc_id: &str) -> Option<DocumentCoordinates> {
        let inner = self.inner.read().expect("coordinate store poisoned");
        inner.documents.get(doc_id).cloned()
    }

    fn stats(&self) -> StoreStats {
        let inner = self.inner.read().expect("coordinate store poisoned");
        let info = |id: &String| {
            inner.documents.get(id).map(|d| StoredDocumentInfo {
                doc_id: d.doc_id.clone(),
                created_at: d.created_at,
            })
        };
        StoreStats {
            document_count: inner.documents.len(),
            total_word_count: inner.documents.values().map(|d| d.word_count()).sum(),
            oldest_doc: inner.order.front().and_then(info),
            newest_doc: inner.order.back().and_then(info),
        }
    }
}
