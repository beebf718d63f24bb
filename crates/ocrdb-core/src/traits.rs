use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::ocr_output::RawOcrOutput;
use crate::types::{Chunk, Document, QueryResult, SourceEngine};

/// An engine-scoped persisted store of documents and their chunks.
///
/// The indexer is the only writer; the query engine only calls `search`.
pub trait CollectionStore: Send + Sync {
    /// The engine whose documents this collection holds.
    fn engine(&self) -> SourceEngine;

    fn name(&self) -> &str;

    /// Create the collection with the fixed schema if absent. Idempotent.
    /// Fails with `SchemaMismatch` rather than migrating an existing schema.
    fn ensure(&self) -> Result<()>;

    /// Replace `document` and all of its chunks in one commit. A failure
    /// leaves the previously stored version untouched. An empty `chunks`
    /// is rejected with `EmptyContent`.
    fn upsert(&self, document: &Document, chunks: &[Chunk]) -> Result<()>;

    /// BM25 search over chunk text. Returns at most `limit` hits in ranking
    /// order. A missing or empty collection yields no hits.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<QueryResult>>;

    fn document_count(&self) -> Result<usize>;

    /// The stored document with its chunks in `sequence_index` order.
    fn fetch_document(&self, document_id: &str) -> Result<Option<(Document, Vec<Chunk>)>>;
}

/// An OCR engine reachable over its provider API.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    fn engine(&self) -> SourceEngine;

    /// Run OCR over a PDF (or page image). Fails with `OcrFailure`.
    async fn run_ocr(&self, path: &Path) -> Result<RawOcrOutput>;
}
