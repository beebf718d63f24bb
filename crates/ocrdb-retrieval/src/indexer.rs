use tracing::info;

use ocrdb_core::error::{Error, Result};
use ocrdb_core::registry::CollectionRegistry;
use ocrdb_core::types::{Chunk, Document, SourceEngine};

/// Sole writer of the collections. Routes each document to the collection
/// of its `source_engine`.
#[derive(Clone)]
pub struct Indexer {
    registry: CollectionRegistry,
}

impl Indexer {
    pub fn new(registry: CollectionRegistry) -> Self {
        Self { registry }
    }

    /// Create the engine's collection if absent. No-op when it exists.
    pub fn ensure_collection(&self, engine: SourceEngine) -> Result<()> {
        self.registry.get(engine).ensure()
    }

    /// Replace `document` and its chunks in its engine's collection.
    /// Rejected input leaves the stored version as it was.
    pub fn index(&self, document: &Document, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Err(Error::EmptyContent(document.document_id.clone()));
        }
        if let Some(stray) = chunks.iter().find(|c| c.document_id != document.document_id) {
            return Err(Error::ForeignChunk {
                chunk_id: stray.chunk_id.clone(),
                document_id: document.document_id.clone(),
            });
        }
        let collection = self.registry.get(document.source_engine);
        collection.ensure()?;
        collection.upsert(document, chunks)?;
        info!(
            collection = collection.name(),
            document_id = %document.document_id,
            chunks = chunks.len(),
            "indexed document"
        );
        Ok(())
    }
}
