use std::thread;

use tracing::debug;

use ocrdb_core::error::{Error, Result};
use ocrdb_core::registry::{CollectionHandle, CollectionRegistry};
use ocrdb_core::types::{rank_and_truncate, QueryResult, Scope, SourceEngine};

use crate::merge::merge_ranked;

/// Read-only search over one collection or both.
#[derive(Clone)]
pub struct QueryEngine {
    registry: CollectionRegistry,
}

impl QueryEngine {
    pub fn new(registry: CollectionRegistry) -> Self {
        Self { registry }
    }

    /// At most `k` hits for `query_text` in `scope`, best first.
    ///
    /// A single-engine scope ranks by BM25 score. `Scope::All` searches both
    /// collections concurrently and ranks by per-collection min-max
    /// normalized score.
    pub fn search(&self, query_text: &str, scope: Scope, k: usize) -> Result<Vec<QueryResult>> {
        let query_text = query_text.trim();
        if query_text.is_empty() {
            return Err(Error::EmptyQuery);
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let hits = match scope {
            Scope::Engine(engine) => {
                let mut hits = self.registry.get(engine).search(query_text, k)?;
                rank_and_truncate(&mut hits, k);
                hits
            }
            Scope::All => {
                let paddle = self.registry.get(SourceEngine::Paddle);
                let mineru = self.registry.get(SourceEngine::MinerU);
                let (paddle_hits, mineru_hits) = search_both(paddle, mineru, query_text, k)?;
                merge_ranked(vec![paddle_hits, mineru_hits], k)
            }
        };
        debug!(query = query_text, scope = %scope, hits = hits.len(), "search finished");
        Ok(hits)
    }
}

fn search_both(
    paddle: &CollectionHandle,
    mineru: &CollectionHandle,
    query_text: &str,
    k: usize,
) -> Result<(Vec<QueryResult>, Vec<QueryResult>)> {
    thread::scope(|s| {
        let paddle_search = s.spawn(|| paddle.search(query_text, k));
        let mineru_hits = mineru.search(query_text, k);
        let paddle_hits = paddle_search
            .join()
            .map_err(|_| Error::Operation("paddle search panicked".into()))?;
        Ok((paddle_hits?, mineru_hits?))
    })
}
