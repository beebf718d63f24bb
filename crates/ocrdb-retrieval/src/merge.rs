//! Cross-collection merge.
//!
//! BM25 scores from two indexes are computed against different term
//! statistics, so each list is min-max scaled into `[0, 1]` before the lists
//! are interleaved.

use ocrdb_core::types::{rank_and_truncate, QueryResult};

/// Scale scores so the best hit gets 1.0 and the worst 0.0. A list whose hits
/// all share one score maps every hit to 1.0.
pub fn normalize_scores(hits: &mut [QueryResult]) {
    let (min, max) = hits
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), h| (lo.min(h.score), hi.max(h.score)));
    let range = max - min;
    for hit in hits.iter_mut() {
        let scaled = if range > f32::EPSILON { (hit.score - min) / range } else { 1.0 };
        hit.normalized_score = Some(scaled);
    }
}

/// Normalize each list independently, then rank the union and keep `k`.
pub fn merge_ranked(lists: Vec<Vec<QueryResult>>, k: usize) -> Vec<QueryResult> {
    let mut merged = Vec::with_capacity(lists.iter().map(Vec::len).sum());
    for mut hits in lists {
        normalize_scores(&mut hits);
        merged.extend(hits);
    }
    rank_and_truncate(&mut merged, k);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocrdb_core::types::SourceEngine;

    fn hit(doc: &str, engine: SourceEngine, score: f32) -> QueryResult {
        QueryResult {
            chunk_id: format!("{doc}:0"),
            document_id: doc.into(),
            source_engine: engine,
            sequence_index: 0,
            page_number: None,
            score,
            normalized_score: None,
            snippet: String::new(),
        }
    }

    #[test]
    fn scales_into_unit_range() {
        let mut hits = vec![
            hit("a", SourceEngine::Paddle, 12.0),
            hit("b", SourceEngine::Paddle, 7.0),
            hit("c", SourceEngine::Paddle, 2.0),
        ];
        normalize_scores(&mut hits);
        let scaled: Vec<_> = hits.iter().map(|h| h.normalized_score.unwrap()).collect();
        assert_eq!(scaled, vec![1.0, 0.5, 0.0]);
        assert_eq!(hits[0].score, 12.0, "raw score is kept");
    }

    #[test]
    fn flat_lists_map_to_one() {
        let mut hits = vec![hit("a", SourceEngine::MinerU, 3.3), hit("b", SourceEngine::MinerU, 3.3)];
        normalize_scores(&mut hits);
        assert!(hits.iter().all(|h| h.normalized_score == Some(1.0)));
    }

    #[test]
    fn large_collection_scores_do_not_dominate() {
        let paddle = vec![hit("p1", SourceEngine::Paddle, 40.0), hit("p2", SourceEngine::Paddle, 30.0)];
        let mineru = vec![hit("m1", SourceEngine::MinerU, 4.0), hit("m2", SourceEngine::MinerU, 1.0)];
        let merged = merge_ranked(vec![paddle, mineru], 4);
        let order: Vec<_> = merged.iter().map(|h| h.document_id.as_str()).collect();
        assert_eq!(order, vec!["m1", "p1", "m2", "p2"]);
    }

    #[test]
    fn empty_lists_merge_to_nothing() {
        assert!(merge_ranked(vec![Vec::new(), Vec::new()], 3).is_empty());
    }
}
