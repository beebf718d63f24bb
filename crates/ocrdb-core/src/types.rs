//! Domain types shared by the normalizer, the collection stores and the query engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub type DocumentId = String;
pub type ChunkId = String;

/// The OCR engine a document was extracted with. Also selects its collection.
///
/// Variant order is significant: it is the final tie-break when merging
/// results from both collections (Paddle before MinerU).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceEngine {
    Paddle,
    MinerU,
}

impl SourceEngine {
    pub const ALL: [SourceEngine; 2] = [SourceEngine::Paddle, SourceEngine::MinerU];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceEngine::Paddle => "paddle",
            SourceEngine::MinerU => "mineru",
        }
    }
}

impl fmt::Display for SourceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceEngine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paddle" | "paddleocr" => Ok(SourceEngine::Paddle),
            "mineru" => Ok(SourceEngine::MinerU),
            other => Err(Error::InvalidConfig(format!("unknown OCR engine '{other}'"))),
        }
    }
}

/// Which collection(s) a query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Engine(SourceEngine),
    All,
}

impl Scope {
    pub fn engines(&self) -> Vec<SourceEngine> {
        match self {
            Scope::Engine(e) => vec![*e],
            Scope::All => SourceEngine::ALL.to_vec(),
        }
    }

    /// Interactive-session rotation: mineru -> paddle -> all -> mineru.
    pub fn next(&self) -> Scope {
        match self {
            Scope::Engine(SourceEngine::MinerU) => Scope::Engine(SourceEngine::Paddle),
            Scope::Engine(SourceEngine::Paddle) => Scope::All,
            Scope::All => Scope::Engine(SourceEngine::MinerU),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Engine(e) => e.fmt(f),
            Scope::All => f.write_str("all"),
        }
    }
}

impl FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Scope::All);
        }
        s.parse().map(Scope::Engine)
    }
}

/// One ingested PDF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub document_id: DocumentId,
    pub source_engine: SourceEngine,
    pub page_count: u32,
    pub raw_text: String,
    pub ingested_at: DateTime<Utc>,
}

/// A retrievable, non-overlapping slice of a document's text.
///
/// `chunk_id` is `"{document_id}:{sequence_index}"`; `sequence_index` starts
/// at 0 and defines reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub sequence_index: u32,
    pub text: String,
    pub page_number: Option<u32>,
}

impl Chunk {
    pub fn new(document_id: &str, sequence_index: u32, text: impl Into<String>, page_number: Option<u32>) -> Self {
        Self {
            chunk_id: format!("{}:{}", document_id, sequence_index),
            document_id: document_id.to_string(),
            sequence_index,
            text: text.into(),
            page_number,
        }
    }
}

/// One ranked hit. Built fresh per query, never persisted.
///
/// `score` is the engine-local BM25 score. `normalized_score` is only set on
/// results merged across collections and is what those results are ordered by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub source_engine: SourceEngine,
    pub sequence_index: u32,
    pub page_number: Option<u32>,
    pub score: f32,
    pub normalized_score: Option<f32>,
    pub snippet: String,
}

impl QueryResult {
    pub fn ranking_score(&self) -> f32 {
        self.normalized_score.unwrap_or(self.score)
    }

    /// Total ranking order: score descending, then `document_id`,
    /// `sequence_index` and `source_engine` ascending.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .ranking_score()
            .total_cmp(&self.ranking_score())
            .then_with(|| self.document_id.cmp(&other.document_id))
            .then_with(|| self.sequence_index.cmp(&other.sequence_index))
            .then_with(|| self.source_engine.cmp(&other.source_engine))
    }
}

/// Sort hits into ranking order and keep at most `k`.
pub fn rank_and_truncate(hits: &mut Vec<QueryResult>, k: usize) {
    hits.sort_by(QueryResult::rank_cmp);
    hits.truncate(k);
}
