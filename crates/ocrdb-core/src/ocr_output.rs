//! Raw engine results, as returned by the OCR providers.
//!
//! Each engine exposes a different shape; the normalizer matches on the tag.

use serde::{Deserialize, Serialize};

use crate::types::SourceEngine;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawOcrOutput {
    Paddle(PaddleOutput),
    MinerU(MinerUOutput),
}

impl RawOcrOutput {
    pub fn engine(&self) -> SourceEngine {
        match self {
            RawOcrOutput::Paddle(_) => SourceEngine::Paddle,
            RawOcrOutput::MinerU(_) => SourceEngine::MinerU,
        }
    }
    /// Wrap already-extracted markdown as one unstructured section of
    /// `engine`'s output: a single Paddle page, or MinerU markdown without
    /// a content list.
    pub fn from_markdown(engine: SourceEngine, markdown: impl Into<String>) -> Self {
        match engine {
            SourceEngine::Paddle => RawOcrOutput::Paddle(PaddleOutput::from_pages([markdown])),
            SourceEngine::MinerU => RawOcrOutput::MinerU(MinerUOutput { markdown: markdown.into(), blocks: None }),
        }
    }
}

/// PP-StructureV3 layout parsing: one entry per page, in page order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaddleOutput {
    pub pages: Vec<PaddlePage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaddlePage {
    pub markdown: String,
}

impl PaddleOutput {
    pub fn from_pages<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { pages: pages.into_iter().map(|p| PaddlePage { markdown: p.into() }).collect() }
    }
}

/// MinerU extraction: the markdown body and, when the result archive carried
/// a content list, the page-tagged text blocks it was rendered from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinerUOutput {
    pub markdown: String,
    pub blocks: Option<Vec<MinerUBlock>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinerUBlock {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    /// 0-based page index.
    #[serde(default)]
    pub page_idx: u32,
}
