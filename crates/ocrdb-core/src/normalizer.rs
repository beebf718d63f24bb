//! Turns engine-specific OCR output into a `Document` plus ordered `Chunk`s.
//!
//! Structure is taken from the engine where it exists (Paddle pages, MinerU
//! content-list pages). Every structural section is then windowed so no chunk
//! exceeds the configured size. Sections are joined with a blank line to form
//! `raw_text`, so the chunks read back in order cover `raw_text` exactly up to
//! whitespace.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

use crate::chunking::{split_windows, ChunkingConfig};
use crate::error::{Error, Result};
use crate::ocr_output::{MinerUOutput, PaddleOutput, RawOcrOutput};
use crate::types::{Chunk, Document, SourceEngine};

/// A contiguous run of text with the page it came from, if known.
struct Section {
    text: String,
    page_number: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    chunking: ChunkingConfig,
}

impl Normalizer {
    pub fn new(chunking: ChunkingConfig) -> Self {
        Self { chunking }
    }

    pub fn normalize(
        &self,
        raw: &RawOcrOutput,
        engine: SourceEngine,
        document_id: &str,
    ) -> Result<(Document, Vec<Chunk>)> {
        self.normalize_at(raw, engine, document_id, Utc::now())
    }

    /// Same as [`Normalizer::normalize`] with a caller-chosen ingestion time.
    pub fn normalize_at(
        &self,
        raw: &RawOcrOutput,
        engine: SourceEngine,
        document_id: &str,
        ingested_at: DateTime<Utc>,
    ) -> Result<(Document, Vec<Chunk>)> {
        if raw.engine() != engine {
            return Err(Error::EngineMismatch { expected: engine, found: raw.engine() });
        }

        let (sections, page_count) = match raw {
            RawOcrOutput::Paddle(out) => paddle_sections(out),
            RawOcrOutput::MinerU(out) => mineru_sections(out),
        };
        if sections.is_empty() {
            return Err(Error::EmptyContent(document_id.to_string()));
        }

        let mut chunks = Vec::new();
        for section in &sections {
            for (start, end) in split_windows(&section.text, self.chunking.target_chars) {
                let sequence_index = u32::try_from(chunks.len())
                    .map_err(|_| Error::Operation(format!("too many chunks in '{document_id}'")))?;
                chunks.push(Chunk::new(
                    document_id,
                    sequence_index,
                    &section.text[start..end],
                    section.page_number,
                ));
            }
        }

        let raw_text = sections.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join("\n\n");
        debug!(
            document_id,
            engine = %engine,
            pages = page_count,
            sections = sections.len(),
            chunks = chunks.len(),
            "normalized OCR output"
        );

        let document = Document {
            document_id: document_id.to_string(),
            source_engine: engine,
            page_count,
            raw_text,
            ingested_at,
        };
        Ok((document, chunks))
    }
}

fn paddle_sections(out: &PaddleOutput) -> (Vec<Section>, u32) {
    let sections = out
        .pages
        .iter()
        .zip(1u32..)
        .filter_map(|(page, number)| {
            let text = page.markdown.trim();
            (!text.is_empty()).then(|| Section { text: text.to_string(), page_number: Some(number) })
        })
        .collect();
    let page_count = u32::try_from(out.pages.len()).unwrap_or(u32::MAX);
    (sections, page_count)
}

fn mineru_sections(out: &MinerUOutput) -> (Vec<Section>, u32) {
    if let Some(blocks) = &out.blocks {
        let mut pages: BTreeMap<u32, Vec<&str>> = BTreeMap::new();
        let mut last_page = None;
        for block in blocks {
            last_page = last_page.max(Some(block.page_idx));
            let text = block.text.trim();
            if !text.is_empty() {
                pages.entry(block.page_idx).or_default().push(text);
            }
        }
        if !pages.is_empty() {
            let page_count = last_page.map_or(0, |idx| idx.saturating_add(1));
            let sections = pages
                .into_iter()
                .map(|(idx, texts)| Section { text: texts.join("\n\n"), page_number: Some(idx + 1) })
                .collect();
            return (sections, page_count);
        }
    }

    // No usable content list: the markdown is a single unpaged section.
    let text = out.markdown.trim();
    if text.is_empty() {
        return (Vec::new(), 0);
    }
    (vec![Section { text: text.to_string(), page_number: None }], 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr_output::MinerUBlock;

    fn block(text: &str, page_idx: u32) -> MinerUBlock {
        MinerUBlock { kind: "text".into(), text: text.into(), page_idx }
    }

    #[test]
    fn blank_paddle_pages_are_skipped_but_counted() {
        let raw = RawOcrOutput::Paddle(PaddleOutput::from_pages(["", "Second page text."]));
        let (doc, chunks) = Normalizer::default().normalize(&raw, SourceEngine::Paddle, "a.pdf").unwrap();
        assert_eq!(doc.page_count, 2);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page_number, Some(2));
        assert_eq!(chunks[0].sequence_index, 0);
    }

    #[test]
    fn mineru_blocks_group_by_page() {
        let raw = RawOcrOutput::MinerU(MinerUOutput {
            markdown: "ignored".into(),
            blocks: Some(vec![block("Intro", 0), block("More intro", 0), block("  ", 1), block("Tail", 2)]),
        });
        let (doc, chunks) = Normalizer::default().normalize(&raw, SourceEngine::MinerU, "m.pdf").unwrap();
        assert_eq!(doc.page_count, 3);
        assert_eq!(doc.raw_text, "Intro\n\nMore intro\n\nTail");
        let pages: Vec<_> = chunks.iter().map(|c| c.page_number).collect();
        assert_eq!(pages, vec![Some(1), Some(3)]);
    }

    #[test]
    fn mineru_without_blocks_falls_back_to_markdown() {
        let raw = RawOcrOutput::MinerU(MinerUOutput { markdown: "# Title\n\nBody".into(), blocks: None });
        let (doc, chunks) = Normalizer::default().normalize(&raw, SourceEngine::MinerU, "m.pdf").unwrap();
        assert_eq!(doc.page_count, 1);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page_number, None);
    }

    #[test]
    fn empty_blocks_fall_back_to_markdown() {
        let raw = RawOcrOutput::MinerU(MinerUOutput {
            markdown: "Only markdown".into(),
            blocks: Some(vec![block("", 0)]),
        });
        let (_, chunks) = Normalizer::default().normalize(&raw, SourceEngine::MinerU, "m.pdf").unwrap();
        assert_eq!(chunks[0].text, "Only markdown");
    }
}
