use chrono::{TimeZone, Utc};

use ocrdb_core::chunking::{normalize_whitespace, ChunkingConfig};
use ocrdb_core::{Error, MinerUOutput, Normalizer, PaddleOutput, RawOcrOutput, SourceEngine};

fn paddle(pages: &[&str]) -> RawOcrOutput {
    RawOcrOutput::Paddle(PaddleOutput::from_pages(pages.iter().copied()))
}

#[test]
fn two_paddle_pages_become_two_chunks() {
    let raw = paddle(&["Page 1 content.", "Page 2 content."]);
    let (doc, chunks) = Normalizer::default()
        .normalize(&raw, SourceEngine::Paddle, "report.pdf")
        .expect("normalize");

    assert_eq!(doc.document_id, "report.pdf");
    assert_eq!(doc.source_engine, SourceEngine::Paddle);
    assert_eq!(doc.page_count, 2);
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks.iter().map(|c| c.sequence_index).collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(chunks.iter().map(|c| c.page_number).collect::<Vec<_>>(), vec![Some(1), Some(2)]);
    assert_eq!(chunks[0].chunk_id, "report.pdf:0");
    assert_eq!(
        normalize_whitespace(&doc.raw_text),
        "Page 1 content. Page 2 content."
    );
}

#[test]
fn chunks_reassemble_raw_text() {
    let long_page = "The quarterly invoice total was reviewed by the finance team. ".repeat(40);
    let texts = [
        "Short opening page.",
        long_page.as_str(),
        "  Closing notes\n\nwith a second paragraph.  ",
    ];
    let normalizer = Normalizer::new(ChunkingConfig { target_chars: 120 });

    for engine_raw in [
        paddle(&texts),
        RawOcrOutput::MinerU(MinerUOutput { markdown: texts.join("\n\n"), blocks: None }),
    ] {
        let engine = engine_raw.engine();
        let (doc, chunks) = normalizer.normalize(&engine_raw, engine, "doc.pdf").expect("normalize");
        assert!(chunks.len() > 3, "long text is windowed");
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence_index as usize, i);
            assert!(!chunk.text.trim().is_empty());
            assert!(chunk.text.chars().count() <= 120);
        }
        let joined = chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join(" ");
        assert_eq!(normalize_whitespace(&joined), normalize_whitespace(&doc.raw_text));
        assert_eq!(normalize_whitespace(&doc.raw_text), normalize_whitespace(&texts.join(" ")));
    }
}

#[test]
fn empty_ocr_text_is_reported() {
    let err = Normalizer::default()
        .normalize(&paddle(&["", "   \n"]), SourceEngine::Paddle, "blank.pdf")
        .unwrap_err();
    assert!(matches!(err, Error::EmptyContent(id) if id == "blank.pdf"));

    let raw = RawOcrOutput::MinerU(MinerUOutput { markdown: String::new(), blocks: None });
    let err = Normalizer::default().normalize(&raw, SourceEngine::MinerU, "blank.pdf").unwrap_err();
    assert!(matches!(err, Error::EmptyContent(_)));
}

#[test]
fn engine_tag_must_match() {
    let err = Normalizer::default()
        .normalize(&paddle(&["text"]), SourceEngine::MinerU, "a.pdf")
        .unwrap_err();
    assert!(matches!(
        err,
        Error::EngineMismatch { expected: SourceEngine::MinerU, found: SourceEngine::Paddle }
    ));
}

#[test]
fn ingestion_time_is_caller_controlled() {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().expect("valid time");
    let (doc, _) = Normalizer::default()
        .normalize_at(&paddle(&["x"]), SourceEngine::Paddle, "a.pdf", at)
        .expect("normalize");
    assert_eq!(doc.ingested_at, at);
}

#[test]
fn existing_markdown_normalizes_as_one_section() {
    let markdown = "# Minutes\n\nThe board approved the budget.";

    let raw = RawOcrOutput::from_markdown(SourceEngine::MinerU, markdown);
    assert_eq!(raw.engine(), SourceEngine::MinerU);
    let (doc, chunks) = Normalizer::default()
        .normalize(&raw, SourceEngine::MinerU, "minutes")
        .expect("normalize");
    assert_eq!(doc.page_count, 1);
    assert_eq!(doc.raw_text, markdown);
    assert!(chunks.iter().all(|c| c.page_number.is_none()));

    let raw = RawOcrOutput::from_markdown(SourceEngine::Paddle, markdown);
    let (doc, chunks) = Normalizer::default()
        .normalize(&raw, SourceEngine::Paddle, "minutes")
        .expect("normalize");
    assert_eq!(doc.page_count, 1);
    assert!(chunks.iter().all(|c| c.page_number == Some(1)));
}
