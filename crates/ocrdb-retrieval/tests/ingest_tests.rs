use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use ocrdb_core::{
    Chunk, CollectionRegistry, CollectionStore, Document, Error, Normalizer, OcrProvider, PaddleOutput, QueryResult,
    RawOcrOutput, Result, Scope, SourceEngine,
};
use ocrdb_retrieval::{DocumentLocks, IngestOptions, Indexer, Ingestor, QueryEngine};
use ocrdb_text::{SearchOptions, TantivyCollection};

/// Returns canned Paddle pages per file name. Unknown files fail OCR.
struct FakeOcr {
    pages: HashMap<String, Vec<String>>,
    calls: AtomicUsize,
}

impl FakeOcr {
    fn new(files: &[(&str, &[&str])]) -> Arc<Self> {
        let pages = files
            .iter()
            .map(|(name, pages)| (name.to_string(), pages.iter().map(|p| p.to_string()).collect()))
            .collect();
        Arc::new(Self { pages, calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl OcrProvider for FakeOcr {
    fn engine(&self) -> SourceEngine {
        SourceEngine::Paddle
    }

    async fn run_ocr(&self, path: &Path) -> Result<RawOcrOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        let pages = self
            .pages
            .get(&name)
            .ok_or_else(|| Error::OcrFailure(format!("service rejected {name}")))?;
        Ok(RawOcrOutput::Paddle(PaddleOutput::from_pages(pages.iter().cloned())))
    }
}

/// A backing store that cannot be reached.
struct DownStore(SourceEngine, &'static str);

impl CollectionStore for DownStore {
    fn engine(&self) -> SourceEngine {
        self.0
    }
    fn name(&self) -> &str {
        self.1
    }
    fn ensure(&self) -> Result<()> {
        Err(Error::IndexUnavailable("connection refused".into()))
    }
    fn upsert(&self, _document: &Document, _chunks: &[Chunk]) -> Result<()> {
        Err(Error::IndexUnavailable("connection refused".into()))
    }
    fn search(&self, _query: &str, _limit: usize) -> Result<Vec<QueryResult>> {
        Err(Error::IndexUnavailable("connection refused".into()))
    }
    fn document_count(&self) -> Result<usize> {
        Err(Error::IndexUnavailable("connection refused".into()))
    }
    fn fetch_document(&self, _document_id: &str) -> Result<Option<(Document, Vec<Chunk>)>> {
        Err(Error::IndexUnavailable("connection refused".into()))
    }
}

fn in_memory_registry() -> CollectionRegistry {
    CollectionRegistry::new(
        Arc::new(TantivyCollection::in_memory("pdf_documents_paddle", SourceEngine::Paddle, SearchOptions::default())),
        Arc::new(TantivyCollection::in_memory("pdf_documents", SourceEngine::MinerU, SearchOptions::default())),
    )
    .unwrap()
}

fn ingestor(ocr: Arc<FakeOcr>, registry: &CollectionRegistry, options: IngestOptions) -> Ingestor {
    Ingestor::new(ocr, Normalizer::default(), Indexer::new(registry.clone()), options)
}

fn touch(dir: &TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, b"%PDF").unwrap();
    path
}

#[tokio::test]
async fn single_file_is_searchable_after_ingest() {
    let tmp = TempDir::new().unwrap();
    let ocr = FakeOcr::new(&[("report.pdf", &["Page 1 content.", "Page 2 content."])]);
    let registry = in_memory_registry();
    let ingest = ingestor(ocr, &registry, IngestOptions::default());

    let report = ingest.ingest_file(&touch(&tmp, "report.pdf")).await.unwrap();
    assert_eq!(report.document_id, "report.pdf");
    assert_eq!(report.page_count, 2);
    assert_eq!(report.chunk_count, 2);

    let hits = QueryEngine::new(registry).search("content", Scope::Engine(SourceEngine::Paddle), 5).unwrap();
    assert_eq!(hits.len(), 2);
    let mut pages: Vec<_> = hits.iter().map(|h| h.page_number).collect();
    pages.sort();
    assert_eq!(pages, vec![Some(1), Some(2)]);
}

#[tokio::test]
async fn ingesting_twice_keeps_one_document() {
    let tmp = TempDir::new().unwrap();
    let ocr = FakeOcr::new(&[("report.pdf", &["Page 1 content.", "Page 2 content."])]);
    let registry = in_memory_registry();
    let ingest = ingestor(ocr, &registry, IngestOptions::default());
    let path = touch(&tmp, "report.pdf");

    ingest.ingest_file(&path).await.unwrap();
    ingest.ingest_file(&path).await.unwrap();

    let paddle = registry.get(SourceEngine::Paddle);
    assert_eq!(paddle.document_count().unwrap(), 1);
    let (_, chunks) = paddle.fetch_document("report.pdf").unwrap().unwrap();
    assert_eq!(chunks.len(), 2);
}

#[tokio::test]
async fn empty_ocr_output_never_reaches_the_index() {
    let tmp = TempDir::new().unwrap();
    let ocr = FakeOcr::new(&[("blank.pdf", &[""])]);
    let registry = in_memory_registry();
    let ingest = ingestor(ocr, &registry, IngestOptions::default());

    let err = ingest.ingest_file(&touch(&tmp, "blank.pdf")).await.unwrap_err();
    assert!(matches!(err, Error::EmptyContent(ref id) if id == "blank.pdf"));
    assert_eq!(registry.get(SourceEngine::Paddle).document_count().unwrap(), 0);
}

#[tokio::test]
async fn folder_run_skips_bad_files_and_continues() {
    let tmp = TempDir::new().unwrap();
    touch(&tmp, "a.pdf");
    touch(&tmp, "b.pdf");
    touch(&tmp, "C.PDF");
    touch(&tmp, "rejected.pdf");
    touch(&tmp, "notes.txt");
    let ocr = FakeOcr::new(&[
        ("a.pdf", &["Alpha page."]),
        ("b.pdf", &["   "]),
        ("C.PDF", &["Gamma page one.", "Gamma page two."]),
        ("notes.txt", &["should never be read"]),
    ]);
    let registry = in_memory_registry();
    let ingest = ingestor(ocr.clone(), &registry, IngestOptions { concurrency: 2, markdown_dir: None });

    let mut seen = Vec::new();
    let paths = ocrdb_retrieval::pdfs_in(tmp.path()).unwrap();
    let report = ingest
        .ingest_paths(paths, |path, _| seen.push(path.file_name().unwrap().to_string_lossy().into_owned()))
        .await
        .unwrap();

    assert_eq!(ocr.calls.load(Ordering::SeqCst), 4);
    seen.sort();
    assert_eq!(seen, vec!["C.PDF", "a.pdf", "b.pdf", "rejected.pdf"]);
    let ingested: Vec<_> = report.ingested.iter().map(|r| r.document_id.as_str()).collect();
    assert_eq!(ingested, vec!["C.PDF", "a.pdf"]);
    assert!(report.has_failures());
    assert_eq!(report.failed.len(), 2);
    assert!(report.failed.iter().any(|f| matches!(f.error, Error::EmptyContent(_))));
    assert!(report.failed.iter().any(|f| matches!(f.error, Error::OcrFailure(_))));
    assert_eq!(registry.get(SourceEngine::Paddle).document_count().unwrap(), 2);
}

#[tokio::test]
async fn unreachable_index_aborts_the_folder_run() {
    let tmp = TempDir::new().unwrap();
    touch(&tmp, "a.pdf");
    let ocr = FakeOcr::new(&[("a.pdf", &["Alpha page."])]);
    let registry = CollectionRegistry::new(
        Arc::new(DownStore(SourceEngine::Paddle, "p")),
        Arc::new(DownStore(SourceEngine::MinerU, "m")),
    )
    .unwrap();
    let ingest = ingestor(ocr, &registry, IngestOptions::default());

    let err = ingest.ingest_folder(tmp.path()).await.unwrap_err();
    assert!(matches!(err, Error::IndexUnavailable(_)));
}

#[tokio::test]
async fn markdown_export_writes_raw_text() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("markdown");
    let ocr = FakeOcr::new(&[("report.pdf", &["# Title", "Body text."])]);
    let registry = in_memory_registry();
    let options = IngestOptions { concurrency: 1, markdown_dir: Some(out.clone()) };
    let ingest = ingestor(ocr, &registry, options);

    ingest.ingest_file(&touch(&tmp, "report.pdf")).await.unwrap();
    let written = std::fs::read_to_string(out.join("report.md")).unwrap();
    assert_eq!(written, "# Title\n\nBody text.");
}

#[tokio::test]
async fn concurrent_ingests_of_one_file_leave_one_version() {
    let tmp = TempDir::new().unwrap();
    let ocr = FakeOcr::new(&[("same.pdf", &["First page.", "Second page.", "Third page."])]);
    let registry = in_memory_registry();
    let ingest = ingestor(ocr, &registry, IngestOptions::default());
    let path = touch(&tmp, "same.pdf");

    let (a, b) = tokio::join!(ingest.ingest_file(&path), ingest.ingest_file(&path));
    a.unwrap();
    b.unwrap();

    let paddle = registry.get(SourceEngine::Paddle);
    assert_eq!(paddle.document_count().unwrap(), 1);
    let (_, chunks) = paddle.fetch_document("same.pdf").unwrap().unwrap();
    let seqs: Vec<_> = chunks.iter().map(|c| c.sequence_index).collect();
    assert_eq!(seqs, vec![0, 1, 2]);
}

#[tokio::test]
async fn document_locks_serialize_one_key_only() {
    let locks = DocumentLocks::default();
    let held = locks.acquire(SourceEngine::Paddle, "a.pdf").await.unwrap();

    let same = tokio::time::timeout(Duration::from_millis(50), locks.acquire(SourceEngine::Paddle, "a.pdf")).await;
    assert!(same.is_err(), "second writer of a.pdf must wait");

    let other_engine =
        tokio::time::timeout(Duration::from_millis(50), locks.acquire(SourceEngine::MinerU, "a.pdf")).await;
    assert!(other_engine.is_ok());

    drop(held);
    let again = tokio::time::timeout(Duration::from_millis(50), locks.acquire(SourceEngine::Paddle, "a.pdf")).await;
    assert!(again.is_ok());
}
