//! Pipeline orchestration: OCR → normalize → index, for one file or a folder.
//!
//! Files in a folder run concurrently up to a bound. Writes of the same
//! `(engine, document_id)` are serialized through [`DocumentLocks`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures::stream::{self, StreamExt};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{info, warn};
use walkdir::WalkDir;

use ocrdb_core::error::{Error, Result};
use ocrdb_core::normalizer::Normalizer;
use ocrdb_core::traits::OcrProvider;
use ocrdb_core::types::{Document, SourceEngine};

use crate::indexer::Indexer;

type LockKey = (SourceEngine, String);

/// Per-document write locks. Entries nobody holds or waits on are pruned.
#[derive(Default)]
pub struct DocumentLocks {
    locks: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
}

impl DocumentLocks {
    pub async fn acquire(&self, engine: SourceEngine, document_id: &str) -> Result<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| Error::Operation("document lock table poisoned".into()))?;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry((engine, document_id.to_string())).or_default())
        };
        Ok(lock.lock_owned().await)
    }
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Files processed at once by folder ingestion.
    pub concurrency: usize,
    /// When set, each document's text is also written here as markdown.
    pub markdown_dir: Option<PathBuf>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self { concurrency: 4, markdown_dir: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub document_id: String,
    pub engine: SourceEngine,
    pub page_count: u32,
    pub chunk_count: usize,
}

#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: Error,
}

/// Outcome of a folder run that was not aborted.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub ingested: Vec<IngestReport>,
    pub failed: Vec<FileFailure>,
}

impl BatchReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

pub struct Ingestor {
    ocr: Arc<dyn OcrProvider>,
    normalizer: Normalizer,
    indexer: Indexer,
    options: IngestOptions,
    locks: DocumentLocks,
}

impl Ingestor {
    pub fn new(ocr: Arc<dyn OcrProvider>, normalizer: Normalizer, indexer: Indexer, options: IngestOptions) -> Self {
        Self { ocr, normalizer, indexer, options, locks: DocumentLocks::default() }
    }

    pub fn engine(&self) -> SourceEngine {
        self.ocr.engine()
    }

    /// OCR, normalize and index one PDF. Its file name is the document id.
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport> {
        let document_id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Operation(format!("not a file: {}", path.display())))?;
        let engine = self.engine();

        let raw = self.ocr.run_ocr(path).await?;
        let _guard = self.locks.acquire(engine, &document_id).await?;
        let (document, chunks) = self.normalizer.normalize(&raw, engine, &document_id)?;

        if let Some(dir) = &self.options.markdown_dir {
            export_markdown(dir, &document).await?;
        }

        let report = IngestReport {
            document_id: document.document_id.clone(),
            engine,
            page_count: document.page_count,
            chunk_count: chunks.len(),
        };
        let indexer = self.indexer.clone();
        tokio::task::spawn_blocking(move || indexer.index(&document, &chunks))
            .await
            .map_err(|e| Error::Operation(format!("indexing task failed: {e}")))??;

        info!(
            document_id = %report.document_id,
            engine = %engine,
            pages = report.page_count,
            chunks = report.chunk_count,
            "ingested file"
        );
        Ok(report)
    }

    /// Ingest every PDF directly inside `folder`.
    pub async fn ingest_folder(&self, folder: &Path) -> Result<BatchReport> {
        let paths = pdfs_in(folder)?;
        self.ingest_paths(paths, |_, _| {}).await
    }

    /// Ingest `paths` concurrently, calling `on_file` as each one finishes.
    ///
    /// `EmptyContent` and `OcrFailure` are recorded and the run continues.
    /// Errors that make the store unusable abort the run.
    pub async fn ingest_paths<F>(&self, paths: Vec<PathBuf>, mut on_file: F) -> Result<BatchReport>
    where
        F: FnMut(&Path, &Result<IngestReport>),
    {
        self.indexer.ensure_collection(self.engine())?;

        let mut results = stream::iter(paths)
            .map(|path| async move {
                let result = self.ingest_file(&path).await;
                (path, result)
            })
            .buffer_unordered(self.options.concurrency.max(1));

        let mut report = BatchReport::default();
        while let Some((path, result)) = results.next().await {
            on_file(&path, &result);
            match result {
                Ok(ingested) => report.ingested.push(ingested),
                Err(error) if error.is_fatal_for_run() => return Err(error),
                Err(error) => {
                    warn!(file = %path.display(), error = %error, "skipping file");
                    report.failed.push(FileFailure { path, error });
                }
            }
        }
        report.ingested.sort_by(|a, b| a.document_id.cmp(&b.document_id));
        info!(
            ingested = report.ingested.len(),
            failed = report.failed.len(),
            "folder ingestion finished"
        );
        Ok(report)
    }
}

/// PDFs directly inside `folder`, sorted by name. Extension match ignores case.
pub fn pdfs_in(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(Error::Operation(format!("not a folder: {}", folder.display())));
    }
    let mut paths: Vec<PathBuf> = WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf")))
        .map(|e| e.into_path())
        .collect();
    paths.sort();
    Ok(paths)
}

async fn export_markdown(dir: &Path, document: &Document) -> Result<()> {
    let file = dir.join(Path::new(&document.document_id).with_extension("md"));
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::Operation(format!("cannot create {}: {e}", dir.display())))?;
    tokio::fs::write(&file, &document.raw_text)
        .await
        .map_err(|e| Error::Operation(format!("cannot write {}: {e}", file.display())))
}
