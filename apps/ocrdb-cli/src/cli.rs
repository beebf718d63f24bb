use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use ocrdb_core::config::Settings;
use ocrdb_core::{CollectionRegistry, Normalizer, RawOcrOutput, Scope, SourceEngine};
use ocrdb_ocr::provider_for;
use ocrdb_retrieval::{pdfs_in, IngestOptions, Indexer, Ingestor, QueryEngine};

use crate::logging;
use crate::session::{print_hits, Session};

const EXAMPLES: &str = "\
Examples:
  # PaddleOCR (default)
  ocrdb --pdf your_file.pdf
  ocrdb --folder scans/

  # MinerU OCR
  ocrdb --ocr mineru --pdf your_file.pdf

  # Markdown that was already extracted
  ocrdb --ocr mineru --markdown report.md --source report.pdf

  # Q&A mode
  ocrdb --qa --index paddle
  ocrdb --qa --index all

  # One question, then exit
  ocrdb --query \"total amount due\" --top-k 5";

#[derive(Debug, Parser)]
#[command(
    name = "ocrdb",
    about = "OCR scanned PDFs into per-engine collections and search them",
    after_help = EXAMPLES
)]
pub struct Args {
    /// OCR engine used for ingestion (paddle | mineru).
    #[arg(long, default_value = "paddle")]
    pub ocr: SourceEngine,

    /// PDF file to ingest.
    #[arg(long, conflicts_with = "folder")]
    pub pdf: Option<PathBuf>,

    /// Folder whose PDFs are ingested, one document per file.
    #[arg(long)]
    pub folder: Option<PathBuf>,

    /// Markdown file indexed as-is into the --ocr engine's collection.
    #[arg(long)]
    pub markdown: Option<PathBuf>,

    /// Document id for --markdown. Defaults to the file name.
    #[arg(long, requires = "markdown")]
    pub source: Option<String>,

    /// Start the interactive Q&A session.
    #[arg(long)]
    pub qa: bool,

    /// Ask a single question and print the hits.
    #[arg(long)]
    pub query: Option<String>,

    /// Collection(s) searched by --qa and --query (paddle | mineru | all).
    #[arg(long, default_value = "all")]
    pub index: Scope,

    /// Number of hits per question. Defaults to `search.top_k`.
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Print the document count of each collection.
    #[arg(long)]
    pub stats: bool,

    /// Config file used in place of ./config.toml.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Args {
    fn has_action(&self) -> bool {
        self.pdf.is_some()
            || self.folder.is_some()
            || self.markdown.is_some()
            || self.qa
            || self.query.is_some()
            || self.stats
    }
}

pub fn run(args: Args) -> Result<()> {
    if !args.has_action() {
        Args::command().print_help()?;
        return Ok(());
    }

    let settings = Settings::load_from(args.config.as_deref()).context("loading configuration")?;
    logging::init(args.log_level.as_deref().unwrap_or(&settings.logging.level))?;

    let top_k = args.top_k.unwrap_or(settings.search.top_k);
    if top_k == 0 {
        bail!("--top-k must be positive");
    }

    info!(root = %settings.collections.root_path().display(), "opening collections");
    let registry = ocrdb_text::open_registry(&settings)?;

    if let Some(pdf) = &args.pdf {
        ingest_file(&args, &settings, &registry, pdf)?;
    }
    if let Some(folder) = &args.folder {
        ingest_folder(&args, &settings, &registry, folder)?;
    }
    if let Some(markdown) = &args.markdown {
        let normalizer = Normalizer::new(settings.chunking.clone());
        let (document_id, chunks) =
            ingest_markdown(&normalizer, &registry, args.ocr, markdown, args.source.as_deref())?;
        println!(
            "✅ Indexed '{}' into {}: {} chunks",
            document_id,
            settings.collections.name_for(args.ocr),
            chunks
        );
    }
    if args.stats {
        print_stats(&registry)?;
    }

    let engine = QueryEngine::new(registry);
    if let Some(query) = &args.query {
        let hits = engine.search(query, args.index, top_k)?;
        print_hits(&mut io::stdout().lock(), &hits)?;
    }
    if args.qa {
        let mut session = Session::new(&engine, args.index, top_k);
        session.run(io::stdin().lock(), &mut io::stdout().lock())?;
    }
    Ok(())
}

fn ingestor(args: &Args, settings: &Settings, registry: &CollectionRegistry) -> Result<Ingestor> {
    let ocr = provider_for(args.ocr, &settings.ocr)?;
    let options = IngestOptions {
        concurrency: settings.ingest.concurrency,
        markdown_dir: settings.ingest.markdown_path(),
    };
    Ok(Ingestor::new(
        ocr,
        Normalizer::new(settings.chunking.clone()),
        Indexer::new(registry.clone()),
        options,
    ))
}

fn require_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("Path not found: {}", path.display());
    }
    Ok(())
}

fn ingest_file(args: &Args, settings: &Settings, registry: &CollectionRegistry, pdf: &Path) -> Result<()> {
    require_exists(pdf)?;
    let ingestor = ingestor(args, settings, registry)?;
    println!("Running {} OCR on {}", args.ocr, pdf.display());

    let report = tokio::runtime::Runtime::new()?
        .block_on(ingestor.ingest_file(pdf))
        .with_context(|| format!("ingesting {}", pdf.display()))?;

    println!(
        "✅ Indexed '{}' into {}: {} pages, {} chunks",
        report.document_id,
        settings.collections.name_for(report.engine),
        report.page_count,
        report.chunk_count
    );
    Ok(())
}

fn ingest_folder(args: &Args, settings: &Settings, registry: &CollectionRegistry, folder: &Path) -> Result<()> {
    require_exists(folder)?;
    let paths = pdfs_in(folder)?;
    if paths.is_empty() {
        println!("No PDF files in {}", folder.display());
        return Ok(());
    }
    let ingestor = ingestor(args, settings, registry)?;
    let total = paths.len();
    println!("Running {} OCR on {} files from {}", args.ocr, total, folder.display());

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}",
            )?
            .progress_chars("#>-"),
    );
    let report = tokio::runtime::Runtime::new()?.block_on(ingestor.ingest_paths(paths, |path, result| {
        pb.inc(1);
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        match result {
            Ok(_) => pb.set_message(name),
            Err(e) => pb.println(format!("⚠️  {name}: {e}")),
        }
    }));
    pb.finish_and_clear();
    let report = report.with_context(|| format!("ingesting {}", folder.display()))?;

    let chunks: usize = report.ingested.iter().map(|r| r.chunk_count).sum();
    println!(
        "📊 Indexed {} of {} files into {} ({} chunks)",
        report.ingested.len(),
        total,
        settings.collections.name_for(ingestor.engine()),
        chunks
    );
    if report.has_failures() {
        for failure in &report.failed {
            eprintln!("   {}: {}", failure.path.display(), failure.error);
        }
        bail!("{} of {} files failed", report.failed.len(), total);
    }
    Ok(())
}

/// Index a markdown file as the single section of `engine`'s output.
/// Returns the document id and the number of chunks stored.
fn ingest_markdown(
    normalizer: &Normalizer,
    registry: &CollectionRegistry,
    engine: SourceEngine,
    path: &Path,
    source: Option<&str>,
) -> Result<(String, usize)> {
    require_exists(path)?;
    let markdown = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let document_id = match source {
        Some(source) => source.to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("no file name in {}", path.display()))?,
    };

    let raw = RawOcrOutput::from_markdown(engine, markdown);
    let (document, chunks) = normalizer.normalize(&raw, engine, &document_id)?;
    let indexer = Indexer::new(registry.clone());
    indexer.ensure_collection(engine)?;
    indexer.index(&document, &chunks)?;
    info!(%document_id, %engine, chunks = chunks.len(), "indexed markdown");
    Ok((document_id, chunks.len()))
}

fn print_stats(registry: &CollectionRegistry) -> Result<()> {
    for (engine, collection) in registry.in_scope(Scope::All) {
        let count = collection.document_count()?;
        println!("{:<7} {:<24} {count} documents", engine.as_str(), collection.name());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ocrdb_text::{SearchOptions, TantivyCollection};

    fn registry() -> CollectionRegistry {
        let options = SearchOptions::default();
        CollectionRegistry::new(
            Arc::new(TantivyCollection::in_memory("pdf_documents_paddle", SourceEngine::Paddle, options.clone())),
            Arc::new(TantivyCollection::in_memory("pdf_documents", SourceEngine::MinerU, options)),
        )
        .unwrap()
    }

    #[test]
    fn markdown_is_indexed_under_the_given_source() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("report.md");
        std::fs::write(&path, "# Report\n\nThe invoice total is 42 dollars.").unwrap();
        let registry = registry();

        let (id, chunks) =
            ingest_markdown(&Normalizer::default(), &registry, SourceEngine::MinerU, &path, Some("report.pdf"))
                .unwrap();
        assert_eq!(id, "report.pdf");
        assert!(chunks >= 1);

        let hits = QueryEngine::new(registry.clone())
            .search("invoice", Scope::Engine(SourceEngine::MinerU), 5)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, "report.pdf");
        assert_eq!(hits[0].page_number, None);
        assert_eq!(registry.get(SourceEngine::Paddle).document_count().unwrap(), 0);
    }

    #[test]
    fn markdown_id_defaults_to_file_name() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("notes.md");
        std::fs::write(&path, "Meeting notes about the harvest.").unwrap();
        let registry = registry();

        let (id, _) = ingest_markdown(&Normalizer::default(), &registry, SourceEngine::Paddle, &path, None).unwrap();
        assert_eq!(id, "notes.md");
        let (document, _) = registry.get(SourceEngine::Paddle).fetch_document("notes.md").unwrap().unwrap();
        assert_eq!(document.page_count, 1);
    }

    #[test]
    fn empty_markdown_is_rejected() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("blank.md");
        std::fs::write(&path, "  \n").unwrap();
        let registry = registry();

        let normalizer = Normalizer::default();
        assert!(ingest_markdown(&normalizer, &registry, SourceEngine::MinerU, &path, None).is_err());
        let missing = tmp.path().join("gone.md");
        assert!(ingest_markdown(&normalizer, &registry, SourceEngine::MinerU, &missing, None).is_err());
        assert_eq!(registry.get(SourceEngine::MinerU).document_count().unwrap(), 0);
    }
}
