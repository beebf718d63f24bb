use std::fmt::Display;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{Query, QueryParser, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::snippet::SnippetGenerator;
use tantivy::{DateTime, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info, warn};

use ocrdb_core::error::{Error, Result};
use ocrdb_core::traits::CollectionStore;
use ocrdb_core::types::{Chunk, Document, QueryResult, SourceEngine};

use crate::tantivy_utils::{build_schema, register_tokenizer, schema_matches, Fields, ROLE_HEAD, ROLE_TAIL};

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// How hits are turned into snippets.
#[derive(Debug, Clone)]
pub struct SearchOptions {
	pub snippet_chars: usize,
	/// Wrap matched terms in `<b>` tags.
	pub highlight: bool,
}

impl Default for SearchOptions {
	fn default() -> Self {
		Self { snippet_chars: 1000, highlight: true }
	}
}

enum Location {
	Dir(PathBuf),
	Ram,
}

struct Opened {
	index: Index,
	reader: IndexReader,
	fields: Fields,
	writer: Mutex<Option<IndexWriter>>,
}

/// A collection backed by one tantivy index.
///
/// Nothing touches disk until the first `ensure` (or write). Searching a
/// collection that was never created returns no hits.
pub struct TantivyCollection {
	name: String,
	engine: SourceEngine,
	location: Location,
	options: SearchOptions,
	opened: Mutex<Option<Arc<Opened>>>,
}

impl TantivyCollection {
	pub fn on_disk(
		dir: impl Into<PathBuf>,
		name: impl Into<String>,
		engine: SourceEngine,
		options: SearchOptions,
	) -> Self {
		Self::with_location(Location::Dir(dir.into()), name.into(), engine, options)
	}

	pub fn in_memory(name: impl Into<String>, engine: SourceEngine, options: SearchOptions) -> Self {
		Self::with_location(Location::Ram, name.into(), engine, options)
	}

	fn with_location(location: Location, name: String, engine: SourceEngine, options: SearchOptions) -> Self {
		Self { name, engine, location, options, opened: Mutex::new(None) }
	}

	fn unavailable(&self, err: impl Display) -> Error {
		Error::IndexUnavailable(format!("collection '{}': {}", self.name, err))
	}

	fn lock<'a, T>(&self, mutex: &'a Mutex<T>) -> Result<MutexGuard<'a, T>> {
		mutex.lock().map_err(|_| Error::Operation(format!("collection '{}': lock poisoned", self.name)))
	}

	/// Open the index if it exists, creating it first when `create` is set.
	fn open(&self, create: bool) -> Result<Option<Arc<Opened>>> {
		let mut slot = self.lock(&self.opened)?;
		if let Some(opened) = slot.as_ref() {
			return Ok(Some(Arc::clone(opened)));
		}

		let index = match &self.location {
			Location::Dir(dir) if dir.join("meta.json").exists() => {
				let index = Index::open_in_dir(dir).map_err(|e| self.unavailable(e))?;
				if !schema_matches(&index.schema()) {
					return Err(Error::SchemaMismatch { collection: self.name.clone() });
				}
				index
			}
			Location::Dir(dir) if create => {
				std::fs::create_dir_all(dir).map_err(|e| self.unavailable(e))?;
				let index = Index::create_in_dir(dir, build_schema()).map_err(|e| self.unavailable(e))?;
				info!(collection = %self.name, engine = %self.engine, path = %dir.display(), "created collection");
				index
			}
			Location::Ram if create => Index::create_in_ram(build_schema()),
			_ => return Ok(None),
		};
		register_tokenizer(&index);

		let reader: IndexReader = index
			.reader_builder()
			.reload_policy(ReloadPolicy::Manual)
			.try_into()
			.map_err(|e| self.unavailable(e))?;
		let fields = Fields::resolve(&index.schema()).map_err(|e| self.unavailable(e))?;
		let opened = Arc::new(Opened { index, reader, fields, writer: Mutex::new(None) });
		*slot = Some(Arc::clone(&opened));
		Ok(Some(opened))
	}

	fn opened_for_write(&self) -> Result<Arc<Opened>> {
		self.open(true)?.ok_or_else(|| self.unavailable("could not be created"))
	}

	/// One record per chunk, carrying the document fields. Only the head also
	/// stores `raw_text`.
	fn chunk_record(&self, fields: &Fields, document: &Document, chunk: &Chunk, head: bool) -> TantivyDocument {
		let mut record = TantivyDocument::default();
		record.add_text(fields.role, if head { ROLE_HEAD } else { ROLE_TAIL });
		record.add_text(fields.document_id, &document.document_id);
		record.add_text(fields.source_engine, self.engine.as_str());
		record.add_u64(fields.page_count, u64::from(document.page_count));
		let ingested_at = DateTime::from_timestamp_micros(document.ingested_at.timestamp_micros());
		record.add_date(fields.ingested_at, ingested_at);
		if head {
			record.add_text(fields.raw_text, &document.raw_text);
		}
		record.add_text(fields.chunk_id, &chunk.chunk_id);
		record.add_u64(fields.sequence_index, u64::from(chunk.sequence_index));
		if let Some(page) = chunk.page_number {
			record.add_u64(fields.page_number, u64::from(page));
		}
		record.add_text(fields.text, &chunk.text);
		record
	}

	/// Delete the previous version, add the new records and commit once.
	fn stage(
		&self,
		writer: &mut IndexWriter,
		fields: &Fields,
		document: &Document,
		chunks: &[&Chunk],
	) -> tantivy::Result<()> {
		writer.delete_term(Term::from_field_text(fields.document_id, &document.document_id));
		for (i, chunk) in chunks.iter().enumerate() {
			writer.add_document(self.chunk_record(fields, document, chunk, i == 0))?;
		}
		writer.commit()?;
		Ok(())
	}

	fn snippet_for(&self, generator: Option<&SnippetGenerator>, record: &TantivyDocument, text: &str) -> String {
		if let Some(generator) = generator {
			let snippet = generator.snippet_from_doc(record);
			if !snippet.fragment().trim().is_empty() {
				return if self.options.highlight { snippet.to_html() } else { snippet.fragment().to_string() };
			}
		}
		text.chars().take(self.options.snippet_chars).collect()
	}
}

fn text_of<'a>(record: &'a TantivyDocument, field: tantivy::schema::Field) -> Option<&'a str> {
	record.get_first(field).and_then(|v| v.as_str())
}

fn u32_of(record: &TantivyDocument, field: tantivy::schema::Field) -> Option<u32> {
	record
		.get_first(field)
		.and_then(|v| v.as_u64())
		.and_then(|v| u32::try_from(v).ok())
}

impl CollectionStore for TantivyCollection {
	fn engine(&self) -> SourceEngine {
		self.engine
	}

	fn name(&self) -> &str {
		&self.name
	}

	fn ensure(&self) -> Result<()> {
		self.opened_for_write().map(|_| ())
	}

	fn upsert(&self, document: &Document, chunks: &[Chunk]) -> Result<()> {
		if document.source_engine != self.engine {
			return Err(Error::EngineMismatch { expected: self.engine, found: document.source_engine });
		}
		if chunks.is_empty() {
			return Err(Error::EmptyContent(document.document_id.clone()));
		}
		let mut ordered: Vec<&Chunk> = chunks.iter().collect();
		ordered.sort_by_key(|c| c.sequence_index);

		let opened = self.opened_for_write()?;
		let mut slot = self.lock(&opened.writer)?;
		if slot.is_none() {
			let writer = opened
				.index
				.writer_with_num_threads(1, WRITER_HEAP_BYTES)
				.map_err(|e| self.unavailable(e))?;
			*slot = Some(writer);
		}
		let Some(writer) = slot.as_mut() else {
			return Err(self.unavailable("writer not available"));
		};

		if let Err(e) = self.stage(writer, &opened.fields, document, &ordered) {
			if let Err(rollback_err) = writer.rollback() {
				warn!(collection = %self.name, error = %rollback_err, "rollback failed");
			}
			return Err(self.unavailable(e));
		}
		opened.reader.reload().map_err(|e| self.unavailable(e))?;
		debug!(
			collection = %self.name,
			document_id = %document.document_id,
			chunks = chunks.len(),
			"upserted document"
		);
		Ok(())
	}

	fn search(&self, query: &str, limit: usize) -> Result<Vec<QueryResult>> {
		if limit == 0 {
			return Ok(Vec::new());
		}
		let Some(opened) = self.open(false)? else {
			debug!(collection = %self.name, "collection does not exist yet");
			return Ok(Vec::new());
		};
		let fields = opened.fields;
		let searcher = opened.reader.searcher();

		let parser = QueryParser::for_index(&opened.index, vec![fields.text]);
		let (parsed, errors) = parser.parse_query_lenient(query);
		if !errors.is_empty() {
			warn!(collection = %self.name, query, problems = errors.len(), "query parsed leniently");
		}
		let parsed: &dyn Query = parsed.as_ref();

		let total = searcher.search(parsed, &Count).map_err(|e| self.unavailable(e))?;
		if total == 0 {
			return Ok(Vec::new());
		}
		// Every match is scored so equal scores are ordered by our own tie-break, not doc address.
		let top_docs = searcher
			.search(parsed, &TopDocs::with_limit(total))
			.map_err(|e| self.unavailable(e))?;

		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, address) in top_docs {
			let record: TantivyDocument = searcher.doc(address).map_err(|e| self.unavailable(e))?;
			let document_id = text_of(&record, fields.document_id).unwrap_or_default().to_string();
			let sequence_index = u32_of(&record, fields.sequence_index).unwrap_or_default();
			let hit = QueryResult {
				chunk_id: text_of(&record, fields.chunk_id)
					.map_or_else(|| format!("{document_id}:{sequence_index}"), str::to_string),
				document_id,
				source_engine: self.engine,
				sequence_index,
				page_number: u32_of(&record, fields.page_number),
				score,
				normalized_score: None,
				snippet: String::new(),
			};
			hits.push((hit, record));
		}
		hits.sort_by(|a, b| a.0.rank_cmp(&b.0));
		hits.truncate(limit);

		let generator = match SnippetGenerator::create(&searcher, parsed, fields.text) {
			Ok(mut generator) => {
				generator.set_max_num_chars(self.options.snippet_chars);
				Some(generator)
			}
			Err(e) => {
				warn!(collection = %self.name, error = %e, "snippet generation unavailable");
				None
			}
		};
		let results: Vec<QueryResult> = hits
			.into_iter()
			.map(|(mut hit, record)| {
				let text = text_of(&record, fields.text).unwrap_or_default();
				hit.snippet = self.snippet_for(generator.as_ref(), &record, text);
				hit
			})
			.collect();
		debug!(
			collection = %self.name,
			query,
			matched = total,
			returned = results.len(),
			"search complete"
		);
		Ok(results)
	}

	fn document_count(&self) -> Result<usize> {
		let Some(opened) = self.open(false)? else {
			return Ok(0);
		};
		let heads = Term::from_field_text(opened.fields.role, ROLE_HEAD);
		let query = TermQuery::new(heads, IndexRecordOption::Basic);
		opened.reader.searcher().search(&query, &Count).map_err(|e| self.unavailable(e))
	}

	fn fetch_document(&self, document_id: &str) -> Result<Option<(Document, Vec<Chunk>)>> {
		let Some(opened) = self.open(false)? else {
			return Ok(None);
		};
		let fields = opened.fields;
		let searcher = opened.reader.searcher();
		let term = Term::from_field_text(fields.document_id, document_id);
		let query = TermQuery::new(term, IndexRecordOption::Basic);
		let total = searcher.search(&query, &Count).map_err(|e| self.unavailable(e))?;
		if total == 0 {
			return Ok(None);
		}
		let addresses = searcher
			.search(&query, &TopDocs::with_limit(total))
			.map_err(|e| self.unavailable(e))?;

		let mut document = None;
		let mut chunks = Vec::new();
		for (_, address) in addresses {
			let record: TantivyDocument = searcher.doc(address).map_err(|e| self.unavailable(e))?;
			if text_of(&record, fields.role) == Some(ROLE_HEAD) {
				let ingested_at = record
					.get_first(fields.ingested_at)
					.and_then(|v| v.as_datetime())
					.and_then(|t| chrono::DateTime::from_timestamp_micros(t.into_timestamp_micros()))
					.unwrap_or_else(Utc::now);
				document = Some(Document {
					document_id: document_id.to_string(),
					source_engine: self.engine,
					page_count: u32_of(&record, fields.page_count).unwrap_or_default(),
					raw_text: text_of(&record, fields.raw_text).unwrap_or_default().to_string(),
					ingested_at,
				});
			}
			chunks.push(Chunk {
				chunk_id: text_of(&record, fields.chunk_id).unwrap_or_default().to_string(),
				document_id: document_id.to_string(),
				sequence_index: u32_of(&record, fields.sequence_index).unwrap_or_default(),
				text: text_of(&record, fields.text).unwrap_or_default().to_string(),
				page_number: u32_of(&record, fields.page_number),
			});
		}
		chunks.sort_by_key(|c| c.sequence_index);
		Ok(document.map(|d| (d, chunks)))
	}
}
