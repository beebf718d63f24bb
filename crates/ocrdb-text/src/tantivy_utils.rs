use tantivy::schema::{
	DateOptions, Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, FAST, INDEXED, STORED,
	STRING,
};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

pub const TOKENIZER: &str = "text_with_stopwords";

/// `role` of a document's first chunk. It alone stores `raw_text`.
pub const ROLE_HEAD: &str = "head";
/// `role` of every other chunk.
pub const ROLE_TAIL: &str = "tail";

/// Every record is one chunk. Document fields (`page_count`, `ingested_at`)
/// ride along on each of its chunks, so BM25 statistics only ever see chunk
/// text. All records carry `document_id`; one delete term replaces a document.
pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field("role", STRING | STORED);
	schema_builder.add_text_field("document_id", STRING | STORED);
	schema_builder.add_text_field("source_engine", STRING | STORED);
	schema_builder.add_u64_field("page_count", STORED);
	schema_builder.add_text_field("raw_text", STORED);
	schema_builder.add_date_field("ingested_at", DateOptions::default().set_stored());
	schema_builder.add_text_field("chunk_id", STRING | STORED);
	schema_builder.add_u64_field("sequence_index", INDEXED | STORED | FAST);
	schema_builder.add_u64_field("page_number", STORED);
	let text_field_indexing = TextFieldIndexing::default()
		.set_tokenizer(TOKENIZER)
		.set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing).set_stored();
	schema_builder.add_text_field("text", text_options);
	schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
	let stop_words = vec![
		"a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it", "its",
		"of", "on", "that", "the", "to", "was", "will", "with", "or", "but", "not", "this", "these", "they",
		"them", "their", "there", "then", "than", "so", "if", "when", "where", "why", "how", "what", "which",
		"who", "whom", "whose", "can", "could", "should", "would", "may", "might", "must", "shall", "do",
		"does", "did", "have", "had", "having",
	];
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(stop_words.into_iter().map(|s| s.to_string())))
		.build();
	index.tokenizers().register(TOKENIZER, tokenizer);
}

/// Resolved field handles for [`build_schema`].
#[derive(Debug, Clone, Copy)]
pub struct Fields {
	pub role: Field,
	pub document_id: Field,
	pub source_engine: Field,
	pub page_count: Field,
	pub raw_text: Field,
	pub ingested_at: Field,
	pub chunk_id: Field,
	pub sequence_index: Field,
	pub page_number: Field,
	pub text: Field,
}

impl Fields {
	pub fn resolve(schema: &Schema) -> tantivy::Result<Self> {
		Ok(Self {
			role: schema.get_field("role")?,
			document_id: schema.get_field("document_id")?,
			source_engine: schema.get_field("source_engine")?,
			page_count: schema.get_field("page_count")?,
			raw_text: schema.get_field("raw_text")?,
			ingested_at: schema.get_field("ingested_at")?,
			chunk_id: schema.get_field("chunk_id")?,
			sequence_index: schema.get_field("sequence_index")?,
			page_number: schema.get_field("page_number")?,
			text: schema.get_field("text")?,
		})
	}
}

/// Whether an existing index was built with the current schema.
pub fn schema_matches(existing: &Schema) -> bool {
	match (serde_json::to_string(existing), serde_json::to_string(&build_schema())) {
		(Ok(a), Ok(b)) => a == b,
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fields_resolve_against_fresh_schema() {
		assert!(Fields::resolve(&build_schema()).is_ok());
		assert!(schema_matches(&build_schema()));
	}

	#[test]
	fn different_schema_is_detected() {
		let mut builder = Schema::builder();
		builder.add_text_field("document_id", STRING | STORED);
		assert!(!schema_matches(&builder.build()));
	}
}
