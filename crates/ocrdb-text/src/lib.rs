#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! ocrdb-text
//!
//! Tantivy-backed collections: one index per OCR engine, BM25 search over
//! chunk text with snippets. See `examples/` for a small inspection tool.

pub mod collection;
pub mod tantivy_utils;

use std::sync::Arc;

use ocrdb_core::config::Settings;
use ocrdb_core::{CollectionRegistry, Result, SourceEngine};

pub use collection::{SearchOptions, TantivyCollection};

/// Build the on-disk registry described by `settings`: one index directory
/// per engine under `collections.root_dir`.
pub fn open_registry(settings: &Settings) -> Result<CollectionRegistry> {
	let root = settings.collections.root_path();
	let options = SearchOptions {
		snippet_chars: settings.search.snippet_chars,
		highlight: settings.search.highlight,
	};
	let collection = |engine: SourceEngine| {
		let name = settings.collections.name_for(engine);
		Arc::new(TantivyCollection::on_disk(root.join(name), name, engine, options.clone()))
	};
	CollectionRegistry::new(collection(SourceEngine::Paddle), collection(SourceEngine::MinerU))
}
