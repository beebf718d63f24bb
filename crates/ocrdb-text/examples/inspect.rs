use std::env;
use std::path::PathBuf;

use ocrdb_core::{CollectionStore, SourceEngine};
use ocrdb_text::{SearchOptions, TantivyCollection};

// Inspect one collection directory without going through the CLI.
// Usage:
//   cargo run -p ocrdb-text --example inspect -- <collection dir> <paddle|mineru> [query] [--limit N] [--doc ID]

fn main() -> anyhow::Result<()> {
	let args: Vec<String> = env::args().skip(1).collect();
	if args.len() < 2 {
		eprintln!(
			"Usage: cargo run -p ocrdb-text --example inspect -- <dir> <paddle|mineru> [query] [--limit N] [--doc ID]"
		);
		std::process::exit(1);
	}
	let dir = PathBuf::from(&args[0]);
	let engine: SourceEngine = args[1].parse()?;
	let mut query = String::new();
	let mut limit: usize = 10;
	let mut doc_id: Option<String> = None;

	let mut i = 2;
	while i < args.len() {
		match args[i].as_str() {
			"--limit" => {
				if i + 1 >= args.len() { eprintln!("--limit requires a number"); std::process::exit(2); }
				limit = args[i + 1].parse().unwrap_or(limit);
				i += 2; continue;
			}
			"--doc" => {
				if i + 1 >= args.len() { eprintln!("--doc requires an id"); std::process::exit(2); }
				doc_id = Some(args[i + 1].clone());
				i += 2; continue;
			}
			s if s.starts_with('-') => {
				eprintln!("Unknown flag: {}", s); std::process::exit(2);
			}
			s => {
				if query.is_empty() { query = s.to_string(); }
				i += 1; continue;
			}
		}
	}

	let name = dir.file_name().map_or_else(|| "collection".to_string(), |n| n.to_string_lossy().into_owned());
	let collection = TantivyCollection::on_disk(&dir, name, engine, SearchOptions::default());

	println!("Collection: {} ({})", dir.display(), engine);
	println!("Documents : {}", collection.document_count()?);

	if let Some(id) = doc_id {
		match collection.fetch_document(&id)? {
			Some((doc, chunks)) => {
				println!(
					"\n{}: {} pages, {} chunks, ingested {}",
					doc.document_id,
					doc.page_count,
					chunks.len(),
					doc.ingested_at
				);
				for c in chunks {
					println!("  [{}] page={:?} {} chars", c.sequence_index, c.page_number, c.text.chars().count());
				}
			}
			None => println!("\nNo document '{}'", id),
		}
	}

	if !query.is_empty() {
		println!("\nQuery: {} (limit {})", query, limit);
		for (i, h) in collection.search(&query, limit)?.iter().enumerate() {
			println!(
				"{:>2}. score={:.3} chunk={} page={:?}\n    snippet: {}",
				i + 1,
				h.score,
				h.chunk_id,
				h.page_number,
				h.snippet
			);
		}
	}
	Ok(())
}
