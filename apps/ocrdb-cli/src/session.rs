//! Interactive Q&A loop over the query engine.

use std::io::{BufRead, Write};

use anyhow::Result;

use ocrdb_core::{QueryResult, Scope};
use ocrdb_retrieval::QueryEngine;

const SNIPPET_DISPLAY_CHARS: usize = 1000;

pub struct Session<'a> {
    engine: &'a QueryEngine,
    scope: Scope,
    top_k: usize,
}

impl<'a> Session<'a> {
    pub fn new(engine: &'a QueryEngine, scope: Scope, top_k: usize) -> Self {
        Self { engine, scope, top_k }
    }

    /// Read questions until `quit`/`exit`/`q` or end of input.
    /// A failed search is reported and the session keeps going.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, out: &mut W) -> Result<()> {
        writeln!(out, "\n🤖 Interactive Q&A Mode - Index: {}", self.scope)?;
        writeln!(out, "Type 'quit' to exit, 'switch' to change index")?;
        writeln!(out, "{}", "-".repeat(40))?;

        let mut line = String::new();
        loop {
            write!(out, "\n❓ [{}] Your question: ", self.scope)?;
            out.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                break;
            }
            let question = line.trim();

            match question.to_lowercase().as_str() {
                "quit" | "exit" | "q" => {
                    writeln!(out, "👋 Goodbye!")?;
                    break;
                }
                "switch" => {
                    self.scope = self.scope.next();
                    writeln!(out, "🔄 Switched to index: {}", self.scope)?;
                    continue;
                }
                "" => continue,
                _ => {}
            }

            match self.engine.search(question, self.scope, self.top_k) {
                Ok(hits) => print_hits(out, &hits)?,
                Err(e) => writeln!(out, "❌ {e}")?,
            }
        }
        Ok(())
    }
}

/// Render hits best first: rank, score, source file, engine, page and snippet.
pub fn print_hits<W: Write>(out: &mut W, hits: &[QueryResult]) -> Result<()> {
    if hits.is_empty() {
        writeln!(out, "No results found.")?;
        return Ok(());
    }
    for (rank, hit) in hits.iter().enumerate() {
        match hit.normalized_score {
            Some(normalized) => writeln!(
                out,
                "\n--- Result {} (score: {:.3}, normalized: {:.3}) ---",
                rank + 1,
                hit.score,
                normalized
            )?,
            None => writeln!(out, "\n--- Result {} (score: {:.3}) ---", rank + 1, hit.score)?,
        }
        let page = hit.page_number.map_or_else(|| "-".to_string(), |p| p.to_string());
        writeln!(out, "📄 Source: {} | Engine: {} | Page: {}", hit.document_id, hit.source_engine, page)?;

        let total = hit.snippet.chars().count();
        if total > SNIPPET_DISPLAY_CHARS {
            let shown: String = hit.snippet.chars().take(SNIPPET_DISPLAY_CHARS).collect();
            writeln!(out, "{shown}")?;
            writeln!(out, "... [truncated, {total} chars total]")?;
        } else {
            writeln!(out, "{}", hit.snippet)?;
        }
    }
    Ok(())
}
