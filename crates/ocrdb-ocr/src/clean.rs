//! Post-processing for MinerU VLM output.
//!
//! The VLM model occasionally loops on a word or emits broken HTML tables.
//! Cleaning drops those artifacts before the text is chunked.

use regex::Regex;

use ocrdb_core::error::{Error, Result};

const TABLE_PLACEHOLDER: &str = "[TABLE REMOVED - See original PDF]";

/// Lines longer than this many words are checked for looping.
const REPETITION_MIN_WORDS: usize = 5;
/// A line is dropped when one word occurs more often than this.
const REPETITION_MAX_COUNT: usize = 10;

/// Known hallucination fragments seen in VLM output.
const GARBAGE_PATTERNS: [&str; 5] = [
    r"흫사무수단lage",
    r"희사무수단lage",
    r"사원법law",
    r"(majority의\s*){5,}",
    r"(minority의\s*){5,}",
];

pub struct MarkdownCleaner {
    garbage: Vec<Regex>,
    table: Regex,
    cell_tags: Regex,
    table_tags: Regex,
    blank_runs: Regex,
}

impl MarkdownCleaner {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| Error::Operation(format!("invalid cleaning pattern '{pattern}': {e}")))
        };
        Ok(Self {
            garbage: GARBAGE_PATTERNS.iter().map(|p| compile(*p)).collect::<Result<_>>()?,
            table: compile(r"(?s)<table>.*?</table>")?,
            cell_tags: compile(r"</?t[dr][^>]*>")?,
            table_tags: compile(r"</?table[^>]*>")?,
            blank_runs: compile(r"\n{4,}")?,
        })
    }

    pub fn clean(&self, text: &str) -> String {
        let kept: Vec<&str> = text
            .split('\n')
            .filter(|line| !is_repetitive(line) && !self.garbage.iter().any(|re| re.is_match(line)))
            .collect();
        let text = kept.join("\n");
        let text = self.table.replace_all(&text, TABLE_PLACEHOLDER);
        let text = self.cell_tags.replace_all(&text, " ");
        let text = self.table_tags.replace_all(&text, "");
        self.blank_runs.replace_all(&text, "\n\n\n").into_owned()
    }
}

fn is_repetitive(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.len() <= REPETITION_MIN_WORDS {
        return false;
    }
    let mut counts = std::collections::HashMap::new();
    for word in words {
        *counts.entry(word).or_insert(0usize) += 1;
    }
    counts.values().any(|&n| n > REPETITION_MAX_COUNT)
}
