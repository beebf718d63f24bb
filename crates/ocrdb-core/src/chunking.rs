//! Fixed-size window splitting used when an engine gives no structure, and
//! for structural sections that are larger than one window.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Target window size in characters.
    pub target_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { target_chars: 1000 }
    }
}

/// Split `text` into ordered, non-overlapping byte ranges of at most
/// `target_chars` characters each. Ranges never start or end on whitespace
/// and are never empty.
///
/// A window is cut at the last paragraph break in its second half, else the
/// last sentence end, else the last whitespace. A single token longer than a
/// window is cut hard.
pub fn split_windows(text: &str, target_chars: usize) -> Vec<(usize, usize)> {
    let target = target_chars.max(1);
    let mut spans = Vec::new();
    let mut start = skip_whitespace(text, 0);

    while start < text.len() {
        let rest = &text[start..];
        let limit = match rest.char_indices().nth(target) {
            Some((offset, _)) => start + offset,
            None => {
                spans.push((start, start + rest.trim_end().len()));
                break;
            }
        };
        let floor = start + rest.char_indices().nth(target / 2).map_or(0, |(offset, _)| offset);
        let cut = snap_point(text, floor, limit);
        spans.push((start, start + text[start..cut].trim_end().len()));
        start = skip_whitespace(text, cut);
    }
    spans
}

fn snap_point(text: &str, floor: usize, limit: usize) -> usize {
    let region = &text[floor..limit];
    if let Some(pos) = region.rfind("\n\n") {
        return floor + pos;
    }
    let sentence_end = region.char_indices().rev().find_map(|(i, c)| {
        let after = floor + i + c.len_utf8();
        let terminal = matches!(c, '.' | '!' | '?' | '。');
        (terminal && text[after..].starts_with(char::is_whitespace)).then_some(after)
    });
    if let Some(after) = sentence_end {
        return after;
    }
    region.rfind(char::is_whitespace).map_or(limit, |pos| floor + pos)
}

fn skip_whitespace(text: &str, from: usize) -> usize {
    text.len() - text[from..].trim_start().len()
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
