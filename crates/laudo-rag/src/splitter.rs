//! Boundary-preserving overlapping text splitter.
//!
//! Documents are cut greedily into chunks of at most `chunk_size` characters,
//! preferring to cut after a paragraph break, then a newline, then a word
//! boundary, and only hard-cutting when a span has no boundary at all.
//! Consecutive chunks of the same document share `chunk_overlap` characters so
//! context spanning a cut is not lost; each produced chunk records how many
//! leading characters it shares with its predecessor, which makes the original
//! text reconstructible exactly.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SplitConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1500,
            chunk_overlap: 200,
        }
    }
}

/// One split fragment. `overlap` counts the leading characters shared with the
/// previous fragment (0 for the first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitChunk {
    pub text: String,
    pub overlap: usize,
}

/// Split `text` into overlapping chunks. All sizes are in characters, not
/// bytes, so multi-byte input never splits inside a code point.
pub fn split_text(text: &str, cfg: &SplitConfig) -> Vec<SplitChunk> {
    debug_assert!(cfg.chunk_overlap < cfg.chunk_size);

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    if total == 0 {
        return vec![];
    }
    if total <= cfg.chunk_size {
        return vec![SplitChunk {
            text: text.to_string(),
            overlap: 0,
        }];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut overlap_len = 0usize;
    loop {
        let hard_end = (start + cfg.chunk_size).min(total);
        let end = if hard_end == total {
            total
        } else {
            pick_cut(&chars, start, hard_end)
        };

        chunks.push(SplitChunk {
            text: chars[start..end].iter().collect(),
            overlap: overlap_len,
        });

        if end == total {
            break;
        }

        // Back up by the overlap, but always make forward progress.
        let next_start = end.saturating_sub(cfg.chunk_overlap).max(start + 1);
        overlap_len = end - next_start;
        start = next_start;
    }
    chunks
}

/// Choose the cut position in `(start, hard_end]`: the latest paragraph break
/// in the second half of the window, else the latest newline, else the latest
/// space, else the hard limit. Cutting *after* the boundary keeps separators
/// attached to the preceding chunk so reassembly is exact.
fn pick_cut(chars: &[char], start: usize, hard_end: usize) -> usize {
    let window = hard_end - start;
    // The cut must land strictly past `start`, so the search never evaluates
    // a boundary before the first character.
    let floor = (start + window / 2).max(start + 1);

    let mut newline = None;
    let mut space = None;
    for pos in (floor..=hard_end).rev() {
        if pos >= 2 && chars[pos - 1] == '\n' && chars[pos - 2] == '\n' {
            return pos;
        }
        if newline.is_none() && chars[pos - 1] == '\n' {
            newline = Some(pos);
        }
        if space.is_none() && chars[pos - 1] == ' ' {
            space = Some(pos);
        }
    }
    newline.or(space).unwrap_or(hard_end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[SplitChunk]) -> String {
        let mut out = String::new();
        for chunk in chunks {
            out.extend(chunk.text.chars().skip(chunk.overlap));
        }
        out
    }

    fn cfg(size: usize, overlap: usize) -> SplitConfig {
        SplitConfig {
            chunk_size: size,
            chunk_overlap: overlap,
        }
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = split_text("um texto curto", &SplitConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "um texto curto");
        assert_eq!(chunks[0].overlap, 0);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_text("", &SplitConfig::default()).is_empty());
    }

    #[test]
    fn no_chunk_exceeds_the_configured_size() {
        let text = "palavra ".repeat(500);
        for (size, overlap) in [(100, 20), (157, 31), (1500, 200)] {
            for chunk in split_text(&text, &cfg(size, overlap)) {
                assert!(chunk.text.chars().count() <= size);
            }
        }
    }

    #[test]
    fn removing_the_overlap_reconstructs_the_original() {
        let text = "Análise da origem do incêndio. ".repeat(120);
        let chunks = split_text(&text, &cfg(200, 40));
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn reconstruction_holds_without_any_boundaries() {
        // One long unbroken run forces hard cuts.
        let text = "x".repeat(730);
        let chunks = split_text(&text, &cfg(100, 25));
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 100);
        }
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn reconstruction_holds_for_multibyte_text() {
        let text = "perícia de incêndio em edificação — seção §3 \u{1F525}. ".repeat(60);
        let chunks = split_text(&text, &cfg(120, 30));
        assert!(chunks.len() > 1);
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn degenerate_single_char_chunks_do_not_panic() {
        // Minimum size the config can express; every cut search starts at
        // the first character boundary.
        let text = "a\nb\nc";
        let chunks = split_text(text, &cfg(1, 0));
        assert_eq!(chunks.len(), 5);
        for chunk in &chunks {
            assert_eq!(chunk.text.chars().count(), 1);
        }
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn prefers_paragraph_breaks_over_mid_sentence_cuts() {
        let para = format!("{}\n\n{}", "a".repeat(80), "b".repeat(80));
        let chunks = split_text(&para, &cfg(100, 10));
        assert!(chunks[0].text.ends_with("\n\n"));
    }

    #[test]
    fn consecutive_chunks_share_the_overlap() {
        let text = "palavra ".repeat(100);
        let chunks = split_text(&text, &cfg(100, 20));
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].text.chars().collect();
            let next: Vec<char> = pair[1].text.chars().collect();
            let overlap = pair[1].overlap;
            assert!(overlap > 0);
            assert_eq!(prev[prev.len() - overlap..], next[..overlap]);
        }
    }
}
