//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`FixedSizeChunker`]: a sliding character window with overlap
//! - [`RecursiveChunker`]: splits by paragraphs, lines, sentences, then words,
//!   and merges the pieces back up to `chunk_size` with a tail overlap
//!
//! Sizes are counted in characters, never bytes, so a split never lands inside
//! a UTF-8 code point. Ordinals are assigned 0, 1, 2, … per source, so
//! identical input always produces identical chunk identities.

use std::collections::VecDeque;

use crate::document::Chunk;

/// A strategy for splitting document text into chunks.
pub trait Chunker: Send + Sync {
    /// Split `text` into chunks attributed to `source_ref`.
    ///
    /// Returns an empty `Vec` if the text has no non-whitespace content.
    fn chunk(&self, source_ref: &str, text: &str) -> Vec<Chunk>;
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn number_chunks(source_ref: &str, texts: Vec<String>) -> Vec<Chunk> {
    texts
        .into_iter()
        .enumerate()
        .map(|(ordinal, text)| Chunk { text, ordinal, source_ref: source_ref.to_string() })
        .collect()
}

/// Splits text into fixed-size character windows with configurable overlap.
///
/// # Example
///
/// ```rust,ignore
/// use ragbase_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(256, 50);
/// let chunks = chunker.chunk("notes.txt", &text);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of characters per chunk
    /// * `chunk_overlap` - number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, source_ref: &str, text: &str) -> Vec<Chunk> {
        if self.chunk_size == 0 || text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let step = self.chunk_size.saturating_sub(self.chunk_overlap).max(1);
        let mut windows = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.chunk_size).min(chars.len());
            let window: String = chars[start..end].iter().collect();
            if !window.trim().is_empty() {
                windows.push(window);
            }
            if end == chars.len() {
                break;
            }
            start += step;
        }

        number_chunks(source_ref, windows)
    }
}

/// Separators tried in order, from coarsest to finest.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " "];

/// Splits text hierarchically: paragraphs → lines → sentences → words.
///
/// Text is first cut at the coarsest separator. Any piece still longer than
/// `chunk_size` is cut at the next separator, and a piece with no separator
/// left is cut by character count. The pieces are then merged greedily into
/// chunks of at most `chunk_size` characters; each new chunk starts with the
/// trailing pieces of the previous one, up to `chunk_overlap` characters.
///
/// # Example
///
/// ```rust,ignore
/// use ragbase_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(1000, 200);
/// let chunks = chunker.chunk("handbook.md", &text);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of characters per chunk
    /// * `chunk_overlap` - number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Cut text into `chunk_size`-character windows without overlap.
fn split_by_chars(text: &str, chunk_size: usize, out: &mut Vec<String>) {
    let chars: Vec<char> = text.chars().collect();
    for window in chars.chunks(chunk_size) {
        out.push(window.iter().collect());
    }
}

/// Recursively break `text` into pieces no longer than `chunk_size` characters.
fn split_pieces(text: &str, chunk_size: usize, separators: &[&str], out: &mut Vec<String>) {
    if text.is_empty() {
        return;
    }
    if char_len(text) <= chunk_size {
        out.push(text.to_string());
        return;
    }
    let Some((separator, finer)) = separators.split_first() else {
        split_by_chars(text, chunk_size, out);
        return;
    };

    for segment in split_keeping_separator(text, separator) {
        if char_len(segment) <= chunk_size {
            out.push(segment.to_string());
        } else {
            split_pieces(segment, chunk_size, finer, out);
        }
    }
}

/// Greedily merge pieces into chunks, carrying a tail of at most
/// `chunk_overlap` characters into the next chunk.
fn merge_pieces(pieces: Vec<String>, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    fn flush(window: &VecDeque<(String, usize)>, chunks: &mut Vec<String>) {
        let joined: String = window.iter().map(|(piece, _)| piece.as_str()).collect();
        let trimmed = joined.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
    }

    let mut chunks = Vec::new();
    let mut window: VecDeque<(String, usize)> = VecDeque::new();
    let mut window_len = 0;

    for piece in pieces {
        let len = char_len(&piece);
        if window_len + len > chunk_size && !window.is_empty() {
            flush(&window, &mut chunks);
            while window_len > chunk_overlap || (window_len + len > chunk_size && window_len > 0) {
                match window.pop_front() {
                    Some((_, dropped)) => window_len -= dropped,
                    None => break,
                }
            }
        }
        window_len += len;
        window.push_back((piece, len));
    }

    if !window.is_empty() {
        flush(&window, &mut chunks);
    }

    chunks
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, source_ref: &str, text: &str) -> Vec<Chunk> {
        if self.chunk_size == 0 || text.trim().is_empty() {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        split_pieces(text, self.chunk_size, SEPARATORS, &mut pieces);
        let merged = merge_pieces(pieces, self.chunk_size, self.chunk_overlap);

        number_chunks(source_ref, merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fixed_size_windows_overlap() {
        let chunks = FixedSizeChunker::new(5, 2).chunk("doc", "abcdefghij");
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcde", "defgh", "ghij"]);
        assert!(chunks.iter().enumerate().all(|(i, c)| c.ordinal == i));
    }

    #[test]
    fn fixed_size_respects_char_boundaries() {
        let chunks = FixedSizeChunker::new(3, 1).chunk("doc", "héllo wörld");
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 3));
    }

    #[test]
    fn short_text_is_one_chunk() {
        let text = "Social control is regulation of behavior by groups.";
        let chunks = RecursiveChunker::new(1000, 200).chunk("soc.txt", text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].source_ref, "soc.txt");
        assert_eq!(chunks[0].ordinal, 0);
    }

    #[test]
    fn recursive_prefers_paragraph_boundaries() {
        let text = "First paragraph here.\n\nSecond paragraph here.";
        let chunks = RecursiveChunker::new(25, 0).chunk("doc", text);
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["First paragraph here.", "Second paragraph here."]);
    }

    #[test]
    fn recursive_carries_overlap_between_neighbours() {
        let text = "one two three four five six seven eight nine ten";
        let chunks = RecursiveChunker::new(20, 10).chunk("doc", text);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let last_word = pair[0].text.split_whitespace().last().unwrap();
            assert!(
                pair[1].text.contains(last_word),
                "{:?} should overlap {:?}",
                pair[1].text,
                pair[0].text
            );
        }
    }

    #[test]
    fn blank_text_has_no_chunks() {
        assert!(RecursiveChunker::new(10, 2).chunk("doc", "   \n\n ").is_empty());
        assert!(FixedSizeChunker::new(10, 2).chunk("doc", "").is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn recursive_chunks_are_bounded_and_cover_every_word(
            text in "[a-zé .!?\n]{0,400}",
            size in 8usize..80,
            overlap_pct in 0usize..50,
        ) {
            let overlap = size * overlap_pct / 100;
            let chunks = RecursiveChunker::new(size, overlap).chunk("doc", &text);

            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.ordinal, i);
                prop_assert!(chunk.text.chars().count() <= size);
                prop_assert!(!chunk.text.trim().is_empty());
            }
            for word in text.split_whitespace().filter(|w| w.chars().count() <= size) {
                prop_assert!(chunks.iter().any(|c| c.text.contains(word)), "lost word {:?}", word);
            }
        }

        #[test]
        fn chunking_is_deterministic(text in "[a-z .\n]{0,300}") {
            let chunker = RecursiveChunker::new(40, 10);
            prop_assert_eq!(chunker.chunk("doc", &text), chunker.chunk("doc", &text));
        }
    }
}
