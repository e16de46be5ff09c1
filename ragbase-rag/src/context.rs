//! Turning retrieved chunks into the context block of a prompt.

use std::sync::LazyLock;

use regex::Regex;

use crate::document::RetrievalResult;

/// The line written after every chunk.
pub const CHUNK_SEPARATOR: &str = "----";

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://\S+|www\.\S+").expect("unreachable error: invalid URL pattern")
});

/// Remove `http(s)://…` and `www.…` substrings, leaving all other text as is.
pub fn remove_links(text: &str) -> String {
    URL_PATTERN.replace_all(text, "").into_owned()
}

/// Join chunk texts in result order, each followed by a separator line, then
/// strip links.
///
/// ```
/// use ragbase_rag::{Chunk, RetrievalResult, SearchResult, format_context};
///
/// let hit = |text: &str, ordinal| SearchResult {
///     chunk: Chunk { text: text.into(), ordinal, source_ref: "a.txt".into() },
///     score: 1.0 - ordinal as f32,
/// };
/// let result = RetrievalResult::from_hits(vec![hit("first", 0), hit("second", 1)]);
/// assert_eq!(format_context(&result), "first\n----\nsecond\n----");
/// ```
pub fn format_context(chunks: &RetrievalResult) -> String {
    let joined = chunks
        .chunks()
        .map(|chunk| format!("{}\n{CHUNK_SEPARATOR}", chunk.text))
        .collect::<Vec<_>>()
        .join("\n");
    remove_links(&joined)
}
