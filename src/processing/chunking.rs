//! Sentence-aware chunking with overlap.
//!
//! Text is split into sentences (a `.`, `!` or `?` followed by whitespace ends a sentence) and
//! sentences are packed greedily into chunks of at most `max_chunk_size` characters. Each new
//! chunk is seeded with the tail of the previous one so that context around a boundary stays
//! visible to retrieval.
//!
//! Lengths are counted in characters, not bytes. A single sentence longer than the maximum is
//! never split and becomes an oversized chunk of its own.

use super::types::ChunkingError;
use regex::Regex;
use std::sync::LazyLock;

/// Default upper bound on chunk length, in characters.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1000;
/// Default upper bound on the overlap carried into the next chunk, in characters.
pub const DEFAULT_OVERLAP_SIZE: usize = 200;

static SENTENCE_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("sentence boundary pattern is valid"));

/// Chunk size limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerSettings {
    /// Upper bound on chunk length, in characters.
    pub max_chunk_size: usize,
    /// Upper bound on the overlap seeded into the next chunk, in characters.
    pub overlap_size: usize,
}

impl Default for ChunkerSettings {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            overlap_size: DEFAULT_OVERLAP_SIZE,
        }
    }
}

/// Splits text into overlapping, sentence-bounded chunks. Deterministic and side-effect free.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    settings: ChunkerSettings,
}

impl TextChunker {
    /// Build a chunker, rejecting a zero maximum size.
    pub fn new(settings: ChunkerSettings) -> Result<Self, ChunkingError> {
        if settings.max_chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        Ok(Self { settings })
    }

    /// Split `text` into chunks in input order. Whitespace-only input yields no chunks.
    ///
    /// Before a sentence is appended, the buffer is closed as a chunk when the sentence would
    /// push it past the maximum. The next buffer starts with the overlap tail of the closed
    /// chunk, shortened when needed so that tail and sentence together still fit.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let max = self.settings.max_chunk_size;
        let mut chunks = Vec::new();
        let mut buffer = String::new();
        let mut buffer_len = 0;

        for sentence in split_sentences(text) {
            let sentence_len = sentence.chars().count();

            if buffer_len > 0 && buffer_len + sentence_len > max {
                let closed = buffer.trim().to_string();
                let limit = self
                    .settings
                    .overlap_size
                    .min(max.saturating_sub(sentence_len + 1));
                let tail = overlap_tail(&closed, limit);

                buffer.clear();
                buffer_len = 0;
                if !tail.is_empty() {
                    buffer.push_str(tail);
                    buffer.push(' ');
                    buffer_len = tail.chars().count() + 1;
                }
                chunks.push(closed);
            }

            buffer.push_str(sentence);
            buffer.push(' ');
            buffer_len += sentence_len + 1;
        }

        let last = buffer.trim();
        if !last.is_empty() {
            chunks.push(last.to_string());
        }

        tracing::debug!(
            chunks = chunks.len(),
            max_chunk_size = max,
            overlap_size = self.settings.overlap_size,
            "Split text into chunks"
        );
        chunks
    }
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for boundary in SENTENCE_BOUNDARY.find_iter(text) {
        // The terminating mark is ASCII, so it spans exactly one byte.
        push_sentence(&mut sentences, &text[start..boundary.start() + 1]);
        start = boundary.end();
    }
    push_sentence(&mut sentences, &text[start..]);
    sentences
}

fn push_sentence<'a>(sentences: &mut Vec<&'a str>, candidate: &'a str) {
    let trimmed = candidate.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed);
    }
}

/// The last `limit` characters of `chunk`, starting after the last sentence break inside
/// them when there is one.
fn overlap_tail(chunk: &str, limit: usize) -> &str {
    if limit == 0 {
        return "";
    }

    let total = chunk.chars().count();
    let start = if total <= limit {
        0
    } else {
        chunk
            .char_indices()
            .nth(total - limit)
            .map_or(0, |(offset, _)| offset)
    };
    let tail = &chunk[start..];

    match SENTENCE_BOUNDARY.find_iter(tail).last() {
        Some(boundary) => &tail[boundary.end()..],
        None => tail.trim_start(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIVE_SENTENCES: &str =
        "First sentence. Second sentence. Third sentence. Fourth sentence. Fifth sentence.";

    fn chunker(max_chunk_size: usize, overlap_size: usize) -> TextChunker {
        TextChunker::new(ChunkerSettings {
            max_chunk_size,
            overlap_size,
        })
        .expect("valid settings")
    }

    #[test]
    fn zero_max_size_is_rejected() {
        let error = TextChunker::new(ChunkerSettings {
            max_chunk_size: 0,
            overlap_size: 0,
        })
        .expect_err("zero size");
        assert!(matches!(error, ChunkingError::InvalidChunkSize));
    }

    #[test]
    fn whitespace_only_input_yields_no_chunks() {
        let chunker = chunker(100, 20);
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n\t ").is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        assert_eq!(chunker(1000, 200).chunk("Hello world."), vec!["Hello world."]);
    }

    #[test]
    fn sentences_split_on_terminal_punctuation() {
        assert_eq!(
            split_sentences("Is it?  Yes!\nIt is. trailing"),
            vec!["Is it?", "Yes!", "It is.", "trailing"]
        );
        assert_eq!(split_sentences("v1.2 is out."), vec!["v1.2 is out."]);
    }

    #[test]
    fn consecutive_chunks_share_the_previous_sentence() {
        let chunks = chunker(40, 20).chunk(FIVE_SENTENCES);
        assert_eq!(
            chunks,
            vec![
                "First sentence. Second sentence.",
                "Second sentence. Third sentence.",
                "Third sentence. Fourth sentence.",
                "Fourth sentence. Fifth sentence.",
            ]
        );
    }

    #[test]
    fn chunks_respect_the_maximum_and_carry_bounded_overlap() {
        let text = "Alpha beta gamma. Delta epsilon! Zeta eta theta? Iota kappa lambda mu. \
                    Nu xi omicron pi. Rho sigma tau upsilon. Phi chi psi omega.";
        let (max, overlap) = (45, 25);
        let chunks = chunker(max, overlap).chunk(text);
        assert!(chunks.len() > 1);

        for chunk in &chunks {
            assert!(chunk.chars().count() <= max, "chunk too long: {chunk:?}");
            assert!(chunk.ends_with(['.', '!', '?']));
        }
        for pair in chunks.windows(2) {
            let shared = (1..=overlap.min(pair[0].len()))
                .rev()
                .find(|&len| pair[1].starts_with(&pair[0][pair[0].len() - len..]));
            assert!(shared.is_some(), "no overlap between {pair:?}");
        }
    }

    #[test]
    fn oversized_sentence_becomes_its_own_chunk() {
        let chunks = chunker(10, 0).chunk("Tiny. This sentence is definitely too long. End.");
        assert_eq!(
            chunks,
            vec!["Tiny.", "This sentence is definitely too long.", "End."]
        );
    }

    #[test]
    fn overlap_without_boundary_uses_raw_tail() {
        assert_eq!(overlap_tail("one two three four.", 6), "four.");
        assert_eq!(overlap_tail("abcdefghij", 4), "ghij");
        assert_eq!(overlap_tail("Short. Tail.", 0), "");
    }

    #[test]
    fn de_overlapped_chunks_preserve_sentence_order() {
        let chunks = chunker(40, 20).chunk(FIVE_SENTENCES);
        let mut seen: Vec<&str> = Vec::new();
        for chunk in &chunks {
            for sentence in split_sentences(chunk) {
                if seen.last() != Some(&sentence) {
                    seen.push(sentence);
                }
            }
        }
        assert_eq!(seen, split_sentences(FIVE_SENTENCES));
    }

    #[test]
    fn lengths_are_counted_in_characters() {
        // Seven characters but nine bytes.
        assert_eq!(chunker(7, 0).chunk("Öl. Äh."), vec!["Öl. Äh."]);
        assert_eq!(chunker(6, 0).chunk("Öl. Äh."), vec!["Öl.", "Äh."]);
    }
}
