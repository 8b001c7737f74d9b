//! Text chunking module
//!
//! Splits extracted document text into passages for embedding. Two
//! strategies are supported, selected explicitly via configuration:
//!
//! - **Semantic**: layered splitting. Paragraphs first; paragraphs that
//!   exceed the chunk size are split into sentences; the resulting units
//!   are packed into chunks with a configurable number of trailing units
//!   carried over as overlap between consecutive chunks.
//! - **Window**: a fixed character window advancing by
//!   `chunk_size - chunk_overlap`, for degenerate inputs with no
//!   paragraph or sentence structure.
//!
//! Content is never truncated: a single sentence longer than the chunk
//! size becomes its own oversized chunk.

use doctalk_common::config::{ChunkStrategy, ChunkingConfig};
use doctalk_common::errors::Result;
use regex_lite::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Configured text chunker.
///
/// Construction validates the configuration once; chunking itself is a
/// pure, deterministic, single-pass computation over one document.
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    /// Create a chunker, rejecting invalid size/overlap combinations.
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Split text into chunk strings using the configured strategy.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let chunks = match self.config.strategy {
            ChunkStrategy::Semantic => self.chunk_semantic(text),
            ChunkStrategy::Window => self.chunk_window(text),
        };

        debug!(
            input_chars = text.chars().count(),
            chunk_count = chunks.len(),
            chunk_size = self.config.chunk_size,
            strategy = ?self.config.strategy,
            "Text chunked"
        );

        chunks
    }

    /// Layered paragraph -> sentence -> aggregation split.
    fn chunk_semantic(&self, text: &str) -> Vec<String> {
        let normalized = normalize_newlines(text);
        let units = split_units(&normalized, self.config.chunk_size);
        aggregate_units(units, self.config.chunk_size, self.config.overlap_units)
    }

    /// Fixed character window advancing by `chunk_size - chunk_overlap`.
    ///
    /// Walks `char` boundaries so multi-byte text is never split inside a
    /// scalar value.
    fn chunk_window(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut chunks = Vec::new();
        let mut start = 0;
        // chunk_overlap < chunk_size is enforced at construction
        let step = self.config.chunk_size - self.config.chunk_overlap;

        while start < total {
            let end = (start + self.config.chunk_size).min(total);
            let window: String = chars[start..end].iter().collect();
            let trimmed = window.trim();

            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }

            if end == total {
                break;
            }
            start += step;
        }

        chunks
    }
}

/// Unify line endings and collapse runs of 3+ newlines into the canonical
/// paragraph separator (exactly two).
fn normalize_newlines(text: &str) -> String {
    static PARA_RUN: OnceLock<Regex> = OnceLock::new();
    let para_run = PARA_RUN.get_or_init(|| Regex::new(r"\n{3,}").unwrap());

    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    para_run.replace_all(&unified, "\n\n").into_owned()
}

/// Break normalized text into ordered units: whole paragraphs where they
/// fit the chunk size, individual sentences where they don't.
fn split_units(normalized: &str, chunk_size: usize) -> Vec<String> {
    let mut units = Vec::new();

    for paragraph in normalized.split("\n\n") {
        let trimmed = paragraph.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.chars().count() <= chunk_size {
            units.push(trimmed.to_string());
        } else {
            units.extend(split_sentences(trimmed));
        }
    }

    units
}

/// Split a paragraph into sentences on `.`/`!`/`?` followed by whitespace,
/// keeping the terminal punctuation attached to its sentence. A paragraph
/// with no sentence boundary comes back as one unit.
fn split_sentences(paragraph: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let chars: Vec<(usize, char)> = paragraph.char_indices().collect();
    let mut start = 0;

    for i in 0..chars.len() {
        let (idx, c) = chars[i];
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let followed_by_space = chars
            .get(i + 1)
            .map(|(_, next)| next.is_whitespace())
            .unwrap_or(true);
        if !followed_by_space {
            continue;
        }

        let end = idx + c.len_utf8();
        let sentence = paragraph[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence.to_string());
        }
        start = end;
    }

    let tail = paragraph[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

/// Pack ordered units into chunks of at most `chunk_size` characters,
/// re-seeding each new chunk with the trailing `overlap_units` units of
/// the sealed one.
///
/// The re-seed is dropped when it would not leave room for the incoming
/// unit, which bounds every chunk at max(chunk_size, longest single unit)
/// and guarantees each sealed chunk consumed at least one fresh unit.
fn aggregate_units(units: Vec<String>, chunk_size: usize, overlap_units: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buffer: Vec<String> = Vec::new();
    let mut buffer_len = 0usize;

    for unit in units {
        let unit_len = unit.chars().count();

        if !buffer.is_empty() && buffer_len + 1 + unit_len > chunk_size {
            chunks.push(buffer.join(" "));

            let keep = overlap_units.min(buffer.len());
            let tail = buffer.split_off(buffer.len() - keep);
            let tail_len = joined_len(&tail);

            if keep > 0 && tail_len + 1 + unit_len <= chunk_size {
                buffer = tail;
                buffer_len = tail_len;
            } else {
                buffer = Vec::new();
                buffer_len = 0;
            }
        }

        buffer_len = if buffer.is_empty() {
            unit_len
        } else {
            buffer_len + 1 + unit_len
        };
        buffer.push(unit);
    }

    if !buffer.is_empty() {
        chunks.push(buffer.join(" "));
    }

    chunks
}

/// Character length of units joined with single spaces.
fn joined_len(units: &[String]) -> usize {
    if units.is_empty() {
        return 0;
    }
    units.iter().map(|u| u.chars().count()).sum::<usize>() + units.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn semantic(chunk_size: usize, overlap_units: usize) -> Chunker {
        Chunker::new(ChunkingConfig {
            chunk_size,
            chunk_overlap: 0,
            overlap_units,
            strategy: ChunkStrategy::Semantic,
        })
        .unwrap()
    }

    fn window(chunk_size: usize, chunk_overlap: usize) -> Chunker {
        Chunker::new(ChunkingConfig {
            chunk_size,
            chunk_overlap,
            overlap_units: 0,
            strategy: ChunkStrategy::Window,
        })
        .unwrap()
    }

    #[test]
    fn test_overlap_must_stay_below_chunk_size() {
        let result = Chunker::new(ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 120,
            overlap_units: 1,
            strategy: ChunkStrategy::Window,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        assert!(semantic(100, 1).chunk("").is_empty());
        assert!(window(100, 10).chunk("").is_empty());
        assert!(semantic(100, 1).chunk("  \n\n  \n ").is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = semantic(700, 1).chunk("Hello, world!");
        assert_eq!(chunks, vec!["Hello, world!"]);
    }

    #[test]
    fn test_short_paragraphs_merge_into_one_chunk() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
        let chunks = semantic(700, 1).chunk(text);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("First paragraph."));
        assert!(chunks[0].contains("Third paragraph."));
    }

    #[test]
    fn test_newline_normalization() {
        let text = "One.\r\n\r\n\r\n\r\nTwo.";
        let chunks = semantic(700, 1).chunk(text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "One. Two.");
    }

    #[test]
    fn test_long_paragraph_splits_with_unit_overlap() {
        let text = "Para one.\n\nSentence alpha here. Sentence beta here. Sentence gamma here.";
        let chunks = semantic(50, 1).chunk(text);

        assert_eq!(
            chunks,
            vec![
                "Para one. Sentence alpha here. Sentence beta here.",
                "Sentence beta here. Sentence gamma here.",
            ]
        );

        // The follow-up chunk begins with the trailing unit of its predecessor
        assert!(chunks[1].starts_with("Sentence beta here."));
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50);
        }
    }

    #[test]
    fn test_zero_overlap_units() {
        let text = "Sentence alpha here. Sentence beta here. Sentence gamma here.";
        let chunks = semantic(25, 0).chunk(text);
        assert_eq!(
            chunks,
            vec![
                "Sentence alpha here.",
                "Sentence beta here.",
                "Sentence gamma here.",
            ]
        );
    }

    #[test]
    fn test_oversized_sentence_is_never_truncated() {
        let giant = "x".repeat(200);
        let text = format!("Short lead. {}. Short tail.", giant);
        let chunks = semantic(50, 1).chunk(&text);

        let oversized: Vec<&String> =
            chunks.iter().filter(|c| c.chars().count() > 50).collect();
        assert_eq!(oversized.len(), 1);
        assert!(oversized[0].contains(&giant));

        // Nothing was dropped
        let joined = chunks.join(" ");
        assert!(joined.contains("Short lead."));
        assert!(joined.contains("Short tail."));
    }

    #[test]
    fn test_all_content_is_covered() {
        let sentences: Vec<String> = (0..20)
            .map(|i| format!("Sentence number {} sits right here.", i))
            .collect();
        let text = sentences.join(" ");
        let chunks = semantic(80, 1).chunk(&text);
        let joined = chunks.join(" ");

        for sentence in &sentences {
            assert!(joined.contains(sentence), "missing: {}", sentence);
        }
    }

    #[test]
    fn test_no_chunk_is_blank() {
        let text = "A.\n\n\n\n   \n\nB!   \n\nC?";
        for chunker in [semantic(10, 1), window(10, 2)] {
            for chunk in chunker.chunk(text) {
                assert!(!chunk.trim().is_empty());
            }
        }
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let text = "Alpha beats beta. Beta beats gamma. Gamma beats delta.\n\nDelta beats alpha.";
        let chunker = semantic(40, 1);
        assert_eq!(chunker.chunk(text), chunker.chunk(text));
    }

    #[test]
    fn test_window_advances_by_size_minus_overlap() {
        let text: String = ('a'..='z').collect();
        let chunks = window(10, 3).chunk(&text);

        assert_eq!(chunks[0], "abcdefghij");
        assert_eq!(chunks[1], "hijklmnopq");
        // Trailing window is shorter and still emitted
        assert!(chunks.last().unwrap().ends_with('z'));
    }

    #[test]
    fn test_window_drops_blank_windows() {
        let text = format!("abcde{}vwxyz", " ".repeat(20));
        let chunks = window(5, 0).chunk(&text);
        assert!(chunks.iter().all(|c| !c.trim().is_empty()));
        assert!(chunks.contains(&"abcde".to_string()));
        assert!(chunks.contains(&"vwxyz".to_string()));
    }

    #[test]
    fn test_window_respects_char_boundaries() {
        let text = "héllo wörld çœur naïve ütopia désert";
        let chunks = window(7, 2).chunk(text);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 7);
        }
    }

    #[test]
    fn test_sentence_split_keeps_punctuation_attached() {
        let sentences = split_sentences("Is this it? Yes! Version 2.5 shipped today.");
        assert_eq!(
            sentences,
            vec!["Is this it?", "Yes!", "Version 2.5 shipped today."]
        );
    }
}
