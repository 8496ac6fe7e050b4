
use std::collections::VecDeque;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;
use crate::corpus::{DocumentChunk, SourceDocument};

/// Configuration for recursive character chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters re-included from the end of the previous chunk
    pub chunk_overlap: usize,
    /// Separators in priority order; headings before paragraphs before whitespace
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 900,
            chunk_overlap: 150,
            separators: ["\n##", "\n#", "\n\n", "\n", " "]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunk_overlap,
                self.chunk_size,
            ));
        }

        if self.separators.iter().all(String::is_empty) {
            return Err(ConfigError::NoSeparators);
        }

        Ok(())
    }
}

/// A contiguous byte range of the source with its length in characters
#[derive(Debug, Clone, Copy)]
struct Piece {
    start: usize,
    end: usize,
    chars: usize,
}

/// Split every document, copying its metadata onto each chunk
#[inline]
pub fn split_documents(
    documents: &[SourceDocument],
    config: &ChunkingConfig,
) -> Result<Vec<DocumentChunk>, ConfigError> {
    config.validate()?;

    let mut chunks = Vec::new();
    for document in documents {
        for range in chunk_ranges(&document.text, config) {
            chunks.push(DocumentChunk {
                text: document.text[range].to_string(),
                metadata: document.metadata.clone(),
            });
        }
    }

    debug!(
        "Split {} documents into {} chunks",
        documents.len(),
        chunks.len()
    );
    Ok(chunks)
}

/// Split a single text into chunks
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Result<Vec<String>, ConfigError> {
    config.validate()?;
    Ok(chunk_ranges(text, config)
        .into_iter()
        .map(|range| text[range].to_string())
        .collect())
}

/// Byte ranges of the chunks of `text`.
///
/// Every character of `text` lies in at least one range; ranges holding only
/// whitespace are dropped.
fn chunk_ranges(text: &str, config: &ChunkingConfig) -> Vec<Range<usize>> {
    if text.is_empty() {
        return Vec::new();
    }

    let separators: Vec<&str> = config
        .separators
        .iter()
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .collect();

    let mut pieces = Vec::new();
    split_recursive(text, 0..text.len(), &separators, config.chunk_size, &mut pieces);

    merge_pieces(&pieces, config.chunk_size, config.chunk_overlap)
        .into_iter()
        .filter(|range| !text[range.clone()].trim().is_empty())
        .collect()
}

/// Partition `range` into pieces no longer than `chunk_size` characters,
/// preferring the earliest separator that occurs in the span.
fn split_recursive(
    text: &str,
    range: Range<usize>,
    separators: &[&str],
    chunk_size: usize,
    pieces: &mut Vec<Piece>,
) {
    let span = &text[range.clone()];
    let chars = span.chars().count();
    if chars <= chunk_size {
        pieces.push(Piece {
            start: range.start,
            end: range.end,
            chars,
        });
        return;
    }

    let Some(position) = separators.iter().position(|sep| span.contains(sep)) else {
        // No separator left: fall back to single characters
        pieces.extend(span.char_indices().map(|(offset, c)| Piece {
            start: range.start + offset,
            end: range.start + offset + c.len_utf8(),
            chars: 1,
        }));
        return;
    };

    let separator = separators[position];
    let remaining = &separators[position + 1..];

    // Separators stay attached to the start of the following piece
    let mut cuts: Vec<usize> = span
        .match_indices(separator)
        .map(|(offset, _)| range.start + offset)
        .filter(|&cut| cut > range.start)
        .collect();
    cuts.push(range.end);

    let mut start = range.start;
    for cut in cuts {
        if cut > start {
            split_recursive(text, start..cut, remaining, chunk_size, pieces);
            start = cut;
        }
    }
}

/// Greedily merge adjacent pieces into chunks, carrying up to `overlap`
/// characters of trailing pieces into the next chunk.
fn merge_pieces(pieces: &[Piece], chunk_size: usize, overlap: usize) -> Vec<Range<usize>> {
    let mut chunks = Vec::new();
    let mut current: VecDeque<Piece> = VecDeque::new();
    let mut total = 0;

    for piece in pieces {
        if total + piece.chars > chunk_size && !current.is_empty() {
            if let (Some(first), Some(last)) = (current.front(), current.back()) {
                chunks.push(first.start..last.end);
            }

            while total > overlap || (total > 0 && total + piece.chars > chunk_size) {
                match current.pop_front() {
                    Some(dropped) => total -= dropped.chars,
                    None => break,
                }
            }
        }

        current.push_back(*piece);
        total += piece.chars;
    }

    if let (Some(first), Some(last)) = (current.front(), current.back()) {
        chunks.push(first.start..last.end);
    }

    chunks
}
