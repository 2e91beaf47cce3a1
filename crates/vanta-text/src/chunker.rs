//! Recursive text chunker.
//!
//! Splits text over an ordered list of separators, packing the resulting
//! fragments into chunks no longer than `chunk_size` characters where each
//! chunk after the first begins with the last `overlap` characters of its
//! predecessor. Fragments that stay oversize after the final separator are
//! sliced at a fixed stride of `chunk_size - overlap`. All offsets are
//! character indices into the original text.

use serde::Serialize;

/// Chunking parameters.
#[derive(Debug, Clone)]
pub struct ChunkOptions {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub overlap: usize,
    /// Separators tried in order, coarsest first.
    pub separators: Vec<String>,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            overlap: 64,
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                ". ".to_string(),
                " ".to_string(),
            ],
        }
    }
}

/// One chunk with provenance offsets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    /// Chunk text, including the overlap prefix.
    pub text: String,
    /// Position in the chunk sequence.
    pub index: usize,
    /// Character offset of the first character in the original text.
    pub char_start: usize,
    /// Character offset one past the last character.
    pub char_end: usize,
    /// Chunk length in characters.
    pub char_count: usize,
    /// Whitespace-delimited word count.
    pub word_count: usize,
}

/// Splits `text` into overlapping chunks.
#[must_use]
pub fn chunk_text(text: &str, options: &ChunkOptions) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let chunk_size = options.chunk_size.max(1);
    let overlap = options.overlap.min(chunk_size.saturating_sub(1));
    // Core budget per chunk; the overlap prefix brings a chunk back up to
    // at most `chunk_size` characters.
    let budget = chunk_size - overlap;
    let separators: Vec<Vec<char>> = options
        .separators
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| s.chars().collect())
        .collect();

    let mut fragments = Vec::new();
    fragment(&chars, 0, chars.len(), &separators, budget, &mut fragments);

    // Greedily pack adjacent fragments into cores no longer than the budget.
    let mut cores: Vec<(usize, usize)> = Vec::new();
    for (start, end) in fragments {
        match cores.last_mut() {
            Some((core_start, core_end)) if *core_end == start && end - *core_start <= budget => {
                *core_end = end;
            }
            _ => cores.push((start, end)),
        }
    }

    cores
        .into_iter()
        .enumerate()
        .map(|(index, (core_start, core_end))| {
            let start = core_start.saturating_sub(overlap);
            let text: String = chars[start..core_end].iter().collect();
            let word_count = text.split_whitespace().count();
            Chunk {
                index,
                char_start: start,
                char_end: core_end,
                char_count: core_end - start,
                word_count,
                text,
            }
        })
        .collect()
}

/// Recursively splits `[start, end)` into fragments no longer than `budget`.
fn fragment(
    chars: &[char],
    start: usize,
    end: usize,
    separators: &[Vec<char>],
    budget: usize,
    out: &mut Vec<(usize, usize)>,
) {
    if end - start <= budget {
        if end > start {
            out.push((start, end));
        }
        return;
    }
    match separators.split_first() {
        Some((separator, rest)) => {
            let pieces = split_on(chars, start, end, separator);
            if pieces.len() == 1 {
                fragment(chars, start, end, rest, budget, out);
            } else {
                for (piece_start, piece_end) in pieces {
                    fragment(chars, piece_start, piece_end, rest, budget, out);
                }
            }
        }
        None => {
            // Separators exhausted: fixed-stride slicing.
            let mut cursor = start;
            while cursor < end {
                let slice_end = (cursor + budget).min(end);
                out.push((cursor, slice_end));
                cursor = slice_end;
            }
        }
    }
}

/// Splits a range on a separator, keeping the separator attached to the
/// preceding piece so the pieces cover the range exactly.
fn split_on(chars: &[char], start: usize, end: usize, separator: &[char]) -> Vec<(usize, usize)> {
    let mut pieces = Vec::new();
    let mut piece_start = start;
    let mut i = start;
    while i + separator.len() <= end {
        if chars[i..i + separator.len()] == *separator {
            i += separator.len();
            pieces.push((piece_start, i));
            piece_start = i;
        } else {
            i += 1;
        }
    }
    if piece_start < end {
        pieces.push((piece_start, end));
    }
    pieces
}
