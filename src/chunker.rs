//! Token-window text chunker.
//!
//! Splits text into sentences, then into word tokens, and slides a
//! fixed-size window over the flat token sequence with a configurable
//! overlap. Pure and deterministic: the same text and parameters always
//! produce the same windows, which keeps chunk ids stable across re-runs.

use crate::config::validate_chunking;
use crate::error::Result;

/// Split text into sentence units on `.`, `!`, and `?` boundaries.
/// Purely a pre-pass for tokenization; empty units are dropped.
fn split_sentences(text: &str) -> Vec<&str> {
    text.split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split a sentence into whitespace-delimited word tokens.
fn tokenize(sentence: &str) -> impl Iterator<Item = &str> {
    sentence.split_whitespace()
}

/// Join tokens back into display text.
pub fn detokenize(tokens: &[String]) -> String {
    tokens.join(" ")
}

/// Slide a window of `chunk_size` tokens with stride `chunk_size - overlap`.
///
/// The final window may be shorter than `chunk_size` but is still emitted
/// if non-empty; iteration stops once a window reaches the end of the
/// sequence. `overlap >= chunk_size` would never advance and is rejected.
pub fn chunk_tokens(
    tokens: &[String],
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Vec<String>>> {
    validate_chunking(chunk_size, overlap)?;

    let stride = chunk_size - overlap;
    let mut chunks = Vec::new();

    for start in (0..tokens.len()).step_by(stride) {
        let end = (start + chunk_size).min(tokens.len());
        if start < end {
            chunks.push(tokens[start..end].to_vec());
        }
        if start + chunk_size >= tokens.len() {
            break;
        }
    }

    Ok(chunks)
}

/// Tokenize `text` sentence-by-sentence and window the flat token stream.
///
/// Empty input yields zero chunks; input shorter than `chunk_size` yields
/// exactly one chunk holding the whole token sequence.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Vec<String>>> {
    let tokens: Vec<String> = split_sentences(text)
        .into_iter()
        .flat_map(tokenize)
        .map(str::to_string)
        .collect();

    chunk_tokens(&tokens, chunk_size, overlap)
}
