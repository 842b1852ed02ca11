//! Sliding-window text splitter.
//!
//! Splits document text into overlapping windows of whitespace-delimited
//! tokens. Consecutive windows of `chunk_size` tokens advance by
//! `chunk_size - overlap` tokens, so each chunk shares its first
//! `overlap` tokens with the previous one.
//!
//! # Guarantees
//!
//! - `overlap < chunk_size` is required; anything else is rejected up
//!   front with [`RagError::InvalidChunking`].
//! - Empty (or whitespace-only) input yields an empty `Vec`, not an error.
//! - Ordinals are contiguous from 0 and preserve source order.
//! - The last window may be shorter than `chunk_size`; window generation
//!   stops as soon as a window reaches the end of the token sequence, so
//!   no trailing window is fully contained in its predecessor.
//! - For `n` tokens with `n > overlap`, the chunk count is
//!   `ceil((n - overlap) / (chunk_size - overlap))`.

use crate::error::{RagError, Result};
use crate::models::Chunk;

/// Split `text` into overlapping token windows.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    if overlap >= chunk_size {
        return Err(RagError::InvalidChunking {
            chunk_size,
            overlap,
        });
    }

    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut ordinal: i64 = 0;

    loop {
        let end = (start + chunk_size).min(tokens.len());
        chunks.push(Chunk {
            text: tokens[start..end].join(" "),
            ordinal,
        });
        if end == tokens.len() {
            break;
        }
        ordinal += 1;
        start += step;
    }

    Ok(chunks)
}
