// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text chunking
//!
//! Splits cleaned text into chunks under a fixed character budget,
//! breaking on whitespace boundaries. A tail of the previous chunk is
//! carried into the next one for context continuity.

/// Split `text` into chunks of at most `chunk_size` characters with
/// roughly `overlap` characters carried between consecutive chunks.
///
/// A single word longer than the budget becomes its own oversized chunk
/// rather than being split mid-word.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chunk_size = chunk_size.max(1);
    // Overlap must leave room for new content, otherwise no progress
    let overlap = overlap.min(chunk_size / 2);

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;
    let mut has_fresh_words = false;

    for word in text.split_whitespace() {
        let added = word.len() + usize::from(!current.is_empty());
        if current_len + added > chunk_size && !current.is_empty() {
            chunks.push(current.join(" "));

            // Seed the next chunk with tail words up to the overlap budget
            let mut tail: Vec<&str> = Vec::new();
            let mut tail_len = 0usize;
            for prev in current.iter().rev() {
                let extra = prev.len() + usize::from(!tail.is_empty());
                if tail_len + extra > overlap {
                    break;
                }
                tail.push(prev);
                tail_len += extra;
            }
            tail.reverse();
            current = tail;
            current_len = tail_len;
            has_fresh_words = false;
        }

        current_len += word.len() + usize::from(!current.is_empty());
        current.push(word);
        has_fresh_words = true;
    }

    if has_fresh_words && !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}
