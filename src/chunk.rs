//! Paragraph-boundary text chunker.
//!
//! Splits the markdown returned by the parsing service into [`Chunk`]s that
//! respect a `max_tokens` limit, preferring paragraph boundaries (`\n\n`) so
//! each chunk stays semantically coherent. Each chunk gets a fresh UUID and a
//! SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Approximate chars-per-token ratio used in place of a real tokenizer.
const CHARS_PER_TOKEN: usize = 4;

/// Split text into chunks with contiguous indices starting at 0.
///
/// Always returns at least one chunk, even for empty input, so an ingested
/// document is never indexless.
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<Chunk> {
    let max_chars = max_tokens * CHARS_PER_TOKEN;

    if text.trim().is_empty() {
        return vec![make_chunk(0, text.trim())];
    }

    let mut chunks = Vec::new();
    let mut buf = String::new();
    let mut next_index: i64 = 0;

    let flush = |buf: &mut String, next_index: &mut i64, chunks: &mut Vec<Chunk>| {
        if !buf.is_empty() {
            chunks.push(make_chunk(*next_index, buf));
            *next_index += 1;
            buf.clear();
        }
    };

    for para in text.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }

        let joined_len = if buf.is_empty() {
            para.len()
        } else {
            buf.len() + 2 + para.len()
        };

        if joined_len > max_chars {
            flush(&mut buf, &mut next_index, &mut chunks);
        }

        if para.len() > max_chars {
            // Oversized paragraph: hard-split near max_chars, backing up to a
            // space or newline when one exists in the window.
            let mut rest = para;
            while !rest.is_empty() {
                let cut = split_point(rest, max_chars);
                chunks.push(make_chunk(next_index, rest[..cut].trim()));
                next_index += 1;
                rest = &rest[cut..];
            }
        } else {
            if !buf.is_empty() {
                buf.push_str("\n\n");
            }
            buf.push_str(para);
        }
    }

    flush(&mut buf, &mut next_index, &mut chunks);

    if chunks.is_empty() {
        chunks.push(make_chunk(0, text.trim()));
    }

    chunks
}

/// Byte offset to cut an oversized paragraph at: the last space or newline
/// inside the window when one exists, otherwise the largest char boundary
/// within `max_chars` bytes. Never returns 0, so the hard split always makes
/// progress even when the first character alone exceeds the window.
fn split_point(text: &str, max_chars: usize) -> usize {
    if text.len() <= max_chars {
        return text.len();
    }

    let mut window = max_chars;
    while !text.is_char_boundary(window) {
        window -= 1;
    }

    let cut = text[..window]
        .rfind(['\n', ' '])
        .map(|pos| pos + 1)
        .unwrap_or(window);

    if cut == 0 {
        text.chars().next().map_or(text.len(), char::len_utf8)
    } else {
        cut
    }
}

fn make_chunk(index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());

    Chunk {
        id: Uuid::new_v4().to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash: format!("{:x}", hasher.finalize()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_text("Hello, world!", 700);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn empty_text_still_yields_one_chunk() {
        let chunks = chunk_text("", 700);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn small_paragraphs_are_merged() {
        let chunks = chunk_text("First part.\n\nSecond part.\n\nThird part.", 700);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("First part."));
        assert!(chunks[0].text.contains("Third part."));
    }

    #[test]
    fn paragraphs_split_when_over_limit() {
        // max_tokens=5 gives a 20-char window
        let text = "This is paragraph one.\n\nThis is paragraph two.\n\nThis is paragraph three.";
        let chunks = chunk_text(text, 5);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
        }
    }

    #[test]
    fn indices_stay_contiguous_across_many_paragraphs() {
        let text = (0..50)
            .map(|i| format!("Paragraph number {}.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunk_text(&text, 10);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64, "index mismatch at {}", i);
        }
    }

    #[test]
    fn oversized_paragraph_is_hard_split() {
        let text = "word ".repeat(200);
        let chunks = chunk_text(&text, 10);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.len() <= 10 * 4);
        }
    }

    #[test]
    fn multibyte_text_splits_only_on_char_boundaries() {
        // max_tokens=5 gives a 20-byte window; each char here is 3 bytes, so
        // the window never lands on a boundary by itself.
        let text = "日".repeat(100);
        let chunks = chunk_text(&text, 5);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.len() <= 20);
            assert!(c.text.chars().all(|ch| ch == '日'));
        }
        let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn four_byte_characters_survive_the_hard_split() {
        let text = "🦀".repeat(50);
        let chunks = chunk_text(&text, 2);
        let total: usize = chunks.iter().map(|c| c.text.chars().count()).sum();
        assert_eq!(total, 50);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
        }
    }

    #[test]
    fn split_point_backs_up_to_whitespace_and_always_advances() {
        assert_eq!(split_point("ab cd ef", 5), 3);
        assert_eq!(split_point("short", 100), 5);
        // Window smaller than the first character: take the whole char.
        assert_eq!(split_point("日本語", 1), 3);
    }

    #[test]
    fn hashes_are_stable_for_identical_text() {
        let a = chunk_text("Alpha\n\nBeta", 700);
        let b = chunk_text("Alpha\n\nBeta", 700);
        assert_eq!(a[0].hash, b[0].hash);
        assert_ne!(a[0].id, b[0].id);
    }
}
