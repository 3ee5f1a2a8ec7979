//! In-memory vector index over embedded document chunks.
//!
//! A [`VectorIndex`] holds every chunk of the most recently ingested document
//! together with its embedding vector. Retrieval is brute-force cosine
//! similarity over all entries — the corpus is a single document, so nothing
//! fancier is warranted.
//!
//! The process holds at most one index at a time, behind a [`SharedIndex`]
//! owned by the server state. Ingestion swaps the whole index under the write
//! lock; queries clone a snapshot under the read lock so no lock is held
//! across external calls.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, ScoredChunk};

/// One indexed chunk and its embedding.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// The in-memory index built from a single ingested document.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    source_file: String,
    built_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Pair chunks with their embeddings.
    ///
    /// Fails if the two lists are different lengths, which would mean the
    /// embedding service dropped or duplicated an input.
    pub fn build(source_file: &str, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if chunks.len() != vectors.len() {
            bail!(
                "chunk/vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();

        Ok(Self {
            source_file: source_file.to_string(),
            built_at: Utc::now(),
            entries,
        })
    }

    /// Basename of the document this index was built from.
    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `k` most similar chunks to the query vector, best first.
    pub fn top_k(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                chunk_index: entry.chunk.chunk_index,
                text: entry.chunk.text.clone(),
                score: cosine_similarity(query, &entry.vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        scored
    }
}

/// Process-wide index slot, passed explicitly through server state rather
/// than living in a global.
pub type SharedIndex = Arc<RwLock<Option<VectorIndex>>>;

pub fn new_shared() -> SharedIndex {
    Arc::new(RwLock::new(None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;

    fn index_of(texts: &[&str], vectors: Vec<Vec<f32>>) -> VectorIndex {
        let chunks: Vec<Chunk> = texts
            .iter()
            .flat_map(|t| chunk_text(t, 700))
            .enumerate()
            .map(|(i, mut c)| {
                c.chunk_index = i as i64;
                c
            })
            .collect();
        VectorIndex::build("report.pdf", chunks, vectors).unwrap()
    }

    #[test]
    fn build_rejects_mismatched_lengths() {
        let chunks = chunk_text("only one chunk", 700);
        let err = VectorIndex::build("a.txt", chunks, vec![]).unwrap_err();
        assert!(err.to_string().contains("mismatch"));
    }

    #[test]
    fn top_k_orders_by_similarity() {
        let index = index_of(
            &["about cats", "about dogs", "about fish"],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
        );

        let hits = index.top_k(&[1.0, 0.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "about cats");
        assert_eq!(hits[1].text, "about fish");
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn top_k_is_bounded_by_entry_count() {
        let index = index_of(&["one"], vec![vec![1.0]]);
        let hits = index.top_k(&[1.0], 10);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn shared_index_starts_empty_and_swaps() {
        let shared = new_shared();
        assert!(shared.read().unwrap().is_none());

        let index = index_of(&["hello"], vec![vec![1.0]]);
        *shared.write().unwrap() = Some(index);
        assert_eq!(
            shared.read().unwrap().as_ref().unwrap().source_file(),
            "report.pdf"
        );

        *shared.write().unwrap() = None;
        assert!(shared.read().unwrap().is_none());
    }
}
