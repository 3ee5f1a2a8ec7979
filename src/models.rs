//! Core data types flowing through the ingestion and query pipeline.

use serde::{Deserialize, Serialize};

/// A chunk of parsed document text, ready for embedding.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

/// One message of the browser-side conversation.
///
/// The chat endpoint accepts the history for interface compatibility with the
/// original demo; the query engine does not condition on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// A retrieved chunk with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk_index: i64,
    pub text: String,
    pub score: f32,
}
