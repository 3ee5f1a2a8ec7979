//! Per-request query engine.
//!
//! A [`QueryEngine`] is built fresh for every question from a snapshot of the
//! current [`VectorIndex`] — it holds no state between requests. The answer
//! flow is: embed the question, retrieve the top-k chunks, build a grounded
//! prompt, stream the completion from the language model, and yield the
//! accumulated answer after every delta.
//!
//! The yielded sequence grows monotonically by prefix; the final value is the
//! complete answer. Any failure from the external services is collapsed into
//! one generic message, with the underlying error only logged to the console.

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::{Config, Credentials};
use crate::embedding::embed_query;
use crate::index::VectorIndex;
use crate::llm::{chat_body, stream_chat};
use crate::models::ScoredChunk;

/// Shown when a question arrives before any document has been ingested.
pub const NO_INDEX_MESSAGE: &str = "Please upload a file first to begin the chat.";

/// Shown when the external query call fails for any reason.
pub const FAILURE_MESSAGE: &str =
    "An error occurred while processing your request. Please try again.";

/// Channel depth for answer snapshots and token deltas.
const STREAM_BUFFER: usize = 32;

pub struct QueryEngine {
    config: Config,
    credentials: Credentials,
    index: VectorIndex,
}

impl QueryEngine {
    pub fn new(config: Config, credentials: Credentials, index: VectorIndex) -> Self {
        Self {
            config,
            credentials,
            index,
        }
    }

    /// Answer a question as a stream of growing text snapshots.
    ///
    /// The producer runs in a spawned task; dropping the returned stream
    /// cancels it (sends fail once the receiver is gone, which also stops the
    /// upstream model read).
    pub fn answer(self, message: String) -> ReceiverStream<String> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        tokio::spawn(async move {
            if let Err(e) = self.run(&message, &tx).await {
                eprintln!("An error occurred during chat: {:#}", e);
                let _ = tx.send(FAILURE_MESSAGE.to_string()).await;
            }
        });

        ReceiverStream::new(rx)
    }

    async fn run(&self, message: &str, out: &mpsc::Sender<String>) -> Result<()> {
        let query_vec = embed_query(
            &self.config.embedding,
            &self.credentials.cohere,
            message,
        )
        .await?;
        let hits = self.index.top_k(&query_vec, self.config.retrieval.top_k);

        let body = chat_body(
            &self.config.llm.model,
            &system_prompt(self.index.source_file()),
            &user_prompt(&hits, message),
        );

        let (delta_tx, delta_rx) = mpsc::channel(STREAM_BUFFER);
        let worker = tokio::spawn(stream_chat(
            self.config.llm.clone(),
            self.credentials.groq.clone(),
            body,
            delta_tx,
        ));

        forward_snapshots(delta_rx, out).await;
        worker.await??;

        Ok(())
    }
}

/// Stream that yields a single fixed message and ends.
///
/// Used for the "upload a file first" reply, which must not touch any
/// external service.
pub fn single_message_stream(message: &str) -> ReceiverStream<String> {
    let (tx, rx) = mpsc::channel(1);
    // Capacity 1 and a fresh channel: this send cannot fail.
    let _ = tx.try_send(message.to_string());
    ReceiverStream::new(rx)
}

/// Fold token deltas into growing answer snapshots on `out`.
///
/// Stops early (and silently) if `out` is closed, which is how a client
/// disconnect propagates back to the producer.
async fn forward_snapshots(mut deltas: mpsc::Receiver<String>, out: &mpsc::Sender<String>) {
    let mut partial = String::new();

    while let Some(delta) = deltas.recv().await {
        partial.push_str(&delta);
        if out.send(partial.clone()).await.is_err() {
            return;
        }
    }
}

fn system_prompt(source_file: &str) -> String {
    format!(
        "You are a helpful assistant answering questions about the document \
         \"{}\". Answer using only the provided context excerpts. If the \
         answer is not in the context, say that the document does not cover \
         it.",
        source_file
    )
}

fn user_prompt(hits: &[ScoredChunk], question: &str) -> String {
    let mut prompt = String::from("Context excerpts from the document:\n\n");

    for (i, hit) in hits.iter().enumerate() {
        prompt.push_str(&format!("[{}]\n{}\n\n", i + 1, hit.text));
    }

    prompt.push_str(&format!("Question: {}", question));
    prompt
}
