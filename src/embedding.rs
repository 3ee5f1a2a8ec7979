//! Cohere embedding client and vector utilities.
//!
//! Calls `POST {base}/v1/embed` with the configured model. Cohere v3 models
//! distinguish how the vector will be used, so document chunks are embedded
//! with [`INPUT_SEARCH_DOCUMENT`] and questions with [`INPUT_SEARCH_QUERY`].
//!
//! Retry strategy matches the other service clients: HTTP 429/5xx and network
//! errors retry with exponential backoff; other 4xx fail immediately.

use anyhow::{anyhow, bail, Result};
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Input type for embedding indexed document chunks.
pub const INPUT_SEARCH_DOCUMENT: &str = "search_document";
/// Input type for embedding a search/chat query.
pub const INPUT_SEARCH_QUERY: &str = "search_query";

/// Embed a batch of texts, preserving input order.
///
/// Splits the input into `batch_size` groups and issues one API call per
/// group.
pub async fn embed_texts(
    config: &EmbeddingConfig,
    api_key: &str,
    texts: &[String],
    input_type: &str,
) -> Result<Vec<Vec<f32>>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let mut embeddings = Vec::with_capacity(texts.len());
    for batch in texts.chunks(config.batch_size.max(1)) {
        let mut vectors = embed_batch(&client, config, api_key, batch, input_type).await?;
        if vectors.len() != batch.len() {
            bail!(
                "Cohere returned {} embeddings for {} texts",
                vectors.len(),
                batch.len()
            );
        }
        embeddings.append(&mut vectors);
    }

    Ok(embeddings)
}

/// Embed a single query text with the `search_query` input type.
pub async fn embed_query(config: &EmbeddingConfig, api_key: &str, text: &str) -> Result<Vec<f32>> {
    let results = embed_texts(config, api_key, &[text.to_string()], INPUT_SEARCH_QUERY).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Empty embedding response"))
}

async fn embed_batch(
    client: &reqwest::Client,
    config: &EmbeddingConfig,
    api_key: &str,
    texts: &[String],
    input_type: &str,
) -> Result<Vec<Vec<f32>>> {
    let url = format!("{}/v1/embed", config.base_url);
    let body = serde_json::json!({
        "model": config.model,
        "texts": texts,
        "input_type": input_type,
    });

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response.json().await?;
                    return parse_embed_response(&json);
                }

                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow!("Cohere API error {}: {}", status, body_text));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                bail!("Cohere API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("Embedding failed after retries")))
}

/// Extract the `embeddings` array from a Cohere embed response.
fn parse_embed_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Cohere response: missing embeddings array"))?;

    let mut result = Vec::with_capacity(embeddings.len());

    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| anyhow!("Invalid Cohere response: embedding is not an array"))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }

    Ok(result)
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    let denom = norm_a * norm_b;
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
