//! Groq chat-completions client with token streaming.
//!
//! Calls the OpenAI-compatible `POST {base}/openai/v1/chat/completions`
//! endpoint with `stream: true` and relays each content delta into an mpsc
//! channel as it arrives. The wire format is Server-Sent Events: `data:`
//! lines carrying JSON chunks with `choices[0].delta.content`, terminated by
//! `data: [DONE]`.
//!
//! There is no retry here — a failed or stuck generation affects only the
//! request that issued it, and the caller collapses errors into a single
//! user-facing message.

use anyhow::{anyhow, bail, Result};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::LlmConfig;

/// Request body for a streamed chat completion.
pub fn chat_body(model: &str, system_prompt: &str, user_prompt: &str) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "stream": true,
        "messages": [
            { "role": "system", "content": system_prompt },
            { "role": "user", "content": user_prompt },
        ],
    })
}

/// Stream a chat completion, sending each content delta through `tx`.
///
/// Returns `Ok(())` on normal completion *or* when the receiver has been
/// dropped (the client disconnected); the send failure is the cancellation
/// signal that stops the upstream read.
pub async fn stream_chat(
    config: LlmConfig,
    api_key: String,
    body: serde_json::Value,
    tx: mpsc::Sender<String>,
) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let url = format!("{}/openai/v1/chat/completions", config.base_url);
    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("Groq API error {}: {}", status, body_text);
    }

    let mut stream = response.bytes_stream();
    let mut buf = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| anyhow!("Groq stream error: {}", e))?;
        buf.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(pos) = buf.find('\n') {
            let line = buf[..pos].trim_end_matches('\r').to_string();
            buf.drain(..=pos);

            let Some(payload) = sse_data(&line) else {
                continue;
            };

            if payload == "[DONE]" {
                return Ok(());
            }

            if let Some(token) = delta_content(payload)? {
                if tx.send(token).await.is_err() {
                    // Receiver gone — the caller disconnected.
                    return Ok(());
                }
            }
        }
    }

    Ok(())
}

/// Extract the payload of an SSE `data:` line, if this is one.
fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(|rest| rest.trim_start())
}

/// Pull `choices[0].delta.content` out of a streamed chunk.
///
/// Returns `Ok(None)` for chunks without content (role headers, finish
/// markers).
fn delta_content(payload: &str) -> Result<Option<String>> {
    let json: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| anyhow!("Invalid Groq stream chunk: {}", e))?;

    Ok(json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_data_strips_prefix_and_padding() {
        assert_eq!(sse_data("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(sse_data("data:[DONE]"), Some("[DONE]"));
        assert_eq!(sse_data(": comment"), None);
        assert_eq!(sse_data(""), None);
    }

    #[test]
    fn delta_content_extracts_token() {
        let payload = r#"{"choices":[{"delta":{"content":"Hel"},"index":0}]}"#;
        assert_eq!(delta_content(payload).unwrap(), Some("Hel".to_string()));
    }

    #[test]
    fn delta_without_content_is_none() {
        let role_only = r#"{"choices":[{"delta":{"role":"assistant"},"index":0}]}"#;
        assert_eq!(delta_content(role_only).unwrap(), None);

        let finish = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(delta_content(finish).unwrap(), None);
    }

    #[test]
    fn malformed_chunk_is_an_error() {
        assert!(delta_content("not json").is_err());
    }

    #[test]
    fn chat_body_requests_streaming() {
        let body = chat_body("llama3-70b-8192", "sys", "usr");
        assert_eq!(body["stream"], serde_json::json!(true));
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "usr");
    }
}
