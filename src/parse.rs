//! Upload validation and LlamaParse client.
//!
//! Documents are never parsed locally — every supported format is routed
//! through the hosted LlamaParse service:
//!
//! 1. `POST {base}/api/parsing/upload` — multipart upload, returns a job id.
//! 2. `GET {base}/api/parsing/job/{id}` — polled until `SUCCESS` or a
//!    terminal failure status.
//! 3. `GET {base}/api/parsing/job/{id}/result/markdown` — the parsed text.
//!
//! Transient upload failures (HTTP 429/5xx, network errors) retry with
//! exponential backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5).

use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use std::time::Duration;

use crate::config::ParserConfig;

/// File extensions accepted for ingestion, all handled by the same parser.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    ".pdf", ".docx", ".doc", ".txt", ".csv", ".xlsx", ".pptx", ".html", ".jpg", ".jpeg", ".png",
    ".webp", ".svg",
];

/// Comma-joined list of supported extensions, for user-facing messages.
pub fn supported_extensions_list() -> String {
    SUPPORTED_EXTENSIONS.join(", ")
}

/// Case-insensitive extension check against [`SUPPORTED_EXTENSIONS`].
pub fn is_supported(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Parse a file via LlamaParse and return its markdown text.
pub async fn parse_file(config: &ParserConfig, api_key: &str, path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read upload: {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let job_id = upload_for_parsing(&client, config, api_key, file_name, bytes).await?;
    let markdown = await_job_result(&client, config, api_key, &job_id).await?;

    Ok(markdown)
}

/// Submit the file and return the parse job id, retrying transient errors.
async fn upload_for_parsing(
    client: &reqwest::Client,
    config: &ParserConfig,
    api_key: &str,
    file_name: String,
    bytes: Vec<u8>,
) -> Result<String> {
    let url = format!("{}/api/parsing/upload", config.base_url);
    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let part = reqwest::multipart::Part::bytes(bytes.clone()).file_name(file_name.clone());
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("result_type", "markdown");

        let resp = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .multipart(form)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response.json().await?;
                    return parse_upload_response(&json);
                }

                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow!("LlamaParse upload error {}: {}", status, body_text));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                bail!("LlamaParse upload error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("LlamaParse upload failed after retries")))
}

/// Poll the job until it succeeds, then fetch the markdown result.
async fn await_job_result(
    client: &reqwest::Client,
    config: &ParserConfig,
    api_key: &str,
    job_id: &str,
) -> Result<String> {
    let status_url = format!("{}/api/parsing/job/{}", config.base_url, job_id);

    for _ in 0..config.max_polls {
        tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;

        let response = client
            .get(&status_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body_text = response.text().await.unwrap_or_default();
            bail!("LlamaParse status error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        match parse_status_response(&json)?.as_str() {
            "SUCCESS" => return fetch_markdown(client, config, api_key, job_id).await,
            "ERROR" | "CANCELED" => bail!("LlamaParse job {} failed", job_id),
            // PENDING / RUNNING — keep polling
            _ => continue,
        }
    }

    bail!(
        "LlamaParse job {} did not complete within {} polls",
        job_id,
        config.max_polls
    )
}

async fn fetch_markdown(
    client: &reqwest::Client,
    config: &ParserConfig,
    api_key: &str,
    job_id: &str,
) -> Result<String> {
    let url = format!(
        "{}/api/parsing/job/{}/result/markdown",
        config.base_url, job_id
    );

    let response = client
        .get(&url)
        .header("Authorization", format!("Bearer {}", api_key))
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body_text = response.text().await.unwrap_or_default();
        bail!("LlamaParse result error {}: {}", status, body_text);
    }

    let json: serde_json::Value = response.json().await?;
    parse_markdown_response(&json)
}

fn parse_upload_response(json: &serde_json::Value) -> Result<String> {
    json.get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Invalid LlamaParse response: missing job id"))
}

fn parse_status_response(json: &serde_json::Value) -> Result<String> {
    json.get("status")
        .and_then(|v| v.as_str())
        .map(|s| s.to_uppercase())
        .ok_or_else(|| anyhow!("Invalid LlamaParse response: missing status"))
}

fn parse_markdown_response(json: &serde_json::Value) -> Result<String> {
    json.get("markdown")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Invalid LlamaParse response: missing markdown"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_extensions_match_case_insensitively() {
        assert!(is_supported("report.pdf"));
        assert!(is_supported("REPORT.PDF"));
        assert!(is_supported("slides.pptx"));
        assert!(is_supported("photo.JPEG"));
        assert!(is_supported("/tmp/uploads/page.html"));
    }

    #[test]
    fn unsupported_extensions_are_rejected() {
        assert!(!is_supported("archive.zip"));
        assert!(!is_supported("notes.md"));
        assert!(!is_supported("binary.exe"));
        assert!(!is_supported("noextension"));
        assert!(!is_supported(""));
    }

    #[test]
    fn extension_list_names_every_supported_type() {
        let list = supported_extensions_list();
        for ext in SUPPORTED_EXTENSIONS {
            assert!(list.contains(ext));
        }
    }

    #[test]
    fn upload_response_requires_job_id() {
        let ok = serde_json::json!({ "id": "job-123", "status": "PENDING" });
        assert_eq!(parse_upload_response(&ok).unwrap(), "job-123");

        let bad = serde_json::json!({ "status": "PENDING" });
        assert!(parse_upload_response(&bad).is_err());
    }

    #[test]
    fn status_response_is_uppercased() {
        let json = serde_json::json!({ "status": "success" });
        assert_eq!(parse_status_response(&json).unwrap(), "SUCCESS");
    }

    #[test]
    fn markdown_response_requires_markdown_field() {
        let ok = serde_json::json!({ "markdown": "# Title\n\nBody." });
        assert_eq!(parse_markdown_response(&ok).unwrap(), "# Title\n\nBody.");

        let bad = serde_json::json!({ "text": "nope" });
        assert!(parse_markdown_response(&bad).is_err());
    }
}
