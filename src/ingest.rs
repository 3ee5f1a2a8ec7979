//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow for a newly uploaded document: path validation →
//! external parse → chunking → embedding → index swap. Validation failures
//! are not errors — they come back as the same user-facing status strings the
//! UI shows — while external-service failures propagate as errors and leave
//! any existing index untouched.

use anyhow::Result;
use std::path::Path;

use crate::chunk::chunk_text;
use crate::config::{Config, Credentials};
use crate::embedding::{embed_texts, INPUT_SEARCH_DOCUMENT};
use crate::index::{SharedIndex, VectorIndex};
use crate::parse::{is_supported, parse_file, supported_extensions_list};

/// Shown when the ingest request carries no file path.
pub const NO_FILE_MESSAGE: &str = "No file path provided. Please upload a file.";

/// Rejection message naming every supported file type.
pub fn unsupported_message() -> String {
    format!(
        "The parser can only parse the following file types: {}",
        supported_extensions_list()
    )
}

/// Status message returned after a successful ingestion.
pub fn ready_message(filename: &str) -> String {
    format!("Ready to provide responses based on: {}", filename)
}

/// Ingest a document and swap it into the shared index.
///
/// Returns the user-facing status message. The index is only replaced on the
/// success path; both validation failures and external errors leave the
/// previous index in place.
pub async fn ingest_file(
    config: &Config,
    credentials: &Credentials,
    index: &SharedIndex,
    file_path: Option<&str>,
) -> Result<String> {
    let path = match file_path {
        Some(p) if !p.trim().is_empty() => p,
        _ => return Ok(NO_FILE_MESSAGE.to_string()),
    };

    if !is_supported(path) {
        return Ok(unsupported_message());
    }

    let markdown = parse_file(&config.parser, &credentials.llama_cloud, Path::new(path)).await?;

    let chunks = chunk_text(&markdown, config.chunking.max_tokens);
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embed_texts(
        &config.embedding,
        &credentials.cohere,
        &texts,
        INPUT_SEARCH_DOCUMENT,
    )
    .await?;

    let filename = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());

    let built = VectorIndex::build(&filename, chunks, vectors)?;
    println!(
        "Parsing completed for: {} ({} chunks)",
        path,
        built.len()
    );

    *index.write().unwrap() = Some(built);

    Ok(ready_message(&filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::new_shared;
    use crate::models::Chunk;

    fn test_setup() -> (Config, Credentials, SharedIndex) {
        let config = Config::default();
        let credentials = Credentials::new(
            Some("llama-key".into()),
            Some("groq-key".into()),
            Some("cohere-key".into()),
        )
        .unwrap();
        (config, credentials, new_shared())
    }

    fn seed_index(index: &SharedIndex) {
        let chunks = vec![Chunk {
            id: "c1".into(),
            chunk_index: 0,
            text: "seeded".into(),
            hash: "h".into(),
        }];
        let built = VectorIndex::build("old.pdf", chunks, vec![vec![1.0]]).unwrap();
        *index.write().unwrap() = Some(built);
    }

    #[tokio::test]
    async fn missing_path_returns_message_without_touching_index() {
        let (config, credentials, index) = test_setup();
        seed_index(&index);

        let msg = ingest_file(&config, &credentials, &index, None)
            .await
            .unwrap();
        assert_eq!(msg, NO_FILE_MESSAGE);

        let msg = ingest_file(&config, &credentials, &index, Some("   "))
            .await
            .unwrap();
        assert_eq!(msg, NO_FILE_MESSAGE);

        let guard = index.read().unwrap();
        assert_eq!(guard.as_ref().unwrap().source_file(), "old.pdf");
    }

    #[tokio::test]
    async fn unsupported_extension_returns_rejection_and_keeps_index() {
        let (config, credentials, index) = test_setup();
        seed_index(&index);

        for path in ["archive.zip", "notes.md", "binary.exe"] {
            let msg = ingest_file(&config, &credentials, &index, Some(path))
                .await
                .unwrap();
            assert_eq!(msg, unsupported_message());
            assert!(msg.contains(".pdf"));
            assert!(msg.contains(".svg"));
        }

        let guard = index.read().unwrap();
        assert_eq!(guard.as_ref().unwrap().source_file(), "old.pdf");
    }

    #[test]
    fn ready_message_names_the_file() {
        assert_eq!(
            ready_message("report.pdf"),
            "Ready to provide responses based on: report.pdf"
        );
    }
}
