//! TOML configuration and external-service credentials.
//!
//! All configuration fields carry defaults, so a missing config file yields a
//! fully usable [`Config`]. The only hard startup requirement is the three
//! API keys in [`Credentials`], which are read from the environment and are
//! fatal when absent.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable holding the LlamaCloud (parsing service) API key.
pub const LLAMA_CLOUD_KEY_VAR: &str = "LLAMA_CLOUD_API_KEY";
/// Environment variable holding the Groq (language model) API key.
pub const GROQ_KEY_VAR: &str = "GROQ_API_KEY";
/// Environment variable holding the Cohere (embedding service) API key.
pub const COHERE_KEY_VAR: &str = "COHERE_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub parser: ParserConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub uploads: UploadsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:7860".to_string(),
        }
    }
}

/// Settings for the LlamaParse document-parsing service.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ParserConfig {
    pub base_url: String,
    /// Delay between job-status polls.
    pub poll_interval_ms: u64,
    /// Give up after this many status polls.
    pub max_polls: u32,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.cloud.llamaindex.ai".to_string(),
            poll_interval_ms: 1500,
            max_polls: 200,
            timeout_secs: 60,
            max_retries: 5,
        }
    }
}

/// Settings for the Cohere embedding service.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub base_url: String,
    /// Texts per embed API call.
    pub batch_size: usize,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "embed-english-v3.0".to_string(),
            base_url: "https://api.cohere.com".to_string(),
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 30,
        }
    }
}

/// Settings for the Groq chat-completions service.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "llama3-70b-8192".to_string(),
            base_url: "https://api.groq.com".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 700 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved as context for each question.
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UploadsConfig {
    /// Directory where browser uploads are stored before ingestion.
    pub dir: PathBuf,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./uploads"),
        }
    }
}

/// Load configuration from a TOML file.
///
/// A missing file is not an error — the demo runs entirely on defaults — but
/// an unreadable or invalid file is.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.max_tokens == 0 {
        bail!("chunking.max_tokens must be > 0");
    }

    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }

    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be >= 1");
    }

    if config.parser.poll_interval_ms == 0 || config.parser.max_polls == 0 {
        bail!("parser.poll_interval_ms and parser.max_polls must be > 0");
    }

    Ok(config)
}

/// API keys for the three external services.
///
/// All three are required; the process refuses to start without them.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// LlamaCloud key for the parsing service.
    pub llama_cloud: String,
    /// Groq key for the language model.
    pub groq: String,
    /// Cohere key for the embedding model.
    pub cohere: String,
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        Self::new(
            std::env::var(LLAMA_CLOUD_KEY_VAR).ok(),
            std::env::var(GROQ_KEY_VAR).ok(),
            std::env::var(COHERE_KEY_VAR).ok(),
        )
    }

    /// Validate that all three keys are present and non-empty.
    pub fn new(
        llama_cloud: Option<String>,
        groq: Option<String>,
        cohere: Option<String>,
    ) -> Result<Self> {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());

        if !present(&llama_cloud) || !present(&groq) || !present(&cohere) {
            bail!(
                "API keys not found! Set {}, {}, and {} in the environment.",
                LLAMA_CLOUD_KEY_VAR,
                GROQ_KEY_VAR,
                COHERE_KEY_VAR
            );
        }

        Ok(Self {
            llama_cloud: llama_cloud.unwrap_or_default(),
            groq: groq.unwrap_or_default(),
            cohere: cohere.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config(Path::new("/nonexistent/docqa.toml")).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:7860");
        assert_eq!(config.llm.model, "llama3-70b-8192");
        assert_eq!(config.embedding.model, "embed-english-v3.0");
        assert_eq!(config.retrieval.top_k, 4);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docqa.toml");
        std::fs::write(
            &path,
            r#"
[server]
bind = "0.0.0.0:8080"

[retrieval]
top_k = 8
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.chunking.max_tokens, 700);
    }

    #[test]
    fn zero_max_tokens_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docqa.toml");
        std::fs::write(&path, "[chunking]\nmax_tokens = 0\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("max_tokens"));
    }

    #[test]
    fn zero_top_k_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docqa.toml");
        std::fs::write(&path, "[retrieval]\ntop_k = 0\n").unwrap();

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn credentials_require_all_three_keys() {
        let err = Credentials::new(Some("a".into()), None, Some("c".into())).unwrap_err();
        assert!(err.to_string().contains("API keys not found"));

        let err =
            Credentials::new(Some("a".into()), Some("  ".into()), Some("c".into())).unwrap_err();
        assert!(err.to_string().contains(GROQ_KEY_VAR));

        let creds = Credentials::new(Some("a".into()), Some("b".into()), Some("c".into())).unwrap();
        assert_eq!(creds.groq, "b");
    }
}
