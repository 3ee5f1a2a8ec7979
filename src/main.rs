//! # docqa CLI
//!
//! Two commands:
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa serve` | Start the web demo (browser UI + JSON API) |
//! | `docqa ask <file> <question>` | One-shot: ingest the file and stream one answer to stdout |
//!
//! Both require the three service credentials in the environment
//! (`LLAMA_CLOUD_API_KEY`, `GROQ_API_KEY`, `COHERE_API_KEY`) and accept an
//! optional `--config` TOML file; missing config falls back to defaults.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tokio_stream::StreamExt;

use docqa::config::{self, Credentials};
use docqa::engine::QueryEngine;
use docqa::index;
use docqa::ingest::ingest_file;
use docqa::server;

/// Document Q&A — a retrieval-augmented document question-answering demo.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Document Q&A — upload a document, ask questions, get streamed answers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web demo server.
    Serve,

    /// Ingest a document and answer a single question, streaming to stdout.
    Ask {
        /// Path to the document (.pdf, .docx, .txt, ...).
        file: PathBuf,
        /// The question to ask about the document.
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let credentials = Credentials::from_env()?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg, credentials).await?;
        }
        Commands::Ask { file, question } => {
            run_ask(cfg, credentials, &file, &question).await?;
        }
    }

    Ok(())
}

async fn run_ask(
    cfg: config::Config,
    credentials: Credentials,
    file: &std::path::Path,
    question: &str,
) -> Result<()> {
    let shared = index::new_shared();
    let status = ingest_file(&cfg, &credentials, &shared, file.to_str()).await?;
    println!("{}", status);

    let snapshot = shared.read().unwrap().clone();
    let Some(built) = snapshot else {
        // Validation rejected the file; the status line already said why.
        return Ok(());
    };

    let engine = QueryEngine::new(cfg, credentials, built);
    let mut stream = engine.answer(question.to_string());

    // Snapshots are prefix-extensions of each other; print only the suffix.
    let mut last = String::new();
    let mut stdout = std::io::stdout();
    while let Some(snapshot) = stream.next().await {
        if snapshot.starts_with(&last) {
            print!("{}", &snapshot[last.len()..]);
        } else {
            // Non-prefix update (the generic failure message); print it whole.
            println!();
            print!("{}", snapshot);
        }
        stdout.flush()?;
        last = snapshot;
    }
    println!();

    Ok(())
}
