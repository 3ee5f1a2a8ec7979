//! # docqa
//!
//! A retrieval-augmented document Q&A web demo: upload a document, let the
//! pipeline parse and index it, then ask questions answered from the
//! document's own content with a streamed response.
//!
//! Parsing, embedding, and generation are all delegated to hosted services —
//! there is no local model or parser:
//!
//! ```text
//! ┌────────┐   ┌────────────┐   ┌──────────┐   ┌───────────┐
//! │ Upload │──▶│ LlamaParse │──▶│ Chunk +  │──▶│ In-memory │
//! │ (file) │   │ (markdown) │   │ Cohere   │   │ vector    │
//! └────────┘   └────────────┘   │ embed    │   │ index     │
//!                               └──────────┘   └─────┬─────┘
//!                                                    │ top-k
//!                                   ┌────────────────▼────┐
//!                                   │ Groq chat completion │──▶ SSE stream
//!                                   └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export LLAMA_CLOUD_API_KEY=... GROQ_API_KEY=... COHERE_API_KEY=...
//! docqa serve                        # browser UI on 127.0.0.1:7860
//! docqa ask report.pdf "What is the executive summary?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and required env credentials |
//! | [`models`] | Core data types |
//! | [`parse`] | Upload validation and LlamaParse client |
//! | [`chunk`] | Paragraph-boundary text chunking |
//! | [`embedding`] | Cohere embedding client |
//! | [`index`] | In-memory vector index |
//! | [`llm`] | Groq streaming chat client |
//! | [`engine`] | Per-request query engine |
//! | [`ingest`] | Ingestion pipeline orchestration |
//! | [`server`] | HTTP server and browser UI |

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod parse;
pub mod server;
