//! # edgequake-digest
//!
//! Turn a research-paper PDF into a short, critiqued digest with two LLM
//! calls.
//!
//! ## Why two calls?
//!
//! A single "summarise this paper" prompt tends to blur what the authors
//! claim with what the model thinks of it. Here a low-temperature
//! *extractor* first pulls out labelled facts (problem, method, results,
//! conclusion, limitations), then a higher-temperature *synthesizer* turns
//! those facts, with the paper text as context, into a 150–250 word digest
//! with a brief critique.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input        resolve local file or download from URL
//!  ├─ 2. Extract      per-page text via pdfium, whitespace-normalised
//!  ├─ 3. Check        advisory warnings for very short / very long text
//!  ├─ 4. Extractor    LLM call, temperature 0.3 → structured facts
//!  └─ 5. Synthesizer  LLM call, temperature 0.6 → final digest
//! ```
//!
//! Each LLM call retries rate-limit and server errors a bounded number of
//! times; anything else fails the stage at once.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_digest::{digest, DigestConfig, LlmSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let key = std::env::var("OPENAI_API_KEY")?;
//!     let config = DigestConfig::builder()
//!         .llm(LlmSettings::new("openai", "gpt-3.5-turbo").with_api_key(key))
//!         .build()?;
//!     let output = digest("paper.pdf", &config).await?;
//!     println!("{}", output.digest);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paper-digest` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-digest = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod digest;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    api_key_env_for, BackoffStrategy, DigestConfig, DigestConfigBuilder, LlmSettings,
    RetryPolicy, DEFAULT_MODEL, DEFAULT_PROVIDER,
};
pub use digest::{digest, digest_from_bytes, digest_sync, digest_to_file};
pub use error::{BackendError, DigestError, ExtractError, InputError};
pub use output::{DigestFailure, DigestOutput, DigestStats, DigestWarning};
pub use pipeline::extract::{DocumentText, PdfTextBackend, PdfiumBackend, TextExtractor};
pub use pipeline::llm::{
    CallOutcome, CallReport, Chatbot, Completion, CompletionBackend, CompletionRequest,
    ProviderBackend,
};
pub use progress::{DigestProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
