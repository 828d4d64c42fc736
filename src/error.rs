//! Error types for the edgequake-digest library.
//!
//! Three layers of failure exist, and only the outermost one escapes the
//! pipeline:
//!
//! * [`DigestError`] — **Fatal**: the digest cannot be produced (no text,
//!   no credential, a stage returned nothing). Returned as `Err` from the
//!   top-level `digest*` functions and mapped to a process exit code by the
//!   CLI via [`DigestError::exit_code`].
//!
//! * [`InputError`] / [`ExtractError`] — input resolution and PDF text
//!   extraction failures. The extractor logs them and reports *absence*;
//!   the orchestrator turns absence into [`DigestError::ExtractionFailed`].
//!
//! * [`BackendError`] — one failed completion request, classified as
//!   transient (rate limit, server error) or fatal. The chatbot's retry loop
//!   consumes these; callers only ever see the resulting absence.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All fatal errors returned by the edgequake-digest library.
#[derive(Debug, Error)]
pub enum DigestError {
    // ── Extraction ────────────────────────────────────────────────────────
    /// No text could be extracted (missing, corrupt, unreadable or empty PDF).
    #[error("Failed to extract text from '{input}'. Aborting.\nWas the PDF text-based? Re-run with -v for details.")]
    ExtractionFailed { input: String },

    // ── Chatbot construction ──────────────────────────────────────────────
    /// The provider needs an API key and none was supplied.
    #[error("{env_var} is not set; provider '{provider}' requires an API key.\nSet it in the environment or in a .env file.")]
    CredentialMissing { provider: String, env_var: String },

    /// The provider factory could not build a provider.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Stages ────────────────────────────────────────────────────────────
    /// The extractor-role call produced no completion.
    #[error("Extractor bot failed to produce an output after {attempts} attempt(s). Aborting.")]
    ExtractorStageFailed { attempts: u32 },

    /// The synthesizer-role call produced no completion.
    ///
    /// The extraction has already been reported through the progress
    /// callback; it is carried here so library callers do not lose it.
    #[error("Synthesizer bot failed to produce an output after {attempts} attempt(s).")]
    SynthesizerStageFailed { attempts: u32, extraction: String },

    // ── I/O ───────────────────────────────────────────────────────────────
    /// Could not create or write the digest output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config ────────────────────────────────────────────────────────────
    /// Builder or settings validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DigestError {
    /// The stage-1 extraction, when the run failed after producing one.
    pub fn extraction(&self) -> Option<&str> {
        match self {
            DigestError::SynthesizerStageFailed { extraction, .. } => Some(extraction),
            _ => None,
        }
    }

    /// Process exit code for this failure.
    ///
    /// | Code | Meaning |
    /// |------|---------|
    /// | 1 | configuration, I/O or internal error |
    /// | 3 | text extraction failed |
    /// | 4 | API credential missing |
    /// | 5 | extractor-stage LLM call failed |
    /// | 6 | synthesizer-stage LLM call failed |
    ///
    /// Code 2 is left to clap for usage errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            DigestError::ExtractionFailed { .. } => 3,
            DigestError::CredentialMissing { .. } => 4,
            DigestError::ExtractorStageFailed { .. } => 5,
            DigestError::SynthesizerStageFailed { .. } => 6,
            DigestError::ProviderNotConfigured { .. }
            | DigestError::OutputWriteFailed { .. }
            | DigestError::InvalidConfig(_)
            | DigestError::Internal(_) => 1,
        }
    }
}

/// Failure to turn the user-supplied input into a local PDF path.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("PDF file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}' (first bytes: {magic:?})")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure inside a [`crate::pipeline::extract::PdfTextBackend`].
#[derive(Debug, Error)]
pub enum ExtractError {
    /// No pdfium library could be loaded.
    #[error("Failed to bind to pdfium library: {0}\nSet PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide.")]
    Bind(String),

    /// pdfium could not parse the document.
    #[error("Cannot open PDF '{path}': {detail}")]
    Open { path: PathBuf, detail: String },

    #[error("PDF '{path}' is encrypted and requires a password")]
    PasswordRequired { path: PathBuf },

    /// Text could not be read from one page.
    #[error("Text extraction failed for page {page}: {detail}")]
    Page { page: usize, detail: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A single failed completion request, as reported by a
/// [`crate::pipeline::llm::CompletionBackend`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackendError {
    /// HTTP 429 or an equivalent provider message.
    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        /// Server-suggested wait, when the backend knows it.
        retry_after: Option<Duration>,
    },

    /// 5xx-class provider failure that usually clears on its own.
    #[error("Server error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Server { status: Option<u16>, message: String },

    /// Auth, malformed request, network, timeout, parse: retrying will not help.
    #[error("{message}")]
    Fatal { message: String },
}

impl BackendError {
    /// Whether the chatbot should wait and retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::RateLimited { .. } | BackendError::Server { .. }
        )
    }
}
