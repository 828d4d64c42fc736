//! Digestion entry points.
//!
//! A run is strictly sequential: resolve the input, extract the text, ask
//! the extractor for structured facts, then ask the synthesizer for a
//! critiqued digest built on those facts. Any stage that comes back empty
//! ends the run with the matching [`DigestError`].

use crate::config::DigestConfig;
use crate::error::DigestError;
use crate::output::{DigestOutput, DigestStats, DigestWarning};
use crate::pipeline::extract::{DocumentText, PdfTextBackend, PdfiumBackend, TextExtractor};
use crate::pipeline::input;
use crate::pipeline::llm::{Chatbot, CompletionBackend, ProviderBackend};
use crate::progress::{callback_or_noop, ProgressCallback, Stage};
use crate::prompts::{extraction_prompt, synthesis_prompt, PaperTextPolicy};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Digest a PDF file or URL.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input_str` — Local file path or HTTP/HTTPS URL to a PDF
/// * `config` — Digestion configuration
///
/// # Errors
/// * [`DigestError::ExtractionFailed`] — missing, unreadable, non-PDF or
///   text-less input. No LLM call is made.
/// * [`DigestError::CredentialMissing`] — the provider needs a key and
///   `config.llm.api_key` is empty. No LLM call is made.
/// * [`DigestError::ExtractorStageFailed`] — stage 1 produced nothing.
/// * [`DigestError::SynthesizerStageFailed`] — stage 2 produced nothing;
///   the stage-1 output is carried in the error.
pub async fn digest(
    input_str: impl AsRef<str>,
    config: &DigestConfig,
) -> Result<DigestOutput, DigestError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    let progress = callback_or_noop(config.progress_callback.as_ref());
    info!("Starting digestion: {}", input_str);

    // ── Step 1: Resolve input and extract text ───────────────────────────
    progress.on_stage_start(Stage::TextExtraction);
    let extraction_start = Instant::now();
    let text = match extract_text(input_str, config).await {
        Some(text) => text,
        None => {
            error!("Failed to extract text from the PDF. Aborting.");
            return Err(DigestError::ExtractionFailed {
                input: input_str.to_string(),
            });
        }
    };
    let extraction_duration_ms = extraction_start.elapsed().as_millis() as u64;
    info!(
        "Extracted {} characters from {} pages",
        text.char_count(),
        text.page_count()
    );
    progress.on_text_extracted(text.char_count(), text.page_count());

    // ── Step 2: Advisory length checks ───────────────────────────────────
    let warnings = length_warnings(&text, config);
    for w in &warnings {
        warn!("{}", w);
        progress.on_warning(w);
    }

    // ── Step 3: Chatbots (credential checked before any call) ────────────
    let backend = resolve_backend(config)?;
    let extractor = build_chatbot(
        Stage::Extractor,
        config.extractor_temperature,
        &backend,
        &progress,
        config,
    )?;
    let synthesizer = build_chatbot(
        Stage::Synthesizer,
        config.synthesizer_temperature,
        &backend,
        &progress,
        config,
    )?;

    let policy = PaperTextPolicy {
        char_limit: config.prompt_char_limit,
        truncate: config.truncate_input,
    };
    let paper_text = text.as_str();
    let llm_start = Instant::now();

    // ── Step 4: Extractor ────────────────────────────────────────────────
    info!("Running Extractor Bot...");
    progress.on_stage_start(Stage::Extractor);
    let first = extractor
        .call(&extraction_prompt(paper_text, policy))
        .await;
    let extractor_attempts = first.attempts;
    let mut input_tokens = first.prompt_tokens;
    let mut output_tokens = first.completion_tokens;
    let extraction = match first.into_text() {
        Some(text) => text,
        None => {
            error!("Extractor bot failed to produce an output. Aborting.");
            return Err(DigestError::ExtractorStageFailed {
                attempts: extractor_attempts,
            });
        }
    };
    progress.on_extraction_complete(&extraction);

    // ── Step 5: Synthesizer ──────────────────────────────────────────────
    info!("Running Synthesizer/Critic Bot...");
    progress.on_stage_start(Stage::Synthesizer);
    let second = synthesizer
        .call(&synthesis_prompt(&extraction, paper_text, policy))
        .await;
    let synthesizer_attempts = second.attempts;
    input_tokens += second.prompt_tokens;
    output_tokens += second.completion_tokens;
    let digest = match second.into_text() {
        Some(text) => text,
        None => {
            error!("Synthesizer bot failed to produce an output.");
            return Err(DigestError::SynthesizerStageFailed {
                attempts: synthesizer_attempts,
                extraction,
            });
        }
    };
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;
    progress.on_digest_complete(&digest);

    let stats = DigestStats {
        page_count: text.page_count(),
        document_chars: text.char_count(),
        prompt_text_chars: policy.apply(paper_text).chars().count(),
        extractor_attempts,
        synthesizer_attempts,
        total_input_tokens: input_tokens,
        total_output_tokens: output_tokens,
        extraction_duration_ms,
        llm_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Digestion complete: {} + {} attempts, {}ms total",
        extractor_attempts, synthesizer_attempts, stats.total_duration_ms
    );

    Ok(DigestOutput {
        extraction,
        digest,
        warnings,
        stats,
    })
}

/// Digest a PDF and write the final digest to a file.
///
/// Uses atomic write (temp file + rename) so a failed run never leaves a
/// partial file behind.
pub async fn digest_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &DigestConfig,
) -> Result<DigestOutput, DigestError> {
    let output = digest(input_str, config).await?;
    write_atomic(output_path.as_ref(), &output.digest).await?;
    Ok(output)
}

/// Synchronous wrapper around [`digest`].
///
/// Creates a temporary tokio runtime internally.
pub fn digest_sync(
    input_str: impl AsRef<str>,
    config: &DigestConfig,
) -> Result<DigestOutput, DigestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DigestError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(digest(input_str, config))
}

/// Digest PDF bytes held in memory.
///
/// The bytes go to a managed [`tempfile`] that is removed on return.
///
/// # Example
/// ```rust,no_run
/// use edgequake_digest::{digest_from_bytes, DigestConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("paper.pdf")?;
/// let config = DigestConfig::builder().api_key("sk-...").build()?;
/// let output = digest_from_bytes(&bytes, &config).await?;
/// println!("{}", output.digest);
/// # Ok(())
/// # }
/// ```
pub async fn digest_from_bytes(
    bytes: &[u8],
    config: &DigestConfig,
) -> Result<DigestOutput, DigestError> {
    let mut tmp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| DigestError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| DigestError::Internal(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_string_lossy().to_string();
    // `tmp` is dropped (and the file deleted) when `digest` returns
    digest(&path, config).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve and extract, folding every failure into absence.
async fn extract_text(input_str: &str, config: &DigestConfig) -> Option<DocumentText> {
    let resolved = match input::resolve_input(input_str, config.download_timeout_secs).await {
        Ok(resolved) => resolved,
        Err(e) => {
            error!("{}", e);
            return None;
        }
    };

    let backend: Arc<dyn PdfTextBackend> = match config.pdf_backend {
        Some(ref backend) => Arc::clone(backend),
        None => {
            let mut pdfium = PdfiumBackend::new();
            if let Some(ref lib) = config.pdfium_lib_path {
                pdfium = pdfium.with_library_path(lib);
            }
            Arc::new(pdfium)
        }
    };

    TextExtractor::new(backend)
        .with_password(config.password.clone())
        .extract(resolved.path())
        .await
}

fn length_warnings(text: &DocumentText, config: &DigestConfig) -> Vec<DigestWarning> {
    let chars = text.char_count();
    let mut warnings = Vec::new();
    if chars < config.short_text_threshold {
        warnings.push(DigestWarning::TextTooShort {
            chars,
            threshold: config.short_text_threshold,
        });
    }
    if chars > config.long_text_threshold {
        warnings.push(DigestWarning::TextTooLong {
            chars,
            threshold: config.long_text_threshold,
        });
    }
    warnings
}

/// Pick the completion backend: a pre-built one wins, else the named
/// provider built from the explicit key by [`ProviderBackend::from_settings`].
///
/// The credential is checked first so a missing key is reported as such
/// rather than as a provider construction failure.
fn resolve_backend(config: &DigestConfig) -> Result<Arc<dyn CompletionBackend>, DigestError> {
    config.llm.require_credential()?;

    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    let timeout = Duration::from_secs(config.api_timeout_secs);
    let backend = ProviderBackend::from_settings(&config.llm, timeout)?;
    Ok(Arc::new(backend))
}

fn build_chatbot(
    stage: Stage,
    temperature: f32,
    backend: &Arc<dyn CompletionBackend>,
    progress: &ProgressCallback,
    config: &DigestConfig,
) -> Result<Chatbot, DigestError> {
    Ok(
        Chatbot::new(stage, &config.llm, temperature, Arc::clone(backend))?
            .with_retry(config.retry)?
            .with_max_tokens(config.max_tokens)
            .with_progress(Arc::clone(progress)),
    )
}

async fn write_atomic(path: &Path, contents: &str) -> Result<(), DigestError> {
    let write_err = |e: std::io::Error| DigestError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("digest.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    info!("Digest written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(chars: usize) -> DocumentText {
        DocumentText::normalize(&"a".repeat(chars)).unwrap()
    }

    #[test]
    fn short_text_warns() {
        let w = length_warnings(&text(31), &DigestConfig::default());
        assert_eq!(
            w,
            vec![DigestWarning::TextTooShort {
                chars: 31,
                threshold: 500
            }]
        );
    }

    #[test]
    fn normal_text_has_no_warnings() {
        assert!(length_warnings(&text(5_000), &DigestConfig::default()).is_empty());
    }

    #[test]
    fn long_text_warns_without_truncating() {
        let doc = text(50_001);
        let w = length_warnings(&doc, &DigestConfig::default());
        assert!(matches!(w[0], DigestWarning::TextTooLong { chars: 50_001, .. }));
        assert_eq!(doc.char_count(), 50_001);
    }

    #[test]
    fn thresholds_are_exclusive() {
        let config = DigestConfig::default();
        assert!(length_warnings(&text(500), &config).is_empty());
        assert!(length_warnings(&text(50_000), &config).is_empty());
    }

    #[test]
    fn missing_credential_blocks_backend_resolution() {
        let err = resolve_backend(&DigestConfig::default()).err().unwrap();
        assert_eq!(err.exit_code(), 4);
    }

    #[tokio::test]
    async fn atomic_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/digest.txt");
        write_atomic(&path, "final digest").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "final digest");
        assert!(!path.with_extension("digest.tmp").exists());
    }
}
