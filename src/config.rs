//! Configuration types for the digestion pipeline.
//!
//! All pipeline behaviour is controlled through [`DigestConfig`], built via
//! its [`DigestConfigBuilder`]. The API credential lives in [`LlmSettings`],
//! which is filled in at the process boundary (the CLI reads the
//! environment) and handed to each chatbot explicitly; the library itself
//! never reads environment variables for credentials.

use crate::error::DigestError;
use crate::pipeline::extract::PdfTextBackend;
use crate::pipeline::llm::CompletionBackend;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Provider used when none is configured.
pub const DEFAULT_PROVIDER: &str = "openai";

/// Which LLM to talk to and with which credential.
///
/// Shared by both chatbots; only the temperature differs between them.
#[derive(Clone, Default, PartialEq)]
pub struct LlmSettings {
    /// Provider name as `edgequake_llm` spells it (openai, anthropic,
    /// gemini, mistral, openrouter, xai, ollama, lmstudio, ...).
    pub provider: String,
    /// Model identifier, e.g. "gpt-3.5-turbo", "gpt-4.1-mini".
    pub model: String,
    /// API key for `provider`. Required unless the provider is local.
    pub api_key: Option<String>,
}

impl LlmSettings {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Environment variable that conventionally holds this provider's key.
    ///
    /// `None` for local providers that need no credential.
    pub fn api_key_env(&self) -> Option<&'static str> {
        api_key_env_for(&self.provider)
    }

    /// The API key if the provider needs one, failing when it is absent.
    pub(crate) fn require_credential(&self) -> Result<Option<&str>, DigestError> {
        let Some(env_var) = self.api_key_env() else {
            return Ok(None);
        };
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(Some(key)),
            _ => Err(DigestError::CredentialMissing {
                provider: self.provider.clone(),
                env_var: env_var.to_string(),
            }),
        }
    }
}

impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Map a provider name to the environment variable holding its API key.
///
/// `None` for keyless providers (local servers, the Copilot proxy, AWS
/// credential chain) and for names `edgequake_llm` does not know; the
/// provider factory rejects the latter when the backend is built.
pub fn api_key_env_for(provider: &str) -> Option<&'static str> {
    match provider.to_ascii_lowercase().as_str() {
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" | "claude" => Some("ANTHROPIC_API_KEY"),
        "gemini" | "google" | "vertex" | "vertexai" => Some("GEMINI_API_KEY"),
        "mistral" | "mistral-ai" | "mistralai" => Some("MISTRAL_API_KEY"),
        "azure" | "azure-openai" | "azure_openai" | "azureopenai" => Some("AZURE_OPENAI_API_KEY"),
        "openrouter" | "open-router" => Some("OPENROUTER_API_KEY"),
        "xai" | "grok" => Some("XAI_API_KEY"),
        "huggingface" | "hf" | "hugging-face" | "hugging_face" => Some("HF_TOKEN"),
        _ => None,
    }
}

/// Delay policy between retryable attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackoffStrategy {
    /// Wait the same delay before every retry.
    Fixed(Duration),
    /// Wait `base * 2^(retry - 1)`: base, 2×base, 4×base, ...
    Exponential(Duration),
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Fixed(Duration::from_secs(5))
    }
}

impl BackoffStrategy {
    /// Delay to wait after the `failed_attempt`-th attempt (1-based) failed.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        match *self {
            BackoffStrategy::Fixed(d) => d,
            BackoffStrategy::Exponential(base) => {
                let shift = failed_attempt.saturating_sub(1).min(16);
                base.saturating_mul(1u32 << shift)
            }
        }
    }
}

/// Bounded retry policy for one chatbot call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Default: 3.
    pub max_attempts: u32,
    /// Delay between retryable attempts. Default: fixed 5 s.
    pub backoff: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::default(),
        }
    }
}

/// Configuration for one digestion run.
///
/// Built via [`DigestConfig::builder()`] or [`DigestConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_digest::{DigestConfig, LlmSettings};
///
/// let config = DigestConfig::builder()
///     .llm(LlmSettings::new("openai", "gpt-4.1-mini").with_api_key("sk-test"))
///     .truncate_input(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.prompt_char_limit, 8000);
/// ```
#[derive(Clone)]
pub struct DigestConfig {
    /// Provider, model and credential shared by both chatbots.
    pub llm: LlmSettings,

    /// Pre-constructed completion backend. Takes precedence over
    /// `llm.provider`; the credential is still validated.
    pub backend: Option<Arc<dyn CompletionBackend>>,

    /// PDF text backend. Default: pdfium.
    pub pdf_backend: Option<Arc<dyn PdfTextBackend>>,

    /// Temperature for the extraction call. Default: 0.3 (factual).
    pub extractor_temperature: f32,

    /// Temperature for the synthesis call. Default: 0.6 (more critical).
    pub synthesizer_temperature: f32,

    /// Maximum tokens the LLM may generate per call. Default: provider's own.
    pub max_tokens: Option<usize>,

    /// Retry policy applied to each of the two calls.
    pub retry: RetryPolicy,

    /// Per-call timeout in seconds. Default: 120. Elapsed calls are not retried.
    pub api_timeout_secs: u64,

    /// Slice the paper text to `prompt_char_limit` before sending. Default: false.
    ///
    /// The prompt templates tell the model it sees "the first N characters",
    /// but by default the full text is substituted anyway. Set this to make
    /// the note true.
    pub truncate_input: bool,

    /// Character budget quoted in the prompt templates. Default: 8000.
    pub prompt_char_limit: usize,

    /// Below this many characters the text is suspicious. Default: 500.
    pub short_text_threshold: usize,

    /// Above this many characters the text may overflow the context. Default: 50 000.
    pub long_text_threshold: usize,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Explicit pdfium library path. Default: working directory, then system.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives stage events and the two outputs as they are produced.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            llm: LlmSettings::new(DEFAULT_PROVIDER, DEFAULT_MODEL),
            backend: None,
            pdf_backend: None,
            extractor_temperature: 0.3,
            synthesizer_temperature: 0.6,
            max_tokens: None,
            retry: RetryPolicy::default(),
            api_timeout_secs: 120,
            truncate_input: false,
            prompt_char_limit: 8000,
            short_text_threshold: 500,
            long_text_threshold: 50_000,
            password: None,
            pdfium_lib_path: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DigestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestConfig")
            .field("llm", &self.llm)
            .field("backend", &self.backend.as_ref().map(|_| "<dyn CompletionBackend>"))
            .field("pdf_backend", &self.pdf_backend.as_ref().map(|_| "<dyn PdfTextBackend>"))
            .field("extractor_temperature", &self.extractor_temperature)
            .field("synthesizer_temperature", &self.synthesizer_temperature)
            .field("max_tokens", &self.max_tokens)
            .field("retry", &self.retry)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("truncate_input", &self.truncate_input)
            .field("prompt_char_limit", &self.prompt_char_limit)
            .field("short_text_threshold", &self.short_text_threshold)
            .field("long_text_threshold", &self.long_text_threshold)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .finish()
    }
}

impl DigestConfig {
    /// Create a new builder for `DigestConfig`.
    pub fn builder() -> DigestConfigBuilder {
        DigestConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`DigestConfig`].
#[derive(Debug)]
pub struct DigestConfigBuilder {
    config: DigestConfig,
}

impl DigestConfigBuilder {
    pub fn llm(mut self, settings: LlmSettings) -> Self {
        self.config.llm = settings;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.llm.model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.llm.provider = name.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.llm.api_key = Some(key.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn CompletionBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn pdf_backend(mut self, backend: Arc<dyn PdfTextBackend>) -> Self {
        self.config.pdf_backend = Some(backend);
        self
    }

    pub fn extractor_temperature(mut self, t: f32) -> Self {
        self.config.extractor_temperature = t;
        self
    }

    pub fn synthesizer_temperature(mut self, t: f32) -> Self {
        self.config.synthesizer_temperature = t;
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n;
        self
    }

    pub fn backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.config.retry.backoff = strategy;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn truncate_input(mut self, v: bool) -> Self {
        self.config.truncate_input = v;
        self
    }

    pub fn prompt_char_limit(mut self, n: usize) -> Self {
        self.config.prompt_char_limit = n;
        self
    }

    pub fn short_text_threshold(mut self, n: usize) -> Self {
        self.config.short_text_threshold = n;
        self
    }

    pub fn long_text_threshold(mut self, n: usize) -> Self {
        self.config.long_text_threshold = n;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// The credential is *not* checked here; a missing key is reported when
    /// the chatbots are constructed, so it surfaces as
    /// [`DigestError::CredentialMissing`] rather than a config error.
    pub fn build(self) -> Result<DigestConfig, DigestError> {
        let c = &self.config;
        for (name, t) in [
            ("extractor", c.extractor_temperature),
            ("synthesizer", c.synthesizer_temperature),
        ] {
            if !(0.0..=1.0).contains(&t) {
                return Err(DigestError::InvalidConfig(format!(
                    "{name} temperature must be in [0, 1], got {t}"
                )));
            }
        }
        if c.retry.max_attempts == 0 {
            return Err(DigestError::InvalidConfig(
                "max attempts must be ≥ 1".into(),
            ));
        }
        if c.llm.model.trim().is_empty() {
            return Err(DigestError::InvalidConfig("model must not be empty".into()));
        }
        if c.prompt_char_limit == 0 {
            return Err(DigestError::InvalidConfig(
                "prompt character limit must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
