//! Chat-completion calls with bounded retry.
//!
//! A [`Chatbot`] is one persona (extractor or synthesizer): a model, a
//! temperature, a retry policy and a [`CompletionBackend`]. Each
//! [`Chatbot::call`] walks this state machine:
//!
//! ```text
//! Attempting(1) ──ok, non-empty──▶ Succeeded
//!      │  ──ok, empty──────────▶ Empty            (no retry)
//!      │  ──fatal error────────▶ FailedFatal      (no retry)
//!      │  ──rate limit / 5xx───▶ wait backoff ──▶ Attempting(2) ─▶ …
//!      ▼
//! Attempting(max) ──rate limit / 5xx──▶ FailedTransient
//! ```
//!
//! Prompt wording lives in [`crate::prompts`]; nothing here knows what the
//! two stages ask for.

use crate::config::{LlmSettings, RetryPolicy};
use crate::error::{BackendError, DigestError};
use crate::progress::{NoopProgressCallback, ProgressCallback, Stage};
use crate::prompts::PromptPair;
use async_trait::async_trait;
use edgequake_llm::{
    AnthropicProvider, ChatMessage, CompletionOptions, GeminiProvider, LLMProvider, LlmError,
    OpenAIProvider, OpenRouterProvider, ProviderFactory,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// One chat-completion request: a system and a user message.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    /// Role instruction (system message).
    pub system: &'a str,
    /// Task instruction (user message).
    pub user: &'a str,
    pub temperature: f32,
    pub max_tokens: Option<usize>,
}

/// A completion as returned by a backend, before any emptiness check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Sends one chat-completion request. No retry; that is the chatbot's job.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion, BackendError>;
}

/// [`CompletionBackend`] over any `edgequake_llm` provider.
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    name: String,
    timeout: Duration,
}

impl ProviderBackend {
    pub fn new(provider: Arc<dyn LLMProvider>, name: impl Into<String>) -> Self {
        Self {
            provider,
            name: name.into(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a provider for `settings`, passing the API key explicitly.
    ///
    /// Hosted providers are constructed from `settings.api_key`; the
    /// environment is never consulted for them. xAI, Mistral and
    /// HuggingFace speak the OpenAI wire format and go through
    /// [`OpenAIProvider::compatible`]. Keyless providers (ollama, lmstudio)
    /// and Azure, whose endpoint and deployment come from its own variables,
    /// are left to `ProviderFactory`.
    pub fn from_settings(settings: &LlmSettings, timeout: Duration) -> Result<Self, DigestError> {
        let model = settings.model.as_str();
        let provider: Arc<dyn LLMProvider> = match settings.require_credential()? {
            Some(key) => match settings.provider.to_ascii_lowercase().as_str() {
                "openai" => Arc::new(OpenAIProvider::new(key).with_model(model)),
                "anthropic" | "claude" => Arc::new(AnthropicProvider::new(key).with_model(model)),
                "gemini" | "google" => Arc::new(GeminiProvider::new(key).with_model(model)),
                "openrouter" | "open-router" => {
                    Arc::new(OpenRouterProvider::new(key).with_model(model))
                }
                "xai" | "grok" => Arc::new(OpenAIProvider::compatible(key, XAI_BASE_URL).with_model(model)),
                "mistral" | "mistral-ai" | "mistralai" => {
                    Arc::new(OpenAIProvider::compatible(key, MISTRAL_BASE_URL).with_model(model))
                }
                "huggingface" | "hf" | "hugging-face" | "hugging_face" => Arc::new(
                    OpenAIProvider::compatible(key, HUGGINGFACE_BASE_URL).with_model(model),
                ),
                _ => from_factory(settings)?,
            },
            None => from_factory(settings)?,
        };
        debug!(
            "LLM provider '{}' ready (model: {})",
            settings.provider, settings.model
        );
        Ok(Self::new(provider, settings.provider.clone()).with_timeout(timeout))
    }
}

const XAI_BASE_URL: &str = "https://api.x.ai/v1";
const MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";
const HUGGINGFACE_BASE_URL: &str = "https://router.huggingface.co/v1";

fn from_factory(settings: &LlmSettings) -> Result<Arc<dyn LLMProvider>, DigestError> {
    ProviderFactory::create_llm_provider(&settings.provider, &settings.model).map_err(|e| {
        DigestError::ProviderNotConfigured {
            provider: settings.provider.clone(),
            hint: format!("{e}"),
        }
    })
}

#[async_trait]
impl CompletionBackend for ProviderBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Completion, BackendError> {
        let messages = vec![
            ChatMessage::system(request.system),
            ChatMessage::user(request.user),
        ];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: request.max_tokens,
            ..Default::default()
        };

        let call = self.provider.chat(&messages, Some(&options));
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => Ok(Completion {
                content: response.content,
                prompt_tokens: response.prompt_tokens as u64,
                completion_tokens: response.completion_tokens as u64,
            }),
            Ok(Err(e)) => Err(classify_error(&e)),
            Err(_) => Err(BackendError::Fatal {
                message: format!("LLM call timed out after {}s", self.timeout.as_secs()),
            }),
        }
    }
}

static RATE_LIMIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b429\b|rate[ _-]?limit|too many requests|quota exceeded").unwrap());

static SERVER_ERROR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(50[0-4]|529)\b|internal server error|server error|bad gateway|service unavailable|gateway timeout|overloaded",
    )
    .unwrap()
});

static STATUS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([45]\d\d)\b").unwrap());

/// "Please try again in 20s", "try again in 250ms", "retry-after: 7".
static RETRY_AFTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:try again in|retry[ _-]after:?)\s*(\d+(?:\.\d+)?)\s*(ms|milliseconds?)?").unwrap()
});

/// Classify a provider error.
///
/// Typed variants decide on their own: rate limits are retried after the
/// server's hint (when the message carries one), auth, request, token-limit,
/// model, config, network and timeout errors are fatal. Only the catch-all
/// `ApiError` / `ProviderError` texts are inspected for an HTTP status.
pub fn classify_error(err: &LlmError) -> BackendError {
    match err {
        LlmError::RateLimited(message) => BackendError::RateLimited {
            retry_after: retry_after_hint(message),
            message: message.clone(),
        },
        LlmError::ApiError(message) | LlmError::ProviderError(message) => {
            classify_message(message)
        }
        other => BackendError::Fatal {
            message: other.to_string(),
        },
    }
}

/// Classify an untyped provider message by status code and usual phrases.
/// Anything unrecognised is fatal.
pub fn classify_message(message: &str) -> BackendError {
    let message = message.to_string();
    if RATE_LIMIT_RE.is_match(&message) {
        return BackendError::RateLimited {
            retry_after: retry_after_hint(&message),
            message,
        };
    }
    if SERVER_ERROR_RE.is_match(&message) {
        let status = STATUS_RE
            .captures(&message)
            .and_then(|c| c[1].parse::<u16>().ok())
            .filter(|s| *s >= 500);
        return BackendError::Server { status, message };
    }
    BackendError::Fatal { message }
}

/// Server-suggested wait embedded in a rate-limit message.
fn retry_after_hint(message: &str) -> Option<Duration> {
    let caps = RETRY_AFTER_RE.captures(message)?;
    let value: f64 = caps[1].parse().ok()?;
    let secs = if caps.get(2).is_some() {
        value / 1000.0
    } else {
        value
    };
    Duration::try_from_secs_f64(secs).ok()
}

/// How a call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// Non-empty completion, trimmed.
    Succeeded(String),
    /// The backend answered with no content. Not retried.
    Empty,
    /// Every attempt hit a transient error.
    FailedTransient { last_error: BackendError },
    /// A non-retryable error ended the call.
    FailedFatal { error: BackendError },
}

/// The outcome of one [`Chatbot::call`] plus bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct CallReport {
    pub outcome: CallOutcome,
    /// Requests actually sent.
    pub attempts: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub duration_ms: u64,
}

impl CallReport {
    /// The completion text, or `None` for every failure outcome.
    pub fn into_text(self) -> Option<String> {
        match self.outcome {
            CallOutcome::Succeeded(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, CallOutcome::Succeeded(_))
    }

    /// Human-readable failure reason, `None` on success.
    pub fn failure_reason(&self) -> Option<String> {
        match &self.outcome {
            CallOutcome::Succeeded(_) => None,
            CallOutcome::Empty => Some("LLM returned an empty message".to_string()),
            CallOutcome::FailedTransient { last_error } => Some(format!(
                "LLM call failed after {} attempts: {}",
                self.attempts, last_error
            )),
            CallOutcome::FailedFatal { error } => Some(format!("LLM call failed: {error}")),
        }
    }
}

/// One LLM persona with its own temperature and retry loop.
pub struct Chatbot {
    stage: Stage,
    model: String,
    temperature: f32,
    max_tokens: Option<usize>,
    retry: RetryPolicy,
    backend: Arc<dyn CompletionBackend>,
    progress: ProgressCallback,
}

impl Chatbot {
    /// Construct a chatbot, validating the explicit settings.
    ///
    /// # Errors
    /// * [`DigestError::CredentialMissing`] when the provider needs a key and
    ///   `settings.api_key` is absent or blank. No request is made.
    /// * [`DigestError::InvalidConfig`] for a temperature outside `[0, 1]`
    ///   or a zero attempt budget.
    pub fn new(
        stage: Stage,
        settings: &LlmSettings,
        temperature: f32,
        backend: Arc<dyn CompletionBackend>,
    ) -> Result<Self, DigestError> {
        settings.require_credential()?;
        if !(0.0..=1.0).contains(&temperature) {
            return Err(DigestError::InvalidConfig(format!(
                "temperature must be in [0, 1], got {temperature}"
            )));
        }
        info!(
            "Chatbot initialized with model: {} ({} via {})",
            settings.model,
            stage,
            backend.name()
        );
        Ok(Self {
            stage,
            model: settings.model.clone(),
            temperature,
            max_tokens: None,
            retry: RetryPolicy::default(),
            backend,
            progress: Arc::new(NoopProgressCallback),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Result<Self, DigestError> {
        if retry.max_attempts == 0 {
            return Err(DigestError::InvalidConfig(
                "max attempts must be ≥ 1".into(),
            ));
        }
        self.retry = retry;
        Ok(self)
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<usize>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run `prompt` and return the completion text, or `None` on any failure.
    pub async fn execute_task(&self, prompt: &PromptPair) -> Option<String> {
        self.call(prompt).await.into_text()
    }

    /// Run `prompt` through the retry loop and report how it went.
    pub async fn call(&self, prompt: &PromptPair) -> CallReport {
        let start = Instant::now();
        let max = self.retry.max_attempts;
        info!(
            "Executing task with role: {}...",
            crate::prompts::first_chars(&prompt.role, 100)
        );
        debug!(
            "{} prompt: {} chars system, {} chars user",
            self.stage,
            prompt.role.chars().count(),
            prompt.task.chars().count()
        );

        let request = CompletionRequest {
            model: &self.model,
            system: &prompt.role,
            user: &prompt.task,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut attempt = 0;
        let mut prompt_tokens = 0;
        let mut completion_tokens = 0;

        let outcome = loop {
            attempt += 1;
            info!("Calling LLM (Attempt {}/{})...", attempt, max);
            self.progress.on_attempt(self.stage, attempt, max);

            match self.backend.complete(&request).await {
                Ok(completion) => {
                    prompt_tokens += completion.prompt_tokens;
                    completion_tokens += completion.completion_tokens;
                    let content = completion.content.trim();
                    if content.is_empty() {
                        warn!("LLM returned an empty message.");
                        break CallOutcome::Empty;
                    }
                    info!("LLM call successful.");
                    break CallOutcome::Succeeded(content.to_string());
                }
                Err(e) if e.is_transient() => {
                    if attempt >= max {
                        error!("LLM call failed after {} attempts: {}", attempt, e);
                        break CallOutcome::FailedTransient { last_error: e };
                    }
                    let delay = match &e {
                        BackendError::RateLimited {
                            retry_after: Some(hint),
                            ..
                        } => *hint,
                        _ => self.retry.backoff.delay_after(attempt),
                    };
                    warn!(
                        "{}. Retrying in {:?}... (Attempt {}/{})",
                        e, delay, attempt, max
                    );
                    self.progress
                        .on_retry(self.stage, attempt, delay, &e.to_string());
                    sleep(delay).await;
                }
                Err(e) => {
                    error!("An unexpected error occurred during LLM call: {}", e);
                    break CallOutcome::FailedFatal { error: e };
                }
            }
        };

        let report = CallReport {
            outcome,
            attempts: attempt,
            prompt_tokens,
            completion_tokens,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        if let Some(reason) = report.failure_reason() {
            self.progress.on_call_failed(self.stage, &reason);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackoffStrategy;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays scripted results; repeats the last one when the script runs out.
    struct Scripted {
        script: Mutex<VecDeque<Result<Completion, BackendError>>>,
        last: Result<Completion, BackendError>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(script: Vec<Result<Completion, BackendError>>) -> Arc<Self> {
            let last = script
                .last()
                .cloned()
                .unwrap_or_else(|| Ok(Completion::default()));
            Arc::new(Self {
                script: Mutex::new(script.into()),
                last,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionBackend for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _: &CompletionRequest<'_>) -> Result<Completion, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| self.last.clone())
        }
    }

    fn rate_limited() -> Result<Completion, BackendError> {
        Err(BackendError::RateLimited {
            message: "429 Too Many Requests".into(),
            retry_after: None,
        })
    }

    fn settings() -> LlmSettings {
        LlmSettings::new("openai", "gpt-3.5-turbo").with_api_key("sk-test")
    }

    fn bot(backend: Arc<Scripted>) -> Chatbot {
        Chatbot::new(Stage::Extractor, &settings(), 0.3, backend)
            .unwrap()
            .with_retry(RetryPolicy {
                max_attempts: 3,
                backoff: BackoffStrategy::Fixed(Duration::ZERO),
            })
            .unwrap()
    }

    fn prompt() -> PromptPair {
        PromptPair::new("You extract facts.", "Extract: Problem X.")
    }

    #[tokio::test]
    async fn succeeds_after_k_transient_failures() {
        let backend = Scripted::new(vec![
            rate_limited(),
            Err(BackendError::Server {
                status: Some(503),
                message: "overloaded".into(),
            }),
            Ok(Completion::text("  facts  ")),
        ]);
        let report = bot(Arc::clone(&backend)).call(&prompt()).await;
        assert_eq!(report.outcome, CallOutcome::Succeeded("facts".into()));
        assert_eq!(report.attempts, 3);
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn always_transient_exhausts_budget() {
        let backend = Scripted::new(vec![rate_limited()]);
        let report = bot(Arc::clone(&backend)).call(&prompt()).await;
        assert!(matches!(report.outcome, CallOutcome::FailedTransient { .. }));
        assert_eq!(backend.calls(), 3);
        assert_eq!(report.into_text(), None);
    }

    #[tokio::test]
    async fn fatal_error_is_not_retried() {
        let backend = Scripted::new(vec![Err(BackendError::Fatal {
            message: "401 invalid api key".into(),
        })]);
        let text = bot(Arc::clone(&backend)).execute_task(&prompt()).await;
        assert_eq!(text, None);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn empty_message_is_not_retried() {
        let backend = Scripted::new(vec![Ok(Completion::text("   \n"))]);
        let report = bot(Arc::clone(&backend)).call(&prompt()).await;
        assert_eq!(report.outcome, CallOutcome::Empty);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn single_attempt_budget_never_sleeps() {
        let backend = Scripted::new(vec![rate_limited()]);
        let bot = Chatbot::new(Stage::Synthesizer, &settings(), 0.6, backend.clone())
            .unwrap()
            .with_retry(RetryPolicy {
                max_attempts: 1,
                backoff: BackoffStrategy::Fixed(Duration::from_secs(3600)),
            })
            .unwrap();
        let report = bot.call(&prompt()).await;
        assert_eq!(report.attempts, 1);
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn tokens_accumulate_across_attempts() {
        let backend = Scripted::new(vec![
            rate_limited(),
            Ok(Completion {
                content: "ok".into(),
                prompt_tokens: 120,
                completion_tokens: 30,
            }),
        ]);
        let report = bot(backend).call(&prompt()).await;
        assert_eq!(report.prompt_tokens, 120);
        assert_eq!(report.completion_tokens, 30);
    }

    #[test]
    fn missing_credential_fails_construction() {
        let backend = Scripted::new(vec![]);
        let err = Chatbot::new(
            Stage::Extractor,
            &LlmSettings::new("openai", "gpt-3.5-turbo"),
            0.3,
            backend.clone(),
        )
        .err()
        .expect("must fail");
        assert!(matches!(err, DigestError::CredentialMissing { .. }));
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn temperature_out_of_range_is_rejected() {
        let backend = Scripted::new(vec![]);
        assert!(Chatbot::new(Stage::Extractor, &settings(), 1.2, backend).is_err());
    }

    #[derive(Default)]
    struct RetryLog(Mutex<Vec<Duration>>);

    impl crate::progress::DigestProgressCallback for RetryLog {
        fn on_retry(&self, _stage: Stage, _attempt: u32, delay: Duration, _reason: &str) {
            self.0.lock().unwrap().push(delay);
        }
    }

    #[tokio::test]
    async fn retry_after_hint_overrides_backoff() {
        let backend = Scripted::new(vec![
            Err(BackendError::RateLimited {
                message: "slow down".into(),
                retry_after: Some(Duration::from_millis(5)),
            }),
            Ok(Completion::text("facts")),
        ]);
        let log = Arc::new(RetryLog::default());
        let bot = Chatbot::new(Stage::Extractor, &settings(), 0.3, backend.clone())
            .unwrap()
            .with_retry(RetryPolicy {
                max_attempts: 2,
                backoff: BackoffStrategy::Fixed(Duration::from_secs(3600)),
            })
            .unwrap()
            .with_progress(log.clone());

        let report = bot.call(&prompt()).await;
        assert!(report.is_success());
        assert_eq!(*log.0.lock().unwrap(), vec![Duration::from_millis(5)]);
    }

    #[test]
    fn explicit_key_builds_hosted_backends_without_env() {
        for (provider, var) in [
            ("openai", "OPENAI_API_KEY"),
            ("anthropic", "ANTHROPIC_API_KEY"),
            ("gemini", "GEMINI_API_KEY"),
            ("openrouter", "OPENROUTER_API_KEY"),
            ("xai", "XAI_API_KEY"),
            ("mistral", "MISTRAL_API_KEY"),
            ("huggingface", "HF_TOKEN"),
        ] {
            std::env::remove_var(var);
            let settings = LlmSettings::new(provider, "some-model").with_api_key("sk-explicit");
            let backend = ProviderBackend::from_settings(&settings, Duration::from_secs(5))
                .unwrap_or_else(|e| panic!("{provider}: {e}"));
            assert_eq!(backend.name(), provider);
        }
    }

    #[test]
    fn backend_without_key_reports_missing_credential() {
        let settings = LlmSettings::new("anthropic", "claude-sonnet-4-20250514");
        match ProviderBackend::from_settings(&settings, Duration::from_secs(5)) {
            Err(DigestError::CredentialMissing { env_var, .. }) => {
                assert_eq!(env_var, "ANTHROPIC_API_KEY")
            }
            Err(other) => panic!("expected CredentialMissing, got {other:?}"),
            Ok(_) => panic!("expected CredentialMissing, got a backend"),
        }
    }

    #[test]
    fn typed_request_errors_are_fatal() {
        let errors = [
            LlmError::TokenLimitExceeded { max: 4096, got: 502 },
            LlmError::InvalidRequest("max_tokens must be <= 500".into()),
            LlmError::AuthError("invalid api key".into()),
            LlmError::ModelNotFound("gpt-9".into()),
            LlmError::ConfigError("missing base url".into()),
            LlmError::NotSupported("streaming".into()),
            LlmError::NetworkError("connection refused".into()),
            LlmError::Timeout,
        ];
        for err in &errors {
            let classified = classify_error(err);
            assert!(
                matches!(classified, BackendError::Fatal { .. }),
                "{err} -> {classified:?}"
            );
        }
    }

    #[test]
    fn typed_rate_limit_carries_server_hint() {
        match classify_error(&LlmError::RateLimited(
            "Rate limit reached for gpt-4.1. Please try again in 20s.".into(),
        )) {
            BackendError::RateLimited { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_secs(20)))
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
        match classify_error(&LlmError::RateLimited("try again in 250ms".into())) {
            BackendError::RateLimited { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_millis(250)))
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
        assert!(matches!(
            classify_error(&LlmError::RateLimited("slow down".into())),
            BackendError::RateLimited {
                retry_after: None,
                ..
            }
        ));
    }

    #[test]
    fn untyped_api_errors_fall_back_to_status() {
        match classify_error(&LlmError::ApiError("HTTP 503 Service Unavailable".into())) {
            BackendError::Server { status, .. } => assert_eq!(status, Some(503)),
            other => panic!("expected Server, got {other:?}"),
        }
        assert!(matches!(
            classify_error(&LlmError::ProviderError("Anthropic is overloaded".into())),
            BackendError::Server { status: None, .. }
        ));
        assert!(matches!(
            classify_error(&LlmError::ApiError("429 Too Many Requests".into())),
            BackendError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_error(&LlmError::ApiError(
                "400 Bad Request: invalid 'messages'".into()
            )),
            BackendError::Fatal { .. }
        ));
    }

    #[test]
    fn classify_message_everything_else_is_fatal() {
        for msg in [
            "401 Unauthorized: invalid api key",
            "400 Bad Request: context_length_exceeded",
            "failed to parse response body",
        ] {
            assert!(
                matches!(classify_message(msg), BackendError::Fatal { .. }),
                "{msg}"
            );
        }
    }
}
