//! CLI binary for edgequake-digest.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `DigestConfig`, prints the two stage outputs and turns
//! pipeline failures into exit codes.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_digest::{
    api_key_env_for, digest, digest_to_file, BackoffStrategy, DigestConfig, DigestError,
    DigestFailure, DigestProgressCallback, DigestWarning, LlmSettings, ProgressCallback, Stage,
    DEFAULT_MODEL, DEFAULT_PROVIDER,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI observer: spinner on stderr, stage outputs on stdout ─────────────────

/// Prints the extractor and synthesizer outputs as they arrive and, when
/// enabled, drives a spinner naming the active stage.
struct CliObserver {
    bar: Option<ProgressBar>,
    /// False in `--json` mode, where only the final JSON goes to stdout.
    print_blocks: bool,
}

impl CliObserver {
    fn new(show_progress: bool, print_blocks: bool) -> Arc<Self> {
        let bar = show_progress.then(|| {
            let bar = ProgressBar::new_spinner();
            let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
            bar.set_style(style);
            bar.set_prefix("Preparing");
            bar.set_message("Opening PDF…");
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        Arc::new(Self { bar, print_blocks })
    }

    /// Status line on stderr; only shown alongside the spinner; without it
    /// the tracing output already carries the same information.
    fn note(&self, line: String) {
        if let Some(ref bar) = self.bar {
            bar.println(line);
        }
    }

    /// Write to stdout without tearing the spinner.
    fn emit(&self, block: &str) {
        if !self.print_blocks {
            return;
        }
        match self.bar {
            Some(ref bar) => bar.suspend(|| println!("{block}")),
            None => println!("{block}"),
        }
    }

    fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

impl DigestProgressCallback for CliObserver {
    fn on_stage_start(&self, stage: Stage) {
        if let Some(ref bar) = self.bar {
            let (prefix, msg) = match stage {
                Stage::TextExtraction => ("Extracting", "reading PDF text…"),
                Stage::Extractor => ("Extractor", "pulling structured facts…"),
                Stage::Synthesizer => ("Synthesizer", "writing the digest…"),
            };
            bar.set_prefix(prefix);
            bar.set_message(msg);
        }
    }

    fn on_text_extracted(&self, chars: usize, pages: usize) {
        self.note(format!(
            "{} Extracted {} from {} pages",
            green("✓"),
            bold(&format!("{chars} chars")),
            pages
        ));
    }

    fn on_warning(&self, warning: &DigestWarning) {
        self.note(format!("{} {}", cyan("⚠"), warning));
    }

    fn on_attempt(&self, stage: Stage, attempt: u32, max_attempts: u32) {
        if let Some(ref bar) = self.bar {
            bar.set_message(format!("{stage}: calling LLM (attempt {attempt}/{max_attempts})…"));
        }
    }

    fn on_retry(&self, stage: Stage, attempt: u32, delay: Duration, reason: &str) {
        self.note(format!(
            "  {} {stage} attempt {attempt} failed: {}  {}",
            cyan("↻"),
            reason,
            dim(&format!("retrying in {:.1}s", delay.as_secs_f64())),
        ));
    }

    fn on_call_failed(&self, stage: Stage, reason: &str) {
        self.note(format!("  {} {stage}: {}", red("✗"), red(reason)));
    }

    fn on_extraction_complete(&self, extraction: &str) {
        self.emit(&format!("\n--- Extractor Bot Output ---\n{extraction}"));
    }

    fn on_digest_complete(&self, digest: &str) {
        self.finish();
        self.emit(&format!("\n--- Final Synthesized Digest ---\n{digest}"));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Digest a local paper (OPENAI_API_KEY from the environment or .env)
  paper-digest paper.pdf

  # Digest an arXiv paper straight from its URL
  paper-digest https://arxiv.org/pdf/1706.03762

  # Another provider and model
  paper-digest --provider anthropic --model claude-sonnet-4-20250514 paper.pdf

  # Local model, no API key needed
  paper-digest --provider ollama --model llama3.2 paper.pdf

  # Really send only the first 8000 characters
  paper-digest --truncate-input paper.pdf

  # Write the digest to a file, JSON with stats on stdout
  paper-digest --json -o digest.txt paper.pdf > run.json

EXIT CODES:
  0  digest produced
  1  configuration, I/O or other error
  2  invalid command-line usage
  3  text could not be extracted from the PDF
  4  API key missing for the selected provider
  5  extractor LLM call failed
  6  synthesizer LLM call failed (extractor output already printed;
     with --json the failure report carries it)

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (default provider)
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  MISTRAL_API_KEY         Mistral API key
  OPENROUTER_API_KEY      OpenRouter API key
  XAI_API_KEY             xAI (Grok) API key
  HF_TOKEN                HuggingFace access token
  EDGEQUAKE_PROVIDER      Provider (openai, anthropic, gemini, mistral, ollama, lmstudio)
  EDGEQUAKE_MODEL         Model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Override the log filter

A .env file in the working directory is loaded before anything else.
"#;

/// Digest and critique a research paper PDF with two LLM calls.
#[derive(Parser, Debug)]
#[command(
    name = "paper-digest",
    version,
    about = "Digest and critique a research paper PDF with two LLM calls",
    long_about = "Extract the text of a research paper (local PDF or URL), ask an extractor \
model for the core problem, method, results, conclusion and limitations, then ask a \
synthesizer model to turn that extraction into a short critiqued digest.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Also write the final digest to this file.
    #[arg(short, long, env = "PAPER_DIGEST_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID shared by both stages.
    #[arg(long, env = "EDGEQUAKE_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// LLM provider: openai, anthropic, gemini, mistral, ollama, lmstudio.
    #[arg(long, env = "EDGEQUAKE_PROVIDER", default_value = DEFAULT_PROVIDER)]
    provider: String,

    /// API key; defaults to the provider's own variable (OPENAI_API_KEY, …).
    #[arg(long)]
    api_key: Option<String>,

    /// Temperature of the extraction call (0.0–1.0).
    #[arg(long, env = "PAPER_DIGEST_EXTRACTOR_TEMPERATURE", default_value_t = 0.3)]
    extractor_temperature: f32,

    /// Temperature of the synthesis call (0.0–1.0).
    #[arg(long, env = "PAPER_DIGEST_SYNTHESIZER_TEMPERATURE", default_value_t = 0.6)]
    synthesizer_temperature: f32,

    /// Attempts per LLM call, including the first.
    #[arg(long, env = "PAPER_DIGEST_MAX_ATTEMPTS", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..=10))]
    max_attempts: u32,

    /// Seconds to wait before retrying a rate-limited or failed call.
    #[arg(long, env = "PAPER_DIGEST_RETRY_DELAY", default_value_t = 5)]
    retry_delay: u64,

    /// Double the retry delay after each failed attempt.
    #[arg(long)]
    exponential_backoff: bool,

    /// Send only the first --prompt-char-limit characters of the paper.
    #[arg(long, env = "PAPER_DIGEST_TRUNCATE_INPUT")]
    truncate_input: bool,

    /// Character budget quoted in the prompts (and enforced with --truncate-input).
    #[arg(long, env = "PAPER_DIGEST_PROMPT_CHAR_LIMIT", default_value_t = 8000)]
    prompt_char_limit: usize,

    /// Max LLM output tokens per call.
    #[arg(long, env = "PAPER_DIGEST_MAX_TOKENS")]
    max_tokens: Option<usize>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PAPER_DIGEST_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Path to libpdfium (file or directory).
    #[arg(long)]
    pdfium_lib: Option<PathBuf>,

    /// Output structured JSON (DigestOutput) instead of the text blocks.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "PAPER_DIGEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all diagnostics except errors.
    #[arg(short, long)]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PAPER_DIGEST_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "PAPER_DIGEST_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,
}

fn main() {
    // Load .env before parsing so clap's env fallbacks see it.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner reports stage progress itself; only errors are logged
    // underneath it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let api_key = resolve_api_key(&cli.provider, cli.api_key.as_deref());

    let result = tokio::runtime::Runtime::new()
        .context("Failed to create tokio runtime")
        .and_then(|rt| rt.block_on(run(&cli, api_key, show_progress)));

    if let Err(err) = result {
        let code = err
            .downcast_ref::<DigestError>()
            .map_or(1, DigestError::exit_code);
        eprintln!("{} {:#}", red("Error:"), err);
        std::process::exit(code);
    }
}

async fn run(cli: &Cli, api_key: Option<String>, show_progress: bool) -> Result<()> {
    let observer = CliObserver::new(show_progress, !cli.json);
    let config = build_config(
        cli,
        api_key,
        Arc::clone(&observer) as ProgressCallback,
    )?;

    let result = match cli.output {
        Some(ref path) => digest_to_file(&cli.input, path, &config).await,
        None => digest(&cli.input, &config).await,
    };
    observer.finish();

    let output = match result {
        Ok(output) => output,
        Err(err) => {
            if cli.json {
                // The extractor block was suppressed; the report carries it.
                let json = serde_json::to_string_pretty(&DigestFailure::from(&err))
                    .context("Failed to serialise failure report")?;
                println!("{json}");
            } else if matches!(err, DigestError::SynthesizerStageFailed { .. }) {
                println!("\n--- Final Digest: FAILED ---");
            }
            return Err(err.into());
        }
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    }

    if !cli.quiet {
        let stats = &output.stats;
        let target = cli
            .output
            .as_ref()
            .map(|p| format!("  →  {}", bold(&p.display().to_string())))
            .unwrap_or_default();
        eprintln!(
            "{}  {} pages, {} chars  {}ms{}",
            green("✔"),
            stats.page_count,
            stats.document_chars,
            stats.total_duration_ms,
            target,
        );
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
        );
    }

    Ok(())
}

/// The key from `--api-key`, else from the provider's environment variable.
/// This is the only place the environment is read for credentials.
fn resolve_api_key(provider: &str, flag: Option<&str>) -> Option<String> {
    let env_var = api_key_env_for(provider)?;
    match flag.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => Some(key.to_string()),
        None => std::env::var(env_var).ok(),
    }
}

/// Map CLI args to `DigestConfig`.
fn build_config(
    cli: &Cli,
    api_key: Option<String>,
    progress: ProgressCallback,
) -> Result<DigestConfig> {
    let mut llm = LlmSettings::new(&cli.provider, &cli.model);
    if let Some(key) = api_key {
        llm = llm.with_api_key(key);
    }

    let delay = Duration::from_secs(cli.retry_delay);
    let backoff = if cli.exponential_backoff {
        BackoffStrategy::Exponential(delay)
    } else {
        BackoffStrategy::Fixed(delay)
    };

    let mut builder = DigestConfig::builder()
        .llm(llm)
        .extractor_temperature(cli.extractor_temperature)
        .synthesizer_temperature(cli.synthesizer_temperature)
        .max_attempts(cli.max_attempts)
        .backoff(backoff)
        .truncate_input(cli.truncate_input)
        .prompt_char_limit(cli.prompt_char_limit)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .progress_callback(progress);

    if let Some(n) = cli.max_tokens {
        builder = builder.max_tokens(n);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }

    // Returned as-is so an invalid value still maps to its exit code.
    Ok(builder.build()?)
}
