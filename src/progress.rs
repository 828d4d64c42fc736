//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn DigestProgressCallback>`] via
//! [`crate::config::DigestConfigBuilder::progress_callback`] to observe a run:
//! stage transitions, every LLM attempt and retry, the advisory warnings,
//! and the two stage outputs in the order they are produced.
//!
//! The callback is passed down to the extractor and to each chatbot rather
//! than installed globally, so two runs in the same process (or two tests)
//! never see each other's events. Diagnostics still go to `tracing` as well;
//! the callback is for hosts that want to react, not just log.
//!
//! # Example
//!
//! ```rust
//! use edgequake_digest::{DigestConfig, DigestProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl DigestProgressCallback for Printer {
//!     fn on_extraction_complete(&self, extraction: &str) {
//!         println!("--- Extractor Bot Output ---\n{extraction}");
//!     }
//! }
//!
//! let config = DigestConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn DigestProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::DigestWarning;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The three steps of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// PDF → normalised text.
    TextExtraction,
    /// Extractor-role LLM call.
    Extractor,
    /// Synthesizer/critic-role LLM call.
    Synthesizer,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::TextExtraction => "text extraction",
            Stage::Extractor => "extractor",
            Stage::Synthesizer => "synthesizer",
        })
    }
}

/// Called by the pipeline as it runs.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. The pipeline is sequential, so events for one run
/// arrive in order on a single task.
pub trait DigestProgressCallback: Send + Sync {
    /// A stage is about to start.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Text extraction produced `chars` characters from `pages` pages.
    fn on_text_extracted(&self, chars: usize, pages: usize) {
        let _ = (chars, pages);
    }

    /// An advisory condition was detected; the run continues.
    fn on_warning(&self, warning: &DigestWarning) {
        let _ = warning;
    }

    /// An LLM request is about to be sent.
    ///
    /// # Arguments
    /// * `attempt`      — 1-based attempt number
    /// * `max_attempts` — attempt budget for this call
    fn on_attempt(&self, stage: Stage, attempt: u32, max_attempts: u32) {
        let _ = (stage, attempt, max_attempts);
    }

    /// A transient failure will be retried after `delay`.
    fn on_retry(&self, stage: Stage, attempt: u32, delay: Duration, reason: &str) {
        let _ = (stage, attempt, delay, reason);
    }

    /// A chatbot call ended without a completion.
    fn on_call_failed(&self, stage: Stage, reason: &str) {
        let _ = (stage, reason);
    }

    /// Stage 1 finished. Fired before the synthesizer runs.
    fn on_extraction_complete(&self, extraction: &str) {
        let _ = extraction;
    }

    /// Stage 2 finished; the digest is final.
    fn on_digest_complete(&self, digest: &str) {
        let _ = digest;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl DigestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DigestConfig`].
pub type ProgressCallback = Arc<dyn DigestProgressCallback>;

/// The configured callback, or a no-op one.
pub(crate) fn callback_or_noop(cb: Option<&ProgressCallback>) -> ProgressCallback {
    cb.cloned()
        .unwrap_or_else(|| Arc::new(NoopProgressCallback) as ProgressCallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct AttemptCounter {
        attempts: AtomicU32,
        retries: AtomicU32,
    }

    impl DigestProgressCallback for AttemptCounter {
        fn on_attempt(&self, _stage: Stage, _attempt: u32, _max: u32) {
            self.attempts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_retry(&self, _stage: Stage, _attempt: u32, _delay: Duration, _reason: &str) {
            self.retries.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::TextExtraction);
        cb.on_text_extracted(1200, 3);
        cb.on_attempt(Stage::Extractor, 1, 3);
        cb.on_retry(Stage::Extractor, 1, Duration::from_secs(5), "429");
        cb.on_call_failed(Stage::Synthesizer, "boom");
        cb.on_extraction_complete("facts");
        cb.on_digest_complete("digest");
    }

    #[test]
    fn overridden_methods_receive_events() {
        let counter = AttemptCounter {
            attempts: AtomicU32::new(0),
            retries: AtomicU32::new(0),
        };
        counter.on_attempt(Stage::Extractor, 1, 3);
        counter.on_retry(Stage::Extractor, 1, Duration::ZERO, "rate limited");
        counter.on_attempt(Stage::Extractor, 2, 3);

        assert_eq!(counter.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(counter.retries.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_or_noop_falls_back() {
        let cb = callback_or_noop(None);
        cb.on_stage_start(Stage::Synthesizer);
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::Extractor.to_string(), "extractor");
        assert_eq!(Stage::TextExtraction.to_string(), "text extraction");
    }
}
