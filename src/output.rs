//! Result types produced by a digestion run.

use crate::error::DigestError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestOutput {
    /// Stage-1 output: the labelled facts pulled from the paper.
    pub extraction: String,
    /// Stage-2 output: the synthesized and critiqued digest.
    pub digest: String,
    /// Advisory conditions detected on the extracted text.
    pub warnings: Vec<DigestWarning>,
    pub stats: DigestStats,
}

/// Counters and timings for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DigestStats {
    /// Pages reported by the PDF backend.
    pub page_count: usize,
    /// Characters of normalised paper text.
    pub document_chars: usize,
    /// Characters of paper text actually placed in each prompt.
    pub prompt_text_chars: usize,
    pub extractor_attempts: u32,
    pub synthesizer_attempts: u32,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub extraction_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// What a failed run still has to report, for `--json` consumers.
///
/// A synthesis failure keeps the stage-1 extraction; every other failure
/// leaves `extraction` empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DigestFailure {
    pub error: String,
    pub exit_code: i32,
    pub extraction: Option<String>,
    pub digest: Option<String>,
}

impl From<&DigestError> for DigestFailure {
    fn from(err: &DigestError) -> Self {
        Self {
            error: err.to_string(),
            exit_code: err.exit_code(),
            extraction: err.extraction().map(str::to_string),
            digest: None,
        }
    }
}

/// Non-fatal findings about the extracted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DigestWarning {
    /// Very little text: the PDF may be scanned images.
    TextTooShort { chars: usize, threshold: usize },
    /// A lot of text: the prompt may exceed the model's context window.
    /// Nothing is truncated because of this.
    TextTooLong { chars: usize, threshold: usize },
}

impl fmt::Display for DigestWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestWarning::TextTooShort { chars, .. } => write!(
                f,
                "Extracted text is very short ({chars} chars). Was the PDF text-based? Check extraction quality."
            ),
            DigestWarning::TextTooLong { chars, .. } => write!(
                f,
                "Extracted text is long ({chars} chars). This might exceed LLM context limits or be slow/expensive."
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesis_failure_report_keeps_extraction() {
        let err = DigestError::SynthesizerStageFailed {
            attempts: 3,
            extraction: "1. Core Problem: X".into(),
        };
        let report = DigestFailure::from(&err);
        assert_eq!(report.exit_code, 6);
        assert_eq!(report.extraction.as_deref(), Some("1. Core Problem: X"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["extraction"], "1. Core Problem: X");
        assert!(json["digest"].is_null());
        assert!(json["error"].as_str().unwrap().contains("Synthesizer"));
    }

    #[test]
    fn other_failures_report_no_extraction() {
        let report = DigestFailure::from(&DigestError::ExtractorStageFailed { attempts: 3 });
        assert_eq!(report.exit_code, 5);
        assert_eq!(report.extraction, None);
    }

    #[test]
    fn warning_display_mentions_length() {
        let w = DigestWarning::TextTooLong {
            chars: 60_000,
            threshold: 50_000,
        };
        assert!(w.to_string().contains("60000 chars"));
    }

    #[test]
    fn output_serialises_to_json() {
        let out = DigestOutput {
            extraction: "1. Core Problem: X".into(),
            digest: "A paper about X.".into(),
            warnings: vec![DigestWarning::TextTooShort {
                chars: 31,
                threshold: 500,
            }],
            stats: DigestStats {
                page_count: 3,
                document_chars: 31,
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&out).expect("serialisable");
        assert_eq!(json["stats"]["page_count"], 3);
        assert_eq!(json["warnings"][0]["TextTooShort"]["chars"], 31);
    }
}
