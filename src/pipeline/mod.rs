//! Pipeline stages for paper digestion.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ llm (extractor) ──▶ llm (synthesizer)
//! (URL/path)  (pdfium)     temperature 0.3       temperature 0.6
//! ```
//!
//! 1. [`input`]   — canonicalise the user-supplied path or URL to a local file
//! 2. [`extract`] — per-page text, concatenated and whitespace-normalised;
//!    runs in `spawn_blocking` because pdfium is not async-safe
//! 3. [`llm`]     — one chat completion per stage with bounded retry; the
//!    only stage with provider network I/O

pub mod extract;
pub mod input;
pub mod llm;
