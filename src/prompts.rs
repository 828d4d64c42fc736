//! Role and task instructions for the two chatbot stages.
//!
//! Every prompt lives here so prompt wording can change without touching
//! retry or orchestration logic, and so tests can inspect exactly what the
//! model will be sent.
//!
//! The task templates quote a "first N characters" budget for the paper
//! text. Whether that budget is actually applied is decided by
//! [`PaperTextPolicy`]: by default the full text is substituted and the note
//! in the template is informational only.

/// Placeholder replaced with the paper text.
pub const PAPER_TEXT_PLACEHOLDER: &str = "{paper_text}";

/// Placeholder replaced with the stage-1 output.
pub const EXTRACTION_PLACEHOLDER: &str = "{initial_extraction}";

/// Placeholder replaced with the character budget.
pub const CHAR_LIMIT_PLACEHOLDER: &str = "{char_limit}";

/// Persona for the extraction stage.
pub const EXTRACTOR_ROLE: &str = "You are an AI assistant specialized in extracting key structured information from academic research papers. Focus on accuracy and conciseness.";

/// Persona for the synthesis/critique stage.
pub const SYNTHESIZER_ROLE: &str = "You are an AI assistant skilled at critically evaluating and synthesizing research paper summaries. Your goal is to produce a final, balanced digest (around 150-250 words) that incorporates the key findings and offers a brief critical perspective.";

/// Stage-1 task. Placeholders: `{paper_text}`, `{char_limit}`.
pub const EXTRACTION_TASK_TEMPLATE: &str = r#"Carefully read the following research paper text. Extract the following sections clearly and concisely:
1. **Core Problem:** What specific problem or question does the paper address?
2. **Proposed Method/Solution:** Briefly describe the key technique, model, or approach proposed.
3. **Key Results:** What were the main quantitative or qualitative findings? Mention key metrics if possible.
4. **Main Conclusion:** What is the primary takeaway or claim of the paper?
5. **Mentioned Limitations:** List any limitations, weaknesses, or future work mentioned by the authors.

Research Paper Text:
---
{paper_text}
---
[Note: Only the first {char_limit} characters of the paper text are provided above due to potential length constraints. Base your extraction on this initial part if the full text is too long for a single prompt.]

Provide the output clearly structured under the headings above."#;

/// Stage-2 task. Placeholders: `{initial_extraction}`, `{paper_text}`.
pub const SYNTHESIS_TASK_TEMPLATE: &str = r#"You have been provided with an initial extraction from a research paper. Review this extraction in the context of the full paper text (provided again below for reference).

Your Tasks:
1. **Synthesize:** Combine the extracted points into a coherent narrative digest summarizing the paper's core contribution.
2. **Critique:** Briefly assess the significance of the findings. Are the limitations acknowledged appropriately? Does the method seem sound based on the description? (Be objective).
3. **Format:** Produce a single block of text representing the final digest.

Initial Extraction:
---
{initial_extraction}
---

Full Paper Text (for context - may be truncated):
---
{paper_text}
---
[Note: Full paper text context provided again, potentially truncated.]

Generate the final synthesized and critiqued digest."#;

/// A (role, task) instruction pair for one chatbot call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    /// System message: persona and context.
    pub role: String,
    /// User message: the concrete instruction.
    pub task: String,
}

impl PromptPair {
    pub fn new(role: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            task: task.into(),
        }
    }
}

/// How much paper text is substituted into a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaperTextPolicy {
    /// Budget quoted in the template note.
    pub char_limit: usize,
    /// Whether the budget is enforced.
    pub truncate: bool,
}

impl PaperTextPolicy {
    /// The slice of `text` that goes into the prompt.
    pub fn apply<'a>(&self, text: &'a str) -> &'a str {
        if self.truncate {
            first_chars(text, self.char_limit)
        } else {
            text
        }
    }
}

/// First `n` characters of `s`, never splitting a UTF-8 sequence.
pub fn first_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Build the stage-1 prompt pair.
pub fn extraction_prompt(paper_text: &str, policy: PaperTextPolicy) -> PromptPair {
    // Substitute the paper text last so placeholder-looking strings inside
    // the paper are never expanded.
    let task = EXTRACTION_TASK_TEMPLATE
        .replace(CHAR_LIMIT_PLACEHOLDER, &policy.char_limit.to_string())
        .replace(PAPER_TEXT_PLACEHOLDER, policy.apply(paper_text));
    PromptPair::new(EXTRACTOR_ROLE, task)
}

/// Build the stage-2 prompt pair.
pub fn synthesis_prompt(
    initial_extraction: &str,
    paper_text: &str,
    policy: PaperTextPolicy,
) -> PromptPair {
    let (head, tail) = SYNTHESIS_TASK_TEMPLATE
        .split_once(PAPER_TEXT_PLACEHOLDER)
        .unwrap_or((SYNTHESIS_TASK_TEMPLATE, ""));
    let mut task = String::with_capacity(
        SYNTHESIS_TASK_TEMPLATE.len() + initial_extraction.len() + paper_text.len(),
    );
    task.push_str(&head.replace(EXTRACTION_PLACEHOLDER, initial_extraction));
    task.push_str(policy.apply(paper_text));
    task.push_str(tail);
    PromptPair::new(SYNTHESIZER_ROLE, task)
}
