//! Prompt assembly and answer post-processing.

use tracing::debug;

use crate::types::PromptRequest;

/// Instruction header for requirements-document answering.
pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant specialized in analyzing software requirements documents.

RULES:
- Answer ONLY the question below using the provided context
- If not related to the requirements document, say: \"I don't know. This question is not related to the requirements document.\"
- Cite requirement IDs when available
- Do NOT generate follow-up questions";

/// Shown in place of context blocks when retrieval found nothing.
pub const NO_CONTEXT_NOTE: &str = "No relevant context was found in the documents.";

/// Shown when passages were retrieved but none fit the input budget.
pub const CONTEXT_TRUNCATED_NOTE: &str =
    "Relevant passages were found but exceeded the input limit and were left out.";

/// Text models tend to continue with new questions or separators after the answer.
const STOP_PATTERNS: &[&str] = &["\n\nQuestion:", "\nQuestion:", "\n\nProvide", "------"];

/// A retrieved passage to show the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextPassage {
    pub text: String,
    pub source: String,
    pub page: Option<u32>,
}

/// Render the prompt for `question` with `passages` in retrieval order.
///
/// While the full prompt is longer than `max_input_chars`, passages are dropped from the end.
/// The question is never shortened, so a very long question may still exceed the budget.
pub fn build_prompt(question: &str, passages: &[ContextPassage], max_input_chars: usize) -> PromptRequest {
    let question = question.trim();
    let mut kept = passages.len();
    loop {
        let request = PromptRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: render_user(question, &passages[..kept], passages.len()),
            context_used: kept,
        };
        if kept == 0 || request.completion_text().chars().count() <= max_input_chars {
            if kept < passages.len() {
                debug!(
                    "Prompt budget {} chars: kept {} of {} passages",
                    max_input_chars,
                    kept,
                    passages.len()
                );
            }
            return request;
        }
        kept -= 1;
    }
}

fn render_user(question: &str, passages: &[ContextPassage], retrieved: usize) -> String {
    let context = if retrieved == 0 {
        NO_CONTEXT_NOTE.to_string()
    } else if passages.is_empty() {
        CONTEXT_TRUNCATED_NOTE.to_string()
    } else {
        passages
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let location = match p.page {
                    Some(page) => format!("{}, page {}", p.source, page),
                    None => p.source.clone(),
                };
                format!("[{}] (source: {})\n{}", i + 1, location, p.text.trim())
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    };
    format!("Context:\n{}\n\nQuestion: {}\n\nAnswer:", context, question)
}

/// Cut the raw model output at the first stop pattern and trim it.
pub fn post_process(raw: &str) -> String {
    let mut answer = raw;
    for pattern in STOP_PATTERNS {
        if let Some(pos) = answer.find(pattern) {
            answer = &answer[..pos];
        }
    }
    answer.trim().to_string()
}
