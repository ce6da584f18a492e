pub mod noop;
pub mod ollama;
pub mod openai;
pub mod prompt_builder;
pub mod prompts;

use anyhow::Result;
use serde::Serialize;

/// Which tier of model a request wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModelClass {
    /// Fast, cheap model for per-chunk work.
    Small,
    /// Default model for the final answer.
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ResponseFormat {
    #[default]
    Text,
}

/// How important a definition is when the prompt is over budget.
/// `Flex` content is trimmed before anything marked `Keep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Priority {
    Flex,
    Keep,
}

/// A named block of text referenced by the instructions, e.g. `GIT_DIFF`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Definition {
    pub label: String,
    pub content: String,
    /// Fence language used when rendering.
    pub language: Option<String>,
    pub priority: Priority,
}

impl Definition {
    pub fn new(label: impl Into<String>, content: impl Into<String>) -> Self {
        Definition {
            label: label.into(),
            content: content.into(),
            language: None,
            priority: Priority::Keep,
        }
    }

    pub fn flex(mut self) -> Self {
        self.priority = Priority::Flex;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunOptions {
    pub format: ResponseFormat,
    pub model: ModelClass,
    /// Token budget for the whole rendered prompt.
    pub max_tokens: usize,
    pub cache: bool,
    pub content_safety: bool,
}

/// Everything a backend needs to run one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub system: Vec<String>,
    pub definitions: Vec<Definition>,
    pub instructions: String,
    pub options: RunOptions,
}

impl PromptRequest {
    #[cfg(test)]
    pub fn definition(&self, label: &str) -> Option<&Definition> {
        self.definitions.iter().find(|d| d.label == label)
    }
}

/// Trait for talking to an LLM.
pub trait LlmClient: Send + Sync {
    /// Run the prompt and return the model's text answer.
    fn complete(&self, request: &PromptRequest) -> Result<String>;

    /// Concrete model used for a class of request.
    fn model_name(&self, class: ModelClass) -> String;
}

/// Truncate long strings for debug logging.
pub(crate) fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut cut = max_len;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...\n[truncated {} chars]", &s[..cut], s.len() - cut)
}
