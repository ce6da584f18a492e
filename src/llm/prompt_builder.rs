use std::cmp::Reverse;

use crate::llm::{prompts, Definition, PromptRequest};
use crate::tokens;

const TRUNCATED_NOTE: &str = "[... truncated to fit the token budget]";

pub struct PromptPair {
    pub system: String,
    pub user: String,
}

impl PromptPair {
    pub fn token_count(&self) -> usize {
        tokens::count(&self.system) + tokens::count(&self.user)
    }
}

/// A definition as it will be rendered, possibly cut short.
struct Slot<'a> {
    def: &'a Definition,
    content: &'a str,
    truncated: bool,
}

/// Render a request into system/user messages that fit its token budget.
///
/// Only definition contents are ever trimmed. The lowest priority goes first
/// and, within one priority, later definitions before earlier ones. Contents
/// lose their tail. If the fixed text alone is over budget the prompt is
/// returned as-is.
pub fn build(request: &PromptRequest) -> PromptPair {
    let system = system_prompt(request);
    let budget = request.options.max_tokens;
    let mut slots: Vec<Slot> = request
        .definitions
        .iter()
        .map(|def| Slot {
            def,
            content: def.content.as_str(),
            truncated: false,
        })
        .collect();

    loop {
        let pair = PromptPair {
            system: system.clone(),
            user: render_user(&slots, &request.instructions),
        };

        let used = pair.token_count();
        if used <= budget {
            return pair;
        }

        let Some(victim) = next_victim(&slots) else {
            log::warn!("Prompt needs {used} tokens but the budget is {budget}; nothing left to trim");
            return pair;
        };

        let slot = &mut slots[victim];
        let keep = tokens::count(slot.content).saturating_sub(used - budget);
        slot.content = tokens::truncate(slot.content, keep);
        slot.truncated = true;

        log::debug!(
            "Trimmed {} to {} tokens to fit a {} token budget",
            slot.def.label,
            keep,
            budget
        );
    }
}

/// Tokens a request costs with every definition trimmed to nothing.
/// A definition of `n` tokens fits untrimmed when `n + fixed_token_count`
/// stays within the budget, whatever the other definitions hold.
pub fn fixed_token_count(request: &PromptRequest) -> usize {
    let slots: Vec<Slot> = request
        .definitions
        .iter()
        .map(|def| Slot {
            def,
            content: "",
            truncated: true,
        })
        .collect();
    tokens::count(&system_prompt(request)) + tokens::count(&render_user(&slots, &request.instructions))
}

fn next_victim(slots: &[Slot]) -> Option<usize> {
    slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| !slot.content.is_empty())
        .min_by_key(|(idx, slot)| (slot.def.priority, Reverse(*idx)))
        .map(|(idx, _)| idx)
}

fn system_prompt(request: &PromptRequest) -> String {
    let mut parts: Vec<&str> = request.system.iter().map(String::as_str).collect();
    if request.options.content_safety {
        parts.push(prompts::SAFETY);
    }
    parts.join("\n\n")
}

fn render_user(slots: &[Slot], instructions: &str) -> String {
    let mut user = String::new();
    for slot in slots {
        user.push_str(&slot.def.label);
        user.push_str(":\n```");
        user.push_str(slot.def.language.as_deref().unwrap_or(""));
        user.push('\n');
        user.push_str(slot.content);
        if slot.truncated {
            if !slot.content.is_empty() && !slot.content.ends_with('\n') {
                user.push('\n');
            }
            user.push_str(TRUNCATED_NOTE);
        }
        if !user.ends_with('\n') {
            user.push('\n');
        }
        user.push_str("```\n\n");
    }
    user.push_str(instructions);
    user
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ModelClass, ResponseFormat, RunOptions};

    fn request(keep: &str, flex: &str, max_tokens: usize, content_safety: bool) -> PromptRequest {
        PromptRequest {
            system: vec!["You review code.".to_string()],
            definitions: vec![
                Definition::new("PREVIOUS_SUMMARIES", flex).flex(),
                Definition::new("GIT_DIFF", keep).language("diff"),
            ],
            instructions: "Summarize GIT_DIFF.".to_string(),
            options: RunOptions {
                format: ResponseFormat::Text,
                model: ModelClass::Small,
                max_tokens,
                cache: false,
                content_safety,
            },
        }
    }

    #[test]
    fn renders_untouched_when_within_budget() {
        let pair = build(&request("+fn added() {}", "earlier work", 10_000, false));
        assert_eq!(pair.system, "You review code.");
        assert!(pair.user.contains("GIT_DIFF:\n```diff\n+fn added() {}\n```\n"));
        assert!(pair.user.contains("PREVIOUS_SUMMARIES:\n```\nearlier work\n```\n"));
        assert!(pair.user.ends_with("Summarize GIT_DIFF."));
        assert!(!pair.user.contains(TRUNCATED_NOTE));
    }

    #[test]
    fn flex_content_is_trimmed_first() {
        let keep = "word ".repeat(200);
        let flex = "ctx ".repeat(200);
        let full = build(&request(&keep, &flex, usize::MAX, false)).token_count();

        let budget = full - 50;
        let pair = build(&request(&keep, &flex, budget, false));

        assert!(pair.token_count() <= budget);
        assert!(pair.user.contains(&keep));
        assert!(!pair.user.contains(&flex));
        assert!(pair.user.contains(TRUNCATED_NOTE));
    }

    #[test]
    fn keep_content_is_trimmed_once_flex_is_gone() {
        let keep = "word ".repeat(200);
        let flex = "ctx ".repeat(200);
        let skeleton = build(&request("", "", usize::MAX, false)).token_count();

        let budget = skeleton + 80;
        let pair = build(&request(&keep, &flex, budget, false));

        assert!(pair.token_count() <= budget);
        assert!(!pair.user.contains("ctx"));
        assert!(pair.user.contains("word"));
        assert!(!pair.user.contains(&keep));
    }

    #[test]
    fn keep_content_within_the_fixed_allowance_is_never_trimmed() {
        let keep = "+line ".repeat(150);
        let flex = "ctx ".repeat(400);
        let shape = request(&keep, &flex, usize::MAX, true);
        let budget = tokens::count(&keep) + fixed_token_count(&shape);

        let pair = build(&request(&keep, &flex, budget, true));

        assert!(pair.token_count() <= budget);
        assert!(pair.user.contains(&keep));
    }

    #[test]
    fn content_safety_adds_a_system_message() {
        let pair = build(&request("x", "", 10_000, true));
        assert!(pair.system.starts_with("You review code.\n\n"));
        assert!(pair.system.ends_with(prompts::SAFETY));
    }
}
