use anyhow::Result;

use super::{LlmClient, ModelClass, PromptRequest};
use crate::tokens;

/// No-op / dummy model client for development with --no-model or model=none.
pub struct NoopClient;

impl LlmClient for NoopClient {
    fn complete(&self, request: &PromptRequest) -> Result<String> {
        let mut msg = format!(
            "Dummy response from {} (LLM disabled)\n",
            self.model_name(request.options.model)
        );
        for def in &request.definitions {
            msg.push_str(&format!(
                "- {}: {} tokens\n",
                def.label,
                tokens::count(&def.content)
            ));
        }
        Ok(msg)
    }

    fn model_name(&self, class: ModelClass) -> String {
        match class {
            ModelClass::Small => "none-small".to_string(),
            ModelClass::Large => "none".to_string(),
        }
    }
}
