use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{prompt_builder, truncate_for_log, LlmClient, ModelClass, PromptRequest};

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Synchronous Ollama client using /api/chat.
pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
    small_model: String,
}

impl OllamaClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        small_model: impl Into<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            small_model: small_model.into(),
        })
    }

    fn chat(&self, model: String, system_prompt: String, user_prompt: String) -> Result<String> {
        log::info!("Calling Ollama model {model:?}");
        let url = format!("{}/api/chat", self.base_url);
        let body = encode_chat_request(model, system_prompt, user_prompt)?;
        log::trace!("POST {url}: {}", truncate_for_log(&body, 3000));

        let resp_text = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.text())
            .with_context(|| format!("Ollama request to {url} failed"))?;

        log::trace!("Ollama response: {}", truncate_for_log(&resp_text, 3000));

        let parsed = parse_chat_response(&resp_text)?;
        if let (Some(prompt), Some(completion)) = (parsed.prompt_eval_count, parsed.eval_count) {
            log::info!("Token usage: prompt={prompt}, completion={completion}");
        }

        Ok(parsed.message.content.trim().to_string())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    stream: bool,
    messages: Vec<OllamaMessage>,
}

/// Non-streaming `/api/chat` body with one system and one user message.
fn encode_chat_request(model: String, system: String, user: String) -> Result<String> {
    let request = ChatRequest {
        model,
        stream: false,
        messages: vec![
            OllamaMessage {
                role: "system".into(),
                content: system,
            },
            OllamaMessage {
                role: "user".into(),
                content: user,
            },
        ],
    };
    serde_json::to_string(&request).context("cannot encode Ollama request")
}

fn parse_chat_response(body: &str) -> Result<OllamaChatResponse> {
    serde_json::from_str(body).context("cannot decode Ollama response")
}

impl LlmClient for OllamaClient {
    fn complete(&self, request: &PromptRequest) -> Result<String> {
        let prompts = prompt_builder::build(request);
        self.chat(
            self.model_name(request.options.model),
            prompts.system,
            prompts.user,
        )
    }

    fn model_name(&self, class: ModelClass) -> String {
        match class {
            ModelClass::Small => self.small_model.clone(),
            ModelClass::Large => self.model.clone(),
        }
    }
}
