use super::prompt_builder;
use super::{truncate_for_log, LlmClient, ModelClass, PromptRequest};
use anyhow::{anyhow, Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client identification GitHub Models' Azure backend expects.
const GITHUB_MODELS_USER_AGENT: &str = "github-cli-models";

/// Used when a 429 carries no usable retry hint.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Minimal request/response structs for the Chat Completions API.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// Client for OpenAI and OpenAI-compatible endpoints (GitHub Models, Azure,
/// local gateways).
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    small_model: String,
    api_base_url: String,
    headers: HeaderMap,
}

impl OpenAiClient {
    pub fn new(
        api_key: String,
        model: String,
        small_model: String,
        api_base_url: String,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .context("failed to build HTTP client")?;

        Ok(OpenAiClient {
            client,
            api_key,
            model,
            small_model,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            headers: HeaderMap::new(),
        })
    }

    /// Send the user-agent headers GitHub Models uses to tell CLI traffic apart.
    pub fn with_github_models_headers(mut self) -> Self {
        let agent = HeaderValue::from_static(GITHUB_MODELS_USER_AGENT);
        self.headers.insert("x-ms-useragent", agent.clone());
        self.headers.insert("x-ms-user-agent", agent);
        self
    }

    fn chat_url(&self) -> String {
        chat_url(&self.api_base_url)
    }

    fn call_chat(&self, req: &ChatRequest) -> Result<String> {
        let url = self.chat_url();

        log::info!("Calling model {:?}", &req.model);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .headers(self.headers.clone())
            .json(req)
            .send()
            .with_context(|| format!("failed to send request to {url}"))?;

        if !resp.status().is_success() {
            return Err(http_error(resp));
        }

        let chat_resp: ChatResponse = resp.json().context("failed to parse chat completion response")?;
        let content = chat_resp
            .choices
            .first()
            .map(|c| c.message.content.clone().unwrap_or_default())
            .ok_or_else(|| anyhow!("no choices returned from {}", req.model))?;

        if let Some(usage) = &chat_resp.usage {
            log::info!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
        }

        Ok(content.trim().to_string())
    }
}

impl LlmClient for OpenAiClient {
    fn complete(&self, request: &PromptRequest) -> Result<String> {
        let prompts = prompt_builder::build(request);

        log::trace!(
            "Prompt for {:?} model:\n{}",
            request.options.model,
            truncate_for_log(&prompts.user, 3000)
        );

        let req = ChatRequest {
            model: self.model_name(request.options.model),
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: prompts.system,
                },
                ChatMessage {
                    role: "user".into(),
                    content: prompts.user,
                },
            ],
        };

        self.call_chat(&req)
    }

    fn model_name(&self, class: ModelClass) -> String {
        match class {
            ModelClass::Small => self.small_model.clone(),
            ModelClass::Large => self.model.clone(),
        }
    }
}

fn chat_url(base: &str) -> String {
    if base.ends_with("/v1") || base.ends_with("/inference") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    }
}

/// Turn a non-success response into a readable error.
fn http_error(resp: Response) -> anyhow::Error {
    let status = resp.status();
    let retry_after = retry_after(resp.headers());
    let text = resp.text().unwrap_or_default();
    let text = text.trim();

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let message = if text.is_empty() { "rate limit exceeded" } else { text };
            anyhow!(
                "rate limited: {} (retry after {}s)",
                message,
                retry_after.as_secs()
            )
        }
        StatusCode::UNAUTHORIZED => anyhow!("unauthorized: check your API key\n{text}"),
        _ => anyhow!("model API error: HTTP {} - {}", status.as_u16(), text),
    }
}

/// Retry hint from `x-ratelimit-timeremaining`, then `Retry-After`, both in seconds.
fn retry_after(headers: &HeaderMap) -> Duration {
    ["x-ratelimit-timeremaining", RETRY_AFTER.as_str()]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.trim().parse::<u64>().ok())
        .find(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}
