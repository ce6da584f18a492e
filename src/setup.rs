use anyhow::{anyhow, Result};
use log::{debug, warn};

use crate::cache::{CachingClient, ResponseCache};
use crate::cli_args::Provider;
use crate::config::Config;
use crate::llm::noop::NoopClient;
use crate::llm::ollama::OllamaClient;
use crate::llm::openai::OpenAiClient;
use crate::llm::LlmClient;

/// Build the LLM client based on CLI + config.
pub fn build_llm_client(cfg: &Config) -> Result<Box<dyn LlmClient>> {
    let client: Box<dyn LlmClient> = if cfg.no_model {
        debug!("Using NoopClient (no model calls).");
        Box::new(NoopClient)
    } else {
        match cfg.provider {
            Provider::OpenAi | Provider::GitHubModels => {
                let key = cfg.api_key.clone().ok_or_else(|| {
                    anyhow!(
                        "{} (or --api-key) is required for this provider",
                        cfg.provider.key_env().unwrap_or("an API key")
                    )
                })?;
                debug!(
                    "Using OpenAiClient ({:?}) at {} with models {} / {}",
                    cfg.provider, cfg.api_base_url, cfg.model, cfg.small_model
                );
                let client = OpenAiClient::new(
                    key,
                    cfg.model.clone(),
                    cfg.small_model.clone(),
                    cfg.api_base_url.clone(),
                )?;
                if cfg.provider == Provider::GitHubModels {
                    Box::new(client.with_github_models_headers())
                } else {
                    Box::new(client)
                }
            }
            Provider::Ollama => {
                debug!(
                    "Using OllamaClient at {} with models {} / {}",
                    cfg.api_base_url, cfg.model, cfg.small_model
                );
                Box::new(OllamaClient::new(
                    cfg.api_base_url.clone(),
                    cfg.model.clone(),
                    cfg.small_model.clone(),
                )?)
            }
        }
    };

    if !cfg.cache || cfg.no_model {
        return Ok(client);
    }

    let Some(path) = ResponseCache::default_path() else {
        warn!("No cache directory available; responses will not be cached");
        return Ok(client);
    };

    match ResponseCache::load(&path) {
        Ok(cache) => {
            debug!("Response cache at {}", path.display());
            Ok(Box::new(CachingClient::new(client, cache)))
        }
        Err(err) => {
            warn!("Ignoring response cache: {err:#}");
            Ok(client)
        }
    }
}
