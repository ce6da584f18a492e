use crate::chunker::ChunkOptions;
use crate::cli_args::{Cli, Provider};
use crate::pipeline::PipelineSettings;
use anyhow::{anyhow, bail, Context, Result};
use clap::ValueEnum;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;

const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_SMALL_MODEL: &str = "gpt-4o-mini";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
const DEFAULT_GITHUB_MODELS_URL: &str = "https://models.github.ai/inference";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_MAX_TOKENS: usize = 7000;
const DEFAULT_EXCLUDES: [&str; 4] = ["*.lock", "package-lock.json", "pnpm-lock.yaml", "yarn.lock"];

/// Final resolved configuration for prscribe.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: Provider,
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub model: String,
    pub small_model: String,
    /// Use the dummy client instead of a real model.
    pub no_model: bool,
    pub chunking: ChunkOptions,
    pub max_tokens: usize,
    pub cache: bool,
    pub content_safety: bool,
    /// Path globs left out of the diff.
    pub exclude: Vec<String>,
}

impl Config {
    /// Build the final config from CLI flags, environment, TOML file, and defaults.
    ///
    /// Precedence:
    ///   1. CLI flags (`--model`, `--chunk-size`, ...)
    ///   2. Env vars `PRSCRIBE_*` (and `OPENAI_API_KEY` / `GITHUB_TOKEN`)
    ///   3. TOML `~/.config/prscribe.toml`
    ///   4. Hardcoded defaults
    pub fn from_sources(cli: &Cli) -> Result<Self> {
        let file_cfg = load_file_config()?.unwrap_or_default();
        Self::resolve(cli, file_cfg, |key| env::var(key).ok())
    }

    fn resolve(cli: &Cli, file_cfg: FileConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let provider = match cli.provider {
            Some(p) => p,
            None => match env("PRSCRIBE_PROVIDER").or(file_cfg.provider) {
                Some(name) => <Provider as ValueEnum>::from_str(&name, true)
                    .map_err(|_| anyhow!("unknown provider {name:?} (expected openai, github or ollama)"))?,
                None => Provider::OpenAi,
            },
        };

        let model = cli
            .model
            .clone()
            .or_else(|| env("PRSCRIBE_MODEL"))
            .or(file_cfg.model)
            .unwrap_or_else(|| default_model(provider, DEFAULT_MODEL));

        let small_model = cli
            .small_model
            .clone()
            .or_else(|| env("PRSCRIBE_SMALL_MODEL"))
            .or(file_cfg.small_model)
            .unwrap_or_else(|| model_or_default_small(provider, &model));

        let api_base_url = cli
            .api_base_url
            .clone()
            .or_else(|| env("PRSCRIBE_API_BASE_URL"))
            .or(file_cfg.api_base_url)
            .unwrap_or_else(|| match provider {
                Provider::OpenAi => DEFAULT_OPENAI_URL.to_string(),
                Provider::GitHubModels => DEFAULT_GITHUB_MODELS_URL.to_string(),
                Provider::Ollama => DEFAULT_OLLAMA_URL.to_string(),
            });

        let api_key = cli
            .api_key
            .clone()
            .or_else(|| provider.key_env().and_then(&env))
            .or(file_cfg.api_key)
            .filter(|k| !k.trim().is_empty());

        let chunking = ChunkOptions {
            chunk_size: pick_number(
                cli.chunk_size,
                &env,
                "PRSCRIBE_CHUNK_SIZE",
                file_cfg.chunk_size,
                ChunkOptions::DEFAULT_CHUNK_SIZE,
            )?,
            chunk_overlap: pick_number(
                cli.chunk_overlap,
                &env,
                "PRSCRIBE_CHUNK_OVERLAP",
                file_cfg.chunk_overlap,
                ChunkOptions::DEFAULT_CHUNK_OVERLAP,
            )?,
        };
        let max_tokens = pick_number(
            cli.max_tokens,
            &env,
            "PRSCRIBE_MAX_TOKENS",
            file_cfg.max_tokens,
            DEFAULT_MAX_TOKENS,
        )?;

        let no_model = cli.no_model || model.eq_ignore_ascii_case("none");
        if let (Some(key_env), None) = (provider.key_env(), &api_key) {
            if !no_model {
                bail!("{key_env} (or --api-key) is required unless --no-model or model=none is used");
            }
        }

        let cfg = Config {
            provider,
            api_key,
            api_base_url,
            model,
            small_model,
            no_model,
            chunking,
            max_tokens,
            cache: !cli.no_cache && file_cfg.cache.unwrap_or(true),
            content_safety: !cli.no_content_safety && file_cfg.content_safety.unwrap_or(true),
            exclude: file_cfg
                .exclude
                .unwrap_or_else(|| DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect()),
        };
        cfg.pipeline_settings(None).validate()?;
        Ok(cfg)
    }

    pub fn pipeline_settings(&self, base: Option<String>) -> PipelineSettings {
        PipelineSettings {
            base,
            chunking: self.chunking,
            max_tokens: self.max_tokens,
            cache: self.cache,
            content_safety: self.content_safety,
        }
    }
}

impl Provider {
    /// Env var holding the API key, for providers that need one.
    pub fn key_env(self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::GitHubModels => Some("GITHUB_TOKEN"),
            Provider::Ollama => None,
        }
    }
}

/// GitHub Models names models by publisher, e.g. `openai/gpt-4o`.
fn default_model(provider: Provider, name: &str) -> String {
    match provider {
        Provider::GitHubModels => format!("openai/{name}"),
        _ => name.to_string(),
    }
}

/// With a custom large model and no small model, use the large one for both.
fn model_or_default_small(provider: Provider, model: &str) -> String {
    if model == default_model(provider, DEFAULT_MODEL) {
        default_model(provider, DEFAULT_SMALL_MODEL)
    } else {
        model.to_string()
    }
}

fn pick_number(
    cli: Option<usize>,
    env: &impl Fn(&str) -> Option<String>,
    env_key: &str,
    file: Option<usize>,
    default: usize,
) -> Result<usize> {
    if let Some(v) = cli {
        return Ok(v);
    }
    if let Some(raw) = env(env_key) {
        return raw
            .trim()
            .parse::<usize>()
            .with_context(|| format!("{env_key} must be a whole number, got {raw:?}"));
    }
    Ok(file.unwrap_or(default))
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    pub provider: Option<String>,
    /// Default model to use when not provided via CLI or env.
    pub model: Option<String>,
    pub small_model: Option<String>,
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub max_tokens: Option<usize>,
    pub cache: Option<bool>,
    pub content_safety: Option<bool>,
    pub exclude: Option<Vec<String>>,
}

/// Return `~/.config/prscribe.toml`
fn config_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(home.join(".config").join("prscribe.toml"))
}

fn load_file_config() -> Result<Option<FileConfig>> {
    let Some(path) = config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }

    let data = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let cfg = toml::from_str::<FileConfig>(&data)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(Some(cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["prscribe"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn uses_defaults() {
        let cfg = Config::resolve(&cli(&["--api-key", "sk-test"]), FileConfig::default(), env_of(&[]))
            .unwrap();
        assert_eq!(cfg.provider, Provider::OpenAi);
        assert_eq!(cfg.model, "gpt-4o");
        assert_eq!(cfg.small_model, "gpt-4o-mini");
        assert_eq!(cfg.api_base_url, "https://api.openai.com");
        assert_eq!(cfg.chunking, ChunkOptions::default());
        assert_eq!(cfg.max_tokens, 7000);
        assert!(cfg.cache && cfg.content_safety && !cfg.no_model);
        assert!(cfg.exclude.iter().any(|p| p == "*.lock"));
    }

    #[test]
    fn cli_beats_env_beats_file() {
        let file_cfg: FileConfig = toml::from_str(
            r#"
            model = "file-model"
            chunk_size = 500
            chunk_overlap = 20
            max_tokens = 3000
            exclude = ["vendor/*"]
            cache = false
            "#,
        )
        .unwrap();
        let env = env_of(&[("PRSCRIBE_MODEL", "env-model"), ("PRSCRIBE_CHUNK_SIZE", "800")]);

        let cfg = Config::resolve(
            &cli(&["--api-key", "sk-test", "--max-tokens", "4000"]),
            file_cfg,
            env,
        )
        .unwrap();

        assert_eq!(cfg.model, "env-model");
        assert_eq!(cfg.small_model, "env-model");
        assert_eq!(cfg.chunking.chunk_size, 800);
        assert_eq!(cfg.chunking.chunk_overlap, 20);
        assert_eq!(cfg.max_tokens, 4000);
        assert_eq!(cfg.exclude, vec!["vendor/*".to_string()]);
        assert!(!cfg.cache);
    }

    #[test]
    fn model_none_means_no_model_and_needs_no_key() {
        let cfg = Config::resolve(&cli(&["--model", "none"]), FileConfig::default(), env_of(&[]))
            .unwrap();
        assert!(cfg.no_model);
    }

    #[test]
    fn ollama_defaults_to_local_server() {
        let cfg = Config::resolve(
            &cli(&["--provider", "ollama", "--model", "llama3.1"]),
            FileConfig::default(),
            env_of(&[]),
        )
        .unwrap();
        assert_eq!(cfg.api_base_url, "http://localhost:11434");
        assert_eq!(cfg.small_model, "llama3.1");
    }

    #[test]
    fn rejects_bad_numbers_and_geometry() {
        let env = env_of(&[("PRSCRIBE_CHUNK_SIZE", "lots")]);
        assert!(Config::resolve(&cli(&["--no-model"]), FileConfig::default(), env).is_err());

        let bad_overlap = cli(&["--no-model", "--chunk-size", "100", "--chunk-overlap", "100"]);
        assert!(Config::resolve(&bad_overlap, FileConfig::default(), env_of(&[])).is_err());
    }

    #[test]
    fn github_models_uses_its_endpoint_and_token() {
        let env = env_of(&[("GITHUB_TOKEN", "ghp-test"), ("OPENAI_API_KEY", "sk-other")]);
        let cfg = Config::resolve(&cli(&["--provider", "github"]), FileConfig::default(), env).unwrap();
        assert_eq!(cfg.provider, Provider::GitHubModels);
        assert_eq!(cfg.api_base_url, "https://models.github.ai/inference");
        assert_eq!(cfg.api_key.as_deref(), Some("ghp-test"));
        assert_eq!(cfg.model, "openai/gpt-4o");
        assert_eq!(cfg.small_model, "openai/gpt-4o-mini");

        let env = env_of(&[("OPENAI_API_KEY", "sk-other")]);
        let err = Config::resolve(&cli(&["--provider", "github"]), FileConfig::default(), env)
            .unwrap_err();
        assert!(err.to_string().contains("GITHUB_TOKEN"));
    }

    #[test]
    fn rejects_chunks_that_do_not_fit_the_prompt_budget() {
        let too_big = cli(&["--no-model", "--chunk-size", "7000"]);
        let err = Config::resolve(&too_big, FileConfig::default(), env_of(&[])).unwrap_err();
        assert!(err.to_string().contains("max tokens"));

        let fits = cli(&["--no-model", "--chunk-size", "3000", "--max-tokens", "4000"]);
        assert!(Config::resolve(&fits, FileConfig::default(), env_of(&[])).is_ok());
    }

    #[test]
    fn rejects_unknown_provider() {
        let env = env_of(&[("PRSCRIBE_PROVIDER", "carrier-pigeon")]);
        assert!(Config::resolve(&cli(&["--no-model"]), FileConfig::default(), env).is_err());
    }
}
