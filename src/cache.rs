use anyhow::{anyhow, Context, Result};
use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::llm::prompt_builder;
use crate::llm::{LlmClient, ModelClass, PromptRequest};

const CACHE_FILE_NAME: &str = "responses.json";
const CACHE_LIMIT: usize = 256;

#[derive(Default, Serialize, Deserialize)]
struct CacheFile {
    entries: Vec<CacheEntry>,
}

#[derive(Serialize, Deserialize, Clone)]
struct CacheEntry {
    key: String,
    model: String,
    response: String,
}

/// Model responses keyed by prompt content, persisted as JSON.
pub struct ResponseCache {
    file_path: PathBuf,
    file: CacheFile,
}

impl ResponseCache {
    /// `<user cache dir>/prscribe/responses.json`
    pub fn default_path() -> Option<PathBuf> {
        Some(dirs::cache_dir()?.join("prscribe").join(CACHE_FILE_NAME))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str::<CacheFile>(&contents)
                .with_context(|| format!("invalid cache file {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => CacheFile::default(),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        Ok(Self {
            file_path: path.to_path_buf(),
            file,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.file
            .entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.response.as_str())
    }

    pub fn insert(&mut self, key: String, model: String, response: String) {
        self.file.entries.retain(|entry| entry.key != key);
        self.file.entries.push(CacheEntry {
            key,
            model,
            response,
        });

        if self.file.entries.len() > CACHE_LIMIT {
            let overflow = self.file.entries.len() - CACHE_LIMIT;
            self.file.entries.drain(0..overflow);
        }
    }

    pub fn len(&self) -> usize {
        self.file.entries.len()
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(&self.file).context("failed to encode cache")?;
        fs::write(&self.file_path, data)
            .with_context(|| format!("failed to write {}", self.file_path.display()))?;
        Ok(())
    }

    /// Delete the cache file at `path`; a missing file is not an error.
    pub fn clear(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
        }
    }

    /// Hash of everything that decides the model's answer: the concrete
    /// model, the run options and the messages exactly as they will be sent.
    pub fn compute_key(model: &str, request: &PromptRequest) -> String {
        let prompts = prompt_builder::build(request);
        let options = serde_json::to_string(&request.options).unwrap_or_default();

        let mut hasher = Hasher::new();
        for part in [model, options.as_str(), prompts.system.as_str(), prompts.user.as_str()] {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Wraps another client and answers repeated prompts from the cache.
pub struct CachingClient {
    inner: Box<dyn LlmClient>,
    cache: Mutex<ResponseCache>,
}

impl CachingClient {
    pub fn new(inner: Box<dyn LlmClient>, cache: ResponseCache) -> Self {
        CachingClient {
            inner,
            cache: Mutex::new(cache),
        }
    }
}

impl LlmClient for CachingClient {
    fn complete(&self, request: &PromptRequest) -> Result<String> {
        if !request.options.cache {
            return self.inner.complete(request);
        }

        let model = self.inner.model_name(request.options.model);
        let key = ResponseCache::compute_key(&model, request);

        {
            let cache = self
                .cache
                .lock()
                .map_err(|_| anyhow!("response cache lock poisoned"))?;
            if let Some(hit) = cache.get(&key) {
                log::info!("Using cached response for {model}");
                return Ok(hit.to_string());
            }
        }

        let response = self.inner.complete(request)?;

        let mut cache = self
            .cache
            .lock()
            .map_err(|_| anyhow!("response cache lock poisoned"))?;
        cache.insert(key, model, response.clone());
        if let Err(err) = cache.save() {
            log::warn!("Could not persist response cache: {err:#}");
        }

        Ok(response)
    }

    fn model_name(&self, class: ModelClass) -> String {
        self.inner.model_name(class)
    }
}
