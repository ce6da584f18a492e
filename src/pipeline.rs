use anyhow::bail;
use indicatif::ProgressBar;
use thiserror::Error;

use crate::chunker::{self, Chunk, ChunkOptions};
use crate::git::VersionControl;
use crate::llm::{
    prompt_builder, prompts, Definition, LlmClient, ModelClass, PromptRequest, ResponseFormat,
    RunOptions,
};

pub const GIT_DIFF: &str = "GIT_DIFF";
pub const PREVIOUS_SUMMARIES: &str = "PREVIOUS_SUMMARIES";
pub const SUMMARY: &str = "SUMMARY";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("already on default branch ({branch}); check out the branch you want to describe")]
    AlreadyOnDefaultBranch { branch: String },

    /// `completed` summaries were produced before chunk `chunk` (1-based) failed.
    #[error("error summarizing chunk: {message}")]
    ChunkSummarization {
        chunk: usize,
        completed: usize,
        message: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Knobs for one run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Diff base; the repository's default branch when `None`.
    pub base: Option<String>,
    pub chunking: ChunkOptions,
    /// Token budget for every prompt, including the final one.
    pub max_tokens: usize,
    pub cache: bool,
    pub content_safety: bool,
}

impl PipelineSettings {
    /// Reject geometry where a full chunk would not reach the model intact.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.chunking.validate()?;
        if self.max_tokens == 0 {
            bail!("max tokens must be greater than zero");
        }

        let fixed = self.chunk_prompt_overhead();
        if self.chunking.chunk_size + fixed > self.max_tokens {
            bail!(
                "chunk size ({}) plus {} tokens of prompt text exceeds max tokens ({}); \
                 lower --chunk-size to at most {} or raise --max-tokens",
                self.chunking.chunk_size,
                fixed,
                self.max_tokens,
                self.max_tokens.saturating_sub(fixed)
            );
        }
        Ok(())
    }

    /// Tokens of a chunk prompt that are not the chunk itself, with the
    /// earlier summaries trimmed away.
    pub fn chunk_prompt_overhead(&self) -> usize {
        let request = chunk_request(String::new(), &[String::new()], self.options(ModelClass::Small));
        prompt_builder::fixed_token_count(&request)
    }

    fn options(&self, model: ModelClass) -> RunOptions {
        RunOptions {
            format: ResponseFormat::Text,
            model,
            max_tokens: self.max_tokens,
            cache: self.cache,
            content_safety: self.content_safety,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            base: None,
            chunking: ChunkOptions::default(),
            max_tokens: 7000,
            cache: true,
            content_safety: true,
        }
    }
}

/// Turns the branch diff into chunks, summarizes them in order and writes a
/// pull-request description from the summaries.
pub struct Pipeline<'a> {
    vcs: &'a dyn VersionControl,
    llm: &'a dyn LlmClient,
    settings: PipelineSettings,
    progress: ProgressBar,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        vcs: &'a dyn VersionControl,
        llm: &'a dyn LlmClient,
        settings: PipelineSettings,
    ) -> Self {
        Pipeline {
            vcs,
            llm,
            settings,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn run(&self) -> Result<String, PipelineError> {
        self.settings.validate()?;

        let base = match &self.settings.base {
            Some(base) => base.clone(),
            None => self.vcs.default_branch()?,
        };
        let branch = self.vcs.current_branch()?;
        if branch == base {
            return Err(PipelineError::AlreadyOnDefaultBranch { branch });
        }

        log::info!("Describing {branch} against {base}");

        let diff = self.vcs.diff(&base)?;
        if diff.trim().is_empty() {
            log::warn!("No changes between {base} and {branch}");
        }

        let chunks = chunker::chunk(&diff, self.settings.chunking)?;
        let summaries = self.summarize_chunks(&chunks)?;
        let summary = compose(&summaries);

        self.progress.set_message("writing description");
        let description = self
            .llm
            .complete(&self.description_request(summary))
            .map_err(PipelineError::Other)?;

        Ok(description)
    }

    /// Summarize chunks strictly in order, each one seeing every summary
    /// before it. Stops at the first failure.
    fn summarize_chunks(&self, chunks: &[Chunk]) -> Result<Vec<String>, PipelineError> {
        self.progress.set_length(chunks.len() as u64);

        chunks
            .iter()
            .try_fold(Vec::with_capacity(chunks.len()), |mut summaries, chunk| {
                self.progress
                    .set_message(format!("summarizing chunk {}/{}", chunk.index + 1, chunks.len()));

                log::trace!("Chunk {} covers diff bytes {:?}", chunk.index + 1, chunk.range);
                let request = chunk_request(
                    chunk.text.clone(),
                    &summaries,
                    self.settings.options(ModelClass::Small),
                );
                match self.llm.complete(&request) {
                    Ok(summary) => {
                        log::debug!("Chunk {} summary:\n{}", chunk.index + 1, summary);
                        summaries.push(summary);
                        self.progress.inc(1);
                        Ok(summaries)
                    }
                    Err(err) => Err(PipelineError::ChunkSummarization {
                        chunk: chunk.index + 1,
                        completed: summaries.len(),
                        message: format!("{err:#}"),
                    }),
                }
            })
    }

    fn description_request(&self, summary: String) -> PromptRequest {
        PromptRequest {
            system: vec![prompts::PR_AUTHOR.to_string()],
            definitions: vec![Definition::new(SUMMARY, summary)],
            instructions: prompts::PR_DESCRIPTION.to_string(),
            options: self.settings.options(ModelClass::Large),
        }
    }
}

fn chunk_request(diff: String, previous: &[String], options: RunOptions) -> PromptRequest {
    let mut definitions = Vec::with_capacity(2);
    let mut instructions = String::new();

    if !previous.is_empty() {
        definitions.push(Definition::new(PREVIOUS_SUMMARIES, compose(previous)).flex());
        instructions.push_str(prompts::PREVIOUS_CONTEXT);
        instructions.push_str("\n\n");
    }
    definitions.push(Definition::new(GIT_DIFF, diff).language("diff"));
    instructions.push_str(prompts::CHUNK_SUMMARY);

    PromptRequest {
        system: vec![prompts::CODE_REVIEWER.to_string()],
        definitions,
        instructions,
        options,
    }
}

/// Join summaries in order, one block each.
pub fn compose(summaries: &[String]) -> String {
    summaries.join("\n\n")
}
