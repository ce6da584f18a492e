use clap::{ArgAction, ArgGroup, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Which model API to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    /// OpenAI or any OpenAI-compatible endpoint
    #[value(name = "openai")]
    OpenAi,
    /// GitHub Models inference (authenticates with GITHUB_TOKEN)
    #[value(name = "github")]
    GitHubModels,
    /// A local Ollama server
    Ollama,
}

/// CLI options
#[derive(Parser, Debug)]
#[command(
    name = "prscribe",
    version,
    about = "LLM-assisted pull request description generator"
)]
#[command(group(
    ArgGroup::new("model_group")
        .args(["model", "no_model"])
        .multiple(false)
))]
pub struct Cli {
    /// Branch to diff against (defaults to the repository's default branch)
    #[arg(long)]
    pub base: Option<String>,

    /// Model for the final description (e.g. gpt-4o). If 'none', acts like --no-model.
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Faster model used to summarize each diff chunk
    #[arg(long, global = true)]
    pub small_model: Option<String>,

    /// Disable model calls; return dummy responses instead
    #[arg(long, global = true)]
    pub no_model: bool,

    /// Model API to use
    #[arg(long, value_enum, global = true)]
    pub provider: Option<Provider>,

    /// Base URL of the model API (e.g. https://models.github.ai/inference)
    #[arg(long, global = true)]
    pub api_base_url: Option<String>,

    /// API key (otherwise OPENAI_API_KEY, or GITHUB_TOKEN with --provider github)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Maximum tokens per diff chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Tokens shared by consecutive chunks
    #[arg(long)]
    pub chunk_overlap: Option<usize>,

    /// Token budget for each prompt
    #[arg(long)]
    pub max_tokens: Option<usize>,

    /// Always call the model, ignoring and not updating the response cache
    #[arg(long)]
    pub no_cache: bool,

    /// Leave out the safety system prompt
    #[arg(long)]
    pub no_content_safety: bool,

    /// Also write the description to this file
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Increase log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands, e.g. `prscribe cache clear`
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect or clear the model response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum CacheAction {
    /// Print where cached responses are stored
    Path,
    /// Delete all cached responses
    Clear,
}
