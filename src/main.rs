mod cache;
mod chunker;
mod cli_args;
mod config;
mod git;
mod llm;
mod logging;
mod pipeline;
mod setup;
mod tokens;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fs;
use std::io::{self, IsTerminal};
use std::time::Duration;

use crate::cache::ResponseCache;
use crate::cli_args::{CacheAction, Cli, Command};
use crate::config::Config;
use crate::git::GitCli;
use crate::pipeline::{Pipeline, PipelineError};

/// Handle `prscribe cache ...`.
fn run_cache(action: CacheAction) -> Result<()> {
    let path = ResponseCache::default_path()
        .ok_or_else(|| anyhow!("no cache directory available on this system"))?;

    match action {
        CacheAction::Path => match ResponseCache::load(&path) {
            Ok(cache) => println!("{} ({} cached responses)", path.display(), cache.len()),
            Err(err) => {
                println!("{}", path.display());
                log::warn!("Cache file is unreadable: {err:#}");
            }
        },
        CacheAction::Clear => {
            ResponseCache::clear(&path)?;
            println!("Cleared {}", path.display());
        }
    }
    Ok(())
}

fn progress_bar() -> Result<ProgressBar> {
    if !io::stderr().is_terminal() {
        return Ok(ProgressBar::hidden());
    }

    let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
    bar.set_style(ProgressStyle::with_template(
        "{spinner:.cyan} [{bar:20.cyan/blue}] {pos}/{len} {msg} ({elapsed})",
    )?);
    bar.enable_steady_tick(Duration::from_millis(100));
    Ok(bar)
}

/// Describe the current branch and print the result.
fn run_describe(cli: &Cli) -> Result<()> {
    let cfg = Config::from_sources(cli)?;
    let llm = setup::build_llm_client(&cfg)?;
    let git = GitCli::new(cfg.exclude.clone());

    let progress = progress_bar()?;
    let result = Pipeline::new(&git, llm.as_ref(), cfg.pipeline_settings(cli.base.clone()))
        .with_progress(progress.clone())
        .run();
    progress.finish_and_clear();

    if let Err(PipelineError::ChunkSummarization {
        chunk, completed, ..
    }) = &result
    {
        log::warn!("Stopped at chunk {chunk}; discarding {completed} earlier chunk summaries");
    }
    let description = result?;

    if let Some(path) = &cli.output {
        fs::write(path, &description)
            .with_context(|| format!("failed to write description to {}", path.display()))?;
        log::info!("Wrote description to {}", path.display());
    }

    if io::stdout().is_terminal() {
        println!();
        println!("----- PR Description Preview -----");
        println!("{description}");
        println!("----------------------------------");
    } else {
        println!("{description}");
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose);

    match &cli.command {
        Some(Command::Cache { action }) => run_cache(*action),
        None => run_describe(&cli),
    }
}
