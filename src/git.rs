use anyhow::{anyhow, bail, Context, Result};
use std::path::PathBuf;
use std::process::Command as GitCommand;

/// Branches tried, in order, when the remote does not advertise a HEAD.
const FALLBACK_DEFAULT_BRANCHES: [&str; 2] = ["main", "master"];

/// What the pipeline needs to know about the repository.
pub trait VersionControl {
    /// Name of the repository's default branch, as something `diff` accepts.
    fn default_branch(&self) -> Result<String>;

    /// Name of the checked-out branch.
    fn current_branch(&self) -> Result<String>;

    /// Full unified diff of the current branch against `base`.
    fn diff(&self, base: &str) -> Result<String>;
}

/// `VersionControl` backed by the `git` executable.
#[derive(Debug, Clone, Default)]
pub struct GitCli {
    /// Working directory for git; the process cwd when `None`.
    pub workdir: Option<PathBuf>,
    /// Path globs left out of the diff.
    pub exclude: Vec<String>,
}

impl GitCli {
    pub fn new(exclude: Vec<String>) -> Self {
        GitCli {
            workdir: None,
            exclude,
        }
    }

    /// Run a git command and capture stdout as String.
    fn output(&self, args: &[&str]) -> Result<String> {
        let mut cmd = GitCommand::new("git");
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }

        let output = cmd
            .args(args)
            .output()
            .with_context(|| format!("failed to run git {:?}", args))?;

        if !output.status.success() {
            return Err(anyhow!(
                "git {:?} exited with status {:?}: {}",
                args,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Run git only to learn whether it succeeds.
    fn succeeds(&self, args: &[&str]) -> bool {
        let mut cmd = GitCommand::new("git");
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }
        cmd.args(args)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn ref_exists(&self, reference: &str) -> bool {
        self.succeeds(&["show-ref", "--verify", "--quiet", reference])
    }

    /// `name` if it is a local branch, else `origin/name` if the remote
    /// tracks it. Fresh CI clones often only have the remote ref.
    fn diffable_branch(&self, name: &str) -> Option<String> {
        if self.ref_exists(&format!("refs/heads/{name}")) {
            return Some(name.to_string());
        }
        if self.ref_exists(&format!("refs/remotes/origin/{name}")) {
            return Some(format!("origin/{name}"));
        }
        None
    }
}

impl VersionControl for GitCli {
    fn default_branch(&self) -> Result<String> {
        if let Ok(head) = self.output(&["symbolic-ref", "--quiet", "refs/remotes/origin/HEAD"]) {
            if let Some(name) = remote_head_branch(&head) {
                if let Some(branch) = self.diffable_branch(&name) {
                    log::debug!("Default branch from origin/HEAD: {branch}");
                    return Ok(branch);
                }
            }
        }

        if let Ok(configured) = self.output(&["config", "--get", "init.defaultBranch"]) {
            let configured = configured.trim();
            if !configured.is_empty() {
                if let Some(branch) = self.diffable_branch(configured) {
                    log::debug!("Default branch from init.defaultBranch: {branch}");
                    return Ok(branch);
                }
            }
        }

        for candidate in FALLBACK_DEFAULT_BRANCHES {
            if let Some(branch) = self.diffable_branch(candidate) {
                log::debug!("Default branch by convention: {branch}");
                return Ok(branch);
            }
        }

        bail!("could not determine the default branch; pass --base explicitly")
    }

    fn current_branch(&self) -> Result<String> {
        let name = self
            .output(&["rev-parse", "--abbrev-ref", "HEAD"])?
            .trim()
            .to_string();
        Ok(name)
    }

    fn diff(&self, base: &str) -> Result<String> {
        let range = format!("{base}...HEAD");
        let excludes = exclude_pathspecs(&self.exclude);

        let mut args = vec!["diff", "--no-color", "--no-ext-diff", range.as_str()];
        if !excludes.is_empty() {
            args.push("--");
            args.push(":/");
            args.extend(excludes.iter().map(String::as_str));
        }

        let diff = self
            .output(&args)
            .with_context(|| format!("failed to diff against {base}"))?;
        Ok(diff)
    }
}

/// Turn `refs/remotes/origin/main` into `main`.
fn remote_head_branch(symbolic_ref: &str) -> Option<String> {
    let name = symbolic_ref
        .trim()
        .strip_prefix("refs/remotes/")?
        .split_once('/')?
        .1;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn exclude_pathspecs(patterns: &[String]) -> Vec<String> {
    patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| format!(":(top,exclude,glob)**/{p}"))
        .collect()
}
