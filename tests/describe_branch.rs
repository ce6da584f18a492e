use assert_cmd::cargo;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Run git in `dir` with an isolated identity, failing the test on error.
fn git(dir: &Path, home: &Path, args: &[&str]) {
    let status = Command::new("git")
        .current_dir(dir)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(args)
        .status()
        .expect("git should be installed");
    assert!(status.success(), "git {args:?} failed");
}

/// A repository with one commit on `main`.
fn repo() -> (TempDir, TempDir) {
    let repo = tempfile::tempdir().unwrap();
    let home = tempfile::tempdir().unwrap();
    git(repo.path(), home.path(), &["init", "-q", "-b", "main"]);
    fs::write(repo.path().join("main.go"), "package main\n\nfunc main() {}\n").unwrap();
    git(repo.path(), home.path(), &["add", "-A"]);
    git(repo.path(), home.path(), &["commit", "-q", "-m", "initial"]);
    (repo, home)
}

fn prscribe(repo: &Path, home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo::cargo_bin_cmd!();
    cmd.current_dir(repo)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("XDG_CACHE_HOME", home.join(".cache"))
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env_remove("OPENAI_API_KEY")
        .env_remove("GITHUB_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn feature_branch(repo: &Path, home: &Path) {
    git(repo, home, &["checkout", "-q", "-b", "feature/greeting"]);
    fs::write(
        repo.join("main.go"),
        "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(\"hello\")\n}\n",
    )
    .unwrap();
    git(repo, home, &["commit", "-q", "-am", "print a greeting"]);
}

#[test]
fn aborts_on_the_default_branch() {
    let (repo, home) = repo();

    prscribe(repo.path(), home.path())
        .arg("--no-model")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already on default branch"));
}

#[test]
fn describes_a_feature_branch_without_a_model() {
    let (repo, home) = repo();
    feature_branch(repo.path(), home.path());

    prscribe(repo.path(), home.path())
        .args(["--no-model", "--no-cache"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dummy response from none"))
        .stdout(predicate::str::contains("- SUMMARY:"));
}

#[test]
fn writes_description_to_output_file() {
    let (repo, home) = repo();
    feature_branch(repo.path(), home.path());
    let out = home.path().join("pr.md");

    prscribe(repo.path(), home.path())
        .args(["--no-model", "--base", "main", "--output"])
        .arg(&out)
        .assert()
        .success();

    let written = fs::read_to_string(&out).unwrap();
    assert!(written.starts_with("Dummy response from none"));
}

#[test]
fn requires_an_api_key_for_openai() {
    let (repo, home) = repo();
    feature_branch(repo.path(), home.path());

    prscribe(repo.path(), home.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}

#[test]
fn prints_the_cache_location() {
    let (repo, home) = repo();

    prscribe(repo.path(), home.path())
        .args(["cache", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("prscribe"))
        .stdout(predicate::str::contains("0 cached responses"));
}

#[test]
fn prints_the_cache_location_even_when_the_cache_is_corrupt() {
    let (repo, home) = repo();
    let cache_dir = home.path().join(".cache").join("prscribe");
    fs::create_dir_all(&cache_dir).unwrap();
    fs::write(cache_dir.join("responses.json"), "{ not json").unwrap();

    prscribe(repo.path(), home.path())
        .args(["cache", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("responses.json"))
        .stderr(predicate::str::contains("unreadable"));
}

#[test]
fn describes_the_branch_from_a_subdirectory() {
    let (repo, home) = repo();
    feature_branch(repo.path(), home.path());
    let sub = repo.path().join("docs");
    fs::create_dir_all(&sub).unwrap();

    prscribe(&sub, home.path())
        .args(["--no-model", "--no-cache", "-v"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No changes").not());
}
