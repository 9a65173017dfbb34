//! Concurrent git query execution
//!
//! A batch of named git commands is spawned at once; each command is bounded by
//! its own timeout so the batch takes as long as its slowest member. The caller
//! bounds the batch as a whole. A failing command only marks its own entry.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinSet;

use super::parse;
use super::snapshot::{CommitInfo, StatusSnapshot};
use crate::error::{HookgateError, Result};

pub const BRANCH: &str = "branch";
pub const PORCELAIN: &str = "porcelain";
pub const STAGED: &str = "staged";
pub const MODIFIED: &str = "modified";
pub const UNTRACKED: &str = "untracked";
pub const LAST_COMMIT: &str = "last_commit";
pub const AHEAD: &str = "ahead";

/// Outcome of a single git command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RawResult {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: None,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// `rev-parse` failed because HEAD points at a branch with no commits
    pub fn is_unborn_head(&self) -> bool {
        !self.success
            && (self.stderr.contains("ambiguous argument 'HEAD'")
                || self.stderr.contains("unknown revision"))
    }

    fn first_error_line(&self) -> String {
        self.stderr
            .lines()
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .unwrap_or("command failed")
            .to_string()
    }
}

/// A named git invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitQuery {
    pub name: String,
    pub args: Vec<String>,
}

impl GitQuery {
    pub fn new(name: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }
}

/// Runs one git command; the seam between the executor and the OS
#[async_trait]
pub trait GitRunner: Send + Sync {
    async fn run(&self, repo: &Path, args: &[String]) -> RawResult;
}

/// Runs the `git` executable found on PATH
#[derive(Debug, Clone)]
pub struct SystemGit {
    program: PathBuf,
}

impl SystemGit {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SystemGit {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitRunner for SystemGit {
    async fn run(&self, repo: &Path, args: &[String]) -> RawResult {
        // kill_on_drop: a timed-out future takes the child process down with it
        let output = Command::new(&self.program)
            .args(args)
            .current_dir(repo)
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(output) => RawResult {
                success: output.status.success(),
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            Err(e) => RawResult::failed(format!("failed to spawn {}: {e}", self.program.display())),
        }
    }
}

pub struct GitQueryExecutor {
    runner: Arc<dyn GitRunner>,
    repo: PathBuf,
    command_timeout: Duration,
}

impl GitQueryExecutor {
    pub fn new(runner: Arc<dyn GitRunner>, repo: impl Into<PathBuf>, command_timeout: Duration) -> Self {
        Self {
            runner,
            repo: repo.into(),
            command_timeout,
        }
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    /// Run every query concurrently, each under the per-command timeout
    pub async fn execute(&self, queries: Vec<GitQuery>) -> HashMap<String, RawResult> {
        let names: Vec<String> = queries.iter().map(|q| q.name.clone()).collect();
        let mut tasks = JoinSet::new();

        for query in queries {
            let runner = Arc::clone(&self.runner);
            let repo = self.repo.clone();
            let limit = self.command_timeout;
            tasks.spawn(async move {
                let result = match tokio::time::timeout(limit, runner.run(&repo, &query.args)).await {
                    Ok(result) => result,
                    Err(_) => RawResult::failed(format!("timed out after {}s", limit.as_secs_f64())),
                };
                (query.name, result)
            });
        }

        let mut results = HashMap::with_capacity(names.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, result)) => {
                    if !result.success {
                        tracing::debug!(query = %name, stderr = %result.stderr.trim(), "git query failed");
                    }
                    results.insert(name, result);
                }
                Err(e) => tracing::warn!(error = %e, "git query task did not complete"),
            }
        }

        // A task that panicked or was aborted leaves a hole; report it as a failure
        for name in names {
            results
                .entry(name)
                .or_insert_with(|| RawResult::failed("query task did not complete"));
        }

        results
    }

    /// Run the standard status batch and assemble a snapshot
    ///
    /// On an unborn branch `rev-parse` cannot resolve HEAD, so the branch name
    /// is read from the symbolic ref instead.
    pub async fn fetch_status(&self) -> Result<StatusSnapshot> {
        let mut results = self.execute(status_queries()).await;
        if results.get(BRANCH).is_some_and(RawResult::is_unborn_head) {
            tracing::debug!("HEAD has no commits, reading branch from symbolic ref");
            let fallback = self.execute(vec![unborn_branch_query()]).await;
            results.extend(fallback);
        }
        assemble_snapshot(&results)
    }

    /// `rev-list --count <range>`, uncached
    pub async fn count_commits(&self, range: &str) -> Result<u64> {
        let query = GitQuery::new("count", &["rev-list", "--count", range]);
        let mut results = self.execute(vec![query]).await;
        let result = results.remove("count").unwrap_or_default();
        if !result.success {
            return Err(HookgateError::CommandFailure {
                command: format!("rev-list --count {range}"),
                message: result.first_error_line(),
            });
        }
        parse::count(&result.stdout).ok_or_else(|| HookgateError::CommandFailure {
            command: format!("rev-list --count {range}"),
            message: format!("unexpected output: {}", result.stdout.trim()),
        })
    }
}

/// The batch behind a status refresh
pub fn status_queries() -> Vec<GitQuery> {
    vec![
        GitQuery::new(BRANCH, &["rev-parse", "--abbrev-ref", "HEAD"]),
        GitQuery::new(PORCELAIN, &["status", "--porcelain"]),
        GitQuery::new(STAGED, &["diff", "--cached", "--name-only"]),
        GitQuery::new(MODIFIED, &["diff", "--name-only"]),
        GitQuery::new(UNTRACKED, &["ls-files", "--others", "--exclude-standard"]),
        GitQuery::new(
            LAST_COMMIT,
            &["log", "-1", "--pretty=format:%H|%s|%an|%ad", "--date=iso"],
        ),
        GitQuery::new(AHEAD, &["rev-list", "--count", "@{upstream}..HEAD"]),
    ]
}

/// Branch name of an unborn HEAD, answered under the branch key
pub fn unborn_branch_query() -> GitQuery {
    GitQuery::new(BRANCH, &["symbolic-ref", "--short", "HEAD"])
}

/// Build a snapshot from a finished batch
///
/// The branch query is fatal: without it the refresh fails. Any other failed
/// query leaves its field empty and is listed in `degraded`. The upstream count
/// is optional and simply stays `None` when it cannot be computed.
pub fn assemble_snapshot(results: &HashMap<String, RawResult>) -> Result<StatusSnapshot> {
    let branch_result = results
        .get(BRANCH)
        .ok_or_else(|| HookgateError::refresh("branch query missing from batch"))?;
    if !branch_result.success {
        return Err(HookgateError::refresh(format!(
            "git {BRANCH} query failed: {}",
            branch_result.first_error_line()
        )));
    }
    let branch = parse::branch(&branch_result.stdout)
        .ok_or_else(|| HookgateError::refresh("empty branch name"))?;

    let mut snapshot = StatusSnapshot::new(branch);

    let mut list = |name: &str| -> Vec<String> {
        match results.get(name) {
            Some(result) if result.success => parse::file_list(&result.stdout),
            _ => {
                snapshot.degraded.push(name.to_string());
                Vec::new()
            }
        }
    };
    let staged = list(STAGED);
    let modified = list(MODIFIED);
    let untracked = list(UNTRACKED);

    snapshot.staged_files = staged;
    snapshot.modified_files = modified;
    snapshot.untracked_files = untracked;

    match results.get(PORCELAIN) {
        Some(result) if result.success => {
            snapshot.conflicted_files = parse::conflicted_files(&result.stdout)
        }
        _ => snapshot.degraded.push(PORCELAIN.to_string()),
    }

    snapshot.latest_commit = match results.get(LAST_COMMIT) {
        Some(result) if result.success => parse::commit_line(&result.stdout).unwrap_or_else(|| {
            snapshot.degraded.push(LAST_COMMIT.to_string());
            CommitInfo::unavailable("unparseable log output")
        }),
        Some(result) if result.stderr.contains("does not have any commits") => {
            CommitInfo::unavailable("no commits")
        }
        Some(result) => {
            snapshot.degraded.push(LAST_COMMIT.to_string());
            CommitInfo::unavailable(result.first_error_line())
        }
        None => {
            snapshot.degraded.push(LAST_COMMIT.to_string());
            CommitInfo::unavailable("log query missing from batch")
        }
    };

    snapshot.ahead_of_upstream = results
        .get(AHEAD)
        .filter(|result| result.success)
        .and_then(|result| parse::count(&result.stdout));

    snapshot.recompute_flags();
    Ok(snapshot)
}
