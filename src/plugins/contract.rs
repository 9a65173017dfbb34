//! The contract every check implements

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::git::StatusSnapshot;

/// Static description of a plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    pub category: String,
    /// Higher runs first within a serial batch
    pub priority: i32,
    /// Executables that must resolve on PATH
    pub dependencies: Vec<String>,
    pub supports_parallel: bool,
    /// Zero means "use the manager default"
    #[serde(rename = "timeout_secs", with = "crate::shared::duration")]
    pub timeout: Duration,
    pub description: String,
}

impl PluginMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            category: "general".to_string(),
            priority: 0,
            dependencies: Vec::new(),
            supports_parallel: true,
            timeout: Duration::ZERO,
            description: String::new(),
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn depends_on(mut self, program: impl Into<String>) -> Self {
        self.dependencies.push(program.into());
        self
    }

    pub fn serial_only(mut self) -> Self {
        self.supports_parallel = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Warning,
    Failure,
    Error,
    Skipped,
}

impl OutcomeStatus {
    /// Failure or Error
    pub fn is_blocking_problem(self) -> bool {
        matches!(self, OutcomeStatus::Failure | OutcomeStatus::Error)
    }

    pub fn exit_code(self) -> i32 {
        if self.is_blocking_problem() { 1 } else { 0 }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::Warning => "warning",
            OutcomeStatus::Failure => "failure",
            OutcomeStatus::Error => "error",
            OutcomeStatus::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

/// Result of one plugin execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginOutcome {
    pub status: OutcomeStatus,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
    #[serde(rename = "duration_ms", serialize_with = "crate::shared::duration::as_millis")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

impl PluginOutcome {
    pub fn new(status: OutcomeStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: BTreeMap::new(),
            duration: Duration::ZERO,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(OutcomeStatus::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(OutcomeStatus::Warning, message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(OutcomeStatus::Failure, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(OutcomeStatus::Error, message)
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self::new(OutcomeStatus::Skipped, message)
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_exit_code(mut self, code: Option<i32>) -> Self {
        self.exit_code = code;
        self
    }

    pub fn with_output(mut self, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self.stderr = stderr.into();
        self
    }
}

/// Everything a plugin may look at while running
#[derive(Debug, Clone, Default, Serialize)]
pub struct PluginContext {
    pub hook_name: String,
    pub repo_path: PathBuf,
    pub branch: String,
    pub staged_files: Vec<String>,
    pub modified_files: Vec<String>,
    pub untracked_files: Vec<String>,
    /// Arguments git passed to the hook
    pub args: Vec<String>,
    /// Repository state came from the fallback and may be stale
    pub status_is_fallback: bool,
    pub extra: BTreeMap<String, Value>,
}

impl PluginContext {
    pub fn new(hook_name: impl Into<String>, repo_path: impl Into<PathBuf>) -> Self {
        Self {
            hook_name: hook_name.into(),
            repo_path: repo_path.into(),
            ..Self::default()
        }
    }

    pub fn from_snapshot(
        hook_name: impl Into<String>,
        repo_path: impl Into<PathBuf>,
        snapshot: &StatusSnapshot,
        args: Vec<String>,
    ) -> Self {
        Self {
            hook_name: hook_name.into(),
            repo_path: repo_path.into(),
            branch: snapshot.current_branch.clone(),
            staged_files: snapshot.staged_files.clone(),
            modified_files: snapshot.modified_files.clone(),
            untracked_files: snapshot.untracked_files.clone(),
            args,
            status_is_fallback: snapshot.is_fallback,
            extra: BTreeMap::new(),
        }
    }

    /// Staged and modified files, sorted and deduplicated
    pub fn changed_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .staged_files
            .iter()
            .chain(&self.modified_files)
            .cloned()
            .collect();
        files.sort();
        files.dedup();
        files
    }
}

/// An independently implemented check run against a git hook
///
/// The manager owns each instance behind a lock and never runs one instance
/// against two contexts at once. Panics from any method are caught by the
/// manager and reported as load failures or `Error` outcomes.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn metadata(&self) -> PluginMetadata;

    /// Whether the plugin can run on this machine
    ///
    /// The default requires every declared dependency to resolve on PATH.
    fn validate_environment(&self) -> bool {
        self.metadata()
            .dependencies
            .iter()
            .all(|program| which::which(program).is_ok())
    }

    /// One-time initialization after a successful environment check
    fn setup(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn teardown(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn should_skip(&self, _context: &PluginContext) -> bool {
        false
    }

    async fn execute(&self, context: &PluginContext) -> anyhow::Result<PluginOutcome>;
}
