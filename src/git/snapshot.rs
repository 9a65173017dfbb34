use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The most recent commit on HEAD
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    pub message: String,
    pub author: String,
    pub date: String,
    /// Set when the commit could not be read; the other fields are then empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommitInfo {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::default()
        }
    }
}

/// Point-in-time view of a repository's status
///
/// Snapshots are handed out by value. `has_uncommitted_changes` always equals
/// `!staged_files.is_empty() || !modified_files.is_empty()`; use [`StatusSnapshot::new`]
/// or [`StatusSnapshot::recompute_flags`] rather than setting the flags by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub current_branch: String,
    pub staged_files: Vec<String>,
    pub modified_files: Vec<String>,
    pub untracked_files: Vec<String>,
    pub conflicted_files: Vec<String>,
    pub has_staged_changes: bool,
    pub has_uncommitted_changes: bool,
    pub latest_commit: CommitInfo,
    /// Commits on HEAD not on its upstream; `None` without an upstream
    pub ahead_of_upstream: Option<u64>,
    /// Queries whose command failed; their fields are empty rather than known-empty
    pub degraded: Vec<String>,
    pub is_fallback: bool,
    pub captured_at: DateTime<Utc>,
}

impl StatusSnapshot {
    pub fn new(current_branch: impl Into<String>) -> Self {
        Self {
            current_branch: current_branch.into(),
            staged_files: Vec::new(),
            modified_files: Vec::new(),
            untracked_files: Vec::new(),
            conflicted_files: Vec::new(),
            has_staged_changes: false,
            has_uncommitted_changes: false,
            latest_commit: CommitInfo::default(),
            ahead_of_upstream: None,
            degraded: Vec::new(),
            is_fallback: false,
            captured_at: Utc::now(),
        }
    }

    /// Synthetic snapshot served when no known-good status has ever been captured
    pub fn placeholder(reason: impl Into<String>) -> Self {
        let mut snapshot = Self::new("unknown");
        snapshot.latest_commit = CommitInfo::unavailable(reason);
        snapshot.is_fallback = true;
        snapshot
    }

    pub fn recompute_flags(&mut self) {
        self.has_staged_changes = !self.staged_files.is_empty();
        self.has_uncommitted_changes =
            !self.staged_files.is_empty() || !self.modified_files.is_empty();
    }

    /// True for the synthetic snapshot from [`StatusSnapshot::placeholder`]
    pub fn is_placeholder(&self) -> bool {
        self.is_fallback && self.latest_commit.error.is_some() && self.current_branch == "unknown"
    }

    /// Staged and modified files, deduplicated, in a stable order
    pub fn changed_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .staged_files
            .iter()
            .chain(self.modified_files.iter())
            .cloned()
            .collect();
        files.sort();
        files.dedup();
        files
    }

    /// Copy of this snapshot relabelled as stale data
    pub fn as_fallback(&self) -> Self {
        let mut snapshot = self.clone();
        snapshot.is_fallback = true;
        snapshot
    }
}
