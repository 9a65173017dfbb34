//! Git integration layer
//!
//! Status queries go through the `git` executable (see [`executor`]) so that
//! their cost and failure modes match what hooks observe. Repository discovery
//! and hooks-directory lookup use git2.

pub mod executor;
pub mod parse;
pub mod snapshot;

pub use executor::{GitQuery, GitQueryExecutor, GitRunner, RawResult, SystemGit};
pub use snapshot::{CommitInfo, StatusSnapshot};

use anyhow::{Context, Result};
use git2::Repository;
use std::path::{Path, PathBuf};

pub struct GitRepo {
    repo: Repository,
}

impl GitRepo {
    pub fn discover(start: impl AsRef<Path>) -> Result<Self> {
        let repo = Repository::discover(start.as_ref()).context("No Git repository found")?;
        Ok(Self { repo })
    }

    /// Working tree root; falls back to the git dir for bare repositories
    pub fn workdir(&self) -> PathBuf {
        self.repo
            .workdir()
            .unwrap_or_else(|| self.repo.path())
            .to_path_buf()
    }

    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Hooks directory, honouring `core.hooksPath`
    pub fn hooks_dir(&self) -> PathBuf {
        let configured = self
            .repo
            .config()
            .ok()
            .and_then(|config| config.get_path("core.hooksPath").ok());

        match configured {
            Some(path) if path.is_absolute() => path,
            Some(path) => self.workdir().join(path),
            None => self.repo.path().join("hooks"),
        }
    }
}
