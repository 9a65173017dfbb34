pub mod cache;
pub mod config;
pub mod install;
pub mod plugins;
pub mod run;
pub mod status;
pub mod uninstall;
pub mod version;

use anyhow::Result;
use std::path::PathBuf;

use crate::cli::Invocation;
use crate::context::Hookgate;
use crate::git::GitRepo;

/// Root of the repository the invocation runs in
pub(crate) fn repo_root(invocation: &Invocation) -> Result<PathBuf> {
    Ok(GitRepo::discover(&invocation.cwd)?.workdir())
}

pub(crate) fn open(invocation: &Invocation) -> Result<Hookgate> {
    Hookgate::open(&invocation.cwd, invocation.config.as_deref())
}
