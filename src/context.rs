//! Process-wide wiring
//!
//! One [`Hookgate`] is built per invocation: configuration, the status cache
//! registry, the plugin manager with everything loaded, and the dispatcher
//! that ties them together.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::CacheRegistry;
use crate::config::{self, HookgateConfig};
use crate::git::{GitRepo, GitRunner, SystemGit};
use crate::hooks::{HookDispatcher, HookReport};
use crate::plugins::{LoadSummary, PluginCatalog, PluginManager};

pub struct Hookgate {
    pub repo_root: PathBuf,
    pub config: HookgateConfig,
    pub caches: Arc<CacheRegistry>,
    pub plugins: PluginManager,
    pub dispatcher: HookDispatcher,
    pub load_summary: LoadSummary,
}

impl Hookgate {
    /// Discover the repository containing `start` and load its configuration
    pub fn open(start: &Path, custom_config: Option<&Path>) -> Result<Self> {
        let repo_root = GitRepo::discover(start)?.workdir();
        let config = config::loader::load(&repo_root, custom_config)?;
        Self::new(repo_root, config)
    }

    pub fn new(repo_root: impl Into<PathBuf>, config: HookgateConfig) -> Result<Self> {
        Self::with_runner(repo_root, config, Arc::new(SystemGit::new()))
    }

    /// Same as [`Hookgate::new`] with a custom git backend
    pub fn with_runner(
        repo_root: impl Into<PathBuf>,
        config: HookgateConfig,
        runner: Arc<dyn GitRunner>,
    ) -> Result<Self> {
        Self::with_catalog(repo_root, config, runner, PluginCatalog::with_builtins())
    }

    pub fn with_catalog(
        repo_root: impl Into<PathBuf>,
        config: HookgateConfig,
        runner: Arc<dyn GitRunner>,
        catalog: PluginCatalog,
    ) -> Result<Self> {
        let repo_root = repo_root.into();
        config.validate()?;

        let caches = Arc::new(CacheRegistry::with_runner(config.cache_settings(), runner));
        let plugins = PluginManager::new(catalog, config.manager_settings(&repo_root));
        let load_summary = plugins.load_all();
        for (name, reason) in &load_summary.failed {
            warn!(plugin = %name, reason = %reason, "plugin unavailable");
        }

        // Referenced but never loaded plugins surface as Error outcomes at dispatch time
        for name in config.hooks.referenced_plugins() {
            if !plugins.is_loaded(name) {
                debug!(plugin = %name, "hook references a plugin that is not loaded");
            }
        }

        let dispatcher = HookDispatcher::new(
            caches.clone(),
            plugins.clone(),
            Arc::new(config.hooks.clone()),
            config.default_workers(),
        );

        Ok(Self {
            repo_root,
            config,
            caches,
            plugins,
            dispatcher,
            load_summary,
        })
    }

    pub async fn run_hook(&self, hook: &str, args: Vec<String>) -> HookReport {
        self.dispatcher.dispatch(hook, &self.repo_root, args).await
    }

    /// Tear down every loaded plugin
    pub async fn shutdown(&self) {
        self.plugins.unload_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_wires_system_git_and_builtins() {
        if which::which("git").is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let status = std::process::Command::new("git")
            .args(["init", "-q"])
            .current_dir(dir.path())
            .status()
            .unwrap();
        assert!(status.success());
        std::process::Command::new("git")
            .args(["checkout", "-q", "-b", "feature/wiring"])
            .current_dir(dir.path())
            .status()
            .unwrap();

        let hookgate = Hookgate::new(dir.path(), HookgateConfig::default()).unwrap();
        assert!(hookgate.load_summary.failed.is_empty());
        assert!(hookgate.plugins.is_loaded("protected-branch"));

        let report = hookgate.run_hook("pre-commit", Vec::new()).await;
        assert_eq!(report.branch.as_deref(), Some("feature/wiring"));
        assert!(!report.used_fallback);
        assert_eq!(hookgate.caches.len(), 1);
        hookgate.shutdown().await;
    }
}
