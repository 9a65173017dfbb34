use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::aggregate::{self, Aggregate};
use super::config::HookConfig;
use super::plan::{self, ChangeSummary, HookExecutionPlan, Selection};
use crate::cache::CacheRegistry;
use crate::plugins::{OutcomeStatus, PluginContext, PluginManager, PluginOutcome};

#[derive(Debug, Clone, Serialize)]
pub struct PluginResult {
    pub name: String,
    pub blocking: bool,
    pub outcome: PluginOutcome,
}

/// Everything known about one hook invocation
#[derive(Debug, Clone, Serialize)]
pub struct HookReport {
    pub run_id: Uuid,
    pub hook: String,
    pub repo_path: PathBuf,
    pub branch: Option<String>,
    pub status: OutcomeStatus,
    pub reason: String,
    /// In plan order
    pub outcomes: Vec<PluginResult>,
    #[serde(rename = "duration_ms", serialize_with = "crate::shared::duration::as_millis")]
    pub duration: Duration,
    /// Repository status came from the fallback store
    pub used_fallback: bool,
}

impl HookReport {
    fn new(hook: &str, repo: &Path) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            hook: hook.to_string(),
            repo_path: repo.to_path_buf(),
            branch: None,
            status: OutcomeStatus::Skipped,
            reason: String::new(),
            outcomes: Vec::new(),
            duration: Duration::ZERO,
            used_fallback: false,
        }
    }

    fn conclude(mut self, status: OutcomeStatus, reason: impl Into<String>, start: Instant) -> Self {
        self.status = status;
        self.reason = reason.into();
        self.duration = start.elapsed();
        self
    }

    /// Success, Warning and Skipped map to 0; Failure and Error to 1
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    pub fn outcome(&self, name: &str) -> Option<&PluginOutcome> {
        self.outcomes.iter().find(|r| r.name == name).map(|r| &r.outcome)
    }
}

/// Turns a hook name and a repository into one aggregate result
pub struct HookDispatcher {
    caches: Arc<CacheRegistry>,
    plugins: PluginManager,
    hooks: Arc<HookConfig>,
    default_workers: usize,
}

impl HookDispatcher {
    pub fn new(
        caches: Arc<CacheRegistry>,
        plugins: PluginManager,
        hooks: Arc<HookConfig>,
        default_workers: usize,
    ) -> Self {
        Self {
            caches,
            plugins,
            hooks,
            default_workers: default_workers.max(1),
        }
    }

    pub fn hooks(&self) -> &HookConfig {
        &self.hooks
    }

    pub async fn dispatch(&self, hook: &str, repo: &Path, args: Vec<String>) -> HookReport {
        let start = Instant::now();
        let mut report = HookReport::new(hook, repo);
        info!(run_id = %report.run_id, hook = %hook, repo = %repo.display(), "dispatching hook");

        let cache = match self.caches.get_default(repo) {
            Ok(cache) => cache,
            Err(e) => return report.conclude(OutcomeStatus::Error, format!("status cache unavailable: {e}"), start),
        };

        let snapshot = cache.get_status(false).await;
        if snapshot.is_placeholder() {
            let cause = snapshot.latest_commit.error.clone().unwrap_or_default();
            warn!(hook = %hook, cause = %cause, "repository status unavailable");
            report.used_fallback = true;
            return report.conclude(
                OutcomeStatus::Error,
                format!("cannot determine repository status ({cause})"),
                start,
            );
        }
        if snapshot.is_fallback {
            warn!(hook = %hook, captured_at = %snapshot.captured_at, "running hook against stale repository status");
        }
        report.used_fallback = snapshot.is_fallback;
        report.branch = Some(snapshot.current_branch.clone());

        let changes = ChangeSummary::from_snapshot(&snapshot);
        let mut plan = match plan::build_plan(hook, &changes, &self.hooks, self.default_workers) {
            Ok(Selection::Run(plan)) => plan,
            Ok(Selection::Skip(reason)) => {
                debug!(hook = %hook, reason = %reason, "hook skipped");
                return report.conclude(OutcomeStatus::Skipped, reason, start);
            }
            Err(e) => return report.conclude(OutcomeStatus::Error, format!("invalid hook configuration: {e}"), start),
        };
        self.order_by_priority(&mut plan);

        let mut context = PluginContext::from_snapshot(hook, repo, &snapshot, args);
        context.extra.extend(plan.context.clone());
        let context = Arc::new(context);
        let mut results = self
            .plugins
            .execute_many(
                &plan.names(),
                context,
                plan.strategy.is_parallel(),
                plan.strategy.workers(),
                plan.timeout,
            )
            .await;

        report.outcomes = plan
            .plugins
            .iter()
            .map(|planned| PluginResult {
                name: planned.name.clone(),
                blocking: planned.blocking,
                outcome: results
                    .remove(&planned.name)
                    .unwrap_or_else(|| PluginOutcome::error("no outcome recorded")),
            })
            .collect();

        let Aggregate { status, reason } = aggregate::fold(
            report
                .outcomes
                .iter()
                .map(|r| (r.name.as_str(), r.outcome.status, r.blocking)),
        );
        info!(
            run_id = %report.run_id,
            hook = %hook,
            status = %status,
            plugins = report.outcomes.len(),
            "hook finished"
        );
        report.conclude(status, reason, start)
    }

    // Higher priority first; config order breaks ties
    fn order_by_priority(&self, plan: &mut HookExecutionPlan) {
        plan.plugins.sort_by_key(|planned| {
            std::cmp::Reverse(self.plugins.metadata(&planned.name).map_or(0, |m| m.priority))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheSettings;
    use crate::git::{GitRunner, RawResult};
    use crate::hooks::config::HookDefinition;
    use crate::plugins::{ManagerSettings, Plugin, PluginCatalog, PluginLocation, PluginMetadata};
    use async_trait::async_trait;

    struct StaticGit {
        branch: Option<&'static str>,
    }

    #[async_trait]
    impl GitRunner for StaticGit {
        async fn run(&self, _repo: &Path, args: &[String]) -> RawResult {
            match (args.first().map(String::as_str), self.branch) {
                (Some("rev-parse"), Some(branch)) => RawResult::ok(format!("{branch}\n")),
                (Some("rev-parse"), None) => RawResult::failed("fatal: not a git repository"),
                (Some("diff"), _) if args.iter().any(|a| a == "--cached") => RawResult::ok("src/lib.rs\n"),
                _ => RawResult::ok(""),
            }
        }
    }

    struct Fixed(OutcomeStatus, i32);

    #[async_trait]
    impl Plugin for Fixed {
        fn metadata(&self) -> PluginMetadata {
            PluginMetadata::new("fixed").priority(self.1)
        }

        async fn execute(&self, context: &PluginContext) -> anyhow::Result<PluginOutcome> {
            let planned = context.extra.get("staged_count").cloned().unwrap_or_default();
            Ok(PluginOutcome::new(
                self.0,
                format!("saw {} staged ({planned} planned)", context.staged_files.len()),
            ))
        }
    }

    fn dispatcher(branch: Option<&'static str>, hooks: HookConfig) -> HookDispatcher {
        let mut catalog = PluginCatalog::new();
        for (kind, status, priority) in [
            ("ok", OutcomeStatus::Success, 0),
            ("bad", OutcomeStatus::Failure, 0),
            ("meh", OutcomeStatus::Warning, 10),
        ] {
            catalog.register(kind, move |_| Ok(Box::new(Fixed(status, priority)) as Box<dyn Plugin>));
        }
        let plugins = PluginManager::new(catalog, ManagerSettings::default());
        for kind in ["ok", "bad", "meh"] {
            assert!(plugins.load(kind, &PluginLocation::Builtin(kind.into())));
        }

        let caches = CacheRegistry::with_runner(CacheSettings::default(), Arc::new(StaticGit { branch }));
        HookDispatcher::new(Arc::new(caches), plugins, Arc::new(hooks), 4)
    }

    #[tokio::test]
    async fn test_blocking_failure_fails_the_hook() {
        let hooks = HookConfig::empty().with_hook("pre-commit", HookDefinition::new(["ok", "bad"]));
        let report = dispatcher(Some("feature/x"), hooks)
            .dispatch("pre-commit", Path::new("/repo"), vec![])
            .await;

        assert_eq!(report.status, OutcomeStatus::Failure);
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.branch.as_deref(), Some("feature/x"));
        assert_eq!(report.outcome("ok").unwrap().message, "saw 1 staged (1 planned)");
        assert!(!report.used_fallback);
    }

    #[tokio::test]
    async fn test_advisory_failure_only_warns_and_priority_orders() {
        let hooks = HookConfig::empty().with_hook(
            "pre-commit",
            HookDefinition::new(["ok", "bad", "meh"]).advisory("bad"),
        );
        let report = dispatcher(Some("main"), hooks)
            .dispatch("pre-commit", Path::new("/repo"), vec![])
            .await;

        assert_eq!(report.status, OutcomeStatus::Warning);
        assert_eq!(report.exit_code(), 0);
        let order: Vec<&str> = report.outcomes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(order, vec!["meh", "ok", "bad"]);
    }

    #[tokio::test]
    async fn test_parallel_hook_matches_serial_result() {
        let mut definition = HookDefinition::new(["ok", "meh"]);
        let serial = dispatcher(Some("main"), HookConfig::empty().with_hook("pre-push", definition.clone()))
            .dispatch("pre-push", Path::new("/repo"), vec![])
            .await;
        definition.parallel = true;
        let parallel = dispatcher(Some("main"), HookConfig::empty().with_hook("pre-push", definition))
            .dispatch("pre-push", Path::new("/repo"), vec![])
            .await;

        assert_eq!(serial.status, parallel.status);
        assert_eq!(serial.reason, parallel.reason);
    }

    #[tokio::test]
    async fn test_unconfigured_hook_is_skipped_with_reason() {
        let report = dispatcher(Some("main"), HookConfig::empty())
            .dispatch("post-merge", Path::new("/repo"), vec![])
            .await;
        assert_eq!(report.status, OutcomeStatus::Skipped);
        assert!(report.reason.contains("post-merge"));
        assert_eq!(report.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_unknown_status_is_an_error() {
        let hooks = HookConfig::empty().with_hook("pre-commit", HookDefinition::new(["ok"]));
        let report = dispatcher(None, hooks)
            .dispatch("pre-commit", Path::new("/repo"), vec![])
            .await;
        assert_eq!(report.status, OutcomeStatus::Error);
        assert!(report.used_fallback);
        assert!(report.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_missing_plugin_is_an_error_outcome() {
        let hooks = HookConfig::empty().with_hook("pre-commit", HookDefinition::new(["ok", "ghost"]));
        let report = dispatcher(Some("dev"), hooks)
            .dispatch("pre-commit", Path::new("/repo"), vec![])
            .await;
        assert_eq!(report.outcome("ghost").unwrap().status, OutcomeStatus::Error);
        assert_eq!(report.status, OutcomeStatus::Failure);
    }
}
