//! Plugin lifecycle: discover, load, execute, unload.
//!
//! Every call into plugin code is isolated. Construction, environment checks
//! and setup run under `catch_unwind`; execution runs in its own task, so a
//! panic or an overrun turns into an `Error` outcome instead of reaching the
//! caller.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::catalog::{PluginCatalog, PluginSpec};
use super::contract::{Plugin, PluginContext, PluginMetadata, PluginOutcome};
use super::manifest::{self, PluginLocation, PluginManifest};
use super::stats::ExecutionStats;
use crate::error::{HookgateError, Result};

#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// Directory scanned for `<name>.toml` manifests
    pub directory: PathBuf,
    /// Used when a plugin declares no timeout
    pub default_timeout: Duration,
    /// How long a parallel batch waits for outstanding results
    pub result_timeout: Duration,
    /// Loaded but disabled from the start
    pub disabled: Vec<String>,
    /// Per-plugin settings layered over manifest settings
    pub plugin_settings: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(".hookgate/plugins"),
            default_timeout: Duration::from_secs(60),
            result_timeout: Duration::from_secs(120),
            disabled: Vec::new(),
            plugin_settings: BTreeMap::new(),
        }
    }
}

/// Outcome of [`PluginManager::load_all`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadSummary {
    pub discovered: usize,
    pub loaded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub metadata: PluginMetadata,
    pub location: PluginLocation,
    pub enabled: bool,
    pub stats: ExecutionStats,
}

type Instance = Arc<tokio::sync::Mutex<Box<dyn Plugin>>>;

struct LoadedPlugin {
    metadata: PluginMetadata,
    location: PluginLocation,
    enabled: bool,
    instance: Instance,
    stats: Arc<Mutex<ExecutionStats>>,
}

struct Inner {
    catalog: PluginCatalog,
    settings: ManagerSettings,
    plugins: RwLock<BTreeMap<String, LoadedPlugin>>,
    stats: Mutex<ExecutionStats>,
}

/// Owns every loaded plugin; cheap to clone
#[derive(Clone)]
pub struct PluginManager {
    inner: Arc<Inner>,
}

impl PluginManager {
    pub fn new(catalog: PluginCatalog, settings: ManagerSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalog,
                settings,
                plugins: RwLock::new(BTreeMap::new()),
                stats: Mutex::new(ExecutionStats::default()),
            }),
        }
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.inner.settings
    }

    pub fn catalog(&self) -> &PluginCatalog {
        &self.inner.catalog
    }

    /// Name to location for every available unit, without loading anything
    ///
    /// Builtin kinds come first; a manifest with the same name replaces the builtin.
    pub fn discover(&self) -> BTreeMap<String, PluginLocation> {
        let mut found: BTreeMap<String, PluginLocation> = self
            .inner
            .catalog
            .builtin_kinds()
            .map(|kind| (kind.to_string(), PluginLocation::Builtin(kind.to_string())))
            .collect();

        match manifest::scan_directory(&self.inner.settings.directory) {
            Ok(manifests) => {
                for (name, path) in manifests {
                    found.insert(name, PluginLocation::Manifest(path));
                }
            }
            Err(e) => warn!(
                directory = %self.inner.settings.directory.display(),
                error = %e,
                "plugin directory scan failed"
            ),
        }

        debug!(count = found.len(), "discovered plugins");
        found
    }

    /// Instantiate, validate and set up a plugin; registered only on full success
    pub fn load(&self, name: &str, location: &PluginLocation) -> bool {
        match self.try_load(name, location) {
            Ok(()) => true,
            Err(e) => {
                warn!(plugin = %name, location = %location, error = %e, "plugin failed to load");
                false
            }
        }
    }

    pub fn try_load(&self, name: &str, location: &PluginLocation) -> Result<()> {
        if self.is_loaded(name) {
            return Err(HookgateError::load(name, "already loaded"));
        }

        let (spec, manifest) = self.build_spec(name, location)?;
        let factory = self
            .inner
            .catalog
            .factory(&spec.kind)
            .map_err(|e| HookgateError::load(name, e.to_string()))?;

        let mut plugin = isolate(name, "construction", || factory(&spec))?
            .map_err(|e| HookgateError::load(name, format!("{e:#}")))?;

        let mut metadata = isolate(name, "metadata", || plugin.metadata())?;
        metadata.name = name.to_string();
        if let Some(manifest) = &manifest {
            manifest.apply(&mut metadata);
        }

        let environment_ok = isolate(name, "environment check", || plugin.validate_environment())?;
        let missing: Vec<&str> = metadata
            .dependencies
            .iter()
            .filter(|program| which::which(program).is_err())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(HookgateError::load(
                name,
                format!("missing dependencies: {}", missing.join(", ")),
            ));
        }
        if !environment_ok {
            return Err(HookgateError::load(name, "environment check failed"));
        }

        isolate(name, "setup", || plugin.setup())?
            .map_err(|e| HookgateError::load(name, format!("setup failed: {e:#}")))?;

        let enabled = !self.inner.settings.disabled.iter().any(|d| d == name);
        let mut plugins = self.inner.plugins.write();
        if plugins.contains_key(name) {
            // A concurrent load won; undo our setup outside the lock
            drop(plugins);
            match isolate(name, "teardown", || plugin.teardown()) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(plugin = %name, error = %e, "teardown of duplicate load returned error"),
                Err(e) => debug!(plugin = %name, error = %e, "teardown of duplicate load panicked"),
            }
            return Err(HookgateError::load(name, "already loaded"));
        }
        info!(
            plugin = %name,
            kind = %spec.kind,
            version = %metadata.version,
            location = %location,
            enabled,
            "plugin loaded"
        );
        plugins.insert(
            name.to_string(),
            LoadedPlugin {
                metadata,
                location: location.clone(),
                enabled,
                instance: Arc::new(tokio::sync::Mutex::new(plugin)),
                stats: Arc::new(Mutex::new(ExecutionStats::default())),
            },
        );
        Ok(())
    }

    fn build_spec(&self, name: &str, location: &PluginLocation) -> Result<(PluginSpec, Option<PluginManifest>)> {
        let (mut spec, manifest) = match location {
            PluginLocation::Builtin(kind) => (PluginSpec::new(name, kind.clone()), None),
            PluginLocation::Manifest(path) => {
                let manifest = PluginManifest::load(path).map_err(|e| HookgateError::load(name, format!("{e:#}")))?;
                let kind = manifest
                    .kind()
                    .map_err(|e| HookgateError::load(name, e.to_string()))?
                    .to_string();
                let mut spec = PluginSpec::new(name, kind);
                spec.settings = manifest.settings.clone();
                (spec, Some(manifest))
            }
        };

        if let Some(overrides) = self.inner.settings.plugin_settings.get(name) {
            spec.settings
                .extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Ok((spec, manifest))
    }

    /// Load everything [`PluginManager::discover`] finds that is not loaded yet
    pub fn load_all(&self) -> LoadSummary {
        let discovered = self.discover();
        let mut summary = LoadSummary {
            discovered: discovered.len(),
            ..LoadSummary::default()
        };

        for (name, location) in &discovered {
            if self.is_loaded(name) {
                continue;
            }
            match self.try_load(name, location) {
                Ok(()) => summary.loaded.push(name.clone()),
                Err(e) => {
                    warn!(plugin = %name, error = %e, "plugin failed to load");
                    summary.failed.push((name.clone(), e.to_string()));
                }
            }
        }

        info!(
            discovered = summary.discovered,
            loaded = summary.loaded.len(),
            failed = summary.failed.len(),
            "plugin loading finished"
        );
        summary
    }

    /// Run one plugin; never fails, every problem becomes an outcome
    pub async fn execute(
        &self,
        name: &str,
        context: Arc<PluginContext>,
        timeout_override: Option<Duration>,
    ) -> PluginOutcome {
        let start = Instant::now();

        let entry = self.inner.plugins.read().get(name).map(|plugin| {
            (
                Arc::clone(&plugin.instance),
                plugin.metadata.timeout,
                plugin.enabled,
                Arc::clone(&plugin.stats),
            )
        });

        let Some((instance, declared_timeout, enabled, plugin_stats)) = entry else {
            let outcome = PluginOutcome::error(format!("Plugin '{name}' is not loaded"));
            self.inner.stats.lock().record(&outcome);
            return outcome;
        };

        let mut outcome = if enabled {
            let limit = timeout_override
                .or(Some(declared_timeout).filter(|t| !t.is_zero()))
                .unwrap_or(self.inner.settings.default_timeout);
            run_isolated(name, instance, context, limit).await
        } else {
            PluginOutcome::skipped(format!("Plugin '{name}' is disabled"))
        };

        outcome.duration = start.elapsed();
        plugin_stats.lock().record(&outcome);
        self.inner.stats.lock().record(&outcome);
        debug!(
            plugin = %name,
            status = %outcome.status,
            duration_ms = outcome.duration.as_millis() as u64,
            "plugin finished"
        );
        outcome
    }

    /// Run several plugins, on a bounded pool when `parallel` is set
    ///
    /// Each name appears once in the result. Plugins that do not support
    /// parallel execution run one by one after the pool drains.
    pub async fn execute_many(
        &self,
        names: &[String],
        context: Arc<PluginContext>,
        parallel: bool,
        max_workers: usize,
        timeout_override: Option<Duration>,
    ) -> BTreeMap<String, PluginOutcome> {
        let mut seen = BTreeSet::new();
        let names: Vec<String> = names.iter().filter(|n| seen.insert(n.as_str())).cloned().collect();
        let mut results = BTreeMap::new();

        if !parallel || names.len() <= 1 {
            for name in &names {
                let outcome = self.execute(name, Arc::clone(&context), timeout_override).await;
                results.insert(name.clone(), outcome);
            }
            return results;
        }

        let (pooled, serial): (Vec<String>, Vec<String>) = {
            let plugins = self.inner.plugins.read();
            names
                .into_iter()
                .partition(|name| plugins.get(name).is_none_or(|p| p.metadata.supports_parallel))
        };

        let workers = max_workers.max(1);
        debug!(pooled = pooled.len(), serial = serial.len(), workers, "running plugin batch");
        let permits = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        for name in &pooled {
            let manager = self.clone();
            let context = Arc::clone(&context);
            let permits = Arc::clone(&permits);
            let name = name.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let outcome = manager.execute(&name, context, timeout_override).await;
                (name, outcome)
            });
        }

        let result_timeout = self.inner.settings.result_timeout;
        let deadline = Instant::now() + result_timeout;
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((name, outcome)))) => {
                    results.insert(name, outcome);
                }
                Ok(Some(Err(e))) => error!(error = %e, "plugin worker task failed"),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        pending = tasks.len(),
                        timeout = ?result_timeout,
                        "plugin batch result wait timed out"
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }
        // A worker may finish between the deadline and the abort; keep its result
        while let Some(joined) = tasks.join_next().await {
            if let Ok((name, outcome)) = joined {
                results.insert(name, outcome);
            }
        }

        for name in &pooled {
            if results.contains_key(name) {
                continue;
            }
            // The worker never recorded this run, so record it here
            let outcome = PluginOutcome::error(format!("No result from '{name}' within {result_timeout:?}"));
            self.record(name, &outcome);
            results.insert(name.clone(), outcome);
        }

        for name in &serial {
            let outcome = self.execute(name, Arc::clone(&context), timeout_override).await;
            results.insert(name.clone(), outcome);
        }

        results
    }

    fn record(&self, name: &str, outcome: &PluginOutcome) {
        if let Some(plugin) = self.inner.plugins.read().get(name) {
            plugin.stats.lock().record(outcome);
        }
        self.inner.stats.lock().record(outcome);
    }

    /// Tear down (best-effort) and deregister
    pub async fn unload(&self, name: &str) -> Result<()> {
        let Some(instance) = self
            .inner
            .plugins
            .read()
            .get(name)
            .map(|plugin| Arc::clone(&plugin.instance))
        else {
            return Err(HookgateError::NotFound(format!("plugin '{name}'")));
        };

        // Waits for an in-flight execution of this instance to finish
        let mut plugin = instance.lock().await;
        match catch_unwind(AssertUnwindSafe(|| plugin.teardown())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(plugin = %name, error = %e, "plugin teardown returned error"),
            Err(_) => error!(plugin = %name, "plugin teardown panicked"),
        }
        drop(plugin);

        self.inner.plugins.write().remove(name);
        info!(plugin = %name, "plugin unloaded");
        Ok(())
    }

    /// Unload, rediscover and load again
    pub async fn reload(&self, name: &str) -> bool {
        if let Err(e) = self.unload(name).await {
            debug!(plugin = %name, error = %e, "reload of a plugin that was not loaded");
        }
        match self.discover().get(name) {
            Some(location) => self.load(name, location),
            None => {
                warn!(plugin = %name, "plugin not found during reload");
                false
            }
        }
    }

    /// Unload every plugin
    pub async fn unload_all(&self) {
        for name in self.loaded_names() {
            if let Err(e) = self.unload(&name).await {
                error!(plugin = %name, error = %e, "error unloading plugin");
            }
        }
    }

    pub fn enable(&self, name: &str) -> Result<()> {
        self.set_enabled(name, true)
    }

    pub fn disable(&self, name: &str) -> Result<()> {
        self.set_enabled(name, false)
    }

    fn set_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let mut plugins = self.inner.plugins.write();
        let plugin = plugins
            .get_mut(name)
            .ok_or_else(|| HookgateError::NotFound(format!("plugin '{name}'")))?;
        plugin.enabled = enabled;
        info!(plugin = %name, enabled, "plugin state changed");
        Ok(())
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.inner.plugins.read().contains_key(name)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.inner.plugins.read().get(name).is_some_and(|p| p.enabled)
    }

    pub fn loaded_names(&self) -> Vec<String> {
        self.inner.plugins.read().keys().cloned().collect()
    }

    pub fn metadata(&self, name: &str) -> Option<PluginMetadata> {
        self.inner.plugins.read().get(name).map(|p| p.metadata.clone())
    }

    pub fn list(&self) -> Vec<PluginInfo> {
        self.inner
            .plugins
            .read()
            .values()
            .map(|plugin| PluginInfo {
                metadata: plugin.metadata.clone(),
                location: plugin.location.clone(),
                enabled: plugin.enabled,
                stats: plugin.stats.lock().clone(),
            })
            .collect()
    }

    /// Aggregate counters across every execution, including unknown names
    pub fn stats(&self) -> ExecutionStats {
        self.inner.stats.lock().clone()
    }

    pub fn plugin_stats(&self, name: &str) -> Option<ExecutionStats> {
        self.inner.plugins.read().get(name).map(|p| p.stats.lock().clone())
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("catalog", &self.inner.catalog)
            .field("loaded", &self.loaded_names())
            .finish()
    }
}

/// Run a synchronous plugin call, turning a panic into a load failure
fn isolate<T>(name: &str, stage: &str, call: impl FnOnce() -> T) -> Result<T> {
    catch_unwind(AssertUnwindSafe(call)).map_err(|panic| {
        let reason = panic_message(panic.as_ref());
        error!(plugin = %name, stage, panic = %reason, "plugin panicked");
        HookgateError::load(name, format!("panicked during {stage}: {reason}"))
    })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn run_isolated(name: &str, instance: Instance, context: Arc<PluginContext>, limit: Duration) -> PluginOutcome {
    let task = tokio::spawn(async move {
        let plugin = instance.lock_owned().await;
        if plugin.should_skip(&context) {
            return None;
        }
        Some(plugin.execute(&context).await)
    });
    // Dropping this future (batch deadline) must not leave the plugin running
    let _abort = AbortOnDrop(task.abort_handle());

    match tokio::time::timeout(limit, task).await {
        Ok(Ok(None)) => PluginOutcome::skipped(format!("Plugin '{name}' skipped itself")),
        Ok(Ok(Some(Ok(outcome)))) => outcome,
        Ok(Ok(Some(Err(e)))) => {
            warn!(plugin = %name, error = %e, "plugin returned error");
            let failure = HookgateError::PluginExecutionFailure {
                name: name.to_string(),
                reason: format!("{e:#}"),
            };
            PluginOutcome::error(failure.to_string())
        }
        Ok(Err(join)) if join.is_panic() => {
            let reason = panic_message(join.into_panic().as_ref());
            error!(plugin = %name, panic = %reason, "plugin panicked");
            PluginOutcome::error(format!("Plugin '{name}' panicked: {reason}"))
        }
        Ok(Err(_)) => PluginOutcome::error(format!("Plugin '{name}' was cancelled")),
        Err(_) => {
            warn!(plugin = %name, timeout = ?limit, "plugin timed out");
            PluginOutcome::error(format!("Plugin '{name}' timed out after {limit:?}"))
                .with_detail("timeout_secs", limit.as_secs_f64())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::contract::OutcomeStatus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Behavior {
        Pass,
        Fail,
        Raise,
        Panic,
        Sleep(u64),
        Skip,
    }

    struct Scripted {
        behavior: Behavior,
        serial: bool,
        teardowns: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Plugin for Scripted {
        fn metadata(&self) -> PluginMetadata {
            let metadata = PluginMetadata::new("scripted").timeout(Duration::from_secs(5));
            if self.serial { metadata.serial_only() } else { metadata }
        }

        fn should_skip(&self, _context: &PluginContext) -> bool {
            matches!(self.behavior, Behavior::Skip)
        }

        fn teardown(&mut self) -> anyhow::Result<()> {
            self.teardowns.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("teardown complaint")
        }

        async fn execute(&self, _context: &PluginContext) -> anyhow::Result<PluginOutcome> {
            match self.behavior {
                Behavior::Pass | Behavior::Skip => Ok(PluginOutcome::success("ok")),
                Behavior::Fail => Ok(PluginOutcome::failure("bad")),
                Behavior::Raise => anyhow::bail!("exploded"),
                Behavior::Panic => panic!("plugin bug"),
                Behavior::Sleep(secs) => {
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                    Ok(PluginOutcome::success("slept"))
                }
            }
        }
    }

    struct Fixture {
        manager: PluginManager,
        teardowns: Arc<AtomicUsize>,
    }

    fn fixture(settings: ManagerSettings) -> Fixture {
        let teardowns = Arc::new(AtomicUsize::new(0));
        let mut catalog = PluginCatalog::new();
        let entries = [
            ("pass", Behavior::Pass),
            ("fail", Behavior::Fail),
            ("raise", Behavior::Raise),
            ("panic", Behavior::Panic),
            ("slow", Behavior::Sleep(30)),
            ("nap", Behavior::Sleep(1)),
            ("edge", Behavior::Sleep(10)),
            ("skip", Behavior::Skip),
        ];
        for (kind, behavior) in entries {
            let teardowns = Arc::clone(&teardowns);
            catalog.register(kind, move |spec| {
                Ok(Box::new(Scripted {
                    behavior,
                    serial: spec.setting_or("serial", false)?,
                    teardowns: Arc::clone(&teardowns),
                }) as Box<dyn Plugin>)
            });
        }
        catalog.register("broken-factory", |_| anyhow::bail!("cannot build"));
        catalog.register("panicking-factory", |_| panic!("factory bug"));

        Fixture {
            manager: PluginManager::new(catalog, settings),
            teardowns,
        }
    }

    fn load(manager: &PluginManager, name: &str, kind: &str) {
        assert!(manager.load(name, &PluginLocation::Builtin(kind.to_string())), "{name}");
    }

    fn context() -> Arc<PluginContext> {
        Arc::new(PluginContext::new("pre-commit", "/repo"))
    }

    #[test]
    fn test_load_failures_do_not_register() {
        let Fixture { manager, .. } = fixture(ManagerSettings::default());
        assert!(!manager.load("a", &PluginLocation::Builtin("broken-factory".into())));
        assert!(!manager.load("b", &PluginLocation::Builtin("panicking-factory".into())));
        assert!(!manager.load("c", &PluginLocation::Builtin("no-such-kind".into())));
        assert!(manager.loaded_names().is_empty());

        load(&manager, "p", "pass");
        assert!(!manager.load("p", &PluginLocation::Builtin("pass".into())));
        assert_eq!(manager.metadata("p").unwrap().name, "p");
    }

    #[test]
    fn test_missing_dependency_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("needs.toml"),
            "kind = \"pass\"\ndependencies = [\"hookgate-missing-tool\"]\n",
        )
        .unwrap();

        let Fixture { manager, .. } = fixture(ManagerSettings {
            directory: dir.path().to_path_buf(),
            ..ManagerSettings::default()
        });
        let err = manager
            .try_load("needs", &PluginLocation::Manifest(dir.path().join("needs.toml")))
            .unwrap_err();
        assert!(matches!(err, HookgateError::PluginLoadFailure { .. }));
        assert!(err.to_string().contains("hookgate-missing-tool"));
        assert!(!manager.is_loaded("needs"));
    }

    #[test]
    fn test_discover_and_load_all_from_manifests() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.toml"), "kind = \"pass\"\npriority = 7\n").unwrap();
        std::fs::write(dir.path().join("twice.toml"), "kind = [\"pass\", \"fail\"]\n").unwrap();
        std::fs::write(dir.path().join("unknown.toml"), "kind = \"nope\"\n").unwrap();

        let Fixture { manager, .. } = fixture(ManagerSettings {
            directory: dir.path().to_path_buf(),
            ..ManagerSettings::default()
        });

        let found = manager.discover();
        assert_eq!(found.len(), 3);
        assert!(manager.loaded_names().is_empty());

        let summary = manager.load_all();
        assert_eq!(summary.discovered, 3);
        assert_eq!(summary.loaded, vec!["good".to_string()]);
        assert_eq!(summary.failed.len(), 2);
        assert!(summary.failed.iter().any(|(name, reason)| name == "twice" && reason.contains("exactly one")));
        assert_eq!(manager.metadata("good").unwrap().priority, 7);
    }

    #[tokio::test]
    async fn test_execute_maps_every_failure_to_an_outcome() {
        let Fixture { manager, .. } = fixture(ManagerSettings::default());
        for kind in ["pass", "fail", "raise", "panic", "skip"] {
            load(&manager, kind, kind);
        }

        let status = |name: &'static str| {
            let manager = manager.clone();
            async move { manager.execute(name, context(), None).await.status }
        };
        assert_eq!(status("pass").await, OutcomeStatus::Success);
        assert_eq!(status("fail").await, OutcomeStatus::Failure);
        assert_eq!(status("raise").await, OutcomeStatus::Error);
        assert_eq!(status("panic").await, OutcomeStatus::Error);
        assert_eq!(status("skip").await, OutcomeStatus::Skipped);
        assert_eq!(status("missing").await, OutcomeStatus::Error);

        // a panicking plugin stays usable
        assert_eq!(status("panic").await, OutcomeStatus::Error);

        let stats = manager.stats();
        assert_eq!(stats.total, 6);
        assert_eq!(stats.skipped, 1);
        assert_eq!(manager.plugin_stats("panic").unwrap().error, 2);
    }

    #[tokio::test]
    async fn test_disabled_plugins_are_skipped() {
        let Fixture { manager, .. } = fixture(ManagerSettings {
            disabled: vec!["off".into()],
            ..ManagerSettings::default()
        });
        load(&manager, "off", "fail");
        assert!(!manager.is_enabled("off"));
        assert_eq!(manager.execute("off", context(), None).await.status, OutcomeStatus::Skipped);

        manager.enable("off").unwrap();
        assert_eq!(manager.execute("off", context(), None).await.status, OutcomeStatus::Failure);
        assert!(manager.disable("ghost").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_becomes_error() {
        let Fixture { manager, .. } = fixture(ManagerSettings::default());
        load(&manager, "slow", "slow");

        let outcome = manager.execute("slow", context(), Some(Duration::from_secs(2))).await;
        assert_eq!(outcome.status, OutcomeStatus::Error);
        assert!(outcome.message.contains("timed out"));
        assert!(outcome.duration >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_batch_isolates_siblings() {
        let Fixture { manager, .. } = fixture(ManagerSettings::default());
        for kind in ["pass", "raise", "panic", "nap"] {
            load(&manager, kind, kind);
        }

        let names: Vec<String> = ["pass", "raise", "panic", "nap", "pass"].iter().map(|s| s.to_string()).collect();
        let results = manager.execute_many(&names, context(), true, 4, None).await;

        assert_eq!(results.len(), 4);
        assert_eq!(results["pass"].status, OutcomeStatus::Success);
        assert_eq!(results["raise"].status, OutcomeStatus::Error);
        assert_eq!(results["panic"].status, OutcomeStatus::Error);
        assert_eq!(results["nap"].status, OutcomeStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_deadline_keeps_finished_results() {
        let Fixture { manager, .. } = fixture(ManagerSettings {
            result_timeout: Duration::from_secs(10),
            ..ManagerSettings::default()
        });
        load(&manager, "pass", "pass");
        load(&manager, "slow", "slow");

        let names = vec!["pass".to_string(), "slow".to_string()];
        let results = manager
            .execute_many(&names, context(), true, 2, Some(Duration::from_secs(60)))
            .await;

        assert_eq!(results["pass"].status, OutcomeStatus::Success);
        assert_eq!(results["slow"].status, OutcomeStatus::Error);
        assert!(results["slow"].message.contains("No result"));
        assert_eq!(manager.plugin_stats("slow").unwrap().error, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_finishing_at_the_deadline_is_recorded_once() {
        let Fixture { manager, .. } = fixture(ManagerSettings {
            result_timeout: Duration::from_secs(10),
            ..ManagerSettings::default()
        });
        load(&manager, "pass", "pass");
        load(&manager, "edge", "edge");

        let names = vec!["pass".to_string(), "edge".to_string()];
        let results = manager
            .execute_many(&names, context(), true, 2, Some(Duration::from_secs(60)))
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(manager.plugin_stats("edge").unwrap().total, 1);
        assert_eq!(manager.stats().total, 2);
    }

    struct Gated {
        barrier: Arc<std::sync::Barrier>,
        teardowns: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Plugin for Gated {
        fn metadata(&self) -> PluginMetadata {
            PluginMetadata::new("gated")
        }

        fn setup(&mut self) -> anyhow::Result<()> {
            self.barrier.wait();
            Ok(())
        }

        fn teardown(&mut self) -> anyhow::Result<()> {
            self.teardowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn execute(&self, _context: &PluginContext) -> anyhow::Result<PluginOutcome> {
            Ok(PluginOutcome::success("ok"))
        }
    }

    #[test]
    fn test_losing_a_concurrent_load_tears_down_its_instance() {
        let barrier = Arc::new(std::sync::Barrier::new(2));
        let teardowns = Arc::new(AtomicUsize::new(0));
        let mut catalog = PluginCatalog::new();
        {
            let barrier = Arc::clone(&barrier);
            let teardowns = Arc::clone(&teardowns);
            catalog.register("gated", move |_| {
                Ok(Box::new(Gated {
                    barrier: Arc::clone(&barrier),
                    teardowns: Arc::clone(&teardowns),
                }) as Box<dyn Plugin>)
            });
        }
        let manager = PluginManager::new(catalog, ManagerSettings::default());
        let location = PluginLocation::Builtin("gated".to_string());

        // Both loads pass setup together, so exactly one sees the other's entry
        let loaded: Vec<bool> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..2)
                .map(|_| scope.spawn(|| manager.try_load("twin", &location).is_ok()))
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        assert_eq!(loaded.iter().filter(|ok| **ok).count(), 1);
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
        assert!(manager.is_loaded("twin"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_limit_bounds_concurrency() {
        let Fixture { manager, .. } = fixture(ManagerSettings::default());
        let names: Vec<String> = (0..4).map(|i| format!("nap{i}")).collect();
        for name in &names {
            load(&manager, name, "nap");
        }

        let start = Instant::now();
        manager.execute_many(&names, context(), true, 2, None).await;
        // four one-second plugins on two workers
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_serial_only_plugins_run_after_pool() {
        let Fixture { manager, .. } = fixture(ManagerSettings {
            plugin_settings: BTreeMap::from([(
                "solo".to_string(),
                BTreeMap::from([("serial".to_string(), Value::Bool(true))]),
            )]),
            ..ManagerSettings::default()
        });
        load(&manager, "solo", "nap");
        load(&manager, "a", "nap");
        load(&manager, "b", "nap");
        assert!(!manager.metadata("solo").unwrap().supports_parallel);

        let names: Vec<String> = ["solo", "a", "b"].iter().map(|s| s.to_string()).collect();
        let start = Instant::now();
        let results = manager.execute_many(&names, context(), true, 4, None).await;
        assert_eq!(results.len(), 3);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_unload_is_best_effort_and_reload_rediscovers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("unit.toml"), "kind = \"pass\"\n").unwrap();
        let Fixture { manager, teardowns } = fixture(ManagerSettings {
            directory: dir.path().to_path_buf(),
            ..ManagerSettings::default()
        });

        assert!(manager.load("unit", &PluginLocation::Manifest(dir.path().join("unit.toml"))));
        manager.unload("unit").await.unwrap();
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
        assert!(!manager.is_loaded("unit"));
        assert!(manager.unload("unit").await.is_err());

        assert!(manager.reload("unit").await);
        assert!(manager.is_loaded("unit"));
        assert!(manager.reload("unit").await);
        assert_eq!(teardowns.load(Ordering::SeqCst), 2);

        assert!(!manager.reload("ghost").await);
        manager.unload_all().await;
        assert!(manager.list().is_empty());
    }
}
