//! Plugin selection for one hook invocation
//!
//! Selection depends only on the branch, the change summary and the static
//! hook configuration. Nothing here touches git or the plugin manager.

use anyhow::Result;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use super::config::HookConfig;
use crate::git::StatusSnapshot;
use crate::parallel::ExecutionStrategy;
use crate::shared::PatternSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    pub branch: String,
    pub staged: usize,
    pub modified: usize,
    pub untracked: usize,
}

impl ChangeSummary {
    pub fn from_snapshot(snapshot: &StatusSnapshot) -> Self {
        Self {
            branch: snapshot.current_branch.clone(),
            staged: snapshot.staged_files.len(),
            modified: snapshot.modified_files.len(),
            untracked: snapshot.untracked_files.len(),
        }
    }

    pub fn has_changes(&self) -> bool {
        self.staged > 0 || self.modified > 0
    }

    /// Key-value view handed to plugins through the plan
    pub fn to_context(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("branch".to_string(), json!(self.branch)),
            ("staged_count".to_string(), json!(self.staged)),
            ("modified_count".to_string(), json!(self.modified)),
            ("untracked_count".to_string(), json!(self.untracked)),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedPlugin {
    pub name: String,
    pub blocking: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookExecutionPlan {
    pub hook: String,
    pub plugins: Vec<PlannedPlugin>,
    pub strategy: ExecutionStrategy,
    #[serde(skip_serializing_if = "Option::is_none", with = "crate::shared::duration::option")]
    pub timeout: Option<Duration>,
    /// Selection inputs plus the hook name, copied into each plugin's `extra`
    pub context: BTreeMap<String, Value>,
}

impl HookExecutionPlan {
    pub fn names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name.clone()).collect()
    }

    pub fn is_blocking(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p.name == name && p.blocking)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Run(HookExecutionPlan),
    Skip(String),
}

/// Decide which plugins run for `hook` and how
///
/// `default_workers` is used when the hook does not set `max_workers`.
pub fn build_plan(
    hook: &str,
    changes: &ChangeSummary,
    config: &HookConfig,
    default_workers: usize,
) -> Result<Selection> {
    let Some(definition) = config.get(hook) else {
        return Ok(Selection::Skip(format!("no plugins configured for hook '{hook}'")));
    };

    if !definition.enabled {
        return Ok(Selection::Skip(format!("hook '{hook}' is disabled")));
    }

    let include = PatternSet::new(&definition.branches)?;
    if !include.is_empty() && !include.is_match(&changes.branch) {
        return Ok(Selection::Skip(format!(
            "branch '{}' does not match the branches selected for '{hook}'",
            changes.branch
        )));
    }

    let exclude = PatternSet::new(&definition.skip_branches)?;
    if exclude.is_match(&changes.branch) {
        return Ok(Selection::Skip(format!(
            "branch '{}' is excluded from '{hook}'",
            changes.branch
        )));
    }

    if definition.require_changes && !changes.has_changes() {
        return Ok(Selection::Skip("no staged or modified files".to_string()));
    }

    let mut seen = BTreeSet::new();
    let plugins: Vec<PlannedPlugin> = definition
        .plugins
        .iter()
        .filter(|plugin| seen.insert(plugin.name()))
        .map(|plugin| PlannedPlugin {
            name: plugin.name().to_string(),
            blocking: plugin.blocking(),
        })
        .collect();

    if plugins.is_empty() {
        return Ok(Selection::Skip(format!("no plugins configured for hook '{hook}'")));
    }

    let strategy = if definition.parallel {
        let workers = if definition.max_workers > 0 {
            definition.max_workers
        } else {
            default_workers
        };
        ExecutionStrategy::auto(plugins.len(), definition.min_plugins_for_parallel, workers)
    } else {
        ExecutionStrategy::Sequential
    };

    let mut context = changes.to_context();
    context.insert("hook".to_string(), json!(hook));

    Ok(Selection::Run(HookExecutionPlan {
        hook: hook.to_string(),
        plugins,
        strategy,
        timeout: definition.timeout_secs.map(Duration::from_secs),
        context,
    }))
}
