use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::shared::PatternSet;

/// Hook name to definition
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HookConfig {
    #[serde(flatten)]
    pub hooks: BTreeMap<String, HookDefinition>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HookDefinition {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub plugins: Vec<PluginRef>,

    #[serde(default)]
    pub parallel: bool,

    /// 0 uses the plugin pool default
    #[serde(default)]
    pub max_workers: usize,

    /// Per-plugin timeout for this hook, overriding declared timeouts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default = "default_min_plugins_for_parallel")]
    pub min_plugins_for_parallel: usize,

    /// Only run on branches matching one of these globs; empty means all
    #[serde(default)]
    pub branches: Vec<String>,

    #[serde(default)]
    pub skip_branches: Vec<String>,

    /// Skip when nothing is staged or modified
    #[serde(default)]
    pub require_changes: bool,
}

/// A plugin entry: a bare name or a table with its blocking flag
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PluginRef {
    Name(String),
    Detailed {
        name: String,
        #[serde(default = "default_blocking")]
        blocking: bool,
    },
}

impl PluginRef {
    pub fn name(&self) -> &str {
        match self {
            PluginRef::Name(name) | PluginRef::Detailed { name, .. } => name,
        }
    }

    pub fn blocking(&self) -> bool {
        match self {
            PluginRef::Name(_) => true,
            PluginRef::Detailed { blocking, .. } => *blocking,
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_blocking() -> bool {
    true
}

fn default_min_plugins_for_parallel() -> usize {
    2
}

impl HookDefinition {
    pub fn new<S: Into<String>>(plugins: impl IntoIterator<Item = S>) -> Self {
        Self {
            enabled: true,
            plugins: plugins.into_iter().map(|name| PluginRef::Name(name.into())).collect(),
            parallel: false,
            max_workers: 0,
            timeout_secs: None,
            min_plugins_for_parallel: default_min_plugins_for_parallel(),
            branches: Vec::new(),
            skip_branches: Vec::new(),
            require_changes: false,
        }
    }

    pub fn advisory(mut self, name: &str) -> Self {
        for plugin in &mut self.plugins {
            if plugin.name() == name {
                *plugin = PluginRef::Detailed {
                    name: name.to_string(),
                    blocking: false,
                };
            }
        }
        self
    }
}

impl HookConfig {
    pub fn empty() -> Self {
        Self {
            hooks: BTreeMap::new(),
        }
    }

    pub fn get(&self, hook: &str) -> Option<&HookDefinition> {
        self.hooks.get(hook)
    }

    pub fn with_hook(mut self, hook: impl Into<String>, definition: HookDefinition) -> Self {
        self.hooks.insert(hook.into(), definition);
        self
    }

    /// Every plugin name referenced by any hook
    pub fn referenced_plugins(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .hooks
            .values()
            .flat_map(|definition| definition.plugins.iter().map(PluginRef::name))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Compile every branch glob so bad patterns surface at load time
    pub fn validate(&self) -> anyhow::Result<()> {
        for (hook, definition) in &self.hooks {
            PatternSet::new(&definition.branches)
                .and_then(|_| PatternSet::new(&definition.skip_branches))
                .map_err(|e| anyhow::anyhow!("hooks.{hook}: {e}"))?;
            if definition.plugins.iter().any(|p| p.name().trim().is_empty()) {
                anyhow::bail!("hooks.{hook}: plugin names must not be empty");
            }
        }
        Ok(())
    }
}

impl Default for HookConfig {
    fn default() -> Self {
        Self::empty()
            .with_hook("pre-commit", HookDefinition::new(["protected-branch"]))
            .with_hook("commit-msg", HookDefinition::new(["conventional-commit"]))
            .with_hook("pre-push", HookDefinition::new(["clean-worktree"]))
    }
}
