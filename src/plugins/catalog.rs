//! Init-time registration of plugin kinds
//!
//! Every concrete plugin type is registered once under a kind name together
//! with a factory. Manifests on disk name a kind; builtin kinds are also
//! offered directly by discovery.

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::builtin;
use super::contract::Plugin;

/// What a factory receives when asked to build an instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginSpec {
    /// Name the instance is registered under
    pub name: String,
    pub kind: String,
    pub settings: BTreeMap<String, Value>,
}

impl PluginSpec {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            settings: BTreeMap::new(),
        }
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Typed setting; `Ok(None)` when absent
    pub fn setting<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.settings
            .get(key)
            .map(|value| {
                serde_json::from_value(value.clone())
                    .with_context(|| format!("Invalid setting '{key}' for plugin '{}'", self.name))
            })
            .transpose()
    }

    pub fn setting_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        Ok(self.setting(key)?.unwrap_or(default))
    }
}

pub type PluginFactory = Arc<dyn Fn(&PluginSpec) -> Result<Box<dyn Plugin>> + Send + Sync>;

#[derive(Clone)]
struct CatalogEntry {
    factory: PluginFactory,
    builtin: bool,
}

#[derive(Clone, Default)]
pub struct PluginCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with every kind shipped in this crate
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        builtin::register_all(&mut catalog);
        catalog
    }

    /// Register a kind that is only instantiated through a manifest
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&PluginSpec) -> Result<Box<dyn Plugin>> + Send + Sync + 'static,
    {
        self.insert(kind.into(), Arc::new(factory), false);
    }

    /// Register a kind that discovery also offers as `builtin:<kind>`
    pub fn register_builtin<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&PluginSpec) -> Result<Box<dyn Plugin>> + Send + Sync + 'static,
    {
        self.insert(kind.into(), Arc::new(factory), true);
    }

    fn insert(&mut self, kind: String, factory: PluginFactory, builtin: bool) {
        if self.entries.insert(kind.clone(), CatalogEntry { factory, builtin }).is_some() {
            tracing::debug!(kind = %kind, "plugin kind re-registered");
        }
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.entries.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn builtin_kinds(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.builtin)
            .map(|(kind, _)| kind.as_str())
    }

    pub fn factory(&self, kind: &str) -> Result<PluginFactory> {
        match self.entries.get(kind) {
            Some(entry) => Ok(Arc::clone(&entry.factory)),
            None => bail!("Unknown plugin kind '{kind}'"),
        }
    }
}

impl std::fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("kinds", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
