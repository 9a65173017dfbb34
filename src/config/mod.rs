//! Typed configuration
//!
//! [`HookgateConfig`] is extracted from the figment chain built in [`loader`].
//! Every section defaults independently, so a partial file is always valid.

pub mod loader;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{CacheSettings, CircuitConfig};
use crate::error::HookgateError;
use crate::hooks::HookConfig;
use crate::parallel::ExecutionStrategy;
use crate::plugins::ManagerSettings;

pub use loader::ConfigLoader;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookgateConfig {
    pub cache: CacheConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub plugins: PluginsConfig,
    pub hooks: HookConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub refresh_timeout_secs: u64,
    pub command_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Relative paths resolve against the repository root
    pub directory: PathBuf,
    pub max_workers: usize,
    pub thread_percentage: u8,
    pub result_timeout_secs: u64,
    pub default_timeout_secs: u64,
    pub disabled: Vec<String>,
    pub settings: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Default for HookgateConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            plugins: PluginsConfig::default(),
            hooks: HookConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 5,
            refresh_timeout_secs: 30,
            command_timeout_secs: 10,
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            open_timeout_secs: 30,
        }
    }
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(".hookgate/plugins"),
            max_workers: 0,
            thread_percentage: 75,
            result_timeout_secs: 120,
            default_timeout_secs: 60,
            disabled: Vec::new(),
            settings: BTreeMap::new(),
        }
    }
}

impl HookgateConfig {
    pub fn validate(&self) -> Result<(), HookgateError> {
        if self.cache.refresh_timeout_secs == 0 {
            return Err(HookgateError::Config("cache.refresh_timeout_secs must be positive".into()));
        }
        if self.cache.command_timeout_secs == 0 {
            return Err(HookgateError::Config("cache.command_timeout_secs must be positive".into()));
        }
        if self.plugins.thread_percentage == 0 || self.plugins.thread_percentage > 100 {
            return Err(HookgateError::Config(
                "plugins.thread_percentage must be between 1 and 100".into(),
            ));
        }
        if self.plugins.result_timeout_secs == 0 || self.plugins.default_timeout_secs == 0 {
            return Err(HookgateError::Config("plugin timeouts must be positive".into()));
        }
        self.circuit().validate()?;
        self.hooks
            .validate()
            .map_err(|e| HookgateError::Config(e.to_string()))
    }

    pub fn circuit(&self) -> CircuitConfig {
        CircuitConfig {
            failure_threshold: self.circuit_breaker.failure_threshold,
            success_threshold: self.circuit_breaker.success_threshold,
            open_timeout: Duration::from_secs(self.circuit_breaker.open_timeout_secs),
        }
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: Duration::from_secs(self.cache.ttl_secs),
            refresh_timeout: Duration::from_secs(self.cache.refresh_timeout_secs),
            command_timeout: Duration::from_secs(self.cache.command_timeout_secs),
            circuit: self.circuit(),
        }
    }

    pub fn manager_settings(&self, repo_root: &Path) -> ManagerSettings {
        let directory = if self.plugins.directory.is_absolute() {
            self.plugins.directory.clone()
        } else {
            repo_root.join(&self.plugins.directory)
        };
        ManagerSettings {
            directory,
            default_timeout: Duration::from_secs(self.plugins.default_timeout_secs),
            result_timeout: Duration::from_secs(self.plugins.result_timeout_secs),
            disabled: self.plugins.disabled.clone(),
            plugin_settings: self.plugins.settings.clone(),
        }
    }

    /// Pool size for parallel hooks
    pub fn default_workers(&self) -> usize {
        ExecutionStrategy::calculate_optimal_workers(self.plugins.max_workers, self.plugins.thread_percentage)
    }
}
