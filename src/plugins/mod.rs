//! Pluggable checks
//!
//! Plugin kinds are registered in a [`PluginCatalog`] at startup. The
//! [`PluginManager`] discovers units (builtin kinds plus `<name>.toml`
//! manifests), loads them, and runs them alone or as a bounded parallel batch.

pub mod builtin;
pub mod catalog;
pub mod contract;
pub mod manager;
pub mod manifest;
pub mod stats;

pub use catalog::{PluginCatalog, PluginFactory, PluginSpec};
pub use contract::{OutcomeStatus, Plugin, PluginContext, PluginMetadata, PluginOutcome};
pub use manager::{LoadSummary, ManagerSettings, PluginInfo, PluginManager};
pub use manifest::{PluginLocation, PluginManifest};
pub use stats::ExecutionStats;
