//! On-disk plugin units
//!
//! A unit is `<plugins dir>/<name>.toml`:
//!
//! ```toml
//! kind = "command"
//! description = "Formatting"
//! timeout_secs = 30
//!
//! [settings]
//! run = "cargo fmt --check"
//! patterns = ["**/*.rs"]
//! ```

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::contract::PluginMetadata;

pub const MANIFEST_EXTENSION: &str = "toml";

/// Where a discovered plugin comes from
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum PluginLocation {
    /// A catalog kind instantiated without a manifest
    Builtin(String),
    Manifest(PathBuf),
}

impl std::fmt::Display for PluginLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginLocation::Builtin(kind) => write!(f, "builtin:{kind}"),
            PluginLocation::Manifest(path) => write!(f, "{}", path.display()),
        }
    }
}

impl Serialize for PluginLocation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum KindField {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginManifest {
    kind: KindField,
    pub version: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub priority: Option<i32>,
    pub timeout_secs: Option<u64>,
    pub supports_parallel: Option<bool>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
}

impl PluginManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plugin manifest {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid plugin manifest {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// The single kind this unit implements
    pub fn kind(&self) -> Result<&str> {
        match &self.kind {
            KindField::One(kind) => Ok(kind),
            KindField::Many(kinds) if kinds.len() == 1 => Ok(&kinds[0]),
            KindField::Many(kinds) if kinds.is_empty() => bail!("manifest declares no plugin kind"),
            KindField::Many(kinds) => bail!(
                "manifest declares {} plugin kinds ({}); exactly one is required",
                kinds.len(),
                kinds.join(", ")
            ),
        }
    }

    /// Apply manifest overrides on top of what the plugin reports
    pub fn apply(&self, metadata: &mut PluginMetadata) {
        if let Some(version) = &self.version {
            metadata.version = version.clone();
        }
        if let Some(category) = &self.category {
            metadata.category = category.clone();
        }
        if let Some(description) = &self.description {
            metadata.description = description.clone();
        }
        if let Some(priority) = self.priority {
            metadata.priority = priority;
        }
        if let Some(secs) = self.timeout_secs {
            metadata.timeout = std::time::Duration::from_secs(secs);
        }
        if let Some(parallel) = self.supports_parallel {
            metadata.supports_parallel = parallel;
        }
        for dependency in &self.dependencies {
            if !metadata.dependencies.contains(dependency) {
                metadata.dependencies.push(dependency.clone());
            }
        }
    }
}

/// Manifest files directly inside `dir`, keyed by file stem
///
/// A missing directory yields nothing. Nothing is parsed.
pub fn scan_directory(dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let mut found = BTreeMap::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read plugin directory {}", dir.display()));
        }
    };

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(MANIFEST_EXTENSION) {
            continue;
        }
        if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
            found.insert(name.to_string(), path);
        }
    }

    Ok(found)
}
