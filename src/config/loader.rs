use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml, Yaml};
use std::path::{Path, PathBuf};

use super::HookgateConfig;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

pub const ENV_PREFIX: &str = "HOOKGATE_";

/// The layered configuration chain for one repository
pub struct ConfigLoader {
    figment: Figment,
}

impl ConfigLoader {
    /// Defaults, user config, repository config, `custom`, then environment
    pub fn new(repo_root: &Path, custom: Option<&Path>) -> Result<Self> {
        tracing::trace!(repo = %repo_root.display(), "loading configuration");

        let mut figment = Figment::from(Toml::string(DEFAULT_CONFIG));
        if let Some(user_base) = user_config_base_path() {
            figment = merge_any_format(figment, &user_base);
        }
        figment = merge_any_format(figment, &repo_root.join("hookgate"));

        if let Some(path) = custom {
            if !path.is_file() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            figment = match path.extension().and_then(|e| e.to_str()) {
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                Some("json") => figment.merge(Json::file(path)),
                _ => figment.merge(Toml::file(path)),
            };
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Ok(Self { figment })
    }

    pub fn figment(&self) -> &Figment {
        &self.figment
    }

    /// Typed and validated configuration
    pub fn extract(&self) -> Result<HookgateConfig> {
        let config: HookgateConfig = self.figment.extract().context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Get a nested section as JSON
    pub fn get_section(&self, path: &str) -> Result<serde_json::Value> {
        Ok(self.figment.extract_inner(path)?)
    }

    /// Get the full merged configuration as JSON
    pub fn get_full_config(&self) -> Result<serde_json::Value> {
        Ok(self.figment.extract()?)
    }
}

/// Load and validate in one step
pub fn load(repo_root: &Path, custom: Option<&Path>) -> Result<HookgateConfig> {
    ConfigLoader::new(repo_root, custom)?.extract()
}

// `base` without extension; every supported format is merged if present
fn merge_any_format(figment: Figment, base: &Path) -> Figment {
    figment
        .merge(Toml::file(base.with_extension("toml")))
        .merge(Yaml::file(base.with_extension("yaml")))
        .merge(Yaml::file(base.with_extension("yml")))
        .merge(Json::file(base.with_extension("json")))
}

fn user_config_base_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/hookgate/config"))
}
