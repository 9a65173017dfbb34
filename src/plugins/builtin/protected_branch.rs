use anyhow::Result;
use async_trait::async_trait;

use crate::plugins::catalog::PluginSpec;
use crate::plugins::contract::{Plugin, PluginContext, PluginMetadata, PluginOutcome};
use crate::shared::PatternSet;

pub const KIND: &str = "protected-branch";

/// Refuses direct commits to protected branches
///
/// Settings: `branches`, a list of globs (default `["main", "master"]`).
pub struct ProtectedBranch {
    name: String,
    branches: PatternSet,
}

impl ProtectedBranch {
    pub fn from_spec(spec: &PluginSpec) -> Result<Self> {
        let branches: Vec<String> =
            spec.setting_or("branches", vec!["main".to_string(), "master".to_string()])?;
        Ok(Self {
            name: spec.name.clone(),
            branches: PatternSet::new(&branches)?,
        })
    }
}

#[async_trait]
impl Plugin for ProtectedBranch {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new(&self.name)
            .category("branch")
            .priority(100)
            .description("Blocks direct commits to protected branches")
    }

    async fn execute(&self, context: &PluginContext) -> Result<PluginOutcome> {
        if self.branches.is_match(&context.branch) {
            return Ok(PluginOutcome::failure(format!(
                "Direct commits to protected branch '{}' are not allowed. \
                 Please create a feature branch and submit a pull request.",
                context.branch
            ))
            .with_detail("branch", context.branch.clone()));
        }

        Ok(PluginOutcome::success(format!("Branch '{}' is not protected", context.branch)))
    }
}
