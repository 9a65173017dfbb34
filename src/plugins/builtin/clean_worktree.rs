use anyhow::Result;
use async_trait::async_trait;

use crate::plugins::catalog::PluginSpec;
use crate::plugins::contract::{Plugin, PluginContext, PluginMetadata, PluginOutcome};

pub const KIND: &str = "clean-worktree";

/// Flags uncommitted changes before a push
///
/// Settings: `strict` turns the warning into a failure, `include_untracked`
/// also counts untracked files.
pub struct CleanWorktree {
    name: String,
    strict: bool,
    include_untracked: bool,
}

impl CleanWorktree {
    pub fn from_spec(spec: &PluginSpec) -> Result<Self> {
        Ok(Self {
            name: spec.name.clone(),
            strict: spec.setting_or("strict", false)?,
            include_untracked: spec.setting_or("include_untracked", false)?,
        })
    }
}

#[async_trait]
impl Plugin for CleanWorktree {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new(&self.name)
            .category("worktree")
            .description("Reports uncommitted changes before pushing")
    }

    async fn execute(&self, context: &PluginContext) -> Result<PluginOutcome> {
        let mut dirty = context.changed_files();
        if self.include_untracked {
            dirty.extend(context.untracked_files.iter().cloned());
        }

        if dirty.is_empty() {
            return Ok(PluginOutcome::success("Working tree is clean"));
        }

        let message = format!(
            "Working tree is not clean ({} file(s)). Please commit or stash your changes before pushing.",
            dirty.len()
        );
        let outcome = if self.strict {
            PluginOutcome::failure(message)
        } else {
            PluginOutcome::warning(message)
        };
        Ok(outcome
            .with_detail("files", dirty)
            .with_detail("stale_status", context.status_is_fallback))
    }
}
