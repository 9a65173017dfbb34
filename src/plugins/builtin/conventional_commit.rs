use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;

use crate::plugins::catalog::PluginSpec;
use crate::plugins::contract::{Plugin, PluginContext, PluginMetadata, PluginOutcome};

pub const KIND: &str = "conventional-commit";

const DEFAULT_TYPES: &[&str] = &[
    "feat", "fix", "docs", "style", "refactor", "test", "chore", "perf", "ci", "build", "revert",
];
const DEFAULT_MAX_SUBJECT: usize = 72;

/// Checks the commit subject against `type(scope)!: description`
///
/// Runs on `commit-msg`, where git passes the message file as the first
/// argument. Settings: `types`, `max_subject_length`.
pub struct ConventionalCommit {
    name: String,
    pattern: Regex,
    max_subject_length: usize,
}

impl ConventionalCommit {
    pub fn from_spec(spec: &PluginSpec) -> Result<Self> {
        let types: Vec<String> =
            spec.setting_or("types", DEFAULT_TYPES.iter().map(|t| t.to_string()).collect())?;
        let alternatives = types.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|");
        // type, then an optional scope and an optional "!" in either order
        let pattern = Regex::new(&format!(
            r"^(?:{alternatives})(?:\([^()]+\)!?|!(?:\([^()]+\))?)?: \S"
        ))?;

        Ok(Self {
            name: spec.name.clone(),
            pattern,
            max_subject_length: spec.setting_or("max_subject_length", DEFAULT_MAX_SUBJECT)?,
        })
    }

    /// Validate a full commit message as git writes it
    pub fn check_message(&self, message: &str) -> PluginOutcome {
        let subject = message
            .lines()
            .map(str::trim_end)
            .find(|line| !line.trim().is_empty() && !line.starts_with('#'));

        let Some(subject) = subject else {
            return PluginOutcome::failure("Commit message is empty");
        };

        // git generates these; they don't follow the format
        if subject.starts_with("Merge ") || subject.starts_with("Revert \"") {
            return PluginOutcome::success("Generated commit message accepted");
        }

        if !self.pattern.is_match(subject) {
            return PluginOutcome::failure(format!(
                "Commit message does not follow conventional commit format: '{subject}'"
            ))
            .with_detail("expected", "type(scope): description");
        }

        let length = subject.chars().count();
        if length > self.max_subject_length {
            return PluginOutcome::failure(format!(
                "Commit subject is {length} characters; the limit is {}",
                self.max_subject_length
            ));
        }

        PluginOutcome::success("Commit message follows conventional commit format")
    }
}

#[async_trait]
impl Plugin for ConventionalCommit {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new(&self.name)
            .category("commit-message")
            .description("Enforces conventional commit subjects")
    }

    fn should_skip(&self, context: &PluginContext) -> bool {
        context.args.is_empty()
    }

    async fn execute(&self, context: &PluginContext) -> Result<PluginOutcome> {
        let Some(file) = context.args.first() else {
            return Ok(PluginOutcome::skipped("No commit message file given"));
        };

        let path = Path::new(file);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            context.repo_path.join(path)
        };
        let message = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read commit message file {}", path.display()))?;

        Ok(self.check_message(&message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::contract::OutcomeStatus;

    fn plugin() -> ConventionalCommit {
        ConventionalCommit::from_spec(&PluginSpec::new(KIND, KIND)).unwrap()
    }

    #[test]
    fn test_accepted_subjects() {
        let plugin = plugin();
        for message in [
            "feat: add new feature",
            "fix: resolve bug",
            "feat(auth): add login functionality",
            "chore: update dependencies",
            "feat!: breaking change",
            "fix!(api): breaking fix",
            "feat(api)!: breaking fix",
            "# comment first\n\ndocs: explain things\n\nbody",
            "Merge branch 'main' into feature",
        ] {
            assert_eq!(plugin.check_message(message).status, OutcomeStatus::Success, "{message}");
        }
    }

    #[test]
    fn test_rejected_subjects() {
        let plugin = plugin();
        for message in ["add new feature", "bug fix", "feat:", "feat: ", "invalid: message", "", "# only a comment"] {
            assert_eq!(plugin.check_message(message).status, OutcomeStatus::Failure, "{message:?}");
        }
    }

    #[test]
    fn test_subject_length_limit() {
        let spec = PluginSpec::new(KIND, KIND).with_setting("max_subject_length", 20);
        let plugin = ConventionalCommit::from_spec(&spec).unwrap();
        assert_eq!(plugin.check_message("fix: short").status, OutcomeStatus::Success);
        let outcome = plugin.check_message("fix: this subject is far too long");
        assert_eq!(outcome.status, OutcomeStatus::Failure);
        assert!(outcome.message.contains("limit is 20"));
    }

    #[test]
    fn test_custom_types() {
        let spec = PluginSpec::new(KIND, KIND).with_setting("types", serde_json::json!(["wip"]));
        let plugin = ConventionalCommit::from_spec(&spec).unwrap();
        assert_eq!(plugin.check_message("wip: halfway").status, OutcomeStatus::Success);
        assert_eq!(plugin.check_message("feat: nope").status, OutcomeStatus::Failure);
    }

    #[tokio::test]
    async fn test_reads_message_file_relative_to_repo() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/COMMIT_EDITMSG"), "feat: from file\n").unwrap();

        let mut context = PluginContext::new("commit-msg", dir.path());
        context.args = vec![".git/COMMIT_EDITMSG".into()];

        let plugin = plugin();
        assert!(!plugin.should_skip(&context));
        let outcome = plugin.execute(&context).await.unwrap();
        assert_eq!(outcome.status, OutcomeStatus::Success);

        assert!(plugin.should_skip(&PluginContext::new("commit-msg", dir.path())));
    }
}
