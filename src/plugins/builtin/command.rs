use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use crate::plugins::catalog::PluginSpec;
use crate::plugins::contract::{Plugin, PluginContext, PluginMetadata, PluginOutcome};
use crate::shared::PatternSet;

/// Runs a configured shell command
///
/// Settings:
/// - `run` (required): passed to `sh -c`; `$1..$n` are replaced with the hook
///   arguments and `{files}` with the matching changed files, each value
///   shell-quoted as a single word
/// - `patterns`: globs; the plugin is skipped when no changed file matches
/// - `fail_on_error` (default true): a non-zero exit is a Failure, otherwise a Warning
/// - `description`
pub struct CommandPlugin {
    name: String,
    run: String,
    patterns: PatternSet,
    fail_on_error: bool,
    description: String,
    dependencies: Vec<String>,
}

impl CommandPlugin {
    pub fn from_spec(spec: &PluginSpec) -> Result<Self> {
        let Some(run) = spec.setting::<String>("run")? else {
            bail!("plugin '{}' has no 'run' command configured", spec.name);
        };
        if run.trim().is_empty() {
            bail!("plugin '{}' has an empty 'run' command", spec.name);
        }

        let patterns: Vec<String> = spec.setting_or("patterns", Vec::new())?;
        let dependencies = match spec.setting::<Vec<String>>("dependencies")? {
            Some(explicit) => explicit,
            None => program_of(&run).into_iter().collect(),
        };

        Ok(Self {
            name: spec.name.clone(),
            description: spec.setting_or("description", format!("Runs `{run}`"))?,
            patterns: PatternSet::new(&patterns)?,
            fail_on_error: spec.setting_or("fail_on_error", true)?,
            run,
            dependencies,
        })
    }

    fn matching_files(&self, context: &PluginContext) -> Vec<String> {
        let changed = context.changed_files();
        if self.patterns.is_empty() {
            return changed;
        }
        self.patterns.filter(&changed).into_iter().cloned().collect()
    }

    /// The command line after argument and file substitution
    ///
    /// One left-to-right pass, so substituted text is never rescanned.
    pub fn render(&self, context: &PluginContext) -> String {
        let mut command = String::with_capacity(self.run.len());
        let mut rest = self.run.as_str();

        while let Some(at) = rest.find(['$', '{']) {
            command.push_str(&rest[..at]);
            rest = &rest[at..];

            if let Some(after) = rest.strip_prefix("{files}") {
                let files: Vec<String> = self.matching_files(context).iter().map(|f| shell_quote(f)).collect();
                command.push_str(&files.join(" "));
                rest = after;
                continue;
            }

            let digits = rest[1..].bytes().take_while(u8::is_ascii_digit).count();
            let arg = rest
                .starts_with('$')
                .then(|| rest[1..=digits].parse::<usize>().ok())
                .flatten()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| context.args.get(i));
            match arg {
                Some(arg) => {
                    command.push_str(&shell_quote(arg));
                    rest = &rest[1 + digits..];
                }
                None => {
                    command.push_str(&rest[..1]);
                    rest = &rest[1..];
                }
            }
        }
        command.push_str(rest);
        command
    }
}

/// Quote `value` so `sh` reads it back as exactly one word
fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./,:=@%+".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "'\\''"))
    }
}

/// First word of a command line that is not an environment assignment
fn program_of(command: &str) -> Option<String> {
    command
        .split_whitespace()
        .find(|word| !word.contains('='))
        .filter(|word| !word.starts_with('$'))
        .map(str::to_string)
}

#[async_trait]
impl Plugin for CommandPlugin {
    fn metadata(&self) -> PluginMetadata {
        let mut metadata = PluginMetadata::new(&self.name)
            .category("command")
            .description(&self.description);
        metadata.dependencies = self.dependencies.clone();
        metadata
    }

    fn should_skip(&self, context: &PluginContext) -> bool {
        !self.patterns.is_empty() && self.matching_files(context).is_empty()
    }

    async fn execute(&self, context: &PluginContext) -> Result<PluginOutcome> {
        let command_line = self.render(context);
        tracing::debug!(plugin = %self.name, command = %command_line, "running command");

        let output = Command::new("sh")
            .arg("-c")
            .arg(&command_line)
            .current_dir(&context.repo_path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to spawn `{command_line}`"))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        let outcome = if output.status.success() {
            PluginOutcome::success(self.description.clone())
        } else if self.fail_on_error {
            PluginOutcome::failure(format!("Command failed: {command_line}"))
        } else {
            PluginOutcome::warning(format!("Command failed (continuing): {command_line}"))
        };

        Ok(outcome
            .with_exit_code(output.status.code())
            .with_output(stdout, stderr))
    }
}
