use anyhow::Result;
use clap::{Args, Subcommand};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::Invocation;
use crate::plugins::{PluginContext, PluginLocation};

#[derive(Args)]
pub struct PluginsArgs {
    #[command(subcommand)]
    pub command: Option<PluginsCommand>,
}

#[derive(Subcommand)]
pub enum PluginsCommand {
    /// Show loaded plugins with their metadata and load failures
    List,
    /// Show every available plugin without loading it
    Discover,
    /// Execute one plugin against the current repository status
    Exec {
        /// Plugin name
        name: String,
        /// Hook name placed in the plugin context
        #[arg(long, default_value = "pre-commit")]
        hook: String,
        /// Timeout in seconds, overriding the declared one
        #[arg(long)]
        timeout: Option<u64>,
        /// Hook arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

pub async fn execute(args: PluginsArgs, invocation: &Invocation) -> Result<i32> {
    match args.command.unwrap_or(PluginsCommand::List) {
        PluginsCommand::List => list(invocation).await,
        PluginsCommand::Discover => discover(invocation).await,
        PluginsCommand::Exec {
            name,
            hook,
            timeout,
            args,
        } => exec(invocation, &name, &hook, timeout.map(Duration::from_secs), args).await,
    }
}

async fn list(invocation: &Invocation) -> Result<i32> {
    let output = &invocation.output;
    let hookgate = super::open(invocation)?;
    let plugins = hookgate.plugins.list();
    hookgate.shutdown().await;

    if output.emit(&serde_json::json!({ "plugins": plugins, "failed": hookgate.load_summary.failed }))? {
        return Ok(0);
    }

    output.header("Loaded plugins");
    for info in &plugins {
        let meta = &info.metadata;
        let state = if info.enabled { "" } else { " (disabled)" };
        output.success(&format!("{} {}{}", meta.name, meta.version, state));
        output.field("source", &info.location);
        output.field("category", &meta.category);
        output.field("priority", meta.priority);
        if !meta.description.is_empty() {
            output.field("description", &meta.description);
        }
        if !meta.supports_parallel {
            output.field("parallel", "no");
        }
    }
    for (name, reason) in &hookgate.load_summary.failed {
        output.warning(&format!("{name}: {reason}"));
    }
    Ok(0)
}

async fn discover(invocation: &Invocation) -> Result<i32> {
    let output = &invocation.output;
    let hookgate = super::open(invocation)?;
    let found: BTreeMap<String, PluginLocation> = hookgate.plugins.discover();
    hookgate.shutdown().await;

    if output.emit(&found)? {
        return Ok(0);
    }
    output.header(&format!("{} plugin(s) available", found.len()));
    for (name, location) in &found {
        output.field(name, location);
    }
    Ok(0)
}

async fn exec(
    invocation: &Invocation,
    name: &str,
    hook: &str,
    timeout: Option<Duration>,
    args: Vec<String>,
) -> Result<i32> {
    let output = &invocation.output;
    let hookgate = super::open(invocation)?;
    let snapshot = hookgate
        .caches
        .get_default(&hookgate.repo_root)?
        .get_status(false)
        .await;

    let context = Arc::new(PluginContext::from_snapshot(hook, &hookgate.repo_root, &snapshot, args));
    let outcome = hookgate.plugins.execute(name, context, timeout).await;
    hookgate.shutdown().await;

    if !output.emit(&outcome)? {
        output.status(outcome.status, name, &outcome.message);
        for (key, value) in &outcome.details {
            output.field(key, value);
        }
    }
    Ok(outcome.status.exit_code())
}
