use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::Invocation;
use crate::context::Hookgate;
use crate::git::{GitRepo, StatusSnapshot};
use crate::hooks::install::{SUPPORTED_HOOKS, is_managed};

#[derive(Args, Default)]
pub struct StatusArgs {
    /// Bypass the cached snapshot
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Debug, Serialize)]
struct HookState {
    hook: &'static str,
    installed: bool,
    /// A hook script exists that hookgate did not write
    foreign: bool,
    configured: bool,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    repo_root: PathBuf,
    status: StatusSnapshot,
    hooks: Vec<HookState>,
    plugins_loaded: Vec<String>,
    plugins_failed: Vec<(String, String)>,
}

pub async fn execute(args: StatusArgs, invocation: &Invocation) -> Result<i32> {
    let output = &invocation.output;

    let repo = match GitRepo::discover(&invocation.cwd) {
        Ok(repo) => repo,
        Err(_) => {
            output.error("Not in a git repository");
            return Ok(1);
        }
    };

    let hookgate = Hookgate::open(&invocation.cwd, invocation.config.as_deref())?;
    let cache = hookgate.caches.get_default(&hookgate.repo_root)?;
    let snapshot = cache.get_status(args.refresh).await;

    let hooks_dir = repo.hooks_dir();
    let hooks: Vec<HookState> = SUPPORTED_HOOKS
        .iter()
        .map(|&hook| {
            let path = hooks_dir.join(hook);
            let installed = is_managed(&path);
            HookState {
                hook,
                installed,
                foreign: path.exists() && !installed,
                configured: hookgate.config.hooks.get(hook).is_some(),
            }
        })
        .collect();

    let report = StatusReport {
        repo_root: hookgate.repo_root.clone(),
        status: snapshot,
        hooks,
        plugins_loaded: hookgate.load_summary.loaded.clone(),
        plugins_failed: hookgate.load_summary.failed.clone(),
    };
    hookgate.shutdown().await;

    if output.emit(&report)? {
        return Ok(0);
    }

    output.header("Repository");
    output.field("root", report.repo_root.display());
    if report.status.is_placeholder() {
        output.warning("repository status unavailable");
    } else {
        output.field("branch", &report.status.current_branch);
        output.field("staged", report.status.staged_files.len());
        output.field("modified", report.status.modified_files.len());
        output.field("untracked", report.status.untracked_files.len());
        if let Some(ahead) = report.status.ahead_of_upstream {
            output.field("ahead of upstream", ahead);
        }
        if !report.status.degraded.is_empty() {
            output.warning(&format!("degraded queries: {}", report.status.degraded.join(", ")));
        }
    }

    output.header("Hooks");
    for state in &report.hooks {
        match (state.installed, state.foreign, state.configured) {
            (true, _, true) => output.success(state.hook),
            (true, _, false) => output.info(&format!("{} (installed, no plugins configured)", state.hook)),
            (false, true, _) => output.warning(&format!("{} (foreign script)", state.hook)),
            (false, false, true) => output.warning(&format!("{} (configured, not installed)", state.hook)),
            (false, false, false) => {}
        }
    }

    output.header("Plugins");
    for name in &report.plugins_loaded {
        output.success(name);
    }
    for (name, reason) in &report.plugins_failed {
        output.warning(&format!("{name}: {reason}"));
    }

    Ok(0)
}
