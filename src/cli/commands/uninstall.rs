use anyhow::Result;
use clap::Args;

use crate::cli::Invocation;
use crate::git::GitRepo;
use crate::hooks::install::{self, SUPPORTED_HOOKS};

#[derive(Args)]
pub struct UninstallArgs {
    /// Only remove these hooks
    #[arg(long, value_delimiter = ',')]
    pub hooks: Option<Vec<String>>,
}

pub async fn execute(args: UninstallArgs, invocation: &Invocation) -> Result<i32> {
    let output = &invocation.output;
    let hooks_dir = GitRepo::discover(&invocation.cwd)?.hooks_dir();

    let hooks = args
        .hooks
        .unwrap_or_else(|| SUPPORTED_HOOKS.iter().map(|hook| hook.to_string()).collect());

    let mut removed = 0;
    for hook in &hooks {
        if install::remove_hook(&hooks_dir, hook)? {
            removed += 1;
            output.success(&format!("Removed {hook}"));
        }
    }

    if removed == 0 {
        output.info("No hookgate hooks found");
    } else {
        output.success(&format!("Removed {removed} hook(s)"));
    }
    Ok(0)
}
