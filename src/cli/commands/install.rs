use anyhow::Result;
use clap::Args;

use crate::cli::Invocation;
use crate::config::loader;
use crate::git::GitRepo;
use crate::hooks::install::{self, InstallAction, SUPPORTED_HOOKS};

#[derive(Args)]
pub struct InstallArgs {
    /// Specify which hooks to install (default: every configured hook)
    #[arg(long, value_delimiter = ',')]
    pub hooks: Option<Vec<String>>,

    /// Overwrite existing hooks
    #[arg(long)]
    pub force: bool,
}

pub async fn execute(args: InstallArgs, invocation: &Invocation) -> Result<i32> {
    let output = &invocation.output;
    let repo = GitRepo::discover(&invocation.cwd)?;
    let hooks_dir = repo.hooks_dir();

    let hooks: Vec<String> = match args.hooks {
        Some(hooks) => hooks,
        None => {
            let config = loader::load(&repo.workdir(), invocation.config.as_deref())?;
            let configured: Vec<String> = config
                .hooks
                .hooks
                .keys()
                .filter(|hook| install::is_supported(hook))
                .cloned()
                .collect();
            if configured.is_empty() {
                SUPPORTED_HOOKS.iter().map(|hook| hook.to_string()).collect()
            } else {
                configured
            }
        }
    };

    if let Some(unknown) = hooks.iter().find(|hook| !install::is_supported(hook)) {
        output.error(&format!(
            "Unsupported hook '{unknown}' (supported: {})",
            SUPPORTED_HOOKS.join(", ")
        ));
        return Ok(1);
    }

    output.info(&format!("Installing hooks into {}", hooks_dir.display()));
    if args.force {
        output.warning("Force mode enabled - will overwrite existing hooks");
    }

    let mut kept = 0;
    for hook in &hooks {
        match install::install_hook(&hooks_dir, hook, args.force)? {
            InstallAction::Created => output.success(&format!("{hook} installed")),
            InstallAction::Updated => output.success(&format!("{hook} updated")),
            InstallAction::Overwritten => output.warning(&format!("{hook} overwritten")),
            InstallAction::KeptForeign => {
                kept += 1;
                output.warning(&format!("{hook} exists and was not written by hookgate (use --force)"));
            }
        }
    }

    if kept > 0 {
        return Ok(1);
    }
    output.success("Hook installation completed!");
    Ok(0)
}
