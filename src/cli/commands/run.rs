use anyhow::Result;
use clap::Args;
use console::style;

use crate::cli::Invocation;
use crate::plugins::OutcomeStatus;

#[derive(Args, Clone)]
pub struct RunArgs {
    /// Hook name to run
    pub hook: String,

    /// Arguments git passed to the hook
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

pub async fn execute(args: RunArgs, invocation: &Invocation) -> Result<i32> {
    let output = &invocation.output;
    let hookgate = super::open(invocation)?;

    let report = hookgate.run_hook(&args.hook, args.args).await;
    hookgate.shutdown().await;

    if output.emit(&report)? {
        return Ok(report.exit_code());
    }

    for result in &report.outcomes {
        let outcome = &result.outcome;
        let label = if result.blocking {
            result.name.clone()
        } else {
            format!("{} (advisory)", result.name)
        };
        output.status(outcome.status, &label, &outcome.message);

        if matches!(outcome.status, OutcomeStatus::Failure | OutcomeStatus::Error) {
            for line in outcome.stdout.lines().chain(outcome.stderr.lines()) {
                eprintln!("    {}", style(line).dim());
            }
        }
    }
    if report.used_fallback {
        output.warning("repository status was served from the fallback snapshot");
    }
    output.status(report.status, &report.hook, &report.reason);

    Ok(report.exit_code())
}
