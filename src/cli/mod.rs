use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;
pub mod output;

pub use output::{Output, OutputFormat};

use commands::{cache, config, install, plugins, run, status, uninstall, version};

#[derive(Parser)]
#[command(
    name = "hookgate",
    version = env!("CARGO_PKG_VERSION"),
    about = "Git hook runner with a resilient status cache and pluggable checks",
    long_about = "Hookgate dispatches git hooks to configured plugins. Repository status is \
                  cached per repository, guarded by a circuit breaker, and served from the \
                  last known-good snapshot when git cannot be queried."
)]
pub struct Cli {
    /// Run as if started in <DIR> instead of current working directory
    #[arg(short = 'C', long = "directory", global = true)]
    pub directory: Option<PathBuf>,

    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a hook against the current repository
    Run(run::RunArgs),
    /// Show repository, cache and hook installation status
    Status(status::StatusArgs),
    /// Inspect the repository status cache
    Cache(cache::CacheArgs),
    /// List and inspect plugins
    Plugins(plugins::PluginsArgs),
    /// Install hook scripts into the current repository
    Install(install::InstallArgs),
    /// Remove hook scripts written by hookgate
    Uninstall(uninstall::UninstallArgs),
    /// Configuration management
    Config(config::ConfigArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Everything a subcommand needs from the global flags
pub struct Invocation {
    pub cwd: PathBuf,
    pub config: Option<PathBuf>,
    pub output: Output,
}

impl Cli {
    /// Returns the process exit code
    pub async fn run(self) -> Result<i32> {
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)?;
        }

        setup_logging(self.verbose, self.quiet);

        let invocation = Invocation {
            cwd: std::env::current_dir()?,
            config: self.config,
            output: Output::new(self.quiet, self.format),
        };

        match self.command {
            Some(Commands::Run(args)) => run::execute(args, &invocation).await,
            Some(Commands::Status(args)) => status::execute(args, &invocation).await,
            Some(Commands::Cache(args)) => cache::execute(args, &invocation).await,
            Some(Commands::Plugins(args)) => plugins::execute(args, &invocation).await,
            Some(Commands::Install(args)) => install::execute(args, &invocation).await,
            Some(Commands::Uninstall(args)) => uninstall::execute(args, &invocation).await,
            Some(Commands::Config(args)) => config::execute(args, &invocation).await,
            Some(Commands::Version(args)) => version::execute(args, &invocation).await,
            None => {
                // Default behavior - show status if in git repo, otherwise point at help
                if crate::git::GitRepo::discover(&invocation.cwd).is_ok() {
                    status::execute(status::StatusArgs::default(), &invocation).await
                } else {
                    invocation.output.info("Run 'hookgate --help' for usage information");
                    Ok(0)
                }
            }
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => tracing_subscriber::EnvFilter::new("warn"),
        1 => tracing_subscriber::EnvFilter::new("info,globset=warn"),
        2 => tracing_subscriber::EnvFilter::new("debug,globset=warn"),
        _ => tracing_subscriber::EnvFilter::new("trace"),
    });

    // stderr keeps `--format json` output parseable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
