use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::{Invocation, OutputFormat};
use crate::config::ConfigLoader;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the merged configuration, or one dotted section of it
    Show {
        /// e.g. `cache` or `hooks.pre-commit`
        section: Option<String>,
    },
    /// Check that the merged configuration is valid
    Validate,
}

pub async fn execute(args: ConfigArgs, invocation: &Invocation) -> Result<i32> {
    let output = &invocation.output;
    let root = super::repo_root(invocation)?;
    let loader = ConfigLoader::new(&root, invocation.config.as_deref())?;

    match args.command {
        ConfigCommand::Show { section: Some(section) } => {
            let value = loader.get_section(&section)?;
            if !output.emit(&value)? {
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
        }
        ConfigCommand::Show { section: None } => {
            let config = loader.extract()?;
            match output.format() {
                OutputFormat::Text => print!("{}", toml::to_string_pretty(&config)?),
                _ => {
                    output.emit(&config)?;
                }
            }
        }
        ConfigCommand::Validate => match loader.extract() {
            Ok(_) => output.success("Configuration is valid"),
            Err(e) => {
                output.error(&format!("{e:#}"));
                return Ok(1);
            }
        },
    }
    Ok(0)
}
