use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

use hookgate::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let code = cli.run().await?;
    Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
}
