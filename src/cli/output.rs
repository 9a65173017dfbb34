//! Console output for hookgate commands
//!
//! Human output goes through [`Output`]; machine output (`--format json|yaml`)
//! is a single serialized document on stdout so it can be piped.

use anyhow::Result;
use clap::ValueEnum;
use console::style;
use serde::Serialize;

use crate::plugins::OutcomeStatus;

pub const CHECK_MARK: &str = "✔";
pub const CROSS_MARK: &str = "✖";
pub const WARNING_SIGN: &str = "⚠";
pub const INFORMATION: &str = "ℹ";
pub const SKIP_MARK: &str = "↷";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy)]
pub struct Output {
    quiet: bool,
    format: OutputFormat,
}

impl Output {
    pub fn new(quiet: bool, format: OutputFormat) -> Self {
        Self { quiet, format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn is_text(&self) -> bool {
        self.format == OutputFormat::Text
    }

    fn chatty(&self) -> bool {
        !self.quiet && self.is_text()
    }

    pub fn success(&self, message: &str) {
        if self.chatty() {
            println!("{} {}", style(CHECK_MARK).green(), message);
        }
    }

    pub fn warning(&self, message: &str) {
        if self.chatty() {
            println!("{} {}", style(WARNING_SIGN).yellow(), style(message).yellow());
        }
    }

    pub fn info(&self, message: &str) {
        if self.chatty() {
            println!("{} {}", style(INFORMATION).blue(), message);
        }
    }

    /// Always shown, on stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style(CROSS_MARK).red(), style(message).red());
    }

    pub fn header(&self, title: &str) {
        if self.chatty() {
            println!("\n{}", style(title).bold().underlined());
        }
    }

    /// Indented `label: value` line
    pub fn field(&self, label: &str, value: impl std::fmt::Display) {
        if self.chatty() {
            println!("  {}: {}", style(label).dim(), style(value).cyan());
        }
    }

    pub fn plain(&self, line: &str) {
        if self.chatty() {
            println!("{line}");
        }
    }

    /// Status line for a plugin or hook result
    pub fn status(&self, status: OutcomeStatus, label: &str, message: &str) {
        match status {
            OutcomeStatus::Error | OutcomeStatus::Failure => {
                eprintln!("{} {} {}", style(CROSS_MARK).red(), style(label).bold(), message)
            }
            _ if !self.chatty() => {}
            OutcomeStatus::Success => println!("{} {} {}", style(CHECK_MARK).green(), style(label).bold(), message),
            OutcomeStatus::Warning => println!("{} {} {}", style(WARNING_SIGN).yellow(), style(label).bold(), message),
            OutcomeStatus::Skipped => println!("{} {} {}", style(SKIP_MARK).dim(), style(label).dim(), style(message).dim()),
        }
    }

    /// Print `value` as a JSON or YAML document; returns false in text mode
    pub fn emit<T: Serialize>(&self, value: &T) -> Result<bool> {
        match self.format {
            OutputFormat::Text => Ok(false),
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(value)?);
                Ok(true)
            }
            OutputFormat::Yaml => {
                print!("{}", serde_yml::to_string(value)?);
                Ok(true)
            }
        }
    }
}
