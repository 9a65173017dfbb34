//! # Hookgate - git hooks backed by a resilient status cache
//!
//! Hookgate dispatches git hooks to pluggable checks. Repository status is
//! queried through the `git` executable, cached per repository with a TTL,
//! guarded by a circuit breaker and served from the last known-good snapshot
//! when git cannot be queried.
//!
//! ## Quick Start
//!
//! ```bash
//! cargo install hookgate
//!
//! # Write hook scripts into .git/hooks
//! hookgate install
//!
//! # Run a hook by hand
//! hookgate run pre-commit
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod git;
pub mod hooks;
pub mod parallel;
pub mod plugins;
pub mod shared;

pub use cli::Cli;
pub use config::HookgateConfig;
pub use context::Hookgate;
pub use error::HookgateError;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
