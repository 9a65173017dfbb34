//! Hook dispatch
//!
//! A hook invocation goes through four steps: read repository status from the
//! cache, select plugins with [`plan::build_plan`], run them through the
//! plugin manager, and fold the outcomes with [`aggregate::fold`].

pub mod aggregate;
pub mod config;
pub mod dispatcher;
pub mod install;
pub mod plan;

pub use aggregate::Aggregate;
pub use config::{HookConfig, HookDefinition, PluginRef};
pub use dispatcher::{HookDispatcher, HookReport, PluginResult};
pub use plan::{ChangeSummary, HookExecutionPlan, PlannedPlugin, Selection};
