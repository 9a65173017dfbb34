//! Plugins shipped with hookgate

pub mod clean_worktree;
pub mod command;
pub mod conventional_commit;
pub mod protected_branch;

pub use clean_worktree::CleanWorktree;
pub use command::CommandPlugin;
pub use conventional_commit::ConventionalCommit;
pub use protected_branch::ProtectedBranch;

use super::catalog::PluginCatalog;
use super::contract::Plugin;

pub fn register_all(catalog: &mut PluginCatalog) {
    catalog.register("command", |spec| Ok(Box::new(CommandPlugin::from_spec(spec)?) as Box<dyn Plugin>));
    catalog.register_builtin(conventional_commit::KIND, |spec| {
        Ok(Box::new(ConventionalCommit::from_spec(spec)?) as Box<dyn Plugin>)
    });
    catalog.register_builtin(protected_branch::KIND, |spec| {
        Ok(Box::new(ProtectedBranch::from_spec(spec)?) as Box<dyn Plugin>)
    });
    catalog.register_builtin(clean_worktree::KIND, |spec| {
        Ok(Box::new(CleanWorktree::from_spec(spec)?) as Box<dyn Plugin>)
    });
}
