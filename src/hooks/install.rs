//! Hook script installation
//!
//! Installed scripts carry [`MANAGED_MARKER`] so that uninstall only removes
//! scripts hookgate wrote and install never clobbers a foreign hook unless forced.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub const MANAGED_MARKER: &str = "# managed by hookgate";

pub const SUPPORTED_HOOKS: &[&str] = &[
    "pre-commit",
    "prepare-commit-msg",
    "commit-msg",
    "post-commit",
    "post-checkout",
    "post-merge",
    "pre-push",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallAction {
    Created,
    /// Replaced an earlier hookgate script
    Updated,
    /// Replaced a foreign script because of `force`
    Overwritten,
    /// A foreign script exists and `force` was not given
    KeptForeign,
}

pub fn is_supported(hook: &str) -> bool {
    SUPPORTED_HOOKS.contains(&hook)
}

pub fn script(hook: &str) -> String {
    format!(
        "#!/bin/sh\n{MANAGED_MARKER}\n# Regenerate with `hookgate install`\nexec hookgate run {hook} \"$@\"\n"
    )
}

pub fn is_managed(path: &Path) -> bool {
    fs::read_to_string(path).is_ok_and(|content| content.contains(MANAGED_MARKER))
}

pub fn install_hook(hooks_dir: &Path, hook: &str, force: bool) -> Result<InstallAction> {
    if !is_supported(hook) {
        anyhow::bail!("unsupported hook '{hook}'");
    }

    fs::create_dir_all(hooks_dir)
        .with_context(|| format!("Failed to create hooks directory {}", hooks_dir.display()))?;

    let path = hooks_dir.join(hook);
    let action = if !path.exists() {
        InstallAction::Created
    } else if is_managed(&path) {
        InstallAction::Updated
    } else if force {
        InstallAction::Overwritten
    } else {
        return Ok(InstallAction::KeptForeign);
    };

    fs::write(&path, script(hook)).with_context(|| format!("Failed to write {}", path.display()))?;
    make_executable(&path)?;
    tracing::debug!(hook = %hook, path = %path.display(), ?action, "hook script written");
    Ok(action)
}

/// Remove a hookgate-managed script; foreign scripts are left alone
pub fn remove_hook(hooks_dir: &Path, hook: &str) -> Result<bool> {
    let path = hooks_dir.join(hook);
    if !path.exists() || !is_managed(&path) {
        return Ok(false);
    }
    fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
    Ok(true)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_update_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let hooks = dir.path().join("hooks");

        assert_eq!(install_hook(&hooks, "pre-commit", false).unwrap(), InstallAction::Created);
        assert!(is_managed(&hooks.join("pre-commit")));
        assert_eq!(install_hook(&hooks, "pre-commit", false).unwrap(), InstallAction::Updated);

        let content = fs::read_to_string(hooks.join("pre-commit")).unwrap();
        assert!(content.starts_with("#!/bin/sh\n"));
        assert!(content.contains("hookgate run pre-commit \"$@\""));

        assert!(remove_hook(&hooks, "pre-commit").unwrap());
        assert!(!hooks.join("pre-commit").exists());
        assert!(!remove_hook(&hooks, "pre-commit").unwrap());
    }

    #[test]
    fn test_foreign_hooks_are_protected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pre-push"), "#!/bin/sh\necho mine\n").unwrap();

        assert_eq!(install_hook(dir.path(), "pre-push", false).unwrap(), InstallAction::KeptForeign);
        assert!(!remove_hook(dir.path(), "pre-push").unwrap());
        assert!(dir.path().join("pre-push").exists());

        assert_eq!(install_hook(dir.path(), "pre-push", true).unwrap(), InstallAction::Overwritten);
        assert!(is_managed(&dir.path().join("pre-push")));
    }

    #[test]
    fn test_unsupported_hook() {
        let dir = tempfile::tempdir().unwrap();
        assert!(install_hook(dir.path(), "pre-rebase-typo", false).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_scripts_are_executable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        install_hook(dir.path(), "commit-msg", false).unwrap();
        let mode = fs::metadata(dir.path().join("commit-msg")).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}
