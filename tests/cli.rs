//! Binary tests against real temporary repositories

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn hookgate(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("hookgate").unwrap();
    cmd.current_dir(dir).env("HOME", dir).env_remove("RUST_LOG");
    cmd
}

fn git(dir: &Path, args: &[&str]) {
    let status = std::process::Command::new("git")
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(args)
        .current_dir(dir)
        .env("HOME", dir)
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?} failed");
}

/// A repository with one commit on `feature/test`, or None without git
fn repository() -> Option<tempfile::TempDir> {
    which::which("git").ok()?;
    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init", "-q"]);
    git(dir.path(), &["commit", "-q", "--allow-empty", "-m", "init"]);
    git(dir.path(), &["checkout", "-q", "-b", "feature/test"]);
    Some(dir)
}

#[test]
fn version_flag() {
    Command::cargo_bin("hookgate")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn version_as_json() {
    let dir = tempfile::tempdir().unwrap();
    hookgate(dir.path())
        .args(["version", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"hookgate\""));
}

#[test]
fn run_outside_a_repository_fails() {
    let dir = tempfile::tempdir().unwrap();
    hookgate(dir.path()).args(["run", "pre-commit"]).assert().failure();
}

#[test]
fn pre_commit_passes_on_feature_branch_and_blocks_on_main() {
    let Some(repo) = repository() else { return };

    let output = hookgate(repo.path())
        .args(["--format", "json", "run", "pre-commit"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "success");
    assert_eq!(report["branch"], "feature/test");
    assert_eq!(report["outcomes"][0]["name"], "protected-branch");

    git(repo.path(), &["checkout", "-q", "-B", "main"]);
    hookgate(repo.path())
        .args(["run", "pre-commit"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("protected-branch"));
}

#[test]
fn first_commit_in_an_empty_repository_is_not_blocked() {
    if which::which("git").is_err() {
        return;
    }
    let repo = tempfile::tempdir().unwrap();
    git(repo.path(), &["init", "-q"]);
    git(repo.path(), &["checkout", "-q", "-b", "feature/x"]);
    std::fs::write(repo.path().join("README.md"), "hello\n").unwrap();
    git(repo.path(), &["add", "README.md"]);

    let output = hookgate(repo.path())
        .args(["--format", "json", "run", "pre-commit"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "success");
    assert_eq!(report["branch"], "feature/x");
    assert_eq!(report["used_fallback"], false);
}

#[test]
fn unconfigured_hook_is_skipped() {
    let Some(repo) = repository() else { return };
    hookgate(repo.path()).args(["run", "post-merge"]).assert().success();
}

#[test]
fn commit_msg_hook_checks_the_message_file() {
    let Some(repo) = repository() else { return };
    std::fs::write(repo.path().join("MSG"), "feat(cli): add run command\n").unwrap();
    hookgate(repo.path()).args(["run", "commit-msg", "MSG"]).assert().success();

    std::fs::write(repo.path().join("MSG"), "did some stuff\n").unwrap();
    hookgate(repo.path()).args(["run", "commit-msg", "MSG"]).assert().code(1);
}

#[test]
fn install_and_uninstall_hooks() {
    let Some(repo) = repository() else { return };
    let hooks = repo.path().join(".git/hooks");

    hookgate(repo.path()).arg("install").assert().success();
    let script = std::fs::read_to_string(hooks.join("pre-commit")).unwrap();
    assert!(script.contains("# managed by hookgate"));
    assert!(script.contains("hookgate run pre-commit"));

    hookgate(repo.path()).arg("uninstall").assert().success();
    assert!(!hooks.join("pre-commit").exists());
}

#[test]
fn install_keeps_foreign_hooks_unless_forced() {
    let Some(repo) = repository() else { return };
    let hook = repo.path().join(".git/hooks/pre-commit");
    std::fs::create_dir_all(hook.parent().unwrap()).unwrap();
    std::fs::write(&hook, "#!/bin/sh\necho mine\n").unwrap();

    hookgate(repo.path())
        .args(["install", "--hooks", "pre-commit"])
        .assert()
        .code(1);
    assert_eq!(std::fs::read_to_string(&hook).unwrap(), "#!/bin/sh\necho mine\n");

    hookgate(repo.path())
        .args(["install", "--hooks", "pre-commit", "--force"])
        .assert()
        .success();
    assert!(std::fs::read_to_string(&hook).unwrap().contains("# managed by hookgate"));

    // uninstall never touches scripts it did not write
    std::fs::write(&hook, "#!/bin/sh\necho mine again\n").unwrap();
    hookgate(repo.path()).arg("uninstall").assert().success();
    assert!(hook.exists());
}

#[test]
fn repository_config_file_adds_hooks() {
    let Some(repo) = repository() else { return };
    std::fs::write(
        repo.path().join("hookgate.toml"),
        "[hooks.post-checkout]\nplugins = [\"clean-worktree\"]\n",
    )
    .unwrap();

    let output = hookgate(repo.path())
        .args(["--format", "json", "run", "post-checkout"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["status"], "success");

    hookgate(repo.path())
        .args(["config", "show", "cache", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ttl_secs"));
}

#[test]
fn status_reports_branch() {
    let Some(repo) = repository() else { return };
    hookgate(repo.path())
        .args(["status", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("feature/test"));
}
