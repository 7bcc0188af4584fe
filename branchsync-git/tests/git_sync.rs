//! End-to-end engine behavior against real git repositories.
//!
//! Layout per test: `seed` → bare `origin.git` → clones `local` (under sync)
//! and `pusher` (publishes new commits).

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use branchsync_core::{BranchName, SyncOutcome, VcsFailure};
use branchsync_git::{GitCli, SyncEngine, VcsError};
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args([
            "-c",
            "user.name=Syncer Test",
            "-c",
            "user.email=syncer@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn commit(dir: &Path, file: &str, content: &str) {
    fs::write(dir.join(file), content).expect("write file");
    git(dir, &["add", file]);
    git(dir, &["commit", "-q", "-m", &format!("update {file}")]);
}

struct Fixture {
    _tmp: TempDir,
    origin: PathBuf,
    local: PathBuf,
    pusher: PathBuf,
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().expect("tempdir");
    let seed = tmp.path().join("seed");
    fs::create_dir_all(&seed).expect("mkdir seed");
    git(&seed, &["init", "-q"]);
    git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    commit(&seed, "README.md", "seed\n");

    let origin = tmp.path().join("origin.git");
    let local = tmp.path().join("local");
    let pusher = tmp.path().join("pusher");
    let as_str = |p: &Path| p.to_str().expect("utf8 path").to_string();
    git(tmp.path(), &["clone", "-q", "--bare", &as_str(&seed), &as_str(&origin)]);
    git(tmp.path(), &["clone", "-q", &as_str(&origin), &as_str(&local)]);
    git(tmp.path(), &["clone", "-q", &as_str(&origin), &as_str(&pusher)]);

    Fixture {
        _tmp: tmp,
        origin,
        local,
        pusher,
    }
}

fn publish(fx: &Fixture, count: usize) {
    for i in 0..count {
        commit(&fx.pusher, &format!("remote-{i}.txt"), &format!("{i}\n"));
    }
    git(&fx.pusher, &["push", "-q", "origin", "main"]);
}

fn engine(dir: &Path) -> SyncEngine<GitCli> {
    SyncEngine::new(GitCli::discover(dir).expect("discover"), "origin")
}

fn main_branch() -> BranchName {
    BranchName::from("main")
}

#[test]
fn three_new_commits_fast_forward_local_branch() {
    let fx = fixture();
    publish(&fx, 3);

    let outcome = engine(&fx.local).evaluate(&main_branch());

    assert_eq!(outcome, SyncOutcome::Synced { commits: 3 });
    assert_eq!(
        git(&fx.local, &["rev-parse", "refs/heads/main"]),
        git(&fx.origin, &["rev-parse", "refs/heads/main"])
    );
    assert!(fx.local.join("remote-2.txt").exists(), "working tree follows the ref");
}

#[test]
fn nothing_new_is_up_to_date_and_leaves_repo_untouched() {
    let fx = fixture();
    let before = git(&fx.local, &["rev-parse", "HEAD"]);
    let engine = engine(&fx.local);

    assert_eq!(engine.evaluate(&main_branch()), SyncOutcome::UpToDate);
    assert_eq!(engine.evaluate(&main_branch()), SyncOutcome::UpToDate);
    assert_eq!(git(&fx.local, &["rev-parse", "HEAD"]), before);
}

#[test]
fn branch_without_upstream_is_no_upstream() {
    let fx = fixture();
    git(&fx.local, &["branch", "feature-x"]);

    let outcome = engine(&fx.local).evaluate(&BranchName::from("feature-x"));

    assert_eq!(outcome, SyncOutcome::NoUpstream);
    assert!(outcome.is_terminal());
}

#[test]
fn diverged_history_is_refused_and_ref_unchanged() {
    let fx = fixture();
    commit(&fx.local, "local-only.txt", "mine\n");
    publish(&fx, 1);
    let before = git(&fx.local, &["rev-parse", "refs/heads/main"]);

    let outcome = engine(&fx.local).evaluate(&main_branch());

    assert_eq!(outcome, SyncOutcome::VcsError(VcsFailure::Diverged));
    assert_eq!(git(&fx.local, &["rev-parse", "refs/heads/main"]), before);
}

#[test]
fn local_only_commits_are_up_to_date() {
    let fx = fixture();
    commit(&fx.local, "ahead.txt", "ahead\n");

    assert_eq!(engine(&fx.local).evaluate(&main_branch()), SyncOutcome::UpToDate);
}

#[test]
fn branch_not_checked_out_moves_ref_only() {
    let fx = fixture();
    git(&fx.local, &["checkout", "-q", "-b", "side"]);
    publish(&fx, 2);

    let outcome = engine(&fx.local).evaluate(&main_branch());

    assert_eq!(outcome, SyncOutcome::Synced { commits: 2 });
    assert_eq!(
        git(&fx.local, &["rev-parse", "refs/heads/main"]),
        git(&fx.origin, &["rev-parse", "refs/heads/main"])
    );
    assert_eq!(git(&fx.local, &["symbolic-ref", "--short", "HEAD"]), "side");
    assert!(!fx.local.join("remote-0.txt").exists(), "side's working tree untouched");
}

#[test]
fn branch_checked_out_in_another_worktree_is_left_alone() {
    let fx = fixture();
    let worktree = fx.local.parent().expect("tmp root").join("wt");
    git(&fx.local, &["checkout", "-q", "-b", "side"]);
    git(
        &fx.local,
        &["worktree", "add", "-q", worktree.to_str().expect("utf8"), "main"],
    );
    publish(&fx, 1);
    let before = git(&fx.local, &["rev-parse", "refs/heads/main"]);

    let outcome = engine(&fx.local).evaluate(&main_branch());

    match &outcome {
        SyncOutcome::VcsError(VcsFailure::CheckedOutElsewhere(path)) => assert_eq!(
            fs::canonicalize(path).expect("canonical worktree"),
            fs::canonicalize(&worktree).expect("canonical worktree")
        ),
        other => panic!("expected checked-out-elsewhere refusal, got {other:?}"),
    }
    assert!(outcome.is_terminal());
    assert_eq!(git(&fx.local, &["rev-parse", "refs/heads/main"]), before);
    assert_eq!(git(&worktree, &["status", "--porcelain"]), "", "worktree stays clean");
}

#[test]
fn missing_branch_is_not_found() {
    let fx = fixture();
    assert_eq!(
        engine(&fx.local).evaluate(&BranchName::from("does-not-exist")),
        SyncOutcome::NotFound
    );
}

#[test]
fn unreachable_remote_is_transport_failure() {
    let fx = fixture();
    let gone = fx.local.join("no-such-remote.git");
    git(&fx.local, &["remote", "set-url", "origin", gone.to_str().expect("utf8")]);

    match engine(&fx.local).evaluate(&main_branch()) {
        SyncOutcome::VcsError(VcsFailure::Transport(_)) => {}
        other => panic!("expected transport failure, got {other:?}"),
    }
}

#[test]
fn discover_resolves_root_from_subdirectory() {
    let fx = fixture();
    let nested = fx.local.join("nested").join("deeper");
    fs::create_dir_all(&nested).expect("mkdir nested");

    let git = GitCli::discover(&nested).expect("discover");
    let root = fs::canonicalize(&fx.local).expect("canonical root");
    assert_eq!(fs::canonicalize(&git.repo().root).expect("canonical"), root);
    assert!(git.repo().git_dir.ends_with(".git"));
    assert_eq!(git.current_branch().expect("current"), Some(main_branch()));
    assert_eq!(git.remotes().expect("remotes"), vec!["origin".to_string()]);
}

#[test]
fn discover_outside_repository_fails() {
    let plain = TempDir::new().expect("tempdir");
    let err = GitCli::discover(plain.path()).unwrap_err();
    assert!(matches!(err, VcsError::NotARepository { .. }), "got: {err}");
    assert!(err.to_string().contains("not in a git repository"));
}
