use std::path::PathBuf;
use std::process::{Command, Output};

use anyhow::Context;

use super::{BranchOutcome, ProjectHandle};

/// A project handle backed by the `git` binary. Every operation is one
/// short-lived subprocess against the project's work tree; git semantics are
/// never reimplemented here.
#[derive(Debug, Clone)]
pub struct GitProject {
    dir: PathBuf,
}

impl GitProject {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn git(&self, args: &[&str]) -> std::io::Result<Output> {
        tracing::debug!(dir = %self.dir.display(), ?args, "running git");
        Command::new("git")
            .arg("-C")
            .arg(&self.dir)
            .args(args)
            .output()
    }

    fn branch_exists(&self, branch: &str) -> bool {
        let reference = format!("refs/heads/{branch}");
        self.git(&["rev-parse", "--verify", "--quiet", reference.as_str()])
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    fn run(&self, args: &[&str]) -> BranchOutcome {
        match self.git(args) {
            Ok(out) if out.status.success() => BranchOutcome::Success,
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                BranchOutcome::Failed(stderr.trim().to_string())
            }
            Err(err) => BranchOutcome::Failed(err.to_string()),
        }
    }
}

impl ProjectHandle for GitProject {
    fn start_branch(&self, branch: &str) -> BranchOutcome {
        if self.branch_exists(branch) {
            // Already started here, possibly by an earlier partial run.
            return self.run(&["checkout", branch]);
        }
        self.run(&["checkout", "-b", branch])
    }

    fn checkout_branch(&self, branch: &str) -> BranchOutcome {
        if !self.branch_exists(branch) {
            return BranchOutcome::NotFound;
        }
        self.run(&["checkout", branch])
    }

    fn abandon_branch(&self, branch: &str) -> BranchOutcome {
        if !self.branch_exists(branch) {
            return BranchOutcome::NotFound;
        }
        self.run(&["branch", "-D", branch])
    }

    fn worktree_status(&self) -> anyhow::Result<String> {
        let out = self
            .git(&["status", "--short", "--branch"])
            .with_context(|| format!("running git status in {}", self.dir.display()))?;
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }

    fn default_revision(&self) -> Option<String> {
        let out = self
            .git(&["symbolic-ref", "--short", "refs/remotes/origin/HEAD"])
            .ok()?;
        if !out.status.success() {
            return None;
        }
        let full = String::from_utf8_lossy(&out.stdout).trim().to_string();
        // "origin/main" -> "main"
        Some(
            full.split_once('/')
                .map(|(_, branch)| branch.to_string())
                .unwrap_or(full),
        )
    }
}
