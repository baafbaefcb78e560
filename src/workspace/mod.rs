//! The thin seam to the external manifest tool.
//!
//! The workspace (the multi-project checkout tree) is created and owned by
//! the manifest tool; everything here is a thin view over it: find the root,
//! map filesystem paths to workspace-relative project paths, and hand out
//! per-project handles whose branch operations shell out to `git`.

mod git;

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub use git::GitProject;

/// Name of the manifest tool's metadata directory at the workspace root.
/// The branchset state file and lock marker live inside it.
pub const METADATA_DIR: &str = ".repo";

/// Result of one branch operation against one project.
///
/// These are reported per project, never raised as errors: one project's
/// failure does not abort the surrounding loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    Success,
    /// The branch does not exist in that project.
    NotFound,
    Failed(String),
}

/// Branch operations on one project, keyed by its workspace-relative path.
///
/// Implemented by [`GitProject`] in production; tests substitute scripted
/// fakes.
pub trait ProjectHandle {
    /// Create the branch and switch the work tree onto it.
    fn start_branch(&self, branch: &str) -> BranchOutcome;

    /// Switch the work tree onto an existing branch.
    fn checkout_branch(&self, branch: &str) -> BranchOutcome;

    /// Delete the local branch.
    fn abandon_branch(&self, branch: &str) -> BranchOutcome;

    /// The project's work tree status, captured as text.
    fn worktree_status(&self) -> anyhow::Result<String>;

    /// The manifest-declared default revision for this project, if it can
    /// be determined.
    fn default_revision(&self) -> Option<String>;
}

/// Maps a normalized project path to a [`ProjectHandle`].
pub trait ProjectProvider {
    fn project(&self, path: &str) -> Box<dyn ProjectHandle>;
}

/// One umbrella workspace, rooted at the directory containing [`METADATA_DIR`].
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Walk up from `start` to the nearest directory containing the manifest
    /// tool's metadata directory.
    pub fn discover(start: &Path) -> Result<Self> {
        let mut dir = start.canonicalize()?;
        loop {
            if dir.join(METADATA_DIR).is_dir() {
                tracing::debug!(root = %dir.display(), "found workspace root");
                return Ok(Self { root: dir });
            }
            if !dir.pop() {
                return Err(Error::validation(format!(
                    "no workspace found above '{}'",
                    start.display()
                )));
            }
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join(METADATA_DIR)
    }

    /// Map an arbitrary filesystem path to a workspace-relative project path
    /// with `/` separators. Paths outside the workspace are refused.
    pub fn normalize_project_path(&self, raw: &Path) -> Result<String> {
        let absolute = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            std::env::current_dir()?.join(raw)
        };
        let canonical = absolute
            .canonicalize()
            .map_err(|_| Error::validation(format!("path '{}' does not exist", raw.display())))?;

        let relative = canonical.strip_prefix(&self.root).map_err(|_| {
            Error::validation(format!(
                "path '{}' is not part of the workspace",
                raw.display()
            ))
        })?;
        if relative.as_os_str().is_empty() {
            return Err(Error::validation(
                "the workspace root itself is not a project",
            ));
        }

        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Ok(parts.join("/"))
    }
}

impl ProjectProvider for Workspace {
    fn project(&self, path: &str) -> Box<dyn ProjectHandle> {
        Box::new(GitProject::new(self.root.join(path)))
    }
}
