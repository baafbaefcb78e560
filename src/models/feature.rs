use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A named set of per-project branch overrides plus a default branch.
///
/// Features are how a change spanning several projects is handled as one
/// unit: every project the feature touches is registered under it, and
/// switching the feature checks each project out onto its effective branch.
/// The same project path may belong to any number of features independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    /// The feature's name; always equal to its key in [`StoreData::features`].
    /// Backfilled from the key on load for older data files.
    #[serde(default)]
    pub name: String,

    /// Branch applied to any project in this feature without an explicit
    /// override. Defaults to the feature's own name at creation time.
    #[serde(default)]
    pub default_branch: String,

    /// Overrides keyed by normalized workspace-relative project path.
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectOverride>,
}

impl Feature {
    pub fn new(name: &str, default_branch: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            default_branch: default_branch.unwrap_or(name).to_string(),
            projects: BTreeMap::new(),
        }
    }

    /// The branch this feature requests for `path`: the override branch if
    /// present and non-empty, else the feature's default branch.
    ///
    /// This is the single resolution rule; every branch-changing command
    /// goes through it.
    pub fn effective_branch(&self, path: &str) -> &str {
        self.projects
            .get(path)
            .and_then(|p| p.branch.as_deref())
            .filter(|b| !b.is_empty())
            .unwrap_or(&self.default_branch)
    }
}

/// One feature's requested branch for one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectOverride {
    /// Workspace-relative project path; always equal to its key in
    /// [`Feature::projects`]. Backfilled from the key on load.
    #[serde(default)]
    pub path: String,

    /// Explicit branch for this project, or `None` to follow the feature's
    /// default branch. An empty string is treated the same as `None`.
    #[serde(default)]
    pub branch: Option<String>,
}

/// The persisted root: everything branchset knows about one workspace.
///
/// Serialized as pretty JSON to `.repo/branchsets.json`, read fully into
/// memory on open and written back in full on save.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreData {
    /// The single active feature, if any. Must name an existing feature;
    /// deleting the active feature is refused rather than auto-clearing.
    #[serde(default)]
    pub active_feature: Option<String>,

    #[serde(default)]
    pub features: BTreeMap<String, Feature>,
}
