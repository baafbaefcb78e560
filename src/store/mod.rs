mod lock;
mod upgrade;

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::{Feature, ProjectOverride, StoreData};

pub use lock::{WorkspaceLock, LOCK_FILE};

pub const STORE_FILE: &str = "branchsets.json";

/// Preconditions a feature must satisfy before a command may proceed.
///
/// Built with the struct-update idiom, e.g.
/// `FeatureExpect { must_exist: true, ..Default::default() }`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExpect {
    pub must_exist: bool,
    pub must_not_exist: bool,
    pub must_be_active: bool,
    pub must_not_be_active: bool,
    /// Permit an empty name to resolve to the active feature. Without this,
    /// an empty name is a programming error, not a user error.
    pub may_default_to_active: bool,
}

/// Preconditions a project registration must satisfy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectExpect {
    pub must_exist: bool,
    pub must_not_exist: bool,
}

/// A feature name that passed validation, plus whether it is active.
#[derive(Debug, Clone)]
pub struct ResolvedFeature {
    pub name: String,
    pub is_active: bool,
}

/// The authoritative record of one workspace's features.
///
/// Opened from (and saved back to) a single JSON file under the workspace
/// metadata directory. Every mutation funnels through [`validate_feature`]
/// and, where a project is involved, [`validate_project`]; callers never
/// touch the maps directly.
///
/// [`validate_feature`]: FeatureStore::validate_feature
/// [`validate_project`]: FeatureStore::validate_project
#[derive(Debug)]
pub struct FeatureStore {
    path: PathBuf,
    data: StoreData,
}

impl FeatureStore {
    /// Open the store backing file, or start empty if it does not exist yet.
    /// The upgrade pass runs on every open, so older data files are lifted
    /// to the current schema in memory before any accessor sees them.
    pub fn open(metadata_dir: &Path) -> Result<Self> {
        let path = metadata_dir.join(STORE_FILE);
        let mut data = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            tracing::debug!(store = %path.display(), "no state file, starting empty");
            StoreData::default()
        };
        upgrade::run_upgrades(&mut data);
        Ok(Self { path, data })
    }

    /// Serialize the full structure back to the backing file, replacing any
    /// previous content.
    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(&self.path, json)?;
        tracing::debug!(store = %self.path.display(), "saved state file");
        Ok(())
    }

    // ============================================================
    // Validation state machine
    // ============================================================

    /// Resolve `name` (empty means the active feature, when permitted) and
    /// check it against the requested preconditions.
    pub fn validate_feature(&self, name: &str, expect: FeatureExpect) -> Result<ResolvedFeature> {
        let name = if name.is_empty() {
            if !expect.may_default_to_active {
                return Err(Error::internal(
                    "feature validator invoked with an empty name",
                ));
            }
            match &self.data.active_feature {
                Some(active) => active.clone(),
                None => return Err(Error::validation("no feature is active")),
            }
        } else {
            name.to_string()
        };

        check_presence(
            "feature",
            &name,
            self.data.features.contains_key(&name),
            expect.must_exist,
            expect.must_not_exist,
        )?;

        let is_active = self.data.active_feature.as_deref() == Some(name.as_str());
        if expect.must_be_active && !is_active {
            return Err(Error::validation(format!("feature '{name}' is not active")));
        }
        if expect.must_not_be_active && is_active {
            return Err(Error::validation(format!(
                "feature '{name}' is currently active"
            )));
        }

        Ok(ResolvedFeature { name, is_active })
    }

    /// Check a project path against the requested preconditions under an
    /// already-validated feature.
    pub fn validate_project(&self, feature: &str, path: &str, expect: ProjectExpect) -> Result<()> {
        let registered = self
            .data
            .features
            .get(feature)
            .is_some_and(|f| f.projects.contains_key(path));
        check_presence(
            "project",
            path,
            registered,
            expect.must_exist,
            expect.must_not_exist,
        )
    }

    // ============================================================
    // Mutations
    // ============================================================

    pub fn create_feature(&mut self, name: &str, default_branch: Option<&str>) -> Result<&Feature> {
        if name.is_empty() {
            return Err(Error::validation("feature name must not be empty"));
        }
        self.validate_feature(
            name,
            FeatureExpect {
                must_not_exist: true,
                ..Default::default()
            },
        )?;
        let feature = Feature::new(name, default_branch);
        Ok(self.data.features.entry(name.to_string()).or_insert(feature))
    }

    /// Delete a feature. The active feature cannot be deleted; callers must
    /// clear or switch first.
    pub fn delete_feature(&mut self, name: &str) -> Result<Feature> {
        let resolved = self.validate_feature(
            name,
            FeatureExpect {
                must_exist: true,
                must_not_be_active: true,
                ..Default::default()
            },
        )?;
        Ok(self
            .data
            .features
            .remove(&resolved.name)
            .expect("validated feature present"))
    }

    pub fn set_active_feature(&mut self, name: &str) -> Result<()> {
        let resolved = self.validate_feature(
            name,
            FeatureExpect {
                must_exist: true,
                ..Default::default()
            },
        )?;
        self.data.active_feature = Some(resolved.name);
        Ok(())
    }

    pub fn clear_active_feature(&mut self) {
        self.data.active_feature = None;
    }

    pub fn add_project(
        &mut self,
        feature: &str,
        path: &str,
        branch: Option<&str>,
    ) -> Result<&ProjectOverride> {
        let resolved = self.validate_feature(
            feature,
            FeatureExpect {
                must_exist: true,
                ..Default::default()
            },
        )?;
        self.validate_project(
            &resolved.name,
            path,
            ProjectExpect {
                must_not_exist: true,
                ..Default::default()
            },
        )?;

        let feature = self
            .data
            .features
            .get_mut(&resolved.name)
            .expect("validated feature present");
        let project = ProjectOverride {
            path: path.to_string(),
            branch: branch.filter(|b| !b.is_empty()).map(str::to_string),
        };
        Ok(feature.projects.entry(path.to_string()).or_insert(project))
    }

    pub fn remove_project(&mut self, feature: &str, path: &str) -> Result<ProjectOverride> {
        let resolved = self.validate_feature(
            feature,
            FeatureExpect {
                must_exist: true,
                ..Default::default()
            },
        )?;
        self.validate_project(
            &resolved.name,
            path,
            ProjectExpect {
                must_exist: true,
                ..Default::default()
            },
        )?;
        Ok(self
            .data
            .features
            .get_mut(&resolved.name)
            .expect("validated feature present")
            .projects
            .remove(path)
            .expect("validated project present"))
    }

    // ============================================================
    // Queries
    // ============================================================

    /// The branch `feature` requests for `path`: override if set, else the
    /// feature's default. Single source of truth for every branch-changing
    /// command.
    pub fn effective_branch(&self, feature: &str, path: &str) -> Result<String> {
        let resolved = self.validate_feature(
            feature,
            FeatureExpect {
                must_exist: true,
                ..Default::default()
            },
        )?;
        self.validate_project(
            &resolved.name,
            path,
            ProjectExpect {
                must_exist: true,
                ..Default::default()
            },
        )?;
        Ok(self.data.features[&resolved.name]
            .effective_branch(path)
            .to_string())
    }

    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.data.features.get(name)
    }

    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.data.features.values()
    }

    pub fn projects(&self, feature: &str) -> Result<impl Iterator<Item = &ProjectOverride>> {
        let resolved = self.validate_feature(
            feature,
            FeatureExpect {
                must_exist: true,
                ..Default::default()
            },
        )?;
        Ok(self.data.features[&resolved.name].projects.values())
    }

    pub fn active_feature(&self) -> Option<&str> {
        self.data.active_feature.as_deref()
    }
}

/// The one presence rule both validators share: an entity may be required
/// to exist or to not exist, and violations are user validation errors,
/// reported, never exited on, so the CLI owns surface semantics.
fn check_presence(
    kind: &str,
    name: &str,
    exists: bool,
    must_exist: bool,
    must_not_exist: bool,
) -> Result<()> {
    if must_exist && !exists {
        return Err(Error::validation(format!("{kind} '{name}' not found")));
    }
    if must_not_exist && exists {
        return Err(Error::validation(format!("{kind} '{name}' already exists")));
    }
    Ok(())
}
