//! The command layer: one function per subcommand.
//!
//! Every command follows the same sequence: resolve and validate through the
//! store, perform branch operations through the project handles one project
//! at a time in store order, fold the per-project outcomes into a report,
//! and persist the store. Branch outcomes are reported, never raised; one
//! project's failure does not abort the batch.

use std::path::Path;
use std::process::Command;

use crate::error::Result;
use crate::store::{FeatureExpect, FeatureStore, WorkspaceLock};
use crate::workspace::{BranchOutcome, ProjectProvider, Workspace};

/// The tagged outcome of one branch operation against one project.
#[derive(Debug, Clone)]
pub struct ProjectReport {
    pub path: String,
    pub action: String,
    pub outcome: BranchOutcome,
}

impl ProjectReport {
    fn render(&self) -> String {
        match &self.outcome {
            BranchOutcome::Success => format!("  {}: {}: ok", self.path, self.action),
            BranchOutcome::NotFound => {
                format!("  {}: {}: branch not found", self.path, self.action)
            }
            BranchOutcome::Failed(msg) => {
                format!("  {}: {}: failed ({})", self.path, self.action, msg)
            }
        }
    }
}

fn print_reports(reports: &[ProjectReport]) {
    for report in reports {
        println!("{}", report.render());
    }
}

fn active_expect() -> FeatureExpect {
    FeatureExpect {
        must_exist: true,
        may_default_to_active: true,
        ..Default::default()
    }
}

/// `bset create <name> [--branch B] [--active]`
pub fn create(workspace: &Workspace, name: &str, branch: Option<&str>, active: bool) -> Result<()> {
    let _lock = WorkspaceLock::acquire(&workspace.metadata_dir())?;
    let mut store = FeatureStore::open(&workspace.metadata_dir())?;

    let feature = store.create_feature(name, branch)?;
    println!(
        "created feature '{}' (default branch '{}')",
        feature.name, feature.default_branch
    );
    if active {
        store.set_active_feature(name)?;
        println!("selected '{name}'");
    }
    store.save()
}

/// `bset add <path> [--feature F] [--branch B | --adopt BRANCH]`
///
/// The override is recorded and the store saved *before* the branch
/// operation runs: a failed checkout is reported, not rolled back, so the
/// bookkeeping never silently diverges from what was requested.
pub fn add(
    workspace: &Workspace,
    provider: &dyn ProjectProvider,
    path: &Path,
    feature: Option<&str>,
    branch: Option<&str>,
    adopt: Option<&str>,
) -> Result<()> {
    let _lock = WorkspaceLock::acquire(&workspace.metadata_dir())?;
    let mut store = FeatureStore::open(&workspace.metadata_dir())?;

    let resolved = store.validate_feature(feature.unwrap_or(""), active_expect())?;
    let project_path = workspace.normalize_project_path(path)?;

    store.add_project(&resolved.name, &project_path, branch.or(adopt))?;
    store.save()?;

    let effective = store.effective_branch(&resolved.name, &project_path)?;
    let handle = provider.project(&project_path);
    let report = if adopt.is_some() {
        ProjectReport {
            path: project_path.clone(),
            action: format!("checkout '{effective}'"),
            outcome: handle.checkout_branch(&effective),
        }
    } else {
        ProjectReport {
            path: project_path.clone(),
            action: format!("start '{effective}'"),
            outcome: handle.start_branch(&effective),
        }
    };

    println!("added '{}' to feature '{}'", project_path, resolved.name);
    print_reports(&[report]);
    Ok(())
}

/// `bset remove <path> [--feature F] [--delete-branch]`
pub fn remove(
    workspace: &Workspace,
    provider: &dyn ProjectProvider,
    path: &Path,
    feature: Option<&str>,
    delete_branch: bool,
) -> Result<()> {
    let _lock = WorkspaceLock::acquire(&workspace.metadata_dir())?;
    let mut store = FeatureStore::open(&workspace.metadata_dir())?;

    let resolved = store.validate_feature(feature.unwrap_or(""), active_expect())?;
    let project_path = workspace.normalize_project_path(path)?;

    let branch = store.effective_branch(&resolved.name, &project_path)?;
    store.remove_project(&resolved.name, &project_path)?;
    store.save()?;

    let handle = provider.project(&project_path);
    let mut reports = Vec::new();
    match handle.default_revision() {
        Some(revision) => reports.push(ProjectReport {
            path: project_path.clone(),
            action: format!("checkout '{revision}'"),
            outcome: handle.checkout_branch(&revision),
        }),
        None => reports.push(ProjectReport {
            path: project_path.clone(),
            action: "checkout default revision".to_string(),
            outcome: BranchOutcome::Failed("no default revision".to_string()),
        }),
    }
    if delete_branch {
        reports.push(ProjectReport {
            path: project_path.clone(),
            action: format!("abandon '{branch}'"),
            outcome: handle.abandon_branch(&branch),
        });
    }

    println!("removed '{}' from feature '{}'", project_path, resolved.name);
    print_reports(&reports);
    Ok(())
}

/// `bset delete <name> [--delete-branches]`
pub fn delete(
    workspace: &Workspace,
    provider: &dyn ProjectProvider,
    name: &str,
    delete_branches: bool,
) -> Result<()> {
    let _lock = WorkspaceLock::acquire(&workspace.metadata_dir())?;
    let mut store = FeatureStore::open(&workspace.metadata_dir())?;

    store.validate_feature(
        name,
        FeatureExpect {
            must_exist: true,
            must_not_be_active: true,
            ..Default::default()
        },
    )?;

    let mut reports = Vec::new();
    if delete_branches {
        let targets: Vec<(String, String)> = store
            .projects(name)?
            .map(|p| {
                (
                    p.path.clone(),
                    store
                        .feature(name)
                        .expect("validated feature present")
                        .effective_branch(&p.path)
                        .to_string(),
                )
            })
            .collect();
        for (path, branch) in targets {
            let handle = provider.project(&path);
            reports.push(ProjectReport {
                path,
                action: format!("abandon '{branch}'"),
                outcome: handle.abandon_branch(&branch),
            });
        }
    }

    store.delete_feature(name)?;
    store.save()?;

    println!("deleted feature '{name}'");
    print_reports(&reports);
    Ok(())
}

/// `bset select <feature>`: mark the feature active, then check every one
/// of its projects out onto its effective branch.
pub fn select(workspace: &Workspace, provider: &dyn ProjectProvider, name: &str) -> Result<()> {
    let _lock = WorkspaceLock::acquire(&workspace.metadata_dir())?;
    let mut store = FeatureStore::open(&workspace.metadata_dir())?;

    store.validate_feature(
        name,
        FeatureExpect {
            must_exist: true,
            must_not_be_active: true,
            ..Default::default()
        },
    )?;
    store.set_active_feature(name)?;
    store.save()?;

    let reports = checkout_projects(&store, provider, name)?;
    println!("selected feature '{name}'");
    print_reports(&reports);
    Ok(())
}

/// `bset clear`
pub fn clear(workspace: &Workspace) -> Result<()> {
    let _lock = WorkspaceLock::acquire(&workspace.metadata_dir())?;
    let mut store = FeatureStore::open(&workspace.metadata_dir())?;

    match store.active_feature() {
        Some(name) => println!("cleared active feature '{name}'"),
        None => println!("no feature was active"),
    }
    store.clear_active_feature();
    store.save()
}

/// `bset list [--json]`
pub fn list(workspace: &Workspace, json: bool) -> Result<()> {
    let store = FeatureStore::open(&workspace.metadata_dir())?;

    if json {
        let features: Vec<_> = store
            .features()
            .map(|f| {
                serde_json::json!({
                    "name": f.name,
                    "default_branch": f.default_branch,
                    "active": store.active_feature() == Some(f.name.as_str()),
                    "projects": f.projects.len(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&features)?);
        return Ok(());
    }

    let mut any = false;
    for feature in store.features() {
        any = true;
        let marker = if store.active_feature() == Some(feature.name.as_str()) {
            '*'
        } else {
            ' '
        };
        let count = feature.projects.len();
        let plural = if count == 1 { "project" } else { "projects" };
        println!(
            "{} {}  (default branch '{}', {} {})",
            marker, feature.name, feature.default_branch, count, plural
        );
    }
    if !any {
        println!("no features defined");
    }
    Ok(())
}

/// `bset show [--feature F] [--json]`
pub fn show(workspace: &Workspace, feature: Option<&str>, json: bool) -> Result<()> {
    let store = FeatureStore::open(&workspace.metadata_dir())?;
    let resolved = store.validate_feature(feature.unwrap_or(""), active_expect())?;
    let feature = store
        .feature(&resolved.name)
        .expect("validated feature present");

    if json {
        let projects: Vec<_> = feature
            .projects
            .values()
            .map(|p| {
                serde_json::json!({
                    "path": p.path,
                    "branch": p.branch,
                    "effective_branch": feature.effective_branch(&p.path),
                })
            })
            .collect();
        let value = serde_json::json!({
            "name": feature.name,
            "default_branch": feature.default_branch,
            "active": resolved.is_active,
            "projects": projects,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let active = if resolved.is_active { " (active)" } else { "" };
    println!("feature '{}'{}", feature.name, active);
    println!("default branch: {}", feature.default_branch);
    if feature.projects.is_empty() {
        println!("  (no projects)");
        return Ok(());
    }
    for project in feature.projects.values() {
        let effective = feature.effective_branch(&project.path);
        let origin = if project.branch.as_deref().is_some_and(|b| !b.is_empty()) {
            " (override)"
        } else {
            ""
        };
        println!("  {} -> {}{}", project.path, effective, origin);
    }
    Ok(())
}

/// `bset checkout [--feature F]`
pub fn checkout(
    workspace: &Workspace,
    provider: &dyn ProjectProvider,
    feature: Option<&str>,
) -> Result<()> {
    let _lock = WorkspaceLock::acquire(&workspace.metadata_dir())?;
    let store = FeatureStore::open(&workspace.metadata_dir())?;

    let resolved = store.validate_feature(feature.unwrap_or(""), active_expect())?;
    let reports = checkout_projects(&store, provider, &resolved.name)?;
    println!("checked out feature '{}'", resolved.name);
    print_reports(&reports);
    Ok(())
}

/// `bset reset`: put every project of the active feature back onto its
/// manifest default revision, then clear the active feature.
pub fn reset(workspace: &Workspace, provider: &dyn ProjectProvider) -> Result<()> {
    let _lock = WorkspaceLock::acquire(&workspace.metadata_dir())?;
    let mut store = FeatureStore::open(&workspace.metadata_dir())?;

    let resolved = store.validate_feature(
        "",
        FeatureExpect {
            must_exist: true,
            must_be_active: true,
            may_default_to_active: true,
            ..Default::default()
        },
    )?;

    let paths: Vec<String> = store.projects(&resolved.name)?.map(|p| p.path.clone()).collect();
    let mut reports = Vec::new();
    for path in paths {
        let handle = provider.project(&path);
        let report = match handle.default_revision() {
            Some(revision) => ProjectReport {
                path,
                action: format!("checkout '{revision}'"),
                outcome: handle.checkout_branch(&revision),
            },
            None => ProjectReport {
                path,
                action: "checkout default revision".to_string(),
                outcome: BranchOutcome::Failed("no default revision".to_string()),
            },
        };
        reports.push(report);
    }

    store.clear_active_feature();
    store.save()?;

    println!("reset workspace, cleared active feature '{}'", resolved.name);
    print_reports(&reports);
    Ok(())
}

/// `bset status`: captured work tree status for each project of the active
/// feature.
pub fn status(workspace: &Workspace, provider: &dyn ProjectProvider) -> Result<()> {
    let store = FeatureStore::open(&workspace.metadata_dir())?;
    let resolved = store.validate_feature("", active_expect())?;

    for project in store.projects(&resolved.name)? {
        let handle = provider.project(&project.path);
        println!("project {}", project.path);
        match handle.worktree_status() {
            Ok(text) if text.trim().is_empty() => println!("  (clean)"),
            Ok(text) => {
                for line in text.lines() {
                    println!("  {line}");
                }
            }
            Err(err) => println!("  status unavailable: {err}"),
        }
    }
    Ok(())
}

/// `bset shell [--command ...]`: spawn a shell (or the given command) with
/// the active feature exported in the environment. Returns the child's exit
/// code.
pub fn shell(workspace: &Workspace, command: Option<&[String]>) -> Result<i32> {
    let store = FeatureStore::open(&workspace.metadata_dir())?;
    let resolved = store.validate_feature("", active_expect())?;
    let feature = store
        .feature(&resolved.name)
        .expect("validated feature present");

    let (program, args): (String, &[String]) = match command {
        Some([program, rest @ ..]) => (program.clone(), rest),
        _ => (
            std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string()),
            &[],
        ),
    };

    tracing::debug!(%program, feature = %feature.name, "spawning feature shell");
    let status = Command::new(&program)
        .args(args)
        .current_dir(workspace.root())
        .env("BSET_FEATURE", &feature.name)
        .env("BSET_BRANCH", &feature.default_branch)
        .status()?;
    Ok(status.code().unwrap_or(1))
}

/// Check every project of `feature` out onto its effective branch, in store
/// order, collecting one tagged outcome per project.
fn checkout_projects(
    store: &FeatureStore,
    provider: &dyn ProjectProvider,
    feature: &str,
) -> Result<Vec<ProjectReport>> {
    let targets: Vec<(String, String)> = store
        .projects(feature)?
        .map(|p| {
            let branch = store
                .feature(feature)
                .expect("validated feature present")
                .effective_branch(&p.path)
                .to_string();
            (p.path.clone(), branch)
        })
        .collect();

    Ok(targets
        .into_iter()
        .map(|(path, branch)| {
            let handle = provider.project(&path);
            ProjectReport {
                path,
                action: format!("checkout '{branch}'"),
                outcome: handle.checkout_branch(&branch),
            }
        })
        .collect())
}
