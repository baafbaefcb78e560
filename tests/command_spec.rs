use std::cell::RefCell;
use std::collections::HashSet;
use std::path::PathBuf;
use std::rc::Rc;

use branchset::commands;
use branchset::store::FeatureStore;
use branchset::workspace::{BranchOutcome, ProjectHandle, ProjectProvider, Workspace};
use branchset::Error;
use speculate2::speculate;
use tempfile::TempDir;

/// A scripted stand-in for the git-backed project handles: branches live in
/// a set, every operation is logged, and named branches can be made to fail.
#[derive(Default)]
struct FakeState {
    branches: HashSet<String>,
    failing: HashSet<String>,
    default_revision: Option<String>,
    log: Vec<String>,
}

#[derive(Clone, Default)]
struct FakeProvider(Rc<RefCell<FakeState>>);

impl FakeProvider {
    fn set_default_revision(&self, revision: &str) {
        self.0.borrow_mut().default_revision = Some(revision.to_string());
    }

    fn seed_branch(&self, branch: &str) {
        self.0.borrow_mut().branches.insert(branch.to_string());
    }

    fn drop_branch(&self, branch: &str) {
        self.0.borrow_mut().branches.remove(branch);
    }

    fn fail_branch(&self, branch: &str) {
        self.0.borrow_mut().failing.insert(branch.to_string());
    }

    fn log(&self) -> Vec<String> {
        self.0.borrow().log.clone()
    }
}

struct FakeHandle {
    path: String,
    state: Rc<RefCell<FakeState>>,
}

impl ProjectProvider for FakeProvider {
    fn project(&self, path: &str) -> Box<dyn ProjectHandle> {
        Box::new(FakeHandle {
            path: path.to_string(),
            state: self.0.clone(),
        })
    }
}

impl ProjectHandle for FakeHandle {
    fn start_branch(&self, branch: &str) -> BranchOutcome {
        let mut state = self.state.borrow_mut();
        state.log.push(format!("start {} {}", self.path, branch));
        if state.failing.contains(branch) {
            return BranchOutcome::Failed("scripted failure".to_string());
        }
        state.branches.insert(branch.to_string());
        BranchOutcome::Success
    }

    fn checkout_branch(&self, branch: &str) -> BranchOutcome {
        let mut state = self.state.borrow_mut();
        state.log.push(format!("checkout {} {}", self.path, branch));
        if state.failing.contains(branch) {
            return BranchOutcome::Failed("scripted failure".to_string());
        }
        if !state.branches.contains(branch) {
            return BranchOutcome::NotFound;
        }
        BranchOutcome::Success
    }

    fn abandon_branch(&self, branch: &str) -> BranchOutcome {
        let mut state = self.state.borrow_mut();
        state.log.push(format!("abandon {} {}", self.path, branch));
        if !state.branches.remove(branch) {
            return BranchOutcome::NotFound;
        }
        BranchOutcome::Success
    }

    fn worktree_status(&self) -> anyhow::Result<String> {
        Ok(format!("## {}\n", self.path))
    }

    fn default_revision(&self) -> Option<String> {
        self.state.borrow().default_revision.clone()
    }
}

/// A scratch workspace: `.repo/` at the root plus a few project directories.
fn scratch_workspace() -> (TempDir, Workspace) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::create_dir(dir.path().join(".repo")).expect("Failed to create metadata dir");
    for project in ["apps/foo", "apps/bar"] {
        std::fs::create_dir_all(dir.path().join(project)).expect("Failed to create project dir");
    }
    let workspace = Workspace::discover(dir.path()).expect("Failed to discover workspace");
    (dir, workspace)
}

fn project_path(workspace: &Workspace, rel: &str) -> PathBuf {
    workspace.root().join(rel)
}

fn reopen(workspace: &Workspace) -> FeatureStore {
    FeatureStore::open(&workspace.metadata_dir()).expect("Failed to reopen store")
}

speculate! {
    before {
        let (_dir, workspace) = scratch_workspace();
    }

    describe "create" {
        it "persists the feature and can make it active" {
            commands::create(&workspace, "auth", None, true).expect("create");

            let store = reopen(&workspace);
            assert_eq!(store.active_feature(), Some("auth"));
            assert_eq!(store.feature("auth").unwrap().default_branch, "auth");
        }

        it "rejects a duplicate with a validation error" {
            commands::create(&workspace, "auth", None, false).expect("create");
            let err = commands::create(&workspace, "auth", None, false).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
            assert_eq!(err.exit_code(), 1);
        }
    }

    describe "add" {
        before {
            let provider = FakeProvider::default();
        }

        it "starts the effective branch for the active feature" {
            commands::create(&workspace, "auth", None, true).expect("create");
            commands::add(&workspace, &provider, &project_path(&workspace, "apps/foo"),
                          None, None, None).expect("add");

            assert_eq!(provider.log(), vec!["start apps/foo auth"]);
            let store = reopen(&workspace);
            assert_eq!(store.effective_branch("auth", "apps/foo").unwrap(), "auth");
        }

        it "checks out an existing branch when adopting" {
            commands::create(&workspace, "auth", None, true).expect("create");
            provider.seed_branch("wip/login");
            commands::add(&workspace, &provider, &project_path(&workspace, "apps/foo"),
                          None, None, Some("wip/login")).expect("add");

            assert_eq!(provider.log(), vec!["checkout apps/foo wip/login"]);
            let store = reopen(&workspace);
            assert_eq!(store.effective_branch("auth", "apps/foo").unwrap(), "wip/login");
        }

        it "records the override even when the branch operation fails" {
            commands::create(&workspace, "auth", None, true).expect("create");
            provider.fail_branch("auth");
            commands::add(&workspace, &provider, &project_path(&workspace, "apps/foo"),
                          None, None, None).expect("add reports, does not abort");

            let store = reopen(&workspace);
            assert!(store.feature("auth").unwrap().projects.contains_key("apps/foo"));
        }

        it "rejects a path outside the workspace" {
            commands::create(&workspace, "auth", None, true).expect("create");
            let outside = TempDir::new().expect("tempdir");
            let err = commands::add(&workspace, &provider, outside.path(),
                                    None, None, None).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }

        it "requires an active feature when none is named" {
            let err = commands::add(&workspace, &provider, &project_path(&workspace, "apps/foo"),
                                    None, None, None).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
    }

    describe "remove" {
        before {
            let provider = FakeProvider::default();
        }

        it "drops the override and returns the project to its default revision" {
            provider.set_default_revision("main");
            provider.seed_branch("main");
            commands::create(&workspace, "auth", None, true).expect("create");
            commands::add(&workspace, &provider, &project_path(&workspace, "apps/foo"),
                          None, None, None).expect("add");

            commands::remove(&workspace, &provider, &project_path(&workspace, "apps/foo"),
                             None, true).expect("remove");

            let log = provider.log();
            assert!(log.contains(&"checkout apps/foo main".to_string()));
            assert!(log.contains(&"abandon apps/foo auth".to_string()));
            let store = reopen(&workspace);
            assert!(store.feature("auth").unwrap().projects.is_empty());
        }

        it "rejects an unregistered project" {
            commands::create(&workspace, "auth", None, true).expect("create");
            let err = commands::remove(&workspace, &provider, &project_path(&workspace, "apps/foo"),
                                       None, false).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
    }

    describe "select and checkout" {
        before {
            let provider = FakeProvider::default();
        }

        it "marks the feature active and checks projects out in store order" {
            commands::create(&workspace, "auth", None, false).expect("create");
            commands::create(&workspace, "scratch", None, true).expect("create scratch");
            commands::add(&workspace, &provider, &project_path(&workspace, "apps/foo"),
                          Some("auth"), None, None).expect("add foo");
            commands::add(&workspace, &provider, &project_path(&workspace, "apps/bar"),
                          Some("auth"), Some("dev"), None).expect("add bar");
            provider.seed_branch("dev");
            commands::clear(&workspace).expect("clear");

            commands::select(&workspace, &provider, "auth").expect("select");

            let store = reopen(&workspace);
            assert_eq!(store.active_feature(), Some("auth"));
            let log = provider.log();
            let tail = &log[log.len() - 2..];
            assert_eq!(tail, ["checkout apps/bar dev", "checkout apps/foo auth"]);
        }

        it "rejects selecting the feature that is already active" {
            commands::create(&workspace, "auth", None, true).expect("create");
            let err = commands::select(&workspace, &provider, "auth").unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }

        it "keeps going when one project's branch is missing" {
            commands::create(&workspace, "auth", None, true).expect("create");
            commands::add(&workspace, &provider, &project_path(&workspace, "apps/bar"),
                          None, Some("ghost"), None).expect("add bar");
            commands::add(&workspace, &provider, &project_path(&workspace, "apps/foo"),
                          None, None, None).expect("add foo");
            provider.drop_branch("ghost");

            commands::checkout(&workspace, &provider, Some("auth")).expect("checkout");

            let log = provider.log();
            let tail = &log[log.len() - 2..];
            assert_eq!(tail, ["checkout apps/bar ghost", "checkout apps/foo auth"]);
        }
    }

    describe "delete" {
        before {
            let provider = FakeProvider::default();
        }

        it "refuses the active feature" {
            commands::create(&workspace, "auth", None, true).expect("create");
            let err = commands::delete(&workspace, &provider, "auth", false).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
            assert!(reopen(&workspace).feature("auth").is_some());
        }

        it "abandons project branches when asked" {
            commands::create(&workspace, "auth", None, true).expect("create");
            commands::add(&workspace, &provider, &project_path(&workspace, "apps/foo"),
                          None, None, None).expect("add");
            commands::clear(&workspace).expect("clear");

            commands::delete(&workspace, &provider, "auth", true).expect("delete");

            assert!(provider.log().contains(&"abandon apps/foo auth".to_string()));
            assert!(reopen(&workspace).feature("auth").is_none());
        }
    }

    describe "reset" {
        before {
            let provider = FakeProvider::default();
        }

        it "returns projects to the default revision and clears the active feature" {
            provider.set_default_revision("main");
            provider.seed_branch("main");
            commands::create(&workspace, "auth", None, true).expect("create");
            commands::add(&workspace, &provider, &project_path(&workspace, "apps/foo"),
                          None, None, None).expect("add");

            commands::reset(&workspace, &provider).expect("reset");

            assert!(provider.log().contains(&"checkout apps/foo main".to_string()));
            assert_eq!(reopen(&workspace).active_feature(), None);
        }

        it "requires an active feature" {
            let err = commands::reset(&workspace, &provider).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
    }

    describe "locking" {
        it "fails fast with the contention code and leaves the store untouched" {
            let marker = workspace.metadata_dir().join("branchsets.lock");
            std::fs::write(&marker, "4242").expect("plant lock marker");

            let err = commands::create(&workspace, "auth", None, false).unwrap_err();
            assert!(matches!(err, Error::Contention { .. }));
            assert_eq!(err.exit_code(), 2);
            assert!(!workspace.metadata_dir().join("branchsets.json").exists());

            std::fs::remove_file(&marker).expect("remove marker");
            commands::create(&workspace, "auth", None, false).expect("create after unlock");
        }
    }

    describe "status" {
        before {
            let provider = FakeProvider::default();
        }

        it "reports each project of the active feature" {
            commands::create(&workspace, "auth", None, true).expect("create");
            commands::add(&workspace, &provider, &project_path(&workspace, "apps/foo"),
                          None, None, None).expect("add");

            commands::status(&workspace, &provider).expect("status");
        }
    }
}
