use crate::models::StoreData;

struct Upgrade {
    name: &'static str,
    apply: fn(&mut StoreData) -> usize,
}

/// Ordered upgrade passes applied on every open, oldest first. Each pass is
/// idempotent: applying it to already-current data changes nothing. Missing
/// fields are backfilled with derived defaults rather than rejected, so data
/// files written by older releases stay readable.
const UPGRADES: &[Upgrade] = &[
    Upgrade {
        name: "backfill_feature_names",
        apply: backfill_feature_names,
    },
    Upgrade {
        name: "backfill_default_branches",
        apply: backfill_default_branches,
    },
    Upgrade {
        name: "backfill_project_paths",
        apply: backfill_project_paths,
    },
];

pub(crate) fn run_upgrades(data: &mut StoreData) {
    for upgrade in UPGRADES {
        let touched = (upgrade.apply)(data);
        if touched > 0 {
            tracing::info!(upgrade = upgrade.name, touched, "upgraded state file records");
        }
    }
}

/// A feature's `name` field always equals its key in the feature map.
fn backfill_feature_names(data: &mut StoreData) -> usize {
    let mut touched = 0;
    for (key, feature) in &mut data.features {
        if feature.name != *key {
            feature.name = key.clone();
            touched += 1;
        }
    }
    touched
}

/// Features written before default branches existed get their own name as
/// the default, the same rule `create` applies when no branch is given.
fn backfill_default_branches(data: &mut StoreData) -> usize {
    let mut touched = 0;
    for (key, feature) in &mut data.features {
        if feature.default_branch.is_empty() {
            feature.default_branch = key.clone();
            touched += 1;
        }
    }
    touched
}

/// An override's `path` field always equals its key; empty `branch` strings
/// from older files collapse to `None` (follow the feature default).
fn backfill_project_paths(data: &mut StoreData) -> usize {
    let mut touched = 0;
    for feature in data.features.values_mut() {
        for (key, project) in &mut feature.projects {
            if project.path != *key {
                project.path = key.clone();
                touched += 1;
            }
            if project.branch.as_deref() == Some("") {
                project.branch = None;
                touched += 1;
            }
        }
    }
    touched
}
