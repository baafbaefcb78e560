//! Domain models for branchset.
//!
//! # Core Concepts
//!
//! - [`Feature`]: a named set of per-project branch overrides plus a default
//!   branch. At most one feature is *active* per workspace; the active
//!   feature is what workspace-wide commands implicitly target.
//! - [`ProjectOverride`]: one feature's requested branch for one project,
//!   keyed by the project's workspace-relative path. An override without a
//!   branch follows the feature's default branch.
//! - [`StoreData`]: the persisted root: the full feature map plus the
//!   active-feature marker. One JSON file per workspace.

mod feature;

pub use feature::*;
