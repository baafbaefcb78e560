//! Feature branch sets for multi-project manifest workspaces.
//!
//! A *feature* is a named set of per-project branch overrides plus a default
//! branch. The workspace itself (the multi-project checkout and its manifest)
//! belongs to the external manifest tool; this crate only records which
//! branch applies to which project under which feature, and drives the
//! per-project switches through thin `git` calls.

pub mod commands;
pub mod error;
pub mod models;
pub mod store;
pub mod workspace;

pub use error::{Error, Result};
