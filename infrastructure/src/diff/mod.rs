//! Workspace diff adapters.
//!
//! Provides [`GitDiffProvider`], which implements the
//! [`DiffProvider`](conductor_application::DiffProvider) port via the `git` CLI.

mod git;

pub use git::GitDiffProvider;
