//! Progress reporters for orchestration runs

pub mod reporter;
