//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod planning;
pub mod run_orchestration;
