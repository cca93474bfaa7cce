//! Application-level configuration.
//!
//! - [`RequestParams`]: size bounds and retry policy per generation call
//! - [`SessionParams`]: inactivity and absolute timeouts per completion
//! - [`LoopParams`]: convergence-loop control

pub mod execution_params;

pub use execution_params::{LoopParams, RequestParams, SessionParams, SnapshotMode};
