//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure and presentation adapters
//! must implement.

pub mod diff_provider;
pub mod event_sink;
pub mod generation;
pub mod progress;
pub mod prompt_builder;
pub mod role_handler;
