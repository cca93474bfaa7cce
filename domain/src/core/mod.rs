//! Core domain concepts shared across all subdomains.
//!
//! - [`model::Model`]: generation-service models
//! - [`error::DomainError`]: domain-level errors
//! - [`string`]: character-safe truncation helpers

pub mod error;
pub mod model;
pub mod string;
