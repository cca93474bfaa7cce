//! Configuration value objects shared by the outer layers.
//!
//! - [`output_mode::OutputMode`]: how a run's changes are handed back
//! - [`validation::ConfigIssue`]: a problem found while validating settings

pub mod output_mode;
pub mod validation;

pub use output_mode::OutputMode;
pub use validation::{ConfigIssue, ConfigIssueCode, IssueSeverity};
