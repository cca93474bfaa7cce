//! Output formatter trait

use conductor_application::RunReport;
use std::path::Path;

/// Trait for formatting run reports
pub trait OutputFormatter {
    /// Human-readable summary
    fn format(&self, report: &RunReport, run_dir: Option<&Path>) -> String;

    /// Machine-readable report
    fn format_json(&self, report: &RunReport, run_dir: Option<&Path>) -> String;
}
