//! Console output formatter for run reports

use crate::output::formatter::OutputFormatter;
use colored::Colorize;
use conductor_application::RunReport;
use conductor_domain::{ReviewStatus, Severity};
use serde_json::json;
use std::path::Path;

/// Formats run reports for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format the complete run summary
    pub fn format(report: &RunReport, run_dir: Option<&Path>) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Conductor Run"));
        output.push('\n');

        output.push_str(&format!(
            "{} {} ({})\n",
            "Run:".cyan().bold(),
            report.run_id,
            report.workflow
        ));
        let status = report.review.status();
        let status_text = match status {
            ReviewStatus::Converged => status.as_str().green().bold(),
            ReviewStatus::Open => status.as_str().yellow().bold(),
            ReviewStatus::Exhausted | ReviewStatus::Blocked => status.as_str().red().bold(),
        };
        output.push_str(&format!(
            "{} {} after {} iteration(s)\n",
            "Status:".cyan().bold(),
            status_text,
            report.iterations
        ));

        if let Some(plan) = &report.plan {
            output.push_str(&Self::section_header("Plan"));
            for step in plan.steps() {
                output.push_str(&format!(
                    "  {}. {} {}\n",
                    step.id(),
                    format!("[{}]", step.role()).yellow(),
                    step.objective().lines().next().unwrap_or_default()
                ));
            }
        }
        if !report.forced_steps.is_empty() {
            let forced: Vec<String> = report.forced_steps.iter().map(|s| s.to_string()).collect();
            output.push_str(&format!(
                "\n{} step(s) {} ran with unmet dependencies\n",
                "Warning:".yellow().bold(),
                forced.join(", ")
            ));
        }

        output.push_str(&Self::section_header("Changed files"));
        if report.touched_files.is_empty() {
            output.push_str(&format!("  {}\n", "(none)".dimmed()));
        }
        for file in &report.touched_files {
            output.push_str(&format!("  {}\n", file));
        }

        output.push_str(&Self::section_header("Final review"));
        output.push_str(&format!("  {}\n", report.review.summary_line()));
        for finding in report.review.findings() {
            let severity = match finding.severity {
                Severity::High => finding.severity.as_str().red().bold(),
                Severity::Medium => finding.severity.as_str().yellow(),
                Severity::Low => finding.severity.as_str().dimmed(),
            };
            let location = finding
                .location()
                .map(|l| format!(" {}", l.dimmed()))
                .unwrap_or_default();
            output.push_str(&format!(
                "  * [{}] {}{}\n{}\n",
                severity,
                finding.rule.bold(),
                location,
                Self::indent(&finding.rationale, "      ")
            ));
        }
        if !report.review.required_actions().is_empty() {
            output.push_str(&format!("\n{}\n", "Required actions:".cyan().bold()));
            for action in report.review.required_actions() {
                output.push_str(&format!("  * {}\n", action));
            }
        }

        if !report.usage.is_empty() {
            output.push_str(&Self::section_header("Usage"));
            for (model, usage) in &report.usage {
                output.push_str(&format!(
                    "  {}: {} call(s), {} prompt / {} response chars\n",
                    model, usage.calls, usage.prompt_chars, usage.response_chars
                ));
            }
        }

        if let Some(dir) = run_dir {
            output.push_str(&format!(
                "\n{} {}\n",
                "Artifacts:".dimmed(),
                dir.display()
            ));
        }

        output.push_str(&Self::footer());
        output
    }

    /// Format as JSON
    pub fn format_json(report: &RunReport, run_dir: Option<&Path>) -> String {
        let value = json!({
            "runId": report.run_id,
            "workflow": report.workflow.as_str(),
            "status": report.review.status(),
            "iterations": report.iterations,
            "plan": report.plan,
            "review": report.review,
            "touchedFiles": report.touched_files,
            "forcedSteps": report.forced_steps,
            "usage": report.usage,
            "runDir": run_dir.map(|d| d.display().to_string()),
        });
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format(&self, report: &RunReport, run_dir: Option<&Path>) -> String {
        Self::format(report, run_dir)
    }

    fn format_json(&self, report: &RunReport, run_dir: Option<&Path>) -> String {
        Self::format_json(report, run_dir)
    }
}
