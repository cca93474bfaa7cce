//! Review value objects: findings, status and the finding-set fingerprint.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Required action appended when remediation stops making progress.
pub const NO_PROGRESS_SENTINEL: &str = "blocked: no-progress";

/// Finding severity, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    /// Accepts the canonical names plus the usual reviewer vocabulary
    /// (`critical`, `major`, `minor`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" | "critical" | "blocker" | "error" | "severe" => Ok(Severity::High),
            "medium" | "moderate" | "major" | "warning" | "warn" => Ok(Severity::Medium),
            "low" | "minor" | "info" | "nit" | "trivial" | "suggestion" => Ok(Severity::Low),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// One issue raised by a review pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub severity: Severity,
    pub rule: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    pub rationale: String,
}

impl Finding {
    pub fn new(severity: Severity, rule: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            severity,
            rule: rule.into(),
            file: None,
            symbol: None,
            line: None,
            rationale: rationale.into(),
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// `severity::rule::file::symbol::rationale`, absent parts left empty.
    pub fn fingerprint_key(&self) -> String {
        format!(
            "{}::{}::{}::{}::{}",
            self.severity,
            self.rule,
            self.file.as_deref().unwrap_or(""),
            self.symbol.as_deref().unwrap_or(""),
            self.rationale
        )
    }

    /// `file:line` or `file`, when a location is known.
    pub fn location(&self) -> Option<String> {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => Some(format!("{file}:{line}")),
            (Some(file), None) => Some(file.clone()),
            _ => None,
        }
    }
}

/// Where a review stands after the convergence loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Produced by a review pass, not yet judged by the loop.
    #[default]
    Open,
    /// No high-severity finding remains.
    Converged,
    /// The iteration limit was reached with high-severity findings left.
    Exhausted,
    /// Two consecutive passes produced the same finding set.
    Blocked,
}

impl ReviewStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewStatus::Open => "open",
            ReviewStatus::Converged => "converged",
            ReviewStatus::Exhausted => "exhausted",
            ReviewStatus::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured output of a review pass.
///
/// Replaced wholesale after every pass; the `with_*` methods return new
/// values.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ReviewRecord")]
pub struct Review {
    findings: Vec<Finding>,
    required_actions: Vec<String>,
    status: ReviewStatus,
}

/// Wire shape of a [`Review`]; deserialized values go through [`Review::new`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewRecord {
    #[serde(default)]
    findings: Vec<Finding>,
    #[serde(default)]
    required_actions: Vec<String>,
    #[serde(default)]
    status: ReviewStatus,
}

impl From<ReviewRecord> for Review {
    fn from(record: ReviewRecord) -> Self {
        Review::new(record.findings, record.required_actions).with_status(record.status)
    }
}

impl Review {
    /// Required actions are trimmed and deduplicated case-insensitively; the
    /// first spelling wins.
    pub fn new(findings: Vec<Finding>, required_actions: Vec<String>) -> Self {
        let mut seen = HashSet::new();
        let required_actions = required_actions
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty() && seen.insert(a.to_lowercase()))
            .collect();
        Self {
            findings,
            required_actions,
            status: ReviewStatus::Open,
        }
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn required_actions(&self) -> &[String] {
        &self.required_actions
    }

    pub fn status(&self) -> ReviewStatus {
        self.status
    }

    pub fn has_high(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::High)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    /// Order-independent identity of the finding set.
    pub fn fingerprint(&self) -> String {
        let mut keys: Vec<String> = self.findings.iter().map(Finding::fingerprint_key).collect();
        keys.sort();
        keys.dedup();
        keys.join("\n")
    }

    pub fn with_status(mut self, status: ReviewStatus) -> Self {
        self.status = status;
        self
    }

    /// Mark as stagnated: status `Blocked` plus the no-progress sentinel.
    pub fn blocked(self) -> Self {
        let mut actions = self.required_actions;
        actions.push(NO_PROGRESS_SENTINEL.to_string());
        Review::new(self.findings, actions).with_status(ReviewStatus::Blocked)
    }

    /// One-line summary for logs and progress output.
    pub fn summary_line(&self) -> String {
        format!(
            "{} high / {} medium / {} low, {} required action(s), status {}",
            self.count(Severity::High),
            self.count(Severity::Medium),
            self.count(Severity::Low),
            self.required_actions.len(),
            self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn high(rule: &str, rationale: &str) -> Finding {
        Finding::new(Severity::High, rule, rationale)
    }

    #[test]
    fn required_actions_dedup_case_insensitive() {
        let review = Review::new(
            vec![],
            vec![
                "Add tests".into(),
                "add TESTS ".into(),
                "".into(),
                "Fix lint".into(),
            ],
        );
        assert_eq!(review.required_actions(), ["Add tests", "Fix lint"]);
    }

    #[test]
    fn fingerprint_is_order_independent() {
        let a = high("layering", "UI imports the database").with_file("src/ui.rs");
        let b = Finding::new(Severity::Medium, "naming", "Unclear name").with_symbol("doIt");
        let one = Review::new(vec![a.clone(), b.clone()], vec![]);
        let two = Review::new(vec![b, a], vec!["different actions".into()]);
        assert_eq!(one.fingerprint(), two.fingerprint());
    }

    #[test]
    fn fingerprint_distinguishes_findings() {
        let one = Review::new(vec![high("r", "x")], vec![]);
        let two = Review::new(vec![high("r", "y")], vec![]);
        assert_ne!(one.fingerprint(), two.fingerprint());
        assert_eq!(Review::default().fingerprint(), "");
    }

    #[test]
    fn fingerprint_ignores_repeated_findings() {
        let a = high("layering", "UI imports the database");
        let once = Review::new(vec![a.clone()], vec![]);
        let twice = Review::new(vec![a.clone(), a], vec![]);
        assert_eq!(once.fingerprint(), twice.fingerprint());
    }

    #[test]
    fn deserialized_review_dedups_actions() {
        let review: Review = serde_json::from_str(
            r#"{"findings": [], "requiredActions": ["Fix lint", " fix LINT ", ""], "status": "blocked"}"#,
        )
        .unwrap();
        assert_eq!(review.required_actions(), ["Fix lint"]);
        assert_eq!(review.status(), ReviewStatus::Blocked);

        let empty: Review = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, Review::default());
    }

    #[test]
    fn fingerprint_key_layout() {
        let f = high("layering", "why").with_file("a.rs").with_line(3);
        assert_eq!(f.fingerprint_key(), "high::layering::a.rs::::why");
        assert_eq!(f.location().as_deref(), Some("a.rs:3"));
    }

    #[test]
    fn blocked_appends_sentinel_once() {
        let review = Review::new(vec![high("r", "x")], vec!["Fix it".into()]).blocked();
        assert_eq!(review.status(), ReviewStatus::Blocked);
        assert_eq!(review.required_actions(), ["Fix it", NO_PROGRESS_SENTINEL]);
        assert_eq!(review.clone().blocked().required_actions().len(), 2);
    }

    #[test]
    fn severity_vocabulary() {
        assert_eq!("Critical".parse::<Severity>(), Ok(Severity::High));
        assert_eq!("major".parse::<Severity>(), Ok(Severity::Medium));
        assert_eq!("nit".parse::<Severity>(), Ok(Severity::Low));
        assert!("urgent-ish".parse::<Severity>().is_err());
    }

    #[test]
    fn has_high_and_counts() {
        let review = Review::new(
            vec![high("a", "b"), Finding::new(Severity::Low, "c", "d")],
            vec![],
        );
        assert!(review.has_high());
        assert_eq!(review.count(Severity::Low), 1);
        assert!(review.summary_line().contains("1 high / 0 medium / 1 low"));
    }
}
