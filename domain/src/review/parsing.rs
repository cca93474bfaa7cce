//! Structured-output parsing for role handler replies.
//!
//! | Function | Reply shape |
//! |----------|-------------|
//! | [`parse_review_response`] | `{"findings": [...], "requiredActions": [...]}` |
//! | [`parse_touched_files`] | `{"filesTouched": ["src/a.rs", ...]}` |
//!
//! Both accept the JSON inside a fenced block or embedded in prose, and
//! return [`OutputParseError`] when the reply cannot be interpreted.

use super::entities::{Finding, Review, Severity};
use crate::util::extract_json_object;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;

/// A role reply that is not the expected structured output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutputParseError {
    #[error("No JSON object found in the reply")]
    MissingJson,

    #[error("Reply contains invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Reply JSON has an unexpected shape: {0}")]
    UnexpectedShape(String),
}

fn parse_object(reply: &str) -> Result<Map<String, Value>, OutputParseError> {
    let json = extract_json_object(reply).ok_or(OutputParseError::MissingJson)?;
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(OutputParseError::UnexpectedShape("expected an object".into())),
        Err(e) => Err(OutputParseError::InvalidJson(e.to_string())),
    }
}

fn first<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| object.get(*n))
}

fn optional_text(object: &Map<String, Value>, names: &[&str]) -> Option<String> {
    first(object, names)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse a review reply.
///
/// A missing `findings` array is an error (an empty array is a clean
/// review); `requiredActions` defaults to empty.
pub fn parse_review_response(reply: &str) -> Result<Review, OutputParseError> {
    let object = parse_object(reply)?;

    let findings_json = object
        .get("findings")
        .and_then(Value::as_array)
        .ok_or_else(|| OutputParseError::UnexpectedShape("`findings` must be an array".into()))?;

    let findings = findings_json
        .iter()
        .enumerate()
        .map(|(i, f)| parse_finding(f, i + 1))
        .collect::<Result<Vec<_>, _>>()?;

    let required_actions = match first(&object, &["requiredActions", "required_actions"]) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(actions)) => actions
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(_) => {
            return Err(OutputParseError::UnexpectedShape(
                "`requiredActions` must be an array of strings".into(),
            ));
        }
    };

    Ok(Review::new(findings, required_actions))
}

fn parse_finding(value: &Value, index: usize) -> Result<Finding, OutputParseError> {
    let object = value
        .as_object()
        .ok_or_else(|| OutputParseError::UnexpectedShape(format!("finding {index} must be an object")))?;

    let severity = first(object, &["severity", "level"])
        .and_then(Value::as_str)
        .ok_or_else(|| OutputParseError::UnexpectedShape(format!("finding {index} has no severity")))?
        .parse::<Severity>()
        .map_err(|e| OutputParseError::UnexpectedShape(format!("finding {index}: {e}")))?;

    let rationale = optional_text(object, &["rationale", "message", "description"])
        .ok_or_else(|| OutputParseError::UnexpectedShape(format!("finding {index} has no rationale")))?;

    let mut finding = Finding::new(
        severity,
        optional_text(object, &["rule", "category", "id"]).unwrap_or_else(|| "general".to_string()),
        rationale,
    );
    finding.file = optional_text(object, &["file", "path"]).map(|f| normalize_relative(&f));
    finding.symbol = optional_text(object, &["symbol"]);
    finding.line = first(object, &["line"])
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok());
    Ok(finding)
}

/// Parse a mutating role's reply into workspace-relative paths.
pub fn parse_touched_files(reply: &str) -> Result<BTreeSet<String>, OutputParseError> {
    let object = parse_object(reply)?;
    let files = first(&object, &["filesTouched", "files_touched", "touchedFiles"])
        .and_then(Value::as_array)
        .ok_or_else(|| OutputParseError::UnexpectedShape("`filesTouched` must be an array".into()))?;

    Ok(files
        .iter()
        .filter_map(Value::as_str)
        .map(normalize_relative)
        .filter(|f| !f.is_empty())
        .collect())
}

/// Forward slashes, no leading `./`.
pub fn normalize_relative(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let mut rest = path.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.to_string()
}
