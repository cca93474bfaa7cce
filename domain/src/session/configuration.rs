//! Session configuration: the cache key for generation sessions.

use crate::core::model::Model;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How the configured system message combines with the service's own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemMessageMode {
    #[default]
    Append,
    Replace,
}

impl SystemMessageMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SystemMessageMode::Append => "append",
            SystemMessageMode::Replace => "replace",
        }
    }
}

/// Everything that shapes a generation session.
///
/// Two values that compare equal share one cached session. Tool names are
/// normalized on construction (trimmed, lowercased, sorted, deduplicated),
/// so `["Shell", "read "]` and `["read", "shell", "READ"]` are the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfiguration {
    model: Model,
    system_message: Option<String>,
    system_message_mode: SystemMessageMode,
    available_tools: BTreeSet<String>,
    excluded_tools: BTreeSet<String>,
}

fn normalize_tools<I, S>(tools: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tools
        .into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

impl SessionConfiguration {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            system_message: None,
            system_message_mode: SystemMessageMode::Append,
            available_tools: BTreeSet::new(),
            excluded_tools: BTreeSet::new(),
        }
    }

    pub fn with_system_message(mut self, message: impl Into<String>, mode: SystemMessageMode) -> Self {
        let message = message.into();
        self.system_message = (!message.trim().is_empty()).then_some(message);
        self.system_message_mode = mode;
        self
    }

    pub fn with_available_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.available_tools = normalize_tools(tools);
        self
    }

    pub fn with_excluded_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.excluded_tools = normalize_tools(tools);
        self
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn system_message(&self) -> Option<&str> {
        self.system_message.as_deref()
    }

    pub fn system_message_mode(&self) -> SystemMessageMode {
        self.system_message_mode
    }

    pub fn available_tools(&self) -> &BTreeSet<String> {
        &self.available_tools
    }

    pub fn excluded_tools(&self) -> &BTreeSet<String> {
        &self.excluded_tools
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tool_lists_are_normalized() {
        let a = SessionConfiguration::new(Model::ClaudeSonnet46)
            .with_available_tools(["Shell", "read "])
            .with_excluded_tools(["web_fetch"]);
        let b = SessionConfiguration::new(Model::ClaudeSonnet46)
            .with_available_tools(["read", "shell", "READ", ""])
            .with_excluded_tools(["WEB_FETCH"]);
        assert_eq!(a, b);

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn excluded_tools_change_the_key() {
        let base = SessionConfiguration::new(Model::Gpt53Codex).with_excluded_tools(["shell"]);
        let other = base.clone().with_excluded_tools(["shell", "write"]);
        assert_ne!(base, other);
    }

    #[test]
    fn system_message_shape_changes_the_key() {
        let base = SessionConfiguration::new(Model::ClaudeOpus46);
        let append = base.clone().with_system_message("Be terse.", SystemMessageMode::Append);
        let replace = base.clone().with_system_message("Be terse.", SystemMessageMode::Replace);
        assert_ne!(append, replace);
        assert_ne!(base, append);
        assert_eq!(base.clone().with_system_message("  ", SystemMessageMode::Append), base);
    }
}
