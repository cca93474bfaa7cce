//! Model value object representing a generation-service model

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Models known to the generation service (Value Object)
///
/// Unknown identifiers are preserved verbatim in [`Model::Custom`] so that a
/// newly released model can be selected from configuration without a code
/// change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Model {
    // Claude models
    ClaudeSonnet46,
    ClaudeOpus46,
    ClaudeSonnet45,
    ClaudeHaiku45,
    // GPT models
    Gpt53Codex,
    Gpt52Codex,
    Gpt5Mini,
    // Gemini models
    Gemini3Pro,
    // Custom
    Custom(String),
}

impl Model {
    /// Get the string identifier for this model
    pub fn as_str(&self) -> &str {
        match self {
            Model::ClaudeSonnet46 => "claude-sonnet-4.6",
            Model::ClaudeOpus46 => "claude-opus-4.6",
            Model::ClaudeSonnet45 => "claude-sonnet-4.5",
            Model::ClaudeHaiku45 => "claude-haiku-4.5",
            Model::Gpt53Codex => "gpt-5.3-codex",
            Model::Gpt52Codex => "gpt-5.2-codex",
            Model::Gpt5Mini => "gpt-5-mini",
            Model::Gemini3Pro => "gemini-3-pro-preview",
            Model::Custom(s) => s,
        }
    }

    /// Check if this is a Claude model
    pub fn is_claude(&self) -> bool {
        matches!(
            self,
            Model::ClaudeSonnet46 | Model::ClaudeOpus46 | Model::ClaudeSonnet45 | Model::ClaudeHaiku45
        )
    }

    /// Check if this is a GPT model
    pub fn is_gpt(&self) -> bool {
        matches!(self, Model::Gpt53Codex | Model::Gpt52Codex | Model::Gpt5Mini)
    }
}

impl Default for Model {
    /// Returns the default model (Claude Sonnet 4.6)
    fn default() -> Self {
        Model::ClaudeSonnet46
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Model {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim() {
            "claude-sonnet-4.6" | "sonnet-4.6" => Model::ClaudeSonnet46,
            "claude-opus-4.6" | "opus-4.6" => Model::ClaudeOpus46,
            "claude-sonnet-4.5" => Model::ClaudeSonnet45,
            "claude-haiku-4.5" => Model::ClaudeHaiku45,
            "gpt-5.3-codex" | "codex-5.3" => Model::Gpt53Codex,
            "gpt-5.2-codex" => Model::Gpt52Codex,
            "gpt-5-mini" => Model::Gpt5Mini,
            "gemini-3-pro-preview" => Model::Gemini3Pro,
            other => Model::Custom(other.to_string()),
        })
    }
}

impl Serialize for Model {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Model {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let Ok(model) = s.parse::<Model>();
        Ok(model)
    }
}
