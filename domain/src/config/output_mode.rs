//! Output mode value object

use serde::{Deserialize, Serialize};

/// How the changes of a run are handed back to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Leave the edits in the working tree and save them as a patch.
    #[default]
    Patch,
    /// Also write a note describing how to commit them on a branch.
    Branch,
}

impl OutputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputMode::Patch => "patch",
            OutputMode::Branch => "branch",
        }
    }
}

impl std::fmt::Display for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "patch" => Ok(OutputMode::Patch),
            "branch" => Ok(OutputMode::Branch),
            other => Err(format!("unknown output mode: {other}")),
        }
    }
}
