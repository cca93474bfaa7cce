//! CLI command definitions

use clap::{Parser, ValueEnum};
use conductor_domain::OutputMode;
use std::path::PathBuf;

/// Output format for the run summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored summary with findings and changed files
    Text,
    /// JSON report on stdout
    Json,
}

/// Artifact mode (mirrors `[output] mode`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputModeArg {
    /// Write `changes.patch` only
    Patch,
    /// Also write a branch note with the commands to commit the run
    Branch,
}

impl From<OutputModeArg> for OutputMode {
    fn from(arg: OutputModeArg) -> Self {
        match arg {
            OutputModeArg::Patch => OutputMode::Patch,
            OutputModeArg::Branch => OutputMode::Branch,
        }
    }
}

/// CLI arguments for conductor
#[derive(Parser, Debug)]
#[command(name = "conductor")]
#[command(author, version, about = "Delegate a coding task to role-specialized models and converge on a clean review")]
#[command(long_about = r#"
Conductor plans a task with a planner model, runs each step through the
model assigned to its role, then loops review and remediation until the
final review has no high-severity findings (or the iteration budget runs out).

Roles: frontend, builder, style review, final (architecture) review.

Configuration files are loaded from (in priority order):
1. CONDUCTOR_* environment variables
2. --config <path>       Explicit config file (TOML or JSON)
3. ./conductor.toml      Project-level config
4. ~/.config/conductor/config.toml   Global config

Example:
  conductor "Add a dark-mode toggle to the settings page"
  conductor --builder gpt-5.2-codex --max-iterations 2 "Split the parser module"
  conductor --review-only "Check the layering of the storage crate"
"#)]
pub struct Cli {
    /// Task to delegate (focus hint in --review-only mode)
    pub task: Option<String>,

    /// Workspace root (defaults to the current directory)
    #[arg(short, long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Skip planning and execution; review the current diff only
    #[arg(long)]
    pub review_only: bool,

    // ==================== Model Overrides ====================
    /// Model for planning
    #[arg(long, value_name = "MODEL")]
    pub planner: Option<String>,

    /// Model for frontend steps
    #[arg(long, value_name = "MODEL")]
    pub frontend: Option<String>,

    /// Model for builder steps and remediation
    #[arg(long, value_name = "MODEL")]
    pub builder: Option<String>,

    /// Model for the style review
    #[arg(long, value_name = "MODEL")]
    pub style: Option<String>,

    /// Model for the final architecture review
    #[arg(long, value_name = "MODEL")]
    pub architect: Option<String>,

    // ==================== Loop Overrides ====================
    /// Maximum remediation iterations (1-8), replacing the planner's value
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<u32>,

    /// Stop after the first final review even if it has high findings
    #[arg(long)]
    pub no_review_loop: bool,

    /// Artifact mode
    #[arg(long, value_enum, value_name = "MODE")]
    pub mode: Option<OutputModeArg>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

impl Cli {
    /// `--no-review-loop` as a `reviewRequired` override.
    pub fn review_required_override(&self) -> Option<bool> {
        self.no_review_loop.then_some(false)
    }
}
