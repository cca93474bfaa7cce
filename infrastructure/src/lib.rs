//! Infrastructure layer for conductor
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer:
//!
//! - [`copilot`]: Copilot CLI JSON-RPC adapter ([`GenerationService`](conductor_application::GenerationService))
//! - [`diff`]: git-backed [`DiffProvider`](conductor_application::DiffProvider)
//! - [`logging`]: JSONL [`EventSink`](conductor_application::EventSink)
//! - [`artifacts`]: per-run output directory
//! - [`config`]: configuration file loading

pub mod artifacts;
pub mod config;
pub mod copilot;
pub mod diff;
pub mod logging;

// Re-export commonly used types
pub use artifacts::{ArtifactError, RunArtifacts, RunLog, RunStatus};
pub use config::{
    ConfigLoader, FileConfig, FileLoggingConfig, FileModelsConfig, FileOrchestrationConfig,
    FileOutputConfig, FileRequestConfig, FileSessionConfig,
};
pub use copilot::{
    error::{CopilotError, Result},
    gateway::{CopilotGenerationService, DEFAULT_COPILOT_COMMAND},
    router::MessageRouter,
    session::CopilotSession,
};
pub use diff::GitDiffProvider;
pub use logging::{EVENTS_FILE, JsonlEventSink};
