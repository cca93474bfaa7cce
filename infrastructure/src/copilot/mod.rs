//! Copilot CLI adapter
//!
//! Implements the generation service port for GitHub Copilot CLI.

pub mod error;
pub mod gateway;
pub mod protocol;
pub mod router;
pub mod session;
pub mod transport;
