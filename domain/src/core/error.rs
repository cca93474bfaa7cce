//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug)]
pub enum DomainError {
    /// The run's workspace root is missing or not a directory.
    #[error("Invalid workspace root: {0}")]
    InvalidWorkspace(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_workspace_display() {
        let error = DomainError::InvalidWorkspace("/nope".to_string());
        assert_eq!(error.to_string(), "Invalid workspace root: /nope");
    }
}
