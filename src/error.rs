/// Error types for conduit
///
/// This module defines all possible errors that can occur while loading,
/// scanning and mutating a project. Uses thiserror for ergonomic error handling.

use thiserror::Error;

/// Main error type for conduit operations
#[derive(Error, Debug)]
pub enum ConduitError {
    /// A mutation or lookup was attempted before a project was loaded
    #[error("No project loaded")]
    NoProjectLoaded,

    /// I/O errors (directory creation, copies, deletes, scans)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Project root is missing or not a directory
    #[error("Project root not found: {0}")]
    ProjectRootNotFound(String),

    /// Handle does not belong to the current tree (e.g. held across a reload)
    #[error("Stale node reference: {0}")]
    StaleNode(String),

    /// No node matches the given path or name
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Operation refused on this node
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for conduit operations
pub type Result<T> = std::result::Result<T, ConduitError>;

/// Convert ConduitError to a user-friendly error message
impl ConduitError {
    pub fn user_message(&self) -> String {
        match self {
            ConduitError::NoProjectLoaded => {
                "No project loaded. Run 'conduit open <dir>' or pass --root.".to_string()
            }
            ConduitError::Io(e) => {
                format!("File system error. Check permissions. Details: {}", e)
            }
            ConduitError::Serialization(e) => {
                format!("Data format error: {}", e)
            }
            ConduitError::ProjectRootNotFound(path) => {
                format!("Project directory does not exist: {}", path)
            }
            ConduitError::StaleNode(what) => {
                format!("'{}' belongs to a previous load. Reload and try again.", what)
            }
            ConduitError::NodeNotFound(what) => {
                format!("Nothing named '{}' in the project", what)
            }
            ConduitError::InvalidOperation(msg) => msg.clone(),
            ConduitError::Config(msg) => {
                format!("Configuration issue: {}", msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_user_messages() {
        let err = ConduitError::NodeNotFound("Hero".to_string());
        assert!(err.user_message().contains("Hero"));

        let err = ConduitError::NoProjectLoaded;
        assert!(err.user_message().contains("No project loaded"));
    }

    #[test]
    fn test_error_display() {
        let err = ConduitError::ProjectRootNotFound("/missing".to_string());
        let display = format!("{}", err);
        assert!(display.contains("Project root not found"));
        assert!(display.contains("/missing"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ConduitError = io.into();
        assert!(matches!(err, ConduitError::Io(_)));
    }
}
