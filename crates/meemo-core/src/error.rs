//! Error types for meemo.

use thiserror::Error;

/// Result type alias using meemo's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for meemo operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input or missing required fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// Archive bundle is unreadable or its envelope is malformed
    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    /// Requesting identity is not on the note's access list
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Note not found
    #[error("Note not found: {0}")]
    NoteNotFound(uuid::Uuid),

    /// Storage or directory collaborator failed
    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    /// A single link probe failed. Never surfaced past the classifier.
    #[error("Probe failure: {0}")]
    Probe(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors caused by bad caller input rather than a failing
    /// collaborator.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::InvalidArchive(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_validation() {
        let err = Error::Validation("missing content".to_string());
        assert_eq!(err.to_string(), "Validation error: missing content");
    }

    #[test]
    fn test_error_display_invalid_archive() {
        let err = Error::InvalidArchive("content is not JSON".to_string());
        assert_eq!(err.to_string(), "Invalid archive: content is not JSON");
    }

    #[test]
    fn test_error_display_access_denied() {
        let err = Error::AccessDenied("not allowed".to_string());
        assert_eq!(err.to_string(), "Access denied: not allowed");
    }

    #[test]
    fn test_error_display_note_not_found() {
        let id = Uuid::nil();
        let err = Error::NoteNotFound(id);
        assert_eq!(err.to_string(), format!("Note not found: {}", id));
    }

    #[test]
    fn test_error_display_upstream() {
        let err = Error::Upstream("directory unreachable".to_string());
        assert_eq!(err.to_string(), "Upstream unavailable: directory unreachable");
    }

    #[test]
    fn test_is_validation() {
        assert!(Error::Validation("x".into()).is_validation());
        assert!(Error::InvalidArchive("x".into()).is_validation());
        assert!(!Error::AccessDenied("x".into()).is_validation());
        assert!(!Error::Upstream("x".into()).is_validation());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => {
                assert!(!msg.is_empty());
            }
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        match err {
            Error::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
