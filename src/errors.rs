use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("network error during {operation}: {source}")]
    Network {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{operation} rejected by gateway ({status}): {message}")]
    Remote {
        operation: &'static str,
        status: u16,
        message: String,
    },
    #[error("invalid input for {operation}: {reason}")]
    Validation {
        operation: &'static str,
        reason: String,
    },
    #[error("{operation} is not supported: {reason}")]
    Unsupported {
        operation: &'static str,
        reason: String,
    },
    #[error("object not found during {operation}: {key}")]
    NotFound { operation: &'static str, key: String },
    #[error("conflict during {operation}: {key} ({reason})")]
    Conflict {
        operation: &'static str,
        key: String,
        reason: String,
    },
    #[error("io error during {operation} for {path}: {source}")]
    LocalIo {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed gateway response for {operation}: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn network(operation: &'static str, source: reqwest::Error) -> Self {
        Self::Network { operation, source }
    }

    pub fn remote(operation: &'static str, status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            operation,
            status,
            message: message.into(),
        }
    }

    pub fn validation(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            operation,
            reason: reason.into(),
        }
    }

    pub fn unsupported(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            operation,
            reason: reason.into(),
        }
    }

    pub fn not_found(operation: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            operation,
            key: key.into(),
        }
    }

    pub fn conflict(
        operation: &'static str,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            operation,
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn local_io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::LocalIo {
            operation,
            path: path.into(),
            source,
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            Self::Network { operation, .. }
            | Self::Remote { operation, .. }
            | Self::Validation { operation, .. }
            | Self::Unsupported { operation, .. }
            | Self::NotFound { operation, .. }
            | Self::Conflict { operation, .. }
            | Self::LocalIo { operation, .. }
            | Self::Decode { operation, .. } => operation,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Text for the notice line. Gateway messages are shown as-is.
    pub fn user_message(&self) -> String {
        match self {
            Self::Remote { message, .. } => message.clone(),
            Self::Validation { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}

/// Message used when a failed gateway response carries no `error` field.
pub fn fallback_message(operation: &'static str) -> &'static str {
    match operation {
        "list" => "Failed to fetch files",
        "upload" => "Upload failed",
        "download" => "Download failed",
        "delete" => "Delete failed",
        "rename" => "Rename failed",
        "create-folder" => "Create folder failed",
        _ => "Request failed",
    }
}

#[cfg(test)]
mod tests {
    use super::{AppError, fallback_message};

    #[test]
    fn remote_user_message_is_gateway_text() {
        let err = AppError::remote("list", 500, "bucket not found");
        assert_eq!(err.user_message(), "bucket not found");
        assert_eq!(err.operation(), "list");
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn validation_is_flagged() {
        let err = AppError::validation("rename", "new name is required");
        assert!(err.is_validation());
        assert_eq!(err.user_message(), "new name is required");
        assert!(!AppError::not_found("delete", "a.txt").is_validation());
    }

    #[test]
    fn fallback_messages_follow_operation() {
        assert_eq!(fallback_message("list"), "Failed to fetch files");
        assert_eq!(fallback_message("create-folder"), "Create folder failed");
        assert_eq!(fallback_message("whatever"), "Request failed");
    }
}
