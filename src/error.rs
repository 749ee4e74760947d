//! Error taxonomy shared by every layer of the crate.

use thiserror::Error;

/// Errors surfaced by the orchestration core.
///
/// `Validation` and `MalformedInput` are raised locally and never reach the
/// network. `Backend` carries the server's `detail` message when one was
/// supplied. `TransientNetwork` means no response arrived at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForgeError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("malformed input for `{field}`: {reason}")]
    MalformedInput { field: String, reason: String },

    #[error("backend returned {status}: {}", message.as_deref().unwrap_or("no detail"))]
    Backend { status: u16, message: Option<String> },

    #[error("network unavailable: {0}")]
    TransientNetwork(String),

    #[error("could not decode backend response: {0}")]
    Decode(String),
}

pub type Result<T, E = ForgeError> = std::result::Result<T, E>;

impl ForgeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True when the failure happened before any request left the process.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::MalformedInput { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientNetwork(_))
    }

    /// Text for an error toast. Server messages are passed through verbatim.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Backend {
                message: Some(msg), ..
            } => msg.clone(),
            Self::Validation(msg) => msg.clone(),
            Self::MalformedInput { field, reason } => format!("{field}: {reason}"),
            _ => fallback.to_string(),
        }
    }
}

impl From<reqwest::Error> for ForgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        if let Some(status) = err.status() {
            return Self::Backend {
                status: status.as_u16(),
                message: None,
            };
        }
        Self::TransientNetwork(err.to_string())
    }
}

impl From<serde_json::Error> for ForgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_server_detail() {
        let err = ForgeError::Backend {
            status: 404,
            message: Some("Dataset not found".into()),
        };
        assert_eq!(err.user_message("Operation failed"), "Dataset not found");

        let bare = ForgeError::Backend {
            status: 500,
            message: None,
        };
        assert_eq!(bare.user_message("Operation failed"), "Operation failed");
        assert_eq!(
            ForgeError::TransientNetwork("refused".into()).user_message("Operation failed"),
            "Operation failed"
        );
    }

    #[test]
    fn test_local_errors_are_classified() {
        assert!(ForgeError::validation("dataset").is_local());
        assert!(ForgeError::malformed("params", "bad json").is_local());
        assert!(!ForgeError::TransientNetwork("x".into()).is_local());
        assert!(ForgeError::TransientNetwork("x".into()).is_transient());
    }

    #[test]
    fn test_display_includes_status_and_detail() {
        let err = ForgeError::Backend {
            status: 400,
            message: Some("Unknown operation: foo".into()),
        };
        assert_eq!(err.to_string(), "backend returned 400: Unknown operation: foo");
    }
}
