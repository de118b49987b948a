use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::captions::CaptionField;

/// Shown when the captioning service fails without telling us why.
pub const GENERIC_SERVICE_FAILURE: &str =
    "The captioning service could not describe this image. Please try again.";

/// Failure reported by a caption service client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptionError {
    #[error("Request to {provider} failed: {message}")]
    Transport { provider: String, message: String },

    #[error("Caption request timed out after {0}s")]
    Timeout(u64),

    #[error("{provider} returned HTTP {status}")]
    Upstream {
        provider: String,
        status: u16,
        message: Option<String>,
    },

    #[error("Malformed response from {provider}: {detail}")]
    Malformed { provider: String, detail: String },

    #[error("Unsupported AI provider: '{0}'. Supported: claude, openai, openrouter")]
    UnsupportedProvider(String),

    /// No usable client could be built from the saved settings.
    #[error("{0}")]
    NotConfigured(String),
}

/// Why a session ended up in `Failed`. Carries the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Transport(String),

    #[error("{0}")]
    Service(String),
}

impl SessionError {
    pub fn message(&self) -> &str {
        match self {
            SessionError::Validation(m)
            | SessionError::Transport(m)
            | SessionError::Service(m) => m,
        }
    }
}

impl From<CaptionError> for SessionError {
    fn from(err: CaptionError) -> Self {
        match err {
            CaptionError::Transport { message, .. } => SessionError::Transport(format!(
                "Could not reach the captioning service: {}",
                message
            )),
            CaptionError::Timeout(secs) => SessionError::Transport(format!(
                "The captioning service did not respond within {} seconds.",
                secs
            )),
            CaptionError::Upstream {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => SessionError::Service(message),
            CaptionError::Upstream { .. } => {
                SessionError::Service(GENERIC_SERVICE_FAILURE.to_string())
            }
            CaptionError::Malformed { .. } => SessionError::Service(
                "The captioning service returned a response that could not be read.".to_string(),
            ),
            CaptionError::UnsupportedProvider(name) => {
                SessionError::Service(format!("Unsupported AI provider: '{}'", name))
            }
            CaptionError::NotConfigured(message) => SessionError::Service(message),
        }
    }
}

/// Local storage failure. Absorbed by the history store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to open history storage: {0}")]
    Open(String),

    #[error("Failed to read history: {0}")]
    Read(String),

    #[error("Failed to write history: {0}")]
    Write(String),

    #[error("Stored history is corrupt: {0}")]
    Decode(String),
}

/// An intent the session cannot act on in its current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionCommandError {
    #[error("Cannot {action} while the session is {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },

    #[error("The {0} caption cannot be empty")]
    EmptyCaption(CaptionField),

    #[error("No history record with id '{0}'")]
    UnknownRecord(String),
}

impl From<SessionCommandError> for String {
    fn from(err: SessionCommandError) -> Self {
        err.to_string()
    }
}

/// Errors raised by the command layer outside the session state machine.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Keychain error: {0}")]
    Keychain(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl From<AppError> for String {
    fn from(err: AppError) -> Self {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_surfaces_verbatim() {
        let err = CaptionError::Upstream {
            provider: "claude".to_string(),
            status: 400,
            message: Some("Image exceeds 5 MB maximum".to_string()),
        };
        assert_eq!(
            SessionError::from(err),
            SessionError::Service("Image exceeds 5 MB maximum".to_string())
        );
    }

    #[test]
    fn test_upstream_without_message_uses_fallback() {
        let err = CaptionError::Upstream {
            provider: "openai".to_string(),
            status: 502,
            message: None,
        };
        assert_eq!(SessionError::from(err).message(), GENERIC_SERVICE_FAILURE);

        let blank = CaptionError::Upstream {
            provider: "openai".to_string(),
            status: 500,
            message: Some("   ".to_string()),
        };
        assert_eq!(SessionError::from(blank).message(), GENERIC_SERVICE_FAILURE);
    }

    #[test]
    fn test_timeout_is_transport() {
        let err = SessionError::from(CaptionError::Timeout(60));
        assert!(matches!(err, SessionError::Transport(_)));
        assert!(err.message().contains("60 seconds"));
    }

    #[test]
    fn test_malformed_is_service() {
        let err = SessionError::from(CaptionError::Malformed {
            provider: "openrouter".to_string(),
            detail: "missing field `short`".to_string(),
        });
        assert!(matches!(err, SessionError::Service(_)));
    }

    #[test]
    fn test_not_configured_surfaces_verbatim() {
        let err = SessionError::from(CaptionError::NotConfigured(
            "No API key configured for claude.".to_string(),
        ));
        assert_eq!(
            err,
            SessionError::Service("No API key configured for claude.".to_string())
        );
    }

    #[test]
    fn test_session_error_serializes_kind_and_message() {
        let json = serde_json::to_string(&SessionError::Validation("bad".to_string())).unwrap();
        assert_eq!(json, r#"{"kind":"validation","message":"bad"}"#);
    }
}
