use serde::{Deserialize, Serialize};

use crate::captions::{CaptionSet, ImageData};
use crate::error::SessionError;

/// Lifecycle of the single active analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionState {
    /// Nothing submitted yet, or the last session was reset.
    Idle,
    /// Waiting on the caption service.
    Pending {
        image: ImageData,
        /// Epoch milliseconds when the request was dispatched.
        started_at: i64,
    },
    Succeeded {
        image: ImageData,
        captions: CaptionSet,
        /// History record this result was stored as or loaded from.
        record_id: Option<String>,
    },
    Failed {
        image: ImageData,
        error: SessionError,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Pending { .. } => "pending",
            SessionState::Succeeded { .. } => "succeeded",
            SessionState::Failed { .. } => "failed",
        }
    }

    pub fn image(&self) -> Option<&ImageData> {
        match self {
            SessionState::Idle => None,
            SessionState::Pending { image, .. }
            | SessionState::Succeeded { image, .. }
            | SessionState::Failed { image, .. } => Some(image),
        }
    }

    pub fn captions(&self) -> Option<&CaptionSet> {
        match self {
            SessionState::Succeeded { captions, .. } => Some(captions),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SessionError> {
        match self {
            SessionState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SessionState::Pending { .. })
    }
}

/// A dispatched caption request, tagged with the generation it belongs to.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub generation: u64,
    pub image: ImageData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_serializes_as_status_only() {
        let json = serde_json::to_string(&SessionState::Idle).unwrap();
        assert_eq!(json, r#"{"status":"idle"}"#);
    }

    #[test]
    fn test_failed_serialization() {
        let state = SessionState::Failed {
            image: ImageData::new("image/png", vec![1]),
            error: SessionError::Transport("offline".to_string()),
        };
        let json: serde_json::Value = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["image"], "data:image/png;base64,AQ==");
        assert_eq!(json["error"]["kind"], "transport");
        assert_eq!(json["error"]["message"], "offline");

        let back: SessionState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_accessors() {
        let state = SessionState::Succeeded {
            image: ImageData::new("image/png", vec![1]),
            captions: CaptionSet::new("a", "b", "c"),
            record_id: None,
        };
        assert_eq!(state.name(), "succeeded");
        assert!(state.image().is_some());
        assert_eq!(state.captions().map(|c| c.short.as_str()), Some("a"));
        assert!(state.error().is_none());
        assert!(!state.is_pending());
        assert!(SessionState::Idle.image().is_none());
    }
}
