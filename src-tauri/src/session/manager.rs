//! The single-session state machine.
//!
//! ```text
//! Idle --submit--> Pending --ok--> Succeeded --edit--> Succeeded
//!                  Pending --err--> Failed --retry--> Pending
//! any --reset--> Idle
//! ```
//!
//! Every dispatch bumps a generation counter. A completion is applied only
//! if it carries the current generation and the session is still pending;
//! anything else is a superseded request and is dropped.

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::state::{PendingRequest, SessionState};
use crate::captions::{validate_image, CaptionField, CaptionSet, ImageData};
use crate::error::{CaptionError, SessionCommandError, SessionError};
use crate::history::{AnalysisRecord, HistoryStore};

pub struct SessionManager {
    state: SessionState,
    generation: u64,
    history: HistoryStore,
}

impl SessionManager {
    pub fn new(history: HistoryStore) -> Self {
        Self {
            state: SessionState::Idle,
            generation: 0,
            history,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Start a new analysis, superseding whatever came before.
    ///
    /// Returns the request to dispatch, or `None` when the payload failed
    /// validation and the session went straight to `Failed`.
    pub fn begin_submit(&mut self, bytes: Vec<u8>) -> Option<PendingRequest> {
        self.generation += 1;

        match validate_image(&bytes) {
            Ok(image) => {
                info!(
                    "Session generation {}: pending ({}, {} bytes)",
                    self.generation,
                    image.mime_type(),
                    image.bytes().len()
                );
                self.state = SessionState::Pending {
                    image: image.clone(),
                    started_at: Utc::now().timestamp_millis(),
                };
                Some(PendingRequest {
                    generation: self.generation,
                    image,
                })
            }
            Err(reason) => {
                self.fail_validation(bytes, reason);
                None
            }
        }
    }

    /// Fail a submission whose payload could not even be decoded into bytes.
    /// Supersedes whatever came before, like any other submission.
    pub fn reject_submission(&mut self, payload: Vec<u8>, reason: String) {
        self.generation += 1;
        self.fail_validation(payload, reason);
    }

    fn fail_validation(&mut self, bytes: Vec<u8>, reason: String) {
        warn!("Rejected submission: {}", reason);
        self.state = SessionState::Failed {
            image: ImageData::unrecognized(bytes),
            error: SessionError::Validation(reason),
        };
    }

    /// Re-submit the image of a failed session.
    pub fn begin_retry(&mut self) -> Result<Option<PendingRequest>, SessionCommandError> {
        let bytes = match &self.state {
            SessionState::Failed { image, .. } => image.bytes().to_vec(),
            other => {
                debug!("Ignoring retry while {}", other.name());
                return Err(SessionCommandError::InvalidState {
                    action: "retry",
                    state: other.name(),
                });
            }
        };
        info!("Retrying failed analysis");
        Ok(self.begin_submit(bytes))
    }

    /// Apply the outcome of a dispatched request.
    ///
    /// Returns false if the request was superseded and the outcome dropped.
    pub fn complete(
        &mut self,
        generation: u64,
        outcome: Result<CaptionSet, CaptionError>,
    ) -> bool {
        if generation != self.generation || !self.state.is_pending() {
            debug!(
                "Discarding stale response for generation {} (current {}, {})",
                generation,
                self.generation,
                self.state.name()
            );
            return false;
        }

        let image = match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Pending { image, .. } => image,
            other => {
                self.state = other;
                return false;
            }
        };

        let outcome = outcome.and_then(|captions| {
            if captions.is_complete() {
                Ok(captions)
            } else {
                Err(CaptionError::Malformed {
                    provider: "caption service".to_string(),
                    detail: "one or more caption fields are empty".to_string(),
                })
            }
        });

        self.state = match outcome {
            Ok(captions) => {
                let record = AnalysisRecord {
                    id: Uuid::new_v4().to_string(),
                    image_data: image.clone(),
                    captions: captions.clone(),
                    timestamp: self.next_timestamp(),
                };
                let record_id = record.id.clone();
                self.history.append(record);
                info!("Session generation {}: succeeded", generation);
                SessionState::Succeeded {
                    image,
                    captions,
                    record_id: Some(record_id),
                }
            }
            Err(err) => {
                warn!("Session generation {}: failed: {}", generation, err);
                SessionState::Failed {
                    image,
                    error: SessionError::from(err),
                }
            }
        };
        true
    }

    /// Return to `Idle`, orphaning any in-flight request.
    pub fn reset(&mut self) {
        if self.state.is_idle() {
            return;
        }
        self.generation += 1;
        self.state = SessionState::Idle;
        info!("Session reset");
    }

    /// Replace one caption of the displayed result and mirror it into every
    /// history record holding the same image bytes.
    pub fn edit_caption(
        &mut self,
        field: CaptionField,
        text: &str,
    ) -> Result<(), SessionCommandError> {
        if text.trim().is_empty() {
            return Err(SessionCommandError::EmptyCaption(field));
        }

        let (image, captions) = match &mut self.state {
            SessionState::Succeeded {
                image, captions, ..
            } => (image, captions),
            other => {
                return Err(SessionCommandError::InvalidState {
                    action: "edit captions",
                    state: other.name(),
                })
            }
        };

        captions.set(field, text);
        let updated = self.history.update_captions_by_image(image, captions);
        debug!("Edited {} caption ({} history records updated)", field, updated);
        Ok(())
    }

    /// Show a stored record as the current result.
    pub fn select_record(&mut self, id: &str) -> Result<(), SessionCommandError> {
        let record = self
            .history
            .get(id)
            .cloned()
            .ok_or_else(|| SessionCommandError::UnknownRecord(id.to_string()))?;

        self.generation += 1;
        self.state = SessionState::Succeeded {
            image: record.image_data,
            captions: record.captions,
            record_id: Some(record.id),
        };
        info!("Selected history record {}", id);
        Ok(())
    }

    /// Delete one history record. The displayed result is left alone.
    pub fn remove_record(&mut self, id: &str) -> bool {
        let removed = self.history.remove(id);
        if removed {
            if let SessionState::Succeeded { record_id, .. } = &mut self.state {
                if record_id.as_deref() == Some(id) {
                    *record_id = None;
                }
            }
        }
        removed
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        if let SessionState::Succeeded { record_id, .. } = &mut self.state {
            *record_id = None;
        }
    }

    /// Current time, never earlier than the newest stored record.
    fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        self.history
            .latest_timestamp()
            .map_or(now, |latest| now.max(latest))
    }
}
