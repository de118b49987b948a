use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{info, warn};

use super::manager::SessionManager;
use super::state::{PendingRequest, SessionState};
use crate::captions::{CaptionField, CaptionService, CaptionSet};
use crate::error::{CaptionError, SessionCommandError};
use crate::history::AnalysisRecord;

/// Async front for the [`SessionManager`].
///
/// The manager lock is only held for state transitions, never across the
/// remote call, so reset, edits and history intents go through while a
/// request is in flight. Cloning shares the same session.
#[derive(Clone)]
pub struct SessionController {
    manager: Arc<Mutex<SessionManager>>,
    request_timeout: Duration,
}

impl SessionController {
    pub fn new(manager: SessionManager, request_timeout: Duration) -> Self {
        Self {
            manager: Arc::new(Mutex::new(manager)),
            request_timeout,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Submit a new image and wait for its outcome.
    ///
    /// Returns the session state once this request settles. If a later
    /// intent superseded it, that is the newer state, not this request's.
    pub async fn submit(&self, service: &dyn CaptionService, image: Vec<u8>) -> SessionState {
        let request = self.lock().begin_submit(image);
        self.dispatch(service, request).await
    }

    /// Like [`submit`](Self::submit), but the service is only built once the
    /// image has passed validation and the session is pending. A `resolve`
    /// failure settles the session as `Failed`.
    pub async fn submit_with<S, F>(&self, image: Vec<u8>, resolve: F) -> SessionState
    where
        S: CaptionService,
        F: FnOnce() -> Result<S, CaptionError>,
    {
        let request = self.lock().begin_submit(image);
        self.resolve_and_dispatch(request, resolve).await
    }

    /// Fail a submission whose payload never decoded to image bytes.
    pub fn reject(&self, payload: Vec<u8>, reason: String) -> SessionState {
        let mut manager = self.lock();
        manager.reject_submission(payload, reason);
        manager.state().clone()
    }

    /// Re-submit the image of a failed session.
    pub async fn retry(
        &self,
        service: &dyn CaptionService,
    ) -> Result<SessionState, SessionCommandError> {
        let request = self.lock().begin_retry()?;
        Ok(self.dispatch(service, request).await)
    }

    pub async fn retry_with<S, F>(&self, resolve: F) -> Result<SessionState, SessionCommandError>
    where
        S: CaptionService,
        F: FnOnce() -> Result<S, CaptionError>,
    {
        let request = self.lock().begin_retry()?;
        Ok(self.resolve_and_dispatch(request, resolve).await)
    }

    pub fn reset(&self) -> SessionState {
        let mut manager = self.lock();
        manager.reset();
        manager.state().clone()
    }

    pub fn edit_caption(
        &self,
        field: CaptionField,
        text: &str,
    ) -> Result<SessionState, SessionCommandError> {
        let mut manager = self.lock();
        manager.edit_caption(field, text)?;
        Ok(manager.state().clone())
    }

    pub fn select_record(&self, id: &str) -> Result<SessionState, SessionCommandError> {
        let mut manager = self.lock();
        manager.select_record(id)?;
        Ok(manager.state().clone())
    }

    pub fn remove_record(&self, id: &str) -> bool {
        self.lock().remove_record(id)
    }

    pub fn clear_history(&self) {
        self.lock().clear_history();
    }

    pub fn state(&self) -> SessionState {
        self.lock().state().clone()
    }

    /// Snapshot of the history, newest first.
    pub fn history(&self) -> Vec<AnalysisRecord> {
        self.lock().history().records().to_vec()
    }

    async fn dispatch(
        &self,
        service: &dyn CaptionService,
        request: Option<PendingRequest>,
    ) -> SessionState {
        let Some(request) = request else {
            return self.state();
        };

        let call = service.caption(&request.image);
        let outcome = match tokio::time::timeout(self.request_timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    "Caption request for generation {} timed out after {:?}",
                    request.generation, self.request_timeout
                );
                Err(CaptionError::Timeout(self.request_timeout.as_secs()))
            }
        };

        self.settle(request.generation, outcome)
    }

    async fn resolve_and_dispatch<S, F>(
        &self,
        request: Option<PendingRequest>,
        resolve: F,
    ) -> SessionState
    where
        S: CaptionService,
        F: FnOnce() -> Result<S, CaptionError>,
    {
        let Some(request) = request else {
            return self.state();
        };

        match resolve() {
            Ok(service) => self.dispatch(&service, Some(request)).await,
            Err(e) => {
                warn!("No caption service for generation {}: {}", request.generation, e);
                self.settle(request.generation, Err(e))
            }
        }
    }

    fn settle(&self, generation: u64, outcome: Result<CaptionSet, CaptionError>) -> SessionState {
        let mut manager = self.lock();
        if !manager.complete(generation, outcome) {
            info!(
                "Response for generation {} arrived after it was superseded",
                generation
            );
        }
        manager.state().clone()
    }

    fn lock(&self) -> MutexGuard<'_, SessionManager> {
        self.manager.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captions::ImageData;
    use crate::error::{PersistenceError, SessionError};
    use crate::history::{HistoryBackend, HistoryStore};
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullBackend;

    impl HistoryBackend for NullBackend {
        fn read(&self) -> Result<Option<String>, PersistenceError> {
            Ok(None)
        }
        fn write(&self, _payload: &str) -> Result<(), PersistenceError> {
            Ok(())
        }
        fn remove(&self) -> Result<(), PersistenceError> {
            Ok(())
        }
    }

    /// Answers immediately with a fixed outcome.
    struct FixedService {
        outcome: Result<CaptionSet, CaptionError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CaptionService for FixedService {
        async fn caption(&self, _image: &ImageData) -> Result<CaptionSet, CaptionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    /// Never answers.
    struct HungService;

    #[async_trait]
    impl CaptionService for HungService {
        async fn caption(&self, _image: &ImageData) -> Result<CaptionSet, CaptionError> {
            std::future::pending().await
        }
    }

    fn controller(timeout: Duration) -> SessionController {
        let history = HistoryStore::load(Box::new(NullBackend));
        SessionController::new(SessionManager::new(history), timeout)
    }

    fn png() -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::new_rgb8(4, 4)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    fn service(outcome: Result<CaptionSet, CaptionError>) -> FixedService {
        FixedService {
            outcome,
            calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_submit_success() {
        let controller = controller(Duration::from_secs(5));
        let captions = CaptionSet::new("s", "m", "d");
        let service = service(Ok(captions.clone()));

        let state = controller.submit(&service, png()).await;
        assert_eq!(state.captions(), Some(&captions));
        assert_eq!(controller.history().len(), 1);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_validation_failure_skips_remote_call() {
        let controller = controller(Duration::from_secs(5));
        let service = service(Ok(CaptionSet::new("s", "m", "d")));

        let state = controller.submit(&service, b"%PDF-1.7".to_vec()).await;
        assert!(matches!(state.error(), Some(SessionError::Validation(_))));
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
        assert!(controller.history().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_fails_session() {
        let controller = controller(Duration::from_millis(20));

        let state = controller.submit(&HungService, png()).await;
        assert!(matches!(state.error(), Some(SessionError::Transport(_))));
        assert!(controller.history().is_empty());
    }

    #[tokio::test]
    async fn test_retry_after_failure() {
        let controller = controller(Duration::from_secs(5));
        let failing = service(Err(CaptionError::Upstream {
            provider: "claude".to_string(),
            status: 529,
            message: Some("Overloaded".to_string()),
        }));

        let state = controller.submit(&failing, png()).await;
        assert_eq!(
            state.error(),
            Some(&SessionError::Service("Overloaded".to_string()))
        );

        let working = service(Ok(CaptionSet::new("s", "m", "d")));
        let state = controller.retry(&working).await.unwrap();
        assert_eq!(state.name(), "succeeded");
        assert_eq!(controller.history().len(), 1);

        assert!(controller.retry(&working).await.is_err());
    }

    #[tokio::test]
    async fn test_unresolvable_service_fails_through_session() {
        let controller = controller(Duration::from_secs(5));

        let state = controller
            .submit_with(png(), || -> Result<FixedService, CaptionError> {
                Err(CaptionError::NotConfigured(
                    "No API key configured for claude.".to_string(),
                ))
            })
            .await;

        assert_eq!(
            state.error(),
            Some(&SessionError::Service(
                "No API key configured for claude.".to_string()
            ))
        );
        assert!(state.image().is_some());
        assert!(controller.history().is_empty());

        let state = controller
            .retry_with(|| Ok(service(Ok(CaptionSet::new("s", "m", "d")))))
            .await
            .unwrap();
        assert_eq!(state.name(), "succeeded");
    }

    #[tokio::test]
    async fn test_validation_runs_before_service_is_resolved() {
        let controller = controller(Duration::from_secs(5));
        let resolved = AtomicUsize::new(0);

        let state = controller
            .submit_with(b"hello".to_vec(), || -> Result<FixedService, CaptionError> {
                resolved.fetch_add(1, Ordering::SeqCst);
                Err(CaptionError::NotConfigured("no key".to_string()))
            })
            .await;

        assert!(matches!(state.error(), Some(SessionError::Validation(_))));
        assert_eq!(resolved.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unresolvable_service_supersedes_previous_result() {
        let controller = controller(Duration::from_secs(5));
        controller
            .submit(&service(Ok(CaptionSet::new("s", "m", "d"))), png())
            .await;

        let state = controller
            .submit_with(png(), || -> Result<FixedService, CaptionError> {
                Err(CaptionError::NotConfigured("no key".to_string()))
            })
            .await;

        assert_eq!(state.name(), "failed");
        assert!(state.captions().is_none());
        assert_eq!(controller.history().len(), 1);
    }

    #[tokio::test]
    async fn test_edit_and_clear_through_controller() {
        let controller = controller(Duration::from_secs(5));
        let service = service(Ok(CaptionSet::new("s", "m", "d")));
        controller.submit(&service, png()).await;

        let state = controller.edit_caption(CaptionField::Detailed, "new alt text").unwrap();
        assert_eq!(state.captions().unwrap().detailed, "new alt text");
        assert_eq!(controller.history()[0].captions.detailed, "new alt text");

        controller.clear_history();
        assert!(controller.history().is_empty());
        assert_eq!(controller.reset(), SessionState::Idle);
    }
}
