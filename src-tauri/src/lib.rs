pub mod captions;
#[cfg(feature = "desktop")]
mod commands;
pub mod error;
pub mod history;
pub mod session;

pub use captions::{CaptionField, CaptionService, CaptionSet, ImageData};
pub use history::{AnalysisRecord, HistoryStore, SqliteBackend};
pub use session::{SessionController, SessionManager, SessionState};

#[cfg(feature = "desktop")]
const HISTORY_DB_FILE: &str = "caption_history.db";

/// State shared by every Tauri command.
#[cfg(feature = "desktop")]
pub struct AppState {
    pub controller: SessionController,
}

#[cfg(feature = "desktop")]
impl AppState {
    fn initialize(app: &tauri::AppHandle) -> Result<Self, Box<dyn std::error::Error>> {
        use std::time::Duration;
        use tauri::Manager;

        let request_timeout = commands::config::read_preference(
            app,
            commands::config::PREF_REQUEST_TIMEOUT_SECS,
        )
        .ok()
        .flatten()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(captions::DEFAULT_REQUEST_TIMEOUT);

        let db_path = app.path().app_data_dir()?.join(HISTORY_DB_FILE);
        let backend = match SqliteBackend::open(&db_path) {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!("{}; history will not survive a restart", e);
                SqliteBackend::in_memory()?
            }
        };

        let history = HistoryStore::load(Box::new(backend));
        tracing::info!(
            "Session ready with {} history records, request timeout {:?}",
            history.len(),
            request_timeout
        );
        Ok(Self {
            controller: SessionController::new(SessionManager::new(history), request_timeout),
        })
    }
}

#[cfg(feature = "desktop")]
pub fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tauri::Builder::default()
        .plugin(tauri_plugin_store::Builder::new().build())
        .invoke_handler(tauri::generate_handler![
            commands::keychain::set_api_key,
            commands::keychain::get_api_key,
            commands::keychain::delete_api_key,
            commands::config::get_preference,
            commands::config::set_preference,
            commands::session::submit_image,
            commands::session::retry_analysis,
            commands::session::reset_session,
            commands::session::edit_caption,
            commands::session::get_session,
            commands::history::list_history,
            commands::history::select_history_record,
            commands::history::delete_history_record,
            commands::history::clear_history,
        ])
        .setup(|app| {
            use tauri::Manager;
            let state = AppState::initialize(app.handle())?;
            app.manage(state);
            Ok(())
        })
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
