use tauri::AppHandle;
use tauri_plugin_store::StoreExt;
use tracing::{info, warn};

use crate::error::AppError;

pub const PREFERENCES_STORE: &str = "preferences.json";

pub const PREF_AI_PROVIDER: &str = "ai_provider";
pub const PREF_AI_MODEL: &str = "ai_model";
pub const PREF_REQUEST_TIMEOUT_SECS: &str = "request_timeout_secs";

/// Read a string preference without going through IPC.
pub fn read_preference(app: &AppHandle, key: &str) -> Result<Option<String>, AppError> {
    let store = app.store(PREFERENCES_STORE).map_err(|e| {
        warn!("Failed to open store: {}", e);
        AppError::Config(e.to_string())
    })?;
    Ok(store
        .get(key)
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .filter(|s| !s.is_empty()))
}

#[tauri::command]
pub fn get_preference(app: AppHandle, key: &str) -> Result<Option<String>, String> {
    info!("Getting preference: {}", key);
    read_preference(&app, key).map_err(String::from)
}

#[tauri::command]
pub fn set_preference(app: AppHandle, key: &str, value: &str) -> Result<(), String> {
    info!("Setting preference: {} = {}", key, value);
    let store = app.store(PREFERENCES_STORE).map_err(|e| {
        warn!("Failed to open store: {}", e);
        e.to_string()
    })?;
    store.set(key, serde_json::json!(value));
    store.save().map_err(|e| {
        warn!("Failed to save store: {}", e);
        e.to_string()
    })
}
