//! Tauri commands for the caption history panel.

use tauri::State;
use tracing::{debug, info};

use crate::history::AnalysisRecord;
use crate::session::SessionState;
use crate::AppState;

/// All stored analyses, newest first.
#[tauri::command]
pub fn list_history(state: State<'_, AppState>) -> Result<Vec<AnalysisRecord>, String> {
    let records = state.controller.history();
    info!("Listed {} history records", records.len());
    Ok(records)
}

/// Show a past analysis as the current session.
#[tauri::command]
pub fn select_history_record(
    state: State<'_, AppState>,
    id: String,
) -> Result<SessionState, String> {
    info!("Selecting history record {}", id);
    state.controller.select_record(&id).map_err(String::from)
}

/// Delete one record. Unknown ids are a no-op.
#[tauri::command]
pub fn delete_history_record(state: State<'_, AppState>, id: String) -> Result<(), String> {
    if !state.controller.remove_record(&id) {
        debug!("No history record with id {} to delete", id);
    }
    Ok(())
}

#[tauri::command]
pub fn clear_history(state: State<'_, AppState>) -> Result<(), String> {
    state.controller.clear_history();
    Ok(())
}
