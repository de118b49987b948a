//! Tauri commands for the active analysis session.
//!
//! The frontend submits images as base64 (optionally as a full data URI) and
//! receives the resulting [`SessionState`] back. Every command returns the
//! state it left the session in so the UI can re-render without polling.

use std::time::Duration;

use base64::Engine;
use tauri::{AppHandle, State};
use tracing::info;

use super::config::{read_preference, PREF_AI_MODEL, PREF_AI_PROVIDER};
use super::keychain::read_api_key;
use crate::captions::{CaptionField, HttpCaptionClient, Provider};
use crate::error::{AppError, CaptionError};
use crate::session::SessionState;
use crate::AppState;

/// Build a caption client from the saved provider, model and API key.
fn resolve_caption_client(
    app: &AppHandle,
    timeout: Duration,
) -> Result<HttpCaptionClient, CaptionError> {
    let not_configured = |e: AppError| CaptionError::NotConfigured(e.to_string());

    let provider = read_preference(app, PREF_AI_PROVIDER)
        .map_err(not_configured)?
        .unwrap_or_else(|| Provider::Claude.as_str().to_string())
        .parse::<Provider>()?;

    let model = read_preference(app, PREF_AI_MODEL)
        .map_err(not_configured)?
        .unwrap_or_else(|| provider.default_model().to_string());

    let api_key = read_api_key(provider.keyring_service())
        .map_err(not_configured)?
        .ok_or_else(|| {
            CaptionError::NotConfigured(format!(
                "No API key configured for {}. Please set it in Settings.",
                provider
            ))
        })?;

    HttpCaptionClient::new(provider, model, api_key, timeout)
}

fn decode_image(image_base64: &str) -> Result<Vec<u8>, String> {
    let encoded = match image_base64.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => image_base64,
    };
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("Invalid image encoding: {}", e))
}

/// Start a new analysis. Supersedes anything still in flight.
///
/// Undecodable payloads, non-images and missing provider settings all end up
/// as a `Failed` session rather than a command error.
#[tauri::command]
pub async fn submit_image(
    app: AppHandle,
    state: State<'_, AppState>,
    image_base64: String,
) -> Result<SessionState, String> {
    let controller = state.controller.clone();
    let bytes = match decode_image(&image_base64) {
        Ok(bytes) => bytes,
        Err(reason) => return Ok(controller.reject(image_base64.into_bytes(), reason)),
    };
    info!("Submitting image ({} bytes)", bytes.len());

    let timeout = controller.request_timeout();
    Ok(controller
        .submit_with(bytes, || resolve_caption_client(&app, timeout))
        .await)
}

/// Re-run the failed analysis with the same image.
#[tauri::command]
pub async fn retry_analysis(
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<SessionState, String> {
    info!("Retrying analysis");
    let controller = state.controller.clone();
    let timeout = controller.request_timeout();
    controller
        .retry_with(|| resolve_caption_client(&app, timeout))
        .await
        .map_err(String::from)
}

#[tauri::command]
pub fn reset_session(state: State<'_, AppState>) -> Result<SessionState, String> {
    info!("Resetting session");
    Ok(state.controller.reset())
}

#[tauri::command]
pub fn edit_caption(
    state: State<'_, AppState>,
    field: CaptionField,
    text: String,
) -> Result<SessionState, String> {
    info!("Editing {} caption", field);
    state
        .controller
        .edit_caption(field, &text)
        .map_err(String::from)
}

#[tauri::command]
pub fn get_session(state: State<'_, AppState>) -> Result<SessionState, String> {
    Ok(state.controller.state())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_base64() {
        assert_eq!(decode_image("AQID").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_decode_data_uri() {
        assert_eq!(
            decode_image("data:image/png;base64,AQID").unwrap(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_image("not base64!").is_err());
    }
}
