use keyring::Entry;
use tracing::{info, warn};

use crate::error::AppError;

const KEYCHAIN_USER: &str = "captionlens";

fn entry(service: &str) -> Result<Entry, AppError> {
    Entry::new(service, KEYCHAIN_USER).map_err(|e| {
        warn!("Failed to create keyring entry for {}: {}", service, e);
        AppError::Keychain(e.to_string())
    })
}

/// Look up a stored API key. `None` when no key has been saved.
pub fn read_api_key(service: &str) -> Result<Option<String>, AppError> {
    match entry(service)?.get_password() {
        Ok(password) => Ok(Some(password)),
        Err(keyring::Error::NoEntry) => {
            info!("No API key found for service: {}", service);
            Ok(None)
        }
        Err(e) => {
            warn!("Failed to get password for {}: {}", service, e);
            Err(AppError::Keychain(e.to_string()))
        }
    }
}

#[tauri::command]
pub fn set_api_key(service: &str, key: &str) -> Result<(), String> {
    info!("Setting API key for service: {}", service);
    entry(service)?.set_password(key).map_err(|e| {
        warn!("Failed to set password for {}: {}", service, e);
        e.to_string()
    })
}

#[tauri::command]
pub fn get_api_key(service: &str) -> Result<Option<String>, String> {
    info!("Getting API key for service: {}", service);
    read_api_key(service).map_err(String::from)
}

#[tauri::command]
pub fn delete_api_key(service: &str) -> Result<(), String> {
    info!("Deleting API key for service: {}", service);
    entry(service)?.delete_credential().map_err(|e| {
        warn!("Failed to delete credential for {}: {}", service, e);
        e.to_string()
    })
}
