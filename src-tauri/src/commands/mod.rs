pub mod config;
pub mod history;
pub mod keychain;
pub mod session;
