//! Lifecycle of the single active image analysis.

pub mod controller;
pub mod manager;
pub mod state;

pub use controller::SessionController;
pub use manager::SessionManager;
pub use state::{PendingRequest, SessionState};
