//! HTTP control surface
//!
//! The two recording controls and their enabled state:
//! - GET /controls - Control state
//! - POST /controls/start-recording - Start a capture session
//! - POST /controls/stop-recording - Stop it and return the session report
//! - GET /session - Stats of the active session
//! - GET /capability - Negotiated capture capability
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::ControlsResponse;
pub use routes::create_router;
pub use state::AppState;
