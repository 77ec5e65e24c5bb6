use crate::session::CaptureController;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<CaptureController>,
}

impl AppState {
    pub fn new(controller: Arc<CaptureController>) -> Self {
        Self { controller }
    }
}
