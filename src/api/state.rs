use crate::control::Controller;
use std::sync::Arc;

/// Application state for API routes
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<Controller>,
}
