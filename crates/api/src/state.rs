use std::sync::Arc;

use domain::collaborators::AuthVerifier;
use websocket::hub::Hub;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub auth: Arc<dyn AuthVerifier>,
}

impl AppState {
    pub fn new(hub: Arc<Hub>, auth: Arc<dyn AuthVerifier>) -> Self {
        Self { hub, auth }
    }
}
