use crate::backend::ScanBackend;
use crate::config::Config;
use crate::session::SessionStore;
use std::sync::Arc;

/// Shared application state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn ScanBackend>,
    pub sessions: Arc<SessionStore>,
    pub config: Config,
}
