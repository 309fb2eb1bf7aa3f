use std::sync::Arc;

use crate::engine::SessionRegistry;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    /// Which progress backend is in use ("http" or "memory"), for the health check.
    pub store_kind: &'static str,
}
