use std::sync::Arc;

use crate::config::Config;
use crate::screening::Screener;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Screening pipeline; owns the injected model client.
    pub screener: Arc<Screener>,
    pub config: Config,
}
