use std::sync::Arc;

use tabrun_pipeline::Orchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Runs pipeline instances and owns the instance registry.
    pub orchestrator: Arc<Orchestrator>,
}
