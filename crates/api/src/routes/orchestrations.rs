//! Route definitions for pipeline orchestrations.

use axum::routing::get;
use axum::Router;

use crate::handlers::orchestrations;
use crate::state::AppState;

/// Routes mounted at `/orchestrations`.
///
/// ```text
/// POST   /          -> start_orchestration
/// GET    /          -> list_orchestrations
/// GET    /{id}      -> get_orchestration
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(orchestrations::list_orchestrations).post(orchestrations::start_orchestration),
        )
        .route("/{id}", get(orchestrations::get_orchestration))
}
