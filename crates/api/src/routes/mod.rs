pub mod health;
pub mod orchestrations;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /orchestrations              start (POST), list (GET)
/// /orchestrations/{id}         status (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/orchestrations", orchestrations::router())
}
