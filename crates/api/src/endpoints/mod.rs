//! API endpoints.

mod me;
mod reports;
mod stages;
mod users;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/i", me::router())
        .nest("/reports", reports::router())
        .nest("/stages", stages::router())
        .nest("/users", users::router())
}
