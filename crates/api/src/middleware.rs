//! API middleware.

#![allow(missing_docs)]

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use aniseg_core::{ReportService, UserService};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub report_service: ReportService,
    pub user_service: UserService,
}

/// Authentication middleware.
///
/// Resolves a `Bearer` token to its user and stores it in the request
/// extensions. Requests without a valid token pass through anonymous;
/// handlers that need a caller reject them through [`crate::extractors::AuthUser`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        match state.user_service.authenticate_by_token(token.trim()).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(e) if e.is_server_error() => {
                tracing::warn!(error = %e, "Token lookup failed");
            }
            Err(_) => {}
        }
    }

    next.run(req).await
}
