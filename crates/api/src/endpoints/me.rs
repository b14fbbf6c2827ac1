//! Endpoints about the caller.

use axum::{Router, extract::State, routing::post};
use aniseg_common::AppResult;
use serde::Serialize;

use super::users::UserResponse;
use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Freshly issued bearer token.
#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Get current user.
async fn me(AuthUser(user): AuthUser) -> ApiResponse<UserResponse> {
    ApiResponse::ok(user.into())
}

/// Replace the caller's bearer token. The old one stops working.
async fn regenerate_token(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<TokenResponse>> {
    let token = state.user_service.regenerate_token(&auth.actor()).await?;

    Ok(ApiResponse::ok(TokenResponse { token }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(me))
        .route("/regenerate-token", post(regenerate_token))
}
