//! Request extractors.

use aniseg_common::AppError;
use aniseg_core::lifecycle::Actor;
use aniseg_db::entities::app_user;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Authenticated user extractor.
#[derive(Debug, Clone)]
pub struct AuthUser(pub app_user::Model);

impl AuthUser {
    /// The caller as seen by the access policy.
    #[must_use]
    pub fn actor(&self) -> Actor {
        Actor::from(&self.0)
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by the auth middleware
        parts
            .extensions
            .get::<app_user::Model>()
            .cloned()
            .map(AuthUser)
            .ok_or(AppError::Unauthorized)
    }
}
