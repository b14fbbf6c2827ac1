//! User management endpoints.

use axum::{Json, Router, extract::State, routing::post};
use aniseg_common::AppResult;
use aniseg_core::{CreateUserInput, UpdateUserInput};
use aniseg_db::entities::app_user::{self, Role};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{Ack, ApiResponse},
};

/// User response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<app_user::Model> for UserResponse {
    fn from(user: app_user::Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            phone: user.phone,
            is_active: user.is_active,
            created_at: user.created_at.to_rfc3339(),
            updated_at: user.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// A new user and the bearer token issued to them.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUserResponse {
    pub user: UserResponse,
    /// Shown once; only its hash is stored.
    pub token: String,
}

/// Show user request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdRequest {
    pub user_id: String,
}

/// List users request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersRequest {
    pub role: Option<Role>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

const fn default_limit() -> u64 {
    20
}

/// Update user request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub user_id: String,
    #[serde(flatten)]
    pub changes: UpdateUserInput,
}

/// Provision a user.
async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateUserInput>,
) -> AppResult<ApiResponse<CreatedUserResponse>> {
    let (user, token) = state.user_service.create(&auth.actor(), req).await?;

    Ok(ApiResponse::ok(CreatedUserResponse {
        user: user.into(),
        token,
    }))
}

/// Show a user (self or staff).
async fn show(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UserIdRequest>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state
        .user_service
        .get(&auth.actor(), &req.user_id)
        .await?;

    Ok(ApiResponse::ok(user.into()))
}

/// List users.
async fn list(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListUsersRequest>,
) -> AppResult<ApiResponse<Vec<UserResponse>>> {
    let limit = req.limit.min(100);
    let users = state
        .user_service
        .list(&auth.actor(), req.role, limit, req.offset)
        .await?;

    Ok(ApiResponse::ok(users.into_iter().map(Into::into).collect()))
}

/// Update a user.
async fn update(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state
        .user_service
        .update(&auth.actor(), &req.user_id, req.changes)
        .await?;

    Ok(ApiResponse::ok(user.into()))
}

/// Delete a user. Their reports are kept.
async fn delete(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UserIdRequest>,
) -> AppResult<ApiResponse<Ack>> {
    state
        .user_service
        .delete(&auth.actor(), &req.user_id)
        .await?;

    Ok(Ack::ok())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/show", post(show))
        .route("/list", post(list))
        .route("/update", post(update))
        .route("/delete", post(delete))
}
