//! Stage metadata endpoint. Public.

use axum::{Router, routing::post};
use aniseg_core::{ReportService, lifecycle::StageInfo};

use crate::{middleware::AppState, response::ApiResponse};

/// Every lifecycle stage with its status, title and color.
async fn stages() -> ApiResponse<&'static [StageInfo]> {
    ApiResponse::ok(ReportService::stages())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(stages))
}
