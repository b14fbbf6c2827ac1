//! Report endpoints.

use axum::{Json, Router, extract::State, routing::post};
use aniseg_common::AppResult;
use aniseg_core::{
    CreateReportInput, ListReportsInput, ReportPage, ReporterSnapshot, lifecycle::ProgressInfo,
};
use aniseg_db::{
    entities::report::{
        self, AnimalCondition, Comment, EvidenceItem, Feedback, FileDescriptor, HistoryEntry,
        IncidentType, Priority, ReportStatus, Stage,
    },
    repositories::ReportStats,
};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{Ack, ApiResponse},
};

// ==================== Request/Response Types ====================

/// Report response, including its full history.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub id: String,
    pub protocol: String,
    pub address: String,
    pub neighborhood: String,
    pub incident_type: IncidentType,
    pub species: String,
    pub condition: AnimalCondition,
    pub description: Option<String>,
    pub suspect_name: Option<String>,
    pub other_info: Option<String>,
    pub reporter_name: Option<String>,
    pub reporter_contact: Option<String>,
    pub stage: Stage,
    pub status: ReportStatus,
    pub priority: Priority,
    pub created_by: String,
    pub assigned_authority_id: Option<String>,
    pub assigned_authority_email: Option<String>,
    pub comments: Vec<Comment>,
    pub evidence: Vec<EvidenceItem>,
    pub feedback: Vec<Feedback>,
    pub history: Vec<HistoryEntry>,
    pub confirmation_deadline: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub concluded_at: Option<String>,
}

impl From<report::Model> for ReportResponse {
    fn from(r: report::Model) -> Self {
        Self {
            id: r.id,
            protocol: r.protocol,
            address: r.address,
            neighborhood: r.neighborhood,
            incident_type: r.incident_type,
            species: r.species,
            condition: r.condition,
            description: r.description,
            suspect_name: r.suspect_name,
            other_info: r.other_info,
            reporter_name: r.reporter_name,
            reporter_contact: r.reporter_contact,
            stage: r.stage,
            status: r.status,
            priority: r.priority,
            created_by: r.created_by,
            assigned_authority_id: r.assigned_authority_id,
            assigned_authority_email: r.assigned_authority_email,
            comments: r.comments.0,
            evidence: r.evidence.0,
            feedback: r.feedback.0,
            history: r.history.0,
            confirmation_deadline: r.confirmation_deadline.map(|t| t.to_rfc3339()),
            created_at: r.created_at.to_rfc3339(),
            updated_at: r.updated_at.to_rfc3339(),
            concluded_at: r.concluded_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// One page of reports.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportListResponse {
    pub items: Vec<ReportResponse>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl From<ReportPage> for ReportListResponse {
    fn from(page: ReportPage) -> Self {
        Self {
            items: page.items.into_iter().map(Into::into).collect(),
            total: page.total,
            page: page.page,
            limit: page.limit,
            total_pages: page.total_pages,
        }
    }
}

/// Request targeting one report.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportIdRequest {
    pub report_id: String,
}

/// Show by protocol request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowByProtocolRequest {
    pub protocol: String,
}

/// Set priority request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPriorityRequest {
    pub report_id: String,
    pub priority: String,
}

/// Request carrying free text: comments and feedback.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRequest {
    pub report_id: String,
    #[serde(default)]
    pub text: String,
}

/// Add evidence request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEvidenceRequest {
    pub report_id: String,
    #[serde(default)]
    pub files: Vec<FileDescriptor>,
}

/// Set status request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStatusRequest {
    pub report_id: String,
    pub status: String,
    pub reason: Option<String>,
}

// ==================== Handlers ====================

/// File a report.
async fn create(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateReportInput>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let report = state
        .report_service
        .create(&auth.actor(), ReporterSnapshot::from(&auth.0), req)
        .await?;

    Ok(ApiResponse::ok(report.into()))
}

/// Show a report.
async fn show(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ReportIdRequest>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let report = state
        .report_service
        .get(&auth.actor(), &req.report_id)
        .await?;

    Ok(ApiResponse::ok(report.into()))
}

/// Show a report by protocol number.
async fn show_by_protocol(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ShowByProtocolRequest>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let report = state
        .report_service
        .get_by_protocol(&auth.actor(), &req.protocol)
        .await?;

    Ok(ApiResponse::ok(report.into()))
}

/// List reports.
async fn list(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListReportsInput>,
) -> AppResult<ApiResponse<ReportListResponse>> {
    let page = state.report_service.list(&auth.actor(), req).await?;

    Ok(ApiResponse::ok(page.into()))
}

/// Accept a report.
async fn accept(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ReportIdRequest>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let report = state
        .report_service
        .accept(&auth.actor(), &req.report_id)
        .await?;

    Ok(ApiResponse::ok(report.into()))
}

/// Advance a report by one stage.
async fn advance(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ReportIdRequest>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let report = state
        .report_service
        .advance_stage(&auth.actor(), &req.report_id)
        .await?;

    Ok(ApiResponse::ok(report.into()))
}

/// Change a report's priority.
async fn set_priority(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SetPriorityRequest>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let report = state
        .report_service
        .set_priority(&auth.actor(), &req.report_id, &req.priority)
        .await?;

    Ok(ApiResponse::ok(report.into()))
}

/// Comment on a report.
async fn comment(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<TextRequest>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let report = state
        .report_service
        .add_comment(&auth.actor(), &req.report_id, &req.text)
        .await?;

    Ok(ApiResponse::ok(report.into()))
}

/// Attach evidence to a report.
async fn add_evidence(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<AddEvidenceRequest>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let report = state
        .report_service
        .add_evidence(&auth.actor(), &req.report_id, req.files)
        .await?;

    Ok(ApiResponse::ok(report.into()))
}

/// Leave feedback on a concluded report.
async fn feedback(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<TextRequest>,
) -> AppResult<ApiResponse<Ack>> {
    state
        .report_service
        .add_feedback(&auth.actor(), &req.report_id, &req.text)
        .await?;

    Ok(Ack::ok())
}

/// Legacy status setter.
async fn set_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SetStatusRequest>,
) -> AppResult<ApiResponse<ReportResponse>> {
    let report = state
        .report_service
        .set_status(&auth.actor(), &req.report_id, &req.status, req.reason)
        .await?;

    Ok(ApiResponse::ok(report.into()))
}

/// Progress summary of a report.
async fn progress(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ReportIdRequest>,
) -> AppResult<ApiResponse<ProgressInfo>> {
    let progress = state
        .report_service
        .progress(&auth.actor(), &req.report_id)
        .await?;

    Ok(ApiResponse::ok(progress))
}

/// Dashboard counters.
async fn stats(auth: AuthUser, State(state): State<AppState>) -> AppResult<ApiResponse<ReportStats>> {
    let stats = state.report_service.stats(&auth.actor()).await?;

    Ok(ApiResponse::ok(stats))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/show", post(show))
        .route("/show-by-protocol", post(show_by_protocol))
        .route("/list", post(list))
        .route("/accept", post(accept))
        .route("/advance", post(advance))
        .route("/set-priority", post(set_priority))
        .route("/comment", post(comment))
        .route("/add-evidence", post(add_evidence))
        .route("/feedback", post(feedback))
        .route("/set-status", post(set_status))
        .route("/progress", post(progress))
        .route("/stats", post(stats))
}
