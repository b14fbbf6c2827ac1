//! Stage/status registry.
//!
//! Pure mapping between the six lifecycle stages and their canonical
//! status symbols, plus the presentation metadata attached to each stage.

use aniseg_common::{AppError, AppResult};
use aniseg_db::entities::report::{self, ReportStatus, Stage};
use serde::Serialize;

/// Number of lifecycle stages.
pub const STAGE_COUNT: i32 = 6;

/// Presentation metadata for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageInfo {
    /// Stage this entry describes.
    pub stage: Stage,
    /// Canonical status of `stage`.
    pub status: ReportStatus,
    /// Short Portuguese label.
    pub title: &'static str,
    /// One-sentence explanation shown to citizens.
    pub description: &'static str,
    /// Hex display color.
    pub color: &'static str,
}

/// Every stage in order. Index `n - 1` describes stage `n`.
pub static STAGE_TABLE: [StageInfo; 6] = [
    StageInfo {
        stage: Stage::Created,
        status: ReportStatus::Criada,
        title: "Denúncia Registrada",
        description: "Aguardando análise inicial pela autoridade",
        color: "#3498db",
    },
    StageInfo {
        stage: Stage::UnderReview,
        status: ReportStatus::EmAnalise,
        title: "Em Análise",
        description: "Autoridade está avaliando a denúncia",
        color: "#f1c40f",
    },
    StageInfo {
        stage: Stage::UnderInvestigation,
        status: ReportStatus::EmInvestigacao,
        title: "Em Investigação",
        description: "Equipe está trabalhando no caso",
        color: "#e67e22",
    },
    StageInfo {
        stage: Stage::AwaitingInspection,
        status: ReportStatus::AguardandoInspecao,
        title: "Aguardando Inspeção",
        description: "Equipe designada para verificação local",
        color: "#9b59b6",
    },
    StageInfo {
        stage: Stage::Resolved,
        status: ReportStatus::Resolvida,
        title: "Resolvida",
        description: "Problema foi resolvido",
        color: "#27ae60",
    },
    StageInfo {
        stage: Stage::Concluded,
        status: ReportStatus::Concluida,
        title: "Concluída",
        description: "Denúncia finalizada e arquivo fechado",
        color: "#16a085",
    },
];

/// Clamp any integer into a valid stage.
#[must_use]
pub const fn normalize_stage(n: i32) -> Stage {
    match Stage::from_number(n) {
        Some(stage) => stage,
        None if n < 1 => Stage::FIRST,
        None => Stage::LAST,
    }
}

/// Metadata for a stage.
#[must_use]
pub fn stage_info(stage: Stage) -> &'static StageInfo {
    &STAGE_TABLE[(stage.number() - 1) as usize]
}

/// Canonical status for a stage.
#[must_use]
pub fn canonical_status(stage: Stage) -> ReportStatus {
    stage_info(stage).status
}

/// Canonical status for a stage number, clamping out-of-range input.
#[must_use]
pub fn status_for_stage(n: i32) -> ReportStatus {
    canonical_status(normalize_stage(n))
}

/// Strict, case-insensitive status lookup.
///
/// Accepts the canonical names in any case, which covers the legacy
/// lower-case spellings (`em_analise`, `em_investigacao`, `concluida`).
pub fn parse_status(s: &str) -> AppResult<ReportStatus> {
    let wanted = s.trim().to_uppercase();
    STAGE_TABLE
        .iter()
        .map(|info| info.status)
        .find(|status| status.as_str() == wanted)
        .ok_or_else(|| AppError::UnknownStatus(s.to_string()))
}

/// Lenient status normalization: unrecognized input becomes `CRIADA`.
///
/// Kept for reading legacy records; request handling uses [`parse_status`].
#[must_use]
pub fn normalize_status(s: &str) -> ReportStatus {
    parse_status(s).unwrap_or(ReportStatus::Criada)
}

/// Stage for a status string, falling back to stage 1 when unrecognized.
#[must_use]
pub fn stage_for_status(s: &str) -> Stage {
    stage_of(normalize_status(s))
}

/// Stage for a known status.
#[must_use]
pub fn stage_of(status: ReportStatus) -> Stage {
    STAGE_TABLE
        .iter()
        .find(|info| info.status == status)
        .map_or(Stage::FIRST, |info| info.stage)
}

/// Progress summary for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressInfo {
    /// Current stage.
    pub stage: Stage,
    /// Always [`STAGE_COUNT`].
    pub total: i32,
    /// `stage / total`, as a percentage.
    pub percent: f64,
    /// Canonical status of the current stage.
    pub status: ReportStatus,
    /// Metadata copied from [`StageInfo`].
    pub title: &'static str,
    /// Metadata copied from [`StageInfo`].
    pub description: &'static str,
    /// Metadata copied from [`StageInfo`].
    pub color: &'static str,
    /// Stage 6 reached.
    pub concluded: bool,
    /// Stages 2 to 4.
    pub in_progress: bool,
    /// `None` once concluded.
    pub next_stage: Option<Stage>,
}

/// Progress summary for a report.
#[must_use]
pub fn progress_info(report: &report::Model) -> ProgressInfo {
    let info = stage_info(report.stage);
    let n = report.stage.number();

    ProgressInfo {
        stage: report.stage,
        total: STAGE_COUNT,
        percent: f64::from(n) / f64::from(STAGE_COUNT) * 100.0,
        status: report.status,
        title: info.title,
        description: info.description,
        color: info.color,
        concluded: report.stage == Stage::LAST,
        in_progress: report.stage != Stage::LAST,
        next_stage: Stage::from_number(n + 1),
    }
}

/// Consistency problems of a report, empty when it is well-formed.
#[must_use]
pub fn validate_report_state(report: &report::Model) -> Vec<String> {
    let mut problems = Vec::new();

    let expected = canonical_status(report.stage);
    if report.status != expected {
        problems.push(format!(
            "status {} out of sync with stage {}, expected {}",
            report.status.as_str(),
            report.stage.number(),
            expected.as_str()
        ));
    }

    let required = [
        ("id", report.id.as_str()),
        ("protocol", report.protocol.as_str()),
        ("address", report.address.as_str()),
        ("neighborhood", report.neighborhood.as_str()),
        ("species", report.species.as_str()),
        ("createdBy", report.created_by.as_str()),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            problems.push(format!("missing {field}"));
        }
    }

    if report.stage == Stage::LAST && report.concluded_at.is_none() {
        problems.push("stage 6 requires a completion time".to_string());
    }

    problems
}
