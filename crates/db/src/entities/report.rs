//! Animal-welfare report ("denúncia") entity.
//!
//! The owned collections (comments, evidence, feedback and the audit
//! history) are embedded as JSONB. They are append-only: nothing in the
//! store layer rewrites or reorders an existing element.

use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle stage, persisted as its number (1-6).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(into = "i32", try_from = "i32")]
pub enum Stage {
    #[sea_orm(num_value = 1)]
    Created,
    #[sea_orm(num_value = 2)]
    UnderReview,
    #[sea_orm(num_value = 3)]
    UnderInvestigation,
    #[sea_orm(num_value = 4)]
    AwaitingInspection,
    #[sea_orm(num_value = 5)]
    Resolved,
    #[sea_orm(num_value = 6)]
    Concluded,
}

impl Stage {
    /// First stage of every report.
    pub const FIRST: Self = Self::Created;
    /// Terminal stage.
    pub const LAST: Self = Self::Concluded;

    /// Stage number, 1-6.
    #[must_use]
    pub const fn number(self) -> i32 {
        match self {
            Self::Created => 1,
            Self::UnderReview => 2,
            Self::UnderInvestigation => 3,
            Self::AwaitingInspection => 4,
            Self::Resolved => 5,
            Self::Concluded => 6,
        }
    }

    /// Exact lookup; `None` outside 1-6.
    #[must_use]
    pub const fn from_number(n: i32) -> Option<Self> {
        match n {
            1 => Some(Self::Created),
            2 => Some(Self::UnderReview),
            3 => Some(Self::UnderInvestigation),
            4 => Some(Self::AwaitingInspection),
            5 => Some(Self::Resolved),
            6 => Some(Self::Concluded),
            _ => None,
        }
    }
}

impl From<Stage> for i32 {
    fn from(stage: Stage) -> Self {
        stage.number()
    }
}

impl TryFrom<i32> for Stage {
    type Error = String;

    fn try_from(n: i32) -> Result<Self, Self::Error> {
        Self::from_number(n).ok_or_else(|| format!("stage {n} outside 1..=6"))
    }
}

/// Symbolic status. Always the canonical projection of [`Stage`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum ReportStatus {
    #[sea_orm(string_value = "CRIADA")]
    #[serde(rename = "CRIADA")]
    Criada,
    #[sea_orm(string_value = "EM_ANALISE")]
    #[serde(rename = "EM_ANALISE")]
    EmAnalise,
    #[sea_orm(string_value = "EM_INVESTIGACAO")]
    #[serde(rename = "EM_INVESTIGACAO")]
    EmInvestigacao,
    #[sea_orm(string_value = "AGUARDANDO_INSPECAO")]
    #[serde(rename = "AGUARDANDO_INSPECAO")]
    AguardandoInspecao,
    #[sea_orm(string_value = "RESOLVIDA")]
    #[serde(rename = "RESOLVIDA")]
    Resolvida,
    #[sea_orm(string_value = "CONCLUIDA")]
    #[serde(rename = "CONCLUIDA")]
    Concluida,
}

impl ReportStatus {
    /// Persisted and wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Criada => "CRIADA",
            Self::EmAnalise => "EM_ANALISE",
            Self::EmInvestigacao => "EM_INVESTIGACAO",
            Self::AguardandoInspecao => "AGUARDANDO_INSPECAO",
            Self::Resolvida => "RESOLVIDA",
            Self::Concluida => "CONCLUIDA",
        }
    }
}

/// Triage priority, independent of the stage.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Priority {
    #[sea_orm(string_value = "BAIXA")]
    #[serde(rename = "BAIXA")]
    Low,
    #[sea_orm(string_value = "MEDIA")]
    #[serde(rename = "MEDIA")]
    #[default]
    Medium,
    #[sea_orm(string_value = "ALTA")]
    #[serde(rename = "ALTA")]
    High,
    #[sea_orm(string_value = "URGENTE")]
    #[serde(rename = "URGENTE")]
    Urgent,
}

impl Priority {
    /// Persisted and wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "BAIXA",
            Self::Medium => "MEDIA",
            Self::High => "ALTA",
            Self::Urgent => "URGENTE",
        }
    }
}

/// Kind of incident being reported.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum IncidentType {
    #[sea_orm(string_value = "abandono")]
    #[serde(rename = "abandono")]
    Abandonment,
    #[sea_orm(string_value = "maus_tratos")]
    #[serde(rename = "maus_tratos")]
    Mistreatment,
    #[sea_orm(string_value = "negligencia")]
    #[serde(rename = "negligencia")]
    Neglect,
    #[sea_orm(string_value = "violencia_fisica")]
    #[serde(rename = "violencia_fisica")]
    PhysicalViolence,
    #[sea_orm(string_value = "comercio_ilegal")]
    #[serde(rename = "comercio_ilegal")]
    IllegalTrade,
    #[sea_orm(string_value = "outro")]
    #[serde(rename = "outro")]
    Other,
}

impl IncidentType {
    /// Persisted and wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Abandonment => "abandono",
            Self::Mistreatment => "maus_tratos",
            Self::Neglect => "negligencia",
            Self::PhysicalViolence => "violencia_fisica",
            Self::IllegalTrade => "comercio_ilegal",
            Self::Other => "outro",
        }
    }
}

/// Observed condition of the animal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum AnimalCondition {
    #[sea_orm(string_value = "saudavel")]
    #[serde(rename = "saudavel")]
    Healthy,
    #[sea_orm(string_value = "ferido")]
    #[serde(rename = "ferido")]
    Injured,
    #[sea_orm(string_value = "desnutrido")]
    #[serde(rename = "desnutrido")]
    Malnourished,
    #[sea_orm(string_value = "em_risco")]
    #[serde(rename = "em_risco")]
    AtRisk,
}

impl AnimalCondition {
    /// Persisted and wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "saudavel",
            Self::Injured => "ferido",
            Self::Malnourished => "desnutrido",
            Self::AtRisk => "em_risco",
        }
    }
}

/// Audit history entry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryKind {
    #[serde(rename = "CRIACAO")]
    Creation,
    #[serde(rename = "ACEITAR_DENUNCIA")]
    Acceptance,
    #[serde(rename = "MUDANCA_STATUS")]
    StatusChange,
    #[serde(rename = "AVANCAR_ETAPA")]
    StageAdvance,
    #[serde(rename = "ALTERACAO_PRIORIDADE")]
    PriorityChange,
    #[serde(rename = "COMENTARIO")]
    CommentAdded,
    #[serde(rename = "EVIDENCIAS_ADICIONADAS")]
    EvidenceAdded,
    #[serde(rename = "ADICIONAR_FEEDBACK")]
    FeedbackAdded,
}

/// Attachment metadata. File bytes never reach this system.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Original file name, including extension.
    pub name: String,
    /// Size in bytes.
    pub size: i64,
}

/// One evidence attachment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceItem {
    pub file: FileDescriptor,
    pub uploaded_by: String,
    pub uploaded_at: DateTimeWithTimeZone,
}

/// Comment left on a report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub text: String,
    pub author_id: String,
    pub author_email: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

/// Post-completion feedback from the creator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub text: String,
    pub author_id: String,
    pub created_at: DateTimeWithTimeZone,
}

/// Structured audit record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub at: DateTimeWithTimeZone,
    pub kind: HistoryKind,
    pub actor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_role: Option<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Embedded comment list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Comments(pub Vec<Comment>);

/// Embedded evidence list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct EvidenceList(pub Vec<EvidenceItem>);

/// Embedded feedback list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct FeedbackList(pub Vec<Feedback>);

/// Embedded audit history, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct History(pub Vec<HistoryEntry>);

/// Report model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "report")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// `ANI-YYYYMMDD-NNNNN`, immutable once assigned.
    #[sea_orm(unique)]
    pub protocol: String,

    pub address: String,

    /// Lower-cased for indexing.
    pub neighborhood: String,

    pub incident_type: IncidentType,

    pub species: String,

    pub condition: AnimalCondition,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Name of the suspected offender, if known.
    #[sea_orm(nullable)]
    pub suspect_name: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub other_info: Option<String>,

    /// Snapshot of the reporting citizen at creation time.
    #[sea_orm(nullable)]
    pub reporter_name: Option<String>,

    #[sea_orm(nullable)]
    pub reporter_cpf: Option<String>,

    #[sea_orm(nullable)]
    pub reporter_contact: Option<String>,

    pub stage: Stage,

    pub status: ReportStatus,

    pub priority: Priority,

    /// Back-reference to the creating user; never an ownership edge.
    pub created_by: String,

    /// Set exactly once, by acceptance.
    #[sea_orm(nullable)]
    pub assigned_authority_id: Option<String>,

    #[sea_orm(nullable)]
    pub assigned_authority_email: Option<String>,

    #[sea_orm(column_type = "JsonBinary")]
    pub comments: Comments,

    #[sea_orm(column_type = "JsonBinary")]
    pub evidence: EvidenceList,

    #[sea_orm(column_type = "JsonBinary")]
    pub feedback: FeedbackList,

    #[sea_orm(column_type = "JsonBinary")]
    pub history: History,

    /// Deadline for the creator to confirm a resolved report.
    #[sea_orm(nullable)]
    pub confirmation_deadline: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,

    /// Stamped once, when the report reaches stage 6.
    #[sea_orm(nullable)]
    pub concluded_at: Option<DateTimeWithTimeZone>,

    /// Optimistic concurrency token, bumped on every write.
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_numbers_round_trip() {
        for n in 1..=6 {
            assert_eq!(Stage::from_number(n).unwrap().number(), n);
        }
        assert_eq!(Stage::from_number(0), None);
        assert_eq!(Stage::from_number(7), None);
    }

    #[test]
    fn test_stage_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Stage::Resolved).unwrap(), "5");
        let stage: Stage = serde_json::from_str("3").unwrap();
        assert_eq!(stage, Stage::UnderInvestigation);
        assert!(serde_json::from_str::<Stage>("9").is_err());
    }

    #[test]
    fn test_history_entry_wire_names() {
        let entry = HistoryEntry {
            at: chrono::Utc::now().into(),
            kind: HistoryKind::StageAdvance,
            actor_id: "u1".to_string(),
            actor_role: None,
            description: "advanced".to_string(),
            reason: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "AVANCAR_ETAPA");
        assert_eq!(json["actorId"], "u1");
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn test_enum_wire_names_match_storage() {
        assert_eq!(
            serde_json::to_value(Priority::Urgent).unwrap(),
            Priority::Urgent.as_str()
        );
        assert_eq!(
            serde_json::to_value(ReportStatus::AguardandoInspecao).unwrap(),
            "AGUARDANDO_INSPECAO"
        );
        assert_eq!(
            serde_json::to_value(IncidentType::IllegalTrade).unwrap(),
            "comercio_ilegal"
        );
        assert_eq!(Priority::default(), Priority::Medium);
    }
}
