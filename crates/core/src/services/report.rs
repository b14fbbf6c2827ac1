//! Report service: the aggregate's mutation operations and read side.
//!
//! Every mutation loads the report, checks the access policy, resolves any
//! stage move through the transition table, appends exactly one history
//! entry and writes the result back with a single version-checked update.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use aniseg_common::{AppError, AppResult, Config, IdGenerator, ProtocolNumber};
use aniseg_db::{
    entities::{
        app_user,
        report::{
            self, Comment, Comments, EvidenceItem, EvidenceList, Feedback, FeedbackList,
            FileDescriptor, History, HistoryEntry, HistoryKind, Priority, Stage,
        },
    },
    repositories::{ReportFilter, ReportSort, ReportStats, ReportStore, SortDirection},
};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::validation::FieldValidator;
use crate::lifecycle::{
    Actor, EntryPoint, Operation, ProgressInfo, STAGE_TABLE, StageInfo, authorize,
    canonical_status, parse_status, policy::parties, progress_info, stage_of, transition,
    validate_report_state,
};

const MAX_COMMENT_LENGTH: usize = 2000;
const MAX_FEEDBACK_LENGTH: usize = 2000;
const MAX_PAGE_SIZE: u64 = 100;

/// Runtime knobs for the report service.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleSettings {
    /// Upper bound for a single store call.
    pub operation_timeout: Duration,
    /// Days the creator has to confirm a resolved report.
    pub confirmation_window_days: i64,
    /// Zone deciding the calendar day of a protocol number.
    pub timezone: Tz,
    /// Source of the current time.
    pub clock: fn() -> DateTime<Utc>,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(5),
            confirmation_window_days: 7,
            timezone: Tz::UTC,
            clock: Utc::now,
        }
    }
}

impl LifecycleSettings {
    /// Build settings from the application configuration.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        Ok(Self {
            operation_timeout: config.database.operation_timeout(),
            confirmation_window_days: config.lifecycle.confirmation_window_days,
            timezone: config.lifecycle.tz()?,
            clock: Utc::now,
        })
    }
}

/// Citizen details copied onto a report when it is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReporterSnapshot {
    /// Display name on the citizen's profile.
    pub name: Option<String>,
    /// Taxpayer number, as registered.
    pub cpf: Option<String>,
    /// Phone or email to reach the reporter.
    pub contact: Option<String>,
}

impl From<&app_user::Model> for ReporterSnapshot {
    fn from(user: &app_user::Model) -> Self {
        Self {
            name: user.name.clone().or_else(|| Some(user.email.clone())),
            cpf: user.cpf.clone(),
            contact: user.phone.clone(),
        }
    }
}

/// Input for filing a report.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportInput {
    #[validate(length(max = 500))]
    #[serde(default)]
    pub address: String,

    #[validate(length(max = 120))]
    #[serde(default)]
    pub neighborhood: String,

    #[serde(default)]
    pub incident_type: String,

    #[validate(length(max = 120))]
    #[serde(default)]
    pub species: String,

    #[serde(default)]
    pub condition: String,

    #[validate(length(max = 5000))]
    pub description: Option<String>,

    #[validate(length(max = 256))]
    pub suspect_name: Option<String>,

    #[validate(length(max = 5000))]
    pub other_info: Option<String>,

    #[serde(default)]
    pub files: Vec<FileDescriptor>,
}

/// Listing query. Unset filters match everything.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListReportsInput {
    #[serde(default)]
    pub statuses: Vec<String>,

    #[serde(default)]
    pub incident_types: Vec<String>,

    #[serde(default)]
    pub priorities: Vec<String>,

    pub neighborhood: Option<String>,

    #[validate(length(max = 200))]
    pub search: Option<String>,

    #[serde(default)]
    pub sort: ReportSort,

    #[serde(default)]
    pub direction: SortDirection,

    #[validate(range(min = 1, max = 1_000_000))]
    #[serde(default = "default_page")]
    pub page: u64,

    #[validate(range(min = 1, max = 100))]
    #[serde(default = "default_limit")]
    pub limit: u64,
}

const fn default_page() -> u64 {
    1
}

const fn default_limit() -> u64 {
    20
}

impl Default for ListReportsInput {
    fn default() -> Self {
        Self {
            statuses: Vec::new(),
            incident_types: Vec::new(),
            priorities: Vec::new(),
            neighborhood: None,
            search: None,
            sort: ReportSort::default(),
            direction: SortDirection::default(),
            page: default_page(),
            limit: default_limit(),
        }
    }
}

/// One page of reports.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPage {
    pub items: Vec<report::Model>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

/// Parse a priority name.
///
/// Accepts the stored Portuguese names and their English equivalents, in
/// any case.
pub fn parse_priority(s: &str) -> AppResult<Priority> {
    match s.trim().to_uppercase().as_str() {
        "BAIXA" | "LOW" => Ok(Priority::Low),
        "MEDIA" | "MEDIUM" => Ok(Priority::Medium),
        "ALTA" | "HIGH" => Ok(Priority::High),
        "URGENTE" | "URGENT" => Ok(Priority::Urgent),
        _ => Err(AppError::Validation(format!("invalid priority: {s}"))),
    }
}

fn history_entry(
    actor: &Actor,
    kind: HistoryKind,
    description: String,
    at: DateTimeWithTimeZone,
) -> HistoryEntry {
    HistoryEntry {
        at,
        kind,
        actor_id: actor.id.clone(),
        actor_role: Some(actor.role.as_str().to_string()),
        description,
        reason: None,
    }
}

fn ensure_open(report: &report::Model) -> AppResult<()> {
    if report.stage == Stage::LAST {
        return Err(AppError::WrongStage(format!(
            "report {} is concluded; only feedback is accepted",
            report.protocol
        )));
    }
    Ok(())
}

fn non_empty(text: &str, what: &str, max: usize) -> AppResult<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation(format!("{what} must not be empty")));
    }
    if text.chars().count() > max {
        return Err(AppError::Validation(format!(
            "{what} exceeds {max} characters"
        )));
    }
    Ok(text.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Report service for business logic.
#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn ReportStore>,
    validator: FieldValidator,
    id_gen: IdGenerator,
    settings: LifecycleSettings,
}

impl ReportService {
    /// Create a report service with default settings.
    #[must_use]
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self::with_settings(store, LifecycleSettings::default())
    }

    /// Create a report service with explicit settings.
    #[must_use]
    pub fn with_settings(store: Arc<dyn ReportStore>, settings: LifecycleSettings) -> Self {
        Self {
            store,
            validator: FieldValidator::new(),
            id_gen: IdGenerator::new(),
            settings,
        }
    }

    fn now(&self) -> DateTimeWithTimeZone {
        (self.settings.clock)().into()
    }

    /// Run one store call under the configured deadline.
    async fn store_call<T, F>(&self, call: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        let limit = self.settings.operation_timeout;
        if let Ok(result) = tokio::time::timeout(limit, call).await {
            result
        } else {
            let ms = limit.as_millis() as u64;
            tracing::warn!(timeout_ms = ms, "Store operation timed out");
            Err(AppError::StoreTimeout(ms))
        }
    }

    /// Run a write under the configured deadline.
    ///
    /// A timed-out write may still have landed, so it is never reported as
    /// retryable. The report is re-read and returned when `landed` recognizes
    /// the write; otherwise the caller gets [`AppError::WriteOutcomeUnknown`].
    async fn write_call<F>(
        &self,
        id: &str,
        call: F,
        landed: impl Fn(&report::Model) -> bool,
    ) -> AppResult<report::Model>
    where
        F: Future<Output = AppResult<report::Model>>,
    {
        match self.store_call(call).await {
            Err(AppError::StoreTimeout(ms)) => {
                match self.store_call(self.store.find_by_id(id)).await {
                    Ok(Some(stored)) if landed(&stored) => {
                        tracing::info!(report_id = %id, "Timed-out write had committed");
                        Ok(stored)
                    }
                    _ => {
                        tracing::warn!(report_id = %id, timeout_ms = ms, "Write outcome unknown");
                        Err(AppError::WriteOutcomeUnknown(format!(
                            "report {id} must be reloaded before retrying"
                        )))
                    }
                }
            }
            other => other,
        }
    }

    async fn load(&self, id: &str) -> AppResult<report::Model> {
        self.store_call(self.store.find_by_id(id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Report {id} not found")))
    }

    /// Move `report` onto `stage`, keeping status and stage timestamps in step.
    fn enter_stage(&self, report: &mut report::Model, stage: Stage, at: DateTimeWithTimeZone) {
        report.stage = stage;
        report.status = canonical_status(stage);

        match stage {
            Stage::Resolved => {
                report.confirmation_deadline =
                    Some(at + chrono::Duration::days(self.settings.confirmation_window_days));
            }
            Stage::Concluded => {
                report.concluded_at.get_or_insert(at);
            }
            _ => {}
        }
    }

    /// Append `entry` and write the report back if nobody else did first.
    async fn commit(
        &self,
        mut report: report::Model,
        entry: HistoryEntry,
    ) -> AppResult<report::Model> {
        let loaded_version = report.version;
        let id = report.id.clone();
        let appended = entry.clone();

        report.updated_at = entry.at;
        report.history.0.push(entry);
        report.version = loaded_version + 1;

        debug_assert!(
            validate_report_state(&report).is_empty(),
            "{:?}",
            validate_report_state(&report)
        );

        self.write_call(
            &id,
            self.store.save_if_version(report, loaded_version),
            |stored| {
                stored.version == loaded_version + 1 && stored.history.0.last() == Some(&appended)
            },
        )
        .await
    }

    /// File a new report at stage 1.
    pub async fn create(
        &self,
        actor: &Actor,
        reporter: ReporterSnapshot,
        input: CreateReportInput,
    ) -> AppResult<report::Model> {
        authorize(actor, Operation::Create, None)?;
        input.validate()?;

        let required = [
            ("address", &input.address),
            ("neighborhood", &input.neighborhood),
            ("incidentType", &input.incident_type),
            ("species", &input.species),
            ("condition", &input.condition),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(AppError::Validation(format!("{field} is required")));
        }

        let incident_type = self.validator.parse_category(&input.incident_type)?;
        let condition = self.validator.parse_condition(&input.condition)?;
        self.validator.check_files(&input.files)?;
        if reporter
            .cpf
            .as_deref()
            .is_some_and(|cpf| !self.validator.is_valid_cpf(cpf))
        {
            return Err(AppError::Validation("invalid reporter CPF".to_string()));
        }

        let at = self.now();
        let today = at.with_timezone(&self.settings.timezone).date_naive();
        let sequence = self
            .store_call(
                self.store
                    .next_protocol_sequence(&ProtocolNumber::day_key(today)),
            )
            .await?;
        let protocol = ProtocolNumber::new(today, sequence)?;

        let evidence = input
            .files
            .into_iter()
            .map(|file| EvidenceItem {
                file,
                uploaded_by: actor.id.clone(),
                uploaded_at: at,
            })
            .collect();

        let report = report::Model {
            id: self.id_gen.generate(),
            protocol: protocol.to_string(),
            address: input.address.trim().to_string(),
            neighborhood: input.neighborhood.trim().to_lowercase(),
            incident_type,
            species: input.species.trim().to_string(),
            condition,
            description: non_blank(input.description),
            suspect_name: non_blank(input.suspect_name),
            other_info: non_blank(input.other_info),
            reporter_name: reporter.name,
            reporter_cpf: reporter.cpf,
            reporter_contact: reporter.contact,
            stage: Stage::FIRST,
            status: canonical_status(Stage::FIRST),
            priority: Priority::default(),
            created_by: actor.id.clone(),
            assigned_authority_id: None,
            assigned_authority_email: None,
            comments: Comments::default(),
            evidence: EvidenceList(evidence),
            feedback: FeedbackList::default(),
            history: History(vec![history_entry(
                actor,
                HistoryKind::Creation,
                format!("report {protocol} created"),
                at,
            )]),
            confirmation_deadline: None,
            created_at: at,
            updated_at: at,
            concluded_at: None,
            version: 1,
        };

        let id = report.id.clone();
        let assigned = report.protocol.clone();
        let report = self
            .write_call(&id, self.store.insert(report), |stored| {
                stored.protocol == assigned
            })
            .await?;

        tracing::info!(
            report_id = %report.id,
            protocol = %report.protocol,
            actor_id = %actor.id,
            stage = report.stage.number(),
            "Report created"
        );
        Ok(report)
    }

    /// Assign the report to the calling authority and move it to stage 2.
    pub async fn accept(&self, actor: &Actor, id: &str) -> AppResult<report::Model> {
        let mut report = self.load(id).await?;

        if report.assigned_authority_id.is_some() || report.stage != Stage::FIRST {
            return Err(AppError::Conflict(format!(
                "report {} is already being handled",
                report.protocol
            )));
        }
        authorize(actor, Operation::Accept, Some(&report))?;

        let at = self.now();
        report.assigned_authority_id = Some(actor.id.clone());
        report.assigned_authority_email.clone_from(&actor.email);
        self.enter_stage(&mut report, Stage::UnderReview, at);

        let entry = history_entry(
            actor,
            HistoryKind::Acceptance,
            "report accepted, stage 1 -> 2".to_string(),
            at,
        );
        let report = self.commit(report, entry).await?;

        tracing::info!(
            report_id = %report.id,
            protocol = %report.protocol,
            actor_id = %actor.id,
            stage = report.stage.number(),
            "Report accepted"
        );
        Ok(report)
    }

    /// Move the report exactly one stage forward.
    pub async fn advance_stage(&self, actor: &Actor, id: &str) -> AppResult<report::Model> {
        let mut report = self.load(id).await?;
        authorize(actor, Operation::Advance, Some(&report))?;

        let from = report.stage;
        let target = transition::resolve(
            EntryPoint::Advance,
            &parties(actor, &report),
            from,
            from.number() + 1,
        )?;

        let at = self.now();
        self.enter_stage(&mut report, target, at);
        let entry = history_entry(
            actor,
            HistoryKind::StageAdvance,
            format!(
                "stage advanced {} -> {} ({})",
                from.number(),
                target.number(),
                report.status.as_str()
            ),
            at,
        );
        let report = self.commit(report, entry).await?;

        tracing::info!(
            report_id = %report.id,
            protocol = %report.protocol,
            actor_id = %actor.id,
            stage = report.stage.number(),
            "Report stage advanced"
        );
        Ok(report)
    }

    /// Legacy status setter, translated into a single-step stage move.
    pub async fn set_status(
        &self,
        actor: &Actor,
        id: &str,
        target_status: &str,
        reason: Option<String>,
    ) -> AppResult<report::Model> {
        let target_status = parse_status(target_status)?;
        let mut report = self.load(id).await?;
        authorize(actor, Operation::SetStatus, Some(&report))?;

        let from = report.status;
        let target = transition::resolve(
            EntryPoint::SetStatus,
            &parties(actor, &report),
            report.stage,
            stage_of(target_status).number(),
        )?;

        let at = self.now();
        self.enter_stage(&mut report, target, at);
        let mut entry = history_entry(
            actor,
            HistoryKind::StatusChange,
            format!("status changed {} -> {}", from.as_str(), report.status.as_str()),
            at,
        );
        entry.reason = non_blank(reason);
        let report = self.commit(report, entry).await?;

        tracing::info!(
            report_id = %report.id,
            protocol = %report.protocol,
            actor_id = %actor.id,
            stage = report.stage.number(),
            "Report status changed"
        );
        Ok(report)
    }

    /// Replace the triage priority.
    pub async fn set_priority(
        &self,
        actor: &Actor,
        id: &str,
        priority: &str,
    ) -> AppResult<report::Model> {
        let priority = parse_priority(priority)?;
        let mut report = self.load(id).await?;
        authorize(actor, Operation::SetPriority, Some(&report))?;
        ensure_open(&report)?;

        let old = std::mem::replace(&mut report.priority, priority);
        let entry = history_entry(
            actor,
            HistoryKind::PriorityChange,
            format!("priority changed {} -> {}", old.as_str(), priority.as_str()),
            self.now(),
        );
        let report = self.commit(report, entry).await?;

        tracing::info!(
            report_id = %report.id,
            protocol = %report.protocol,
            actor_id = %actor.id,
            priority = priority.as_str(),
            "Report priority changed"
        );
        Ok(report)
    }

    /// Append a comment.
    pub async fn add_comment(
        &self,
        actor: &Actor,
        id: &str,
        text: &str,
    ) -> AppResult<report::Model> {
        let text = non_empty(text, "comment text", MAX_COMMENT_LENGTH)?;
        let mut report = self.load(id).await?;
        authorize(actor, Operation::Comment, Some(&report))?;
        ensure_open(&report)?;

        let at = self.now();
        report.comments.0.push(Comment {
            id: self.id_gen.generate(),
            text,
            author_id: actor.id.clone(),
            author_email: actor.email.clone(),
            created_at: at,
        });
        let entry = history_entry(
            actor,
            HistoryKind::CommentAdded,
            "comment added".to_string(),
            at,
        );
        let report = self.commit(report, entry).await?;

        tracing::debug!(report_id = %report.id, actor_id = %actor.id, "Comment added");
        Ok(report)
    }

    /// Attach evidence files. One history entry per call, whatever the count.
    pub async fn add_evidence(
        &self,
        actor: &Actor,
        id: &str,
        files: Vec<FileDescriptor>,
    ) -> AppResult<report::Model> {
        self.validator.check_files(&files)?;
        let mut report = self.load(id).await?;
        authorize(actor, Operation::AddEvidence, Some(&report))?;
        ensure_open(&report)?;

        let at = self.now();
        let count = files.len();
        report
            .evidence
            .0
            .extend(files.into_iter().map(|file| EvidenceItem {
                file,
                uploaded_by: actor.id.clone(),
                uploaded_at: at,
            }));
        let entry = history_entry(
            actor,
            HistoryKind::EvidenceAdded,
            format!("{count} evidence file(s) added"),
            at,
        );
        let report = self.commit(report, entry).await?;

        tracing::info!(
            report_id = %report.id,
            actor_id = %actor.id,
            files = count,
            "Evidence added"
        );
        Ok(report)
    }

    /// Leave the creator's feedback on a concluded report. Once per creator.
    pub async fn add_feedback(&self, actor: &Actor, id: &str, text: &str) -> AppResult<()> {
        let mut report = self.load(id).await?;
        authorize(actor, Operation::Feedback, Some(&report))?;

        if report.stage != Stage::LAST {
            return Err(AppError::WrongStage(format!(
                "feedback requires stage 6, report {} is at stage {}",
                report.protocol,
                report.stage.number()
            )));
        }
        let text = non_empty(text, "feedback text", MAX_FEEDBACK_LENGTH)?;
        if report.feedback.0.iter().any(|f| f.author_id == actor.id) {
            return Err(AppError::Conflict(
                "feedback was already submitted for this report".to_string(),
            ));
        }

        let at = self.now();
        report.feedback.0.push(Feedback {
            text,
            author_id: actor.id.clone(),
            created_at: at,
        });
        let entry = history_entry(
            actor,
            HistoryKind::FeedbackAdded,
            "feedback added".to_string(),
            at,
        );
        let report = self.commit(report, entry).await?;

        tracing::info!(report_id = %report.id, actor_id = %actor.id, "Feedback added");
        Ok(())
    }

    /// Fetch a report by id.
    pub async fn get(&self, actor: &Actor, id: &str) -> AppResult<report::Model> {
        let report = self.load(id).await?;
        authorize(actor, Operation::View, Some(&report))?;
        Ok(report)
    }

    /// Fetch a report by protocol number.
    pub async fn get_by_protocol(&self, actor: &Actor, protocol: &str) -> AppResult<report::Model> {
        let protocol = protocol.trim();
        if !self.validator.is_valid_protocol(protocol) {
            return Err(AppError::Validation(format!(
                "invalid protocol number: {protocol}"
            )));
        }

        let report = self
            .store_call(self.store.find_by_protocol(protocol))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Report {protocol} not found")))?;
        authorize(actor, Operation::View, Some(&report))?;
        Ok(report)
    }

    /// List reports. Citizens only ever see their own.
    pub async fn list(&self, actor: &Actor, input: ListReportsInput) -> AppResult<ReportPage> {
        input.validate()?;

        let filter = ReportFilter {
            created_by: (!actor.is_staff()).then(|| actor.id.clone()),
            statuses: input
                .statuses
                .iter()
                .map(|s| parse_status(s))
                .collect::<AppResult<_>>()?,
            incident_types: input
                .incident_types
                .iter()
                .map(|t| self.validator.parse_category(t))
                .collect::<AppResult<_>>()?,
            priorities: input
                .priorities
                .iter()
                .map(|p| parse_priority(p))
                .collect::<AppResult<_>>()?,
            neighborhood: non_blank(input.neighborhood).map(|n| n.to_lowercase()),
            search: non_blank(input.search),
            sort: input.sort,
            direction: input.direction,
        };

        let limit = input.limit.min(MAX_PAGE_SIZE);
        let offset = input
            .page
            .saturating_sub(1)
            .checked_mul(limit)
            .ok_or_else(|| AppError::Validation("page is out of range".to_string()))?;
        let (items, total) = self
            .store_call(self.store.list(&filter, offset, limit))
            .await?;

        Ok(ReportPage {
            items,
            total,
            page: input.page,
            limit,
            total_pages: total.div_ceil(limit),
        })
    }

    /// Dashboard counters (staff only).
    pub async fn stats(&self, actor: &Actor) -> AppResult<ReportStats> {
        authorize(actor, Operation::ViewStats, None)?;
        self.store_call(self.store.stats()).await
    }

    /// Progress summary of a report.
    pub async fn progress(&self, actor: &Actor, id: &str) -> AppResult<ProgressInfo> {
        let report = self.get(actor, id).await?;
        Ok(progress_info(&report))
    }

    /// Metadata of every stage.
    #[must_use]
    pub fn stages() -> &'static [StageInfo] {
        &STAGE_TABLE
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use aniseg_db::entities::{app_user::Role, report::ReportStatus};
    use aniseg_db::test_utils::{InMemoryReportStore, WriteStall};
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn file(name: &str) -> FileDescriptor {
        FileDescriptor {
            name: name.to_string(),
            size: 1024,
        }
    }

    fn input() -> CreateReportInput {
        CreateReportInput {
            address: "Rua das Flores, 120".to_string(),
            neighborhood: "Centro".to_string(),
            incident_type: "maus_tratos".to_string(),
            species: "cachorro".to_string(),
            condition: "ferido".to_string(),
            description: Some("Animal preso sem água".to_string()),
            files: vec![file("foto.jpg")],
            ..CreateReportInput::default()
        }
    }

    fn alice() -> Actor {
        Actor::new("alice", Role::Citizen)
    }

    fn bob() -> Actor {
        Actor::new("bob", Role::Citizen)
    }

    fn officer() -> Actor {
        Actor::new("officer", Role::Authority).with_email("fiscal@prefeitura.gov.br")
    }

    fn admin() -> Actor {
        Actor::new("root", Role::Admin)
    }

    fn setup() -> (Arc<InMemoryReportStore>, ReportService) {
        let store = Arc::new(InMemoryReportStore::new());
        let service = ReportService::new(store.clone());
        (store, service)
    }

    async fn created(service: &ReportService) -> report::Model {
        service
            .create(&alice(), ReporterSnapshot::default(), input())
            .await
            .unwrap()
    }

    /// A report accepted by `officer` and advanced to `stage`.
    async fn at_stage(service: &ReportService, stage: i32) -> report::Model {
        let mut report = created(service).await;
        if stage >= 2 {
            report = service.accept(&officer(), &report.id).await.unwrap();
        }
        while report.stage.number() < stage {
            report = service.advance_stage(&officer(), &report.id).await.unwrap();
        }
        report
    }

    fn assert_consistent(report: &report::Model) {
        assert_eq!(report.status, canonical_status(report.stage));
        assert!(
            validate_report_state(report).is_empty(),
            "{:?}",
            validate_report_state(report)
        );
    }

    #[tokio::test]
    async fn test_create_starts_at_stage_one() {
        let (store, service) = setup();
        let report = created(&service).await;

        assert_eq!(report.stage, Stage::Created);
        assert_eq!(report.status, ReportStatus::Criada);
        assert_eq!(report.priority, Priority::Medium);
        assert_eq!(report.neighborhood, "centro");
        assert_eq!(report.history.0.len(), 1);
        assert_eq!(report.history.0[0].kind, HistoryKind::Creation);
        assert_eq!(report.evidence.0.len(), 1);
        assert_eq!(report.version, 1);
        assert_consistent(&report);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_create_names_the_missing_field() {
        let (store, service) = setup();

        let mut missing_species = input();
        missing_species.species = "  ".to_string();
        let err = service
            .create(&alice(), ReporterSnapshot::default(), missing_species)
            .await
            .unwrap_err();
        assert!(matches!(&err, AppError::Validation(msg) if msg.contains("species")));

        let mut no_files = input();
        no_files.files.clear();
        assert!(matches!(
            service
                .create(&alice(), ReporterSnapshot::default(), no_files)
                .await,
            Err(AppError::Validation(_))
        ));

        let mut bad_type = input();
        bad_type.incident_type = "furto".to_string();
        assert!(matches!(
            service
                .create(&alice(), ReporterSnapshot::default(), bad_type)
                .await,
            Err(AppError::Validation(_))
        ));

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_protocols_increase_within_a_day() {
        let (_, service) = setup();
        let first = created(&service).await;
        let second = created(&service).await;

        let a: ProtocolNumber = first.protocol.parse().unwrap();
        let b: ProtocolNumber = second.protocol.parse().unwrap();
        assert_eq!(a.sequence(), 1);
        assert_eq!(b.sequence(), 2);
        assert!(first.protocol < second.protocol);
        assert!(first.protocol.ends_with("-00001"));
    }

    #[tokio::test]
    async fn test_accept_is_exactly_once() {
        let (_, service) = setup();
        let report = created(&service).await;

        let accepted = service.accept(&officer(), &report.id).await.unwrap();
        assert_eq!(accepted.stage, Stage::UnderReview);
        assert_eq!(accepted.assigned_authority_id.as_deref(), Some("officer"));
        assert_eq!(
            accepted.assigned_authority_email.as_deref(),
            Some("fiscal@prefeitura.gov.br")
        );
        assert_consistent(&accepted);

        for actor in [officer(), admin(), Actor::new("other", Role::Authority)] {
            assert!(matches!(
                service.accept(&actor, &report.id).await,
                Err(AppError::Conflict(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_citizen_cannot_accept() {
        let (_, service) = setup();
        let report = created(&service).await;
        assert!(matches!(
            service.accept(&alice(), &report.id).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_advance_never_skips() {
        let (_, service) = setup();
        let report = at_stage(&service, 2).await;

        let once = service.advance_stage(&officer(), &report.id).await.unwrap();
        let twice = service.advance_stage(&officer(), &report.id).await.unwrap();
        assert_eq!(once.stage.number(), 3);
        assert_eq!(twice.stage.number(), 4);
        assert_consistent(&once);
        assert_consistent(&twice);
    }

    #[tokio::test]
    async fn test_advance_to_terminal_stamps_completion() {
        let (_, service) = setup();
        let resolved = at_stage(&service, 5).await;
        assert!(resolved.confirmation_deadline.is_some());
        assert!(resolved.concluded_at.is_none());

        let concluded = service
            .advance_stage(&officer(), &resolved.id)
            .await
            .unwrap();
        assert_eq!(concluded.stage, Stage::Concluded);
        assert_eq!(concluded.status, ReportStatus::Concluida);
        assert!(concluded.concluded_at.is_some());

        assert!(matches!(
            service.advance_stage(&officer(), &resolved.id).await,
            Err(AppError::IllegalTransition(_))
        ));
    }

    #[tokio::test]
    async fn test_non_owner_citizen_cannot_advance_unaccepted_report() {
        let (store, service) = setup();
        let report = created(&service).await;

        assert!(matches!(
            service.advance_stage(&bob(), &report.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(store.snapshot(&report.id).await.unwrap(), report);
    }

    #[tokio::test]
    async fn test_creator_advance_skips_acceptance() {
        let (_, service) = setup();
        let report = created(&service).await;

        let advanced = service.advance_stage(&alice(), &report.id).await.unwrap();
        assert_eq!(advanced.stage, Stage::UnderReview);
        assert!(advanced.assigned_authority_id.is_none());
        assert_consistent(&advanced);

        assert!(matches!(
            service.accept(&officer(), &report.id).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_unassigned_authority_cannot_advance() {
        let (_, service) = setup();
        let report = at_stage(&service, 2).await;
        assert!(matches!(
            service
                .advance_stage(&Actor::new("other", Role::Authority), &report.id)
                .await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_creator_confirms_resolution_through_set_status() {
        let (_, service) = setup();
        let report = at_stage(&service, 5).await;

        assert!(matches!(
            service
                .set_status(&bob(), &report.id, "CONCLUIDA", None)
                .await,
            Err(AppError::Forbidden(_))
        ));

        let confirmed = service
            .set_status(&alice(), &report.id, "concluida", Some("resolvido".into()))
            .await
            .unwrap();
        assert_eq!(confirmed.stage, Stage::Concluded);
        assert!(confirmed.concluded_at.is_some());
        let last = confirmed.history.0.last().unwrap();
        assert_eq!(last.kind, HistoryKind::StatusChange);
        assert_eq!(last.reason.as_deref(), Some("resolvido"));
        assert_consistent(&confirmed);
    }

    #[tokio::test]
    async fn test_set_status_rejects_unknown_and_skips() {
        let (_, service) = setup();
        let report = at_stage(&service, 2).await;

        assert!(matches!(
            service
                .set_status(&officer(), &report.id, "ARQUIVADA", None)
                .await,
            Err(AppError::UnknownStatus(_))
        ));
        assert!(matches!(
            service
                .set_status(&officer(), &report.id, "RESOLVIDA", None)
                .await,
            Err(AppError::IllegalTransition(_))
        ));
        assert!(matches!(
            service
                .set_status(&officer(), &report.id, "CRIADA", None)
                .await,
            Err(AppError::IllegalTransition(_))
        ));

        let moved = service
            .set_status(&officer(), &report.id, "EM_INVESTIGACAO", None)
            .await
            .unwrap();
        assert_eq!(moved.stage, Stage::UnderInvestigation);
    }

    #[tokio::test]
    async fn test_set_priority() {
        let (_, service) = setup();
        let report = created(&service).await;

        let updated = service
            .set_priority(&officer(), &report.id, "urgent")
            .await
            .unwrap();
        assert_eq!(updated.priority, Priority::Urgent);
        assert_eq!(updated.stage, Stage::Created);
        assert!(
            updated
                .history
                .0
                .last()
                .unwrap()
                .description
                .contains("MEDIA -> URGENTE")
        );

        assert!(matches!(
            service.set_priority(&officer(), &report.id, "CRITICA").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.set_priority(&alice(), &report.id, "ALTA").await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_comment() {
        let (_, service) = setup();
        let report = created(&service).await;

        let updated = service
            .add_comment(&alice(), &report.id, "  mais detalhes  ")
            .await
            .unwrap();
        assert_eq!(updated.comments.0.len(), 1);
        assert_eq!(updated.comments.0[0].text, "mais detalhes");

        assert!(matches!(
            service.add_comment(&alice(), &report.id, "   ").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.add_comment(&bob(), &report.id, "oi").await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_evidence_appends_one_history_entry() {
        let (_, service) = setup();
        let report = created(&service).await;

        let updated = service
            .add_evidence(
                &alice(),
                &report.id,
                vec![file("a.png"), file("b.pdf"), file("c.mp4")],
            )
            .await
            .unwrap();
        assert_eq!(updated.evidence.0.len(), 4);
        assert_eq!(updated.history.0.len(), report.history.0.len() + 1);

        assert!(matches!(
            service.add_evidence(&alice(), &report.id, Vec::new()).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_history_grows_by_one_per_mutation() {
        let (store, service) = setup();
        let report = created(&service).await;
        let id = report.id.clone();

        let mut expected = 1;
        let steps: Vec<report::Model> = vec![
            service.set_priority(&officer(), &id, "ALTA").await.unwrap(),
            service.add_comment(&alice(), &id, "obrigada").await.unwrap(),
            service.accept(&officer(), &id).await.unwrap(),
            service.advance_stage(&officer(), &id).await.unwrap(),
            service
                .set_status(&admin(), &id, "AGUARDANDO_INSPECAO", None)
                .await
                .unwrap(),
            service
                .add_evidence(&officer(), &id, vec![file("laudo.pdf"), file("x.jpg")])
                .await
                .unwrap(),
        ];
        for step in steps {
            expected += 1;
            assert_eq!(step.history.0.len(), expected);
            assert_consistent(&step);
        }

        let stored = store.snapshot(&id).await.unwrap();
        assert_eq!(stored.history.0.len(), expected);
        assert_eq!(stored.version, expected as i32);
    }

    #[tokio::test]
    async fn test_feedback_only_at_terminal_stage_once() {
        let (store, service) = setup();
        let report = at_stage(&service, 5).await;

        assert!(matches!(
            service.add_feedback(&alice(), &report.id, "ok").await,
            Err(AppError::WrongStage(_))
        ));

        let concluded = service
            .advance_stage(&officer(), &report.id)
            .await
            .unwrap();

        assert!(matches!(
            service.add_feedback(&bob(), &report.id, "ok").await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            service.add_feedback(&alice(), &report.id, " ").await,
            Err(AppError::Validation(_))
        ));

        service.add_feedback(&alice(), &report.id, "ok").await.unwrap();
        let stored = store.snapshot(&report.id).await.unwrap();
        assert_eq!(stored.stage, Stage::Concluded);
        assert_eq!(stored.status, ReportStatus::Concluida);
        assert_eq!(stored.concluded_at, concluded.concluded_at);
        assert_eq!(stored.history.0.len(), concluded.history.0.len() + 1);
        assert_eq!(stored.feedback.0.len(), 1);

        assert!(matches!(
            service.add_feedback(&alice(), &report.id, "de novo").await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_concluded_report_only_takes_feedback() {
        let (_, service) = setup();
        let report = at_stage(&service, 6).await;

        assert!(matches!(
            service.add_comment(&alice(), &report.id, "oi").await,
            Err(AppError::WrongStage(_))
        ));
        assert!(matches!(
            service.set_priority(&officer(), &report.id, "ALTA").await,
            Err(AppError::WrongStage(_))
        ));
        assert!(matches!(
            service
                .add_evidence(&alice(), &report.id, vec![file("a.png")])
                .await,
            Err(AppError::WrongStage(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_report() {
        let (_, service) = setup();
        assert!(matches!(
            service.advance_stage(&admin(), "ghost").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.get_by_protocol(&admin(), "ANI-20250101-00001").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.get_by_protocol(&admin(), "ANI-1").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_view_policy() {
        let (_, service) = setup();
        let report = created(&service).await;

        assert!(service.get(&alice(), &report.id).await.is_ok());
        assert!(service.get(&officer(), &report.id).await.is_ok());
        assert!(matches!(
            service.get(&bob(), &report.id).await,
            Err(AppError::Forbidden(_))
        ));
        let by_protocol = service
            .get_by_protocol(&alice(), &report.protocol)
            .await
            .unwrap();
        assert_eq!(by_protocol.id, report.id);
    }

    #[tokio::test]
    async fn test_list_scopes_citizens_to_their_own_reports() {
        let (_, service) = setup();
        created(&service).await;
        created(&service).await;
        service
            .create(&bob(), ReporterSnapshot::default(), input())
            .await
            .unwrap();

        let mine = service
            .list(&alice(), ListReportsInput::default())
            .await
            .unwrap();
        assert_eq!(mine.total, 2);
        assert!(mine.items.iter().all(|r| r.created_by == "alice"));

        let page = service
            .list(
                &officer(),
                ListReportsInput {
                    limit: 2,
                    page: 2,
                    ..ListReportsInput::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (_, service) = setup();
        let report = created(&service).await;
        service.accept(&officer(), &report.id).await.unwrap();
        created(&service).await;

        let under_review = service
            .list(
                &officer(),
                ListReportsInput {
                    statuses: vec!["em_analise".to_string()],
                    ..ListReportsInput::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(under_review.total, 1);
        assert_eq!(under_review.items[0].id, report.id);

        let searched = service
            .list(
                &officer(),
                ListReportsInput {
                    search: Some(report.protocol.to_lowercase()),
                    ..ListReportsInput::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(searched.total, 1);

        assert!(matches!(
            service
                .list(
                    &officer(),
                    ListReportsInput {
                        statuses: vec!["ARQUIVADA".to_string()],
                        ..ListReportsInput::default()
                    },
                )
                .await,
            Err(AppError::UnknownStatus(_))
        ));
    }

    #[tokio::test]
    async fn test_stats_are_staff_only() {
        let (_, service) = setup();
        let report = created(&service).await;
        service.accept(&officer(), &report.id).await.unwrap();

        assert!(matches!(
            service.stats(&alice()).await,
            Err(AppError::Forbidden(_))
        ));
        let stats = service.stats(&officer()).await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.by_status.get("EM_ANALISE"), Some(&1));
    }

    #[tokio::test]
    async fn test_progress() {
        let (_, service) = setup();
        let report = at_stage(&service, 3).await;

        let progress = service.progress(&alice(), &report.id).await.unwrap();
        assert_eq!(progress.stage, Stage::UnderInvestigation);
        assert_eq!(progress.next_stage, Some(Stage::AwaitingInspection));
        assert!(progress.in_progress);
        assert_eq!(ReportService::stages().len(), 6);
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let store = Arc::new(InMemoryReportStore::with_latency(Duration::from_millis(200)));
        let service = ReportService::with_settings(
            store,
            LifecycleSettings {
                operation_timeout: Duration::from_millis(20),
                ..LifecycleSettings::default()
            },
        );

        let err = service.get(&admin(), "any").await.unwrap_err();
        assert!(matches!(err, AppError::StoreTimeout(20)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_concurrent_advances_lose_cleanly() {
        let store = Arc::new(InMemoryReportStore::with_latency(Duration::from_millis(10)));
        let service = ReportService::new(store.clone());
        let report = at_stage(&service, 2).await;

        let (officer, admin) = (officer(), admin());
        let (a, b) = tokio::join!(
            service.advance_stage(&officer, &report.id),
            service.advance_stage(&admin, &report.id),
        );
        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            outcomes
                .iter()
                .any(|r| matches!(r, Err(AppError::Conflict(_))))
        );

        let stored = store.snapshot(&report.id).await.unwrap();
        assert_eq!(stored.stage, Stage::UnderInvestigation);
        assert_eq!(stored.history.0.len(), report.history.0.len() + 1);
    }

    fn with_timeout(store: Arc<InMemoryReportStore>, ms: u64) -> ReportService {
        ReportService::with_settings(
            store,
            LifecycleSettings {
                operation_timeout: Duration::from_millis(ms),
                ..LifecycleSettings::default()
            },
        )
    }

    #[tokio::test]
    async fn test_late_acknowledged_advance_is_applied_once() {
        let store = Arc::new(InMemoryReportStore::new());
        let service = with_timeout(store.clone(), 50);
        let report = at_stage(&service, 2).await;
        store
            .stall_writes(WriteStall::AfterCommit(Duration::from_millis(200)))
            .await;

        let advanced = service.advance_stage(&officer(), &report.id).await.unwrap();
        assert_eq!(advanced.stage, Stage::UnderInvestigation);

        let stored = store.snapshot(&report.id).await.unwrap();
        assert_eq!(stored.stage, Stage::UnderInvestigation);
        assert_eq!(stored.version, report.version + 1);
        assert_eq!(stored.history.0.len(), report.history.0.len() + 1);
    }

    #[tokio::test]
    async fn test_late_acknowledged_create_is_returned() {
        let store = Arc::new(InMemoryReportStore::new());
        let service = with_timeout(store.clone(), 50);
        store
            .stall_writes(WriteStall::AfterCommit(Duration::from_millis(200)))
            .await;

        let report = created(&service).await;
        assert_eq!(store.len().await, 1);
        assert_eq!(store.snapshot(&report.id).await.unwrap(), report);
    }

    #[tokio::test]
    async fn test_unconfirmed_write_is_not_retryable() {
        let store = Arc::new(InMemoryReportStore::new());
        let service = with_timeout(store.clone(), 50);
        let report = at_stage(&service, 2).await;
        store
            .stall_writes(WriteStall::BeforeCommit(Duration::from_millis(200)))
            .await;

        let err = service
            .advance_stage(&officer(), &report.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::WriteOutcomeUnknown(_)));
        assert!(!err.is_retryable());

        let stored = store.snapshot(&report.id).await.unwrap();
        assert_eq!(stored.stage, Stage::UnderReview);
        assert_eq!(stored.version, report.version);
    }

    #[tokio::test]
    async fn test_list_rejects_out_of_range_page() {
        let (_, service) = setup();
        created(&service).await;

        let err = service
            .list(
                &officer(),
                ListReportsInput {
                    page: u64::MAX,
                    ..ListReportsInput::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let last = service
            .list(
                &officer(),
                ListReportsInput {
                    page: 1_000_000,
                    limit: 100,
                    ..ListReportsInput::default()
                },
            )
            .await
            .unwrap();
        assert!(last.items.is_empty());
        assert_eq!(last.total, 1);
    }

    static MIDNIGHT_CLOCK: AtomicI64 = AtomicI64::new(0);

    fn midnight_clock() -> DateTime<Utc> {
        DateTime::from_timestamp(MIDNIGHT_CLOCK.load(Ordering::SeqCst), 0).unwrap()
    }

    #[tokio::test]
    async fn test_protocol_sequence_restarts_at_local_midnight() {
        // 23:59:30 on 2025-11-17 in São Paulo
        let before = Utc.with_ymd_and_hms(2025, 11, 18, 2, 59, 30).unwrap();
        MIDNIGHT_CLOCK.store(before.timestamp(), Ordering::SeqCst);

        let service = ReportService::with_settings(
            Arc::new(InMemoryReportStore::new()),
            LifecycleSettings {
                timezone: chrono_tz::America::Sao_Paulo,
                clock: midnight_clock,
                ..LifecycleSettings::default()
            },
        );

        assert_eq!(created(&service).await.protocol, "ANI-20251117-00001");
        assert_eq!(created(&service).await.protocol, "ANI-20251117-00002");

        MIDNIGHT_CLOCK.store(before.timestamp() + 60, Ordering::SeqCst);
        let after = created(&service).await;
        assert_eq!(after.protocol, "ANI-20251118-00001");
        assert_eq!(after.created_at, before + chrono::Duration::seconds(60));
    }

    #[test]
    fn test_parse_priority() {
        assert_eq!(parse_priority("baixa").unwrap(), Priority::Low);
        assert_eq!(parse_priority(" HIGH ").unwrap(), Priority::High);
        assert_eq!(parse_priority("Urgente").unwrap(), Priority::Urgent);
        assert!(parse_priority("CRITICA").is_err());
    }

    #[test]
    fn test_reporter_snapshot_falls_back_to_email() {
        let user = app_user::Model {
            id: "alice".to_string(),
            email: "alice@example.com".to_string(),
            name: None,
            role: Role::Citizen,
            cpf: Some("52998224725".to_string()),
            phone: Some("11987654321".to_string()),
            token_hash: None,
            is_active: true,
            created_at: Utc::now().into(),
            updated_at: None,
            last_login_at: None,
        };
        let snapshot = ReporterSnapshot::from(&user);
        assert_eq!(snapshot.name.as_deref(), Some("alice@example.com"));
        assert_eq!(snapshot.contact.as_deref(), Some("11987654321"));
    }
}
