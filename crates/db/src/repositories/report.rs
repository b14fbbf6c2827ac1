//! Report repository: durable storage for the report aggregate.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
    sea_query::{Expr, Func, OnConflict},
};
use serde::{Deserialize, Serialize};

use crate::entities::{
    ProtocolCounter, Report, protocol_counter,
    report::{self, IncidentType, Priority, ReportStatus, Stage},
};
use aniseg_common::{AppError, AppResult};

/// Column a listing is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportSort {
    #[default]
    CreatedAt,
    UpdatedAt,
    Stage,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl From<SortDirection> for Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => Self::Asc,
            SortDirection::Desc => Self::Desc,
        }
    }
}

/// Listing filter. Empty lists mean "any".
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    /// Restrict to reports created by this user.
    pub created_by: Option<String>,
    pub statuses: Vec<ReportStatus>,
    pub incident_types: Vec<IncidentType>,
    pub priorities: Vec<Priority>,
    /// Matched exactly against the lower-cased column.
    pub neighborhood: Option<String>,
    /// Case-insensitive substring over protocol, address, neighborhood and type.
    pub search: Option<String>,
    pub sort: ReportSort,
    pub direction: SortDirection,
}

/// Aggregate counters over every stored report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStats {
    pub total: u64,
    pub concluded: u64,
    /// Reports in stages 2 to 4.
    pub in_progress: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_type: BTreeMap<String, u64>,
    pub by_priority: BTreeMap<String, u64>,
}

/// Persistence contract for reports.
///
/// Writes after creation go through [`ReportStore::save_if_version`], a
/// single conditional update: it succeeds only when the stored version
/// still equals the one the caller loaded.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Insert a freshly created report.
    async fn insert(&self, report: report::Model) -> AppResult<report::Model>;

    /// Find a report by id.
    async fn find_by_id(&self, id: &str) -> AppResult<Option<report::Model>>;

    /// Find a report by its protocol number.
    async fn find_by_protocol(&self, protocol: &str) -> AppResult<Option<report::Model>>;

    /// Replace the stored report if its version is still `expected_version`.
    ///
    /// Returns [`AppError::Conflict`] when another writer got there first.
    async fn save_if_version(
        &self,
        report: report::Model,
        expected_version: i32,
    ) -> AppResult<report::Model>;

    /// One page of reports matching `filter`, plus the total match count.
    async fn list(
        &self,
        filter: &ReportFilter,
        offset: u64,
        limit: u64,
    ) -> AppResult<(Vec<report::Model>, u64)>;

    /// Counters for the dashboard.
    async fn stats(&self) -> AppResult<ReportStats>;

    /// Atomically claim the next protocol sequence for a calendar day key.
    async fn next_protocol_sequence(&self, day_key: &str) -> AppResult<u32>;
}

/// Report repository backed by sea-orm.
#[derive(Clone)]
pub struct ReportRepository {
    db: Arc<DatabaseConnection>,
}

impl ReportRepository {
    /// Create a new report repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn filtered(filter: &ReportFilter) -> Select<Report> {
        let mut query = Report::find();

        if let Some(creator) = &filter.created_by {
            query = query.filter(report::Column::CreatedBy.eq(creator.as_str()));
        }
        if !filter.statuses.is_empty() {
            query = query.filter(report::Column::Status.is_in(filter.statuses.clone()));
        }
        if !filter.incident_types.is_empty() {
            query = query.filter(report::Column::IncidentType.is_in(filter.incident_types.clone()));
        }
        if !filter.priorities.is_empty() {
            query = query.filter(report::Column::Priority.is_in(filter.priorities.clone()));
        }
        if let Some(neighborhood) = &filter.neighborhood {
            query = query.filter(report::Column::Neighborhood.eq(neighborhood.to_lowercase()));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search.to_lowercase());
            let lower_like = |column: report::Column| {
                Expr::expr(Func::lower(Expr::col(column))).like(pattern.clone())
            };
            query = query.filter(
                Condition::any()
                    .add(lower_like(report::Column::Protocol))
                    .add(lower_like(report::Column::Address))
                    .add(lower_like(report::Column::Neighborhood))
                    .add(lower_like(report::Column::IncidentType)),
            );
        }

        let column = match filter.sort {
            ReportSort::CreatedAt => report::Column::CreatedAt,
            ReportSort::UpdatedAt => report::Column::UpdatedAt,
            ReportSort::Stage => report::Column::Stage,
        };
        query
            .order_by(column, filter.direction.into())
            .order_by(report::Column::Id, filter.direction.into())
    }

    async fn count_by(&self, column: report::Column) -> AppResult<BTreeMap<String, u64>> {
        let rows: Vec<(String, i64)> = Report::find()
            .select_only()
            .column(column)
            .column_as(report::Column::Id.count(), "count")
            .group_by(column)
            .into_tuple()
            .all(self.db.as_ref())
            .await?;

        Ok(rows
            .into_iter()
            .map(|(key, count)| (key, count.max(0) as u64))
            .collect())
    }
}

/// Every column set, so the model can be inserted or written back whole.
fn to_active(model: report::Model) -> report::ActiveModel {
    report::ActiveModel {
        id: Set(model.id),
        protocol: Set(model.protocol),
        address: Set(model.address),
        neighborhood: Set(model.neighborhood),
        incident_type: Set(model.incident_type),
        species: Set(model.species),
        condition: Set(model.condition),
        description: Set(model.description),
        suspect_name: Set(model.suspect_name),
        other_info: Set(model.other_info),
        reporter_name: Set(model.reporter_name),
        reporter_cpf: Set(model.reporter_cpf),
        reporter_contact: Set(model.reporter_contact),
        stage: Set(model.stage),
        status: Set(model.status),
        priority: Set(model.priority),
        created_by: Set(model.created_by),
        assigned_authority_id: Set(model.assigned_authority_id),
        assigned_authority_email: Set(model.assigned_authority_email),
        comments: Set(model.comments),
        evidence: Set(model.evidence),
        feedback: Set(model.feedback),
        history: Set(model.history),
        confirmation_deadline: Set(model.confirmation_deadline),
        created_at: Set(model.created_at),
        updated_at: Set(model.updated_at),
        concluded_at: Set(model.concluded_at),
        version: Set(model.version),
    }
}

#[async_trait]
impl ReportStore for ReportRepository {
    async fn insert(&self, report: report::Model) -> AppResult<report::Model> {
        Ok(to_active(report).insert(self.db.as_ref()).await?)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<report::Model>> {
        Ok(Report::find_by_id(id).one(self.db.as_ref()).await?)
    }

    async fn find_by_protocol(&self, protocol: &str) -> AppResult<Option<report::Model>> {
        Ok(Report::find()
            .filter(report::Column::Protocol.eq(protocol))
            .one(self.db.as_ref())
            .await?)
    }

    async fn save_if_version(
        &self,
        report: report::Model,
        expected_version: i32,
    ) -> AppResult<report::Model> {
        let id = report.id.clone();
        let result = Report::update_many()
            .set(to_active(report.clone()))
            .filter(report::Column::Id.eq(id.as_str()))
            .filter(report::Column::Version.eq(expected_version))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            tracing::warn!(report_id = %id, expected_version, "Lost optimistic update");
            return Err(AppError::Conflict(format!(
                "report {id} was modified concurrently"
            )));
        }

        Ok(report)
    }

    async fn list(
        &self,
        filter: &ReportFilter,
        offset: u64,
        limit: u64,
    ) -> AppResult<(Vec<report::Model>, u64)> {
        let query = Self::filtered(filter);
        let total = query.clone().count(self.db.as_ref()).await?;
        let items = query
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;
        Ok((items, total))
    }

    async fn stats(&self) -> AppResult<ReportStats> {
        let total = Report::find().count(self.db.as_ref()).await?;
        let concluded = Report::find()
            .filter(report::Column::Stage.eq(Stage::Concluded))
            .count(self.db.as_ref())
            .await?;
        let in_progress = Report::find()
            .filter(report::Column::Stage.is_in([
                Stage::UnderReview,
                Stage::UnderInvestigation,
                Stage::AwaitingInspection,
            ]))
            .count(self.db.as_ref())
            .await?;

        Ok(ReportStats {
            total,
            concluded,
            in_progress,
            by_status: self.count_by(report::Column::Status).await?,
            by_type: self.count_by(report::Column::IncidentType).await?,
            by_priority: self.count_by(report::Column::Priority).await?,
        })
    }

    async fn next_protocol_sequence(&self, day_key: &str) -> AppResult<u32> {
        let seed = protocol_counter::ActiveModel {
            day: Set(day_key.to_string()),
            last_value: Set(1),
        };

        let counter = ProtocolCounter::insert(seed)
            .on_conflict(
                OnConflict::column(protocol_counter::Column::Day)
                    .value(
                        protocol_counter::Column::LastValue,
                        Expr::col((ProtocolCounter, protocol_counter::Column::LastValue)).add(1),
                    )
                    .to_owned(),
            )
            .exec_with_returning(self.db.as_ref())
            .await?;

        u32::try_from(counter.last_value).map_err(|_| {
            AppError::Internal(format!("protocol counter for {day_key} is negative"))
        })
    }
}
