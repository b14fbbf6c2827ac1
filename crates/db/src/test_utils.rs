//! Test utilities: an in-memory [`ReportStore`].
//!
//! Enabled with the `test-utils` feature so downstream crates can drive
//! the report service without a database.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::entities::report::{self, Stage};
use crate::repositories::{ReportFilter, ReportSort, ReportStats, ReportStore, SortDirection};
use aniseg_common::{AppError, AppResult};

/// Delay injected into writes, relative to the moment they take effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStall {
    /// Sleep, then write. A caller that gives up in time leaves no trace.
    BeforeCommit(Duration),
    /// Write, then sleep before acknowledging.
    AfterCommit(Duration),
}

#[derive(Default)]
struct State {
    reports: HashMap<String, report::Model>,
    counters: HashMap<String, u32>,
    write_stall: Option<WriteStall>,
}

/// Report store kept in process memory.
///
/// Honors the same version check as the database-backed repository.
#[derive(Default)]
pub struct InMemoryReportStore {
    state: Mutex<State>,
    latency: Option<Duration>,
}

impl InMemoryReportStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that sleeps this long before every operation.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            state: Mutex::default(),
            latency: Some(latency),
        }
    }

    /// Number of stored reports.
    pub async fn len(&self) -> usize {
        self.state.lock().await.reports.len()
    }

    /// Whether the store holds no reports.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stored copy of a report, bypassing the trait.
    pub async fn snapshot(&self, id: &str) -> Option<report::Model> {
        self.state.lock().await.reports.get(id).cloned()
    }

    /// Stall every later `insert` and `save_if_version`.
    pub async fn stall_writes(&self, stall: WriteStall) {
        self.state.lock().await.write_stall = Some(stall);
    }

    async fn stall_before_commit(&self) {
        let stall = self.state.lock().await.write_stall;
        if let Some(WriteStall::BeforeCommit(delay)) = stall {
            tokio::time::sleep(delay).await;
        }
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

async fn stall_after_commit(stall: Option<WriteStall>) {
    if let Some(WriteStall::AfterCommit(delay)) = stall {
        tokio::time::sleep(delay).await;
    }
}

fn filter_accepts(filter: &ReportFilter, report: &report::Model) -> bool {
    if filter
        .created_by
        .as_ref()
        .is_some_and(|creator| &report.created_by != creator)
    {
        return false;
    }
    if !filter.statuses.is_empty() && !filter.statuses.contains(&report.status) {
        return false;
    }
    if !filter.incident_types.is_empty() && !filter.incident_types.contains(&report.incident_type)
    {
        return false;
    }
    if !filter.priorities.is_empty() && !filter.priorities.contains(&report.priority) {
        return false;
    }
    if filter
        .neighborhood
        .as_ref()
        .is_some_and(|n| report.neighborhood != n.to_lowercase())
    {
        return false;
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let needle = search.to_lowercase();
        let haystacks = [
            report.protocol.as_str(),
            report.address.as_str(),
            report.neighborhood.as_str(),
            report.incident_type.as_str(),
        ];
        if !haystacks
            .iter()
            .any(|h| h.to_lowercase().contains(&needle))
        {
            return false;
        }
    }
    true
}

fn compare(filter: &ReportFilter, a: &report::Model, b: &report::Model) -> Ordering {
    let ordering = match filter.sort {
        ReportSort::CreatedAt => a.created_at.cmp(&b.created_at),
        ReportSort::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        ReportSort::Stage => a.stage.cmp(&b.stage),
    }
    .then_with(|| a.id.cmp(&b.id));

    match filter.direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn insert(&self, report: report::Model) -> AppResult<report::Model> {
        self.simulate_latency().await;
        self.stall_before_commit().await;
        let stall = {
            let mut state = self.state.lock().await;

            if state.reports.contains_key(&report.id)
                || state.reports.values().any(|r| r.protocol == report.protocol)
            {
                return Err(AppError::Conflict(format!(
                    "report {} already exists",
                    report.protocol
                )));
            }

            state.reports.insert(report.id.clone(), report.clone());
            state.write_stall
        };

        stall_after_commit(stall).await;
        Ok(report)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<report::Model>> {
        self.simulate_latency().await;
        Ok(self.state.lock().await.reports.get(id).cloned())
    }

    async fn find_by_protocol(&self, protocol: &str) -> AppResult<Option<report::Model>> {
        self.simulate_latency().await;
        Ok(self
            .state
            .lock()
            .await
            .reports
            .values()
            .find(|r| r.protocol == protocol)
            .cloned())
    }

    async fn save_if_version(
        &self,
        report: report::Model,
        expected_version: i32,
    ) -> AppResult<report::Model> {
        self.simulate_latency().await;
        self.stall_before_commit().await;
        let stall = {
            let mut state = self.state.lock().await;
            let stall = state.write_stall;

            match state.reports.get_mut(&report.id) {
                Some(stored) if stored.version == expected_version => {
                    *stored = report.clone();
                }
                _ => {
                    return Err(AppError::Conflict(format!(
                        "report {} was modified concurrently",
                        report.id
                    )));
                }
            }
            stall
        };

        stall_after_commit(stall).await;
        Ok(report)
    }

    async fn list(
        &self,
        filter: &ReportFilter,
        offset: u64,
        limit: u64,
    ) -> AppResult<(Vec<report::Model>, u64)> {
        self.simulate_latency().await;
        let state = self.state.lock().await;

        let mut hits: Vec<report::Model> = state
            .reports
            .values()
            .filter(|r| filter_accepts(filter, r))
            .cloned()
            .collect();
        hits.sort_by(|a, b| compare(filter, a, b));

        let total = hits.len() as u64;
        let page = hits
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn stats(&self) -> AppResult<ReportStats> {
        self.simulate_latency().await;
        let state = self.state.lock().await;

        let mut stats = ReportStats::default();
        for report in state.reports.values() {
            stats.total += 1;
            if report.stage == Stage::Concluded {
                stats.concluded += 1;
            }
            if matches!(
                report.stage,
                Stage::UnderReview | Stage::UnderInvestigation | Stage::AwaitingInspection
            ) {
                stats.in_progress += 1;
            }
            *stats
                .by_status
                .entry(report.status.as_str().to_string())
                .or_default() += 1;
            *stats
                .by_type
                .entry(report.incident_type.as_str().to_string())
                .or_default() += 1;
            *stats
                .by_priority
                .entry(report.priority.as_str().to_string())
                .or_default() += 1;
        }
        Ok(stats)
    }

    async fn next_protocol_sequence(&self, day_key: &str) -> AppResult<u32> {
        self.simulate_latency().await;
        let mut state = self.state.lock().await;

        let counter = state.counters.entry(day_key.to_string()).or_default();
        *counter += 1;
        Ok(*counter)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counters_are_per_day() {
        let store = InMemoryReportStore::new();

        assert_eq!(store.next_protocol_sequence("20251117").await.unwrap(), 1);
        assert_eq!(store.next_protocol_sequence("20251117").await.unwrap(), 2);
        assert_eq!(store.next_protocol_sequence("20251118").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = InMemoryReportStore::new();
        assert!(store.is_empty().await);
        assert!(store.snapshot("nope").await.is_none());
    }
}
