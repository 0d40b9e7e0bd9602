//! Records every terminal call outcome and keeps the handful of incremental
//! aggregates the Cost Controller's admission checks need at O(1), alongside
//! the full call-record log a general [`CostFilter`] query scans.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use tokio::sync::RwLock;

use forgepipe_core::call_record::CallRecord;
use forgepipe_core::ids::{BuildId, CorrelationId, ProjectId, TenantId, UserId};

#[derive(Debug, Clone, Default)]
pub struct CostFilter {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub role: Option<String>,
    pub tenant: Option<TenantId>,
    pub user: Option<UserId>,
    pub project: Option<ProjectId>,
    pub build: Option<BuildId>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl CostFilter {
    fn matches(&self, record: &CallRecord) -> bool {
        if let Some(p) = &self.provider
            && *p != record.provider
        {
            return false;
        }
        if let Some(m) = &self.model
            && *m != record.model
        {
            return false;
        }
        if let Some(r) = &self.role
            && *r != record.role
        {
            return false;
        }
        if let Some(t) = &self.tenant
            && *t != record.tenant
        {
            return false;
        }
        if let Some(u) = &self.user
            && *u != record.user
        {
            return false;
        }
        if let Some(p) = &self.project
            && *p != record.project
        {
            return false;
        }
        if let Some(b) = &self.build
            && *b != record.build_id
        {
            return false;
        }
        if let Some(since) = self.since
            && record.recorded_at < since
        {
            return false;
        }
        if let Some(until) = self.until
            && record.recorded_at > until
        {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostSummary {
    pub total_cost: f64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub call_count: u64,
}

#[derive(Default)]
struct Aggregates {
    global_daily: HashMap<NaiveDate, f64>,
    global_monthly: HashMap<(i32, u32), f64>,
    per_build: HashMap<BuildId, f64>,
    per_user_daily: HashMap<(NaiveDate, UserId), f64>,
    per_tenant_daily: HashMap<(NaiveDate, TenantId), f64>,
}

pub struct CostTracker {
    retention_days: u32,
    records: RwLock<Vec<CallRecord>>,
    seen: RwLock<HashSet<CorrelationId>>,
    aggregates: RwLock<Aggregates>,
}

impl CostTracker {
    #[must_use]
    pub fn new(retention_days: u32) -> Self {
        Self {
            retention_days,
            records: RwLock::new(Vec::new()),
            seen: RwLock::new(HashSet::new()),
            aggregates: RwLock::new(Aggregates::default()),
        }
    }

    /// Append a call record, updating the incremental aggregates. Replaying
    /// the same `correlation_id` is a no-op: the Model Router may call this
    /// more than once for the same logical call across a retry of the
    /// recording step itself, and double-counting spend would be worse than
    /// silently dropping a duplicate.
    pub async fn record(&self, record: CallRecord) -> bool {
        {
            let mut seen = self.seen.write().await;
            if !seen.insert(record.correlation_id) {
                return false;
            }
        }

        let date = record.recorded_at.date_naive();
        let month_key = (date.year(), date.month());

        {
            let mut aggregates = self.aggregates.write().await;
            *aggregates.global_daily.entry(date).or_insert(0.0) += record.cost;
            *aggregates.global_monthly.entry(month_key).or_insert(0.0) += record.cost;
            *aggregates.per_build.entry(record.build_id).or_insert(0.0) += record.cost;
            *aggregates
                .per_user_daily
                .entry((date, record.user.clone()))
                .or_insert(0.0) += record.cost;
            *aggregates
                .per_tenant_daily
                .entry((date, record.tenant.clone()))
                .or_insert(0.0) += record.cost;
        }

        self.records.write().await.push(record);
        true
    }

    pub async fn query(&self, filter: &CostFilter) -> CostSummary {
        let records = self.records.read().await;
        let mut summary = CostSummary::default();
        for record in records.iter().filter(|r| filter.matches(r)) {
            summary.total_cost += record.cost;
            summary.total_input_tokens += record.input_tokens;
            summary.total_output_tokens += record.output_tokens;
            summary.call_count += 1;
        }
        summary
    }

    pub async fn global_daily(&self, date: NaiveDate) -> f64 {
        *self.aggregates.read().await.global_daily.get(&date).unwrap_or(&0.0)
    }

    pub async fn global_monthly(&self, year: i32, month: u32) -> f64 {
        *self
            .aggregates
            .read()
            .await
            .global_monthly
            .get(&(year, month))
            .unwrap_or(&0.0)
    }

    pub async fn per_build(&self, build: BuildId) -> f64 {
        *self.aggregates.read().await.per_build.get(&build).unwrap_or(&0.0)
    }

    pub async fn per_user_daily(&self, date: NaiveDate, user: &UserId) -> f64 {
        *self
            .aggregates
            .read()
            .await
            .per_user_daily
            .get(&(date, user.clone()))
            .unwrap_or(&0.0)
    }

    pub async fn per_tenant_daily(&self, date: NaiveDate, tenant: &TenantId) -> f64 {
        *self
            .aggregates
            .read()
            .await
            .per_tenant_daily
            .get(&(date, tenant.clone()))
            .unwrap_or(&0.0)
    }

    /// Drop call records (and the `seen` dedup set entries implied by them)
    /// older than `retention_days`. The incremental daily/monthly aggregates
    /// are left as-is: a budget check never looks further back than "today"
    /// or "this month", so stale aggregate buckets are simply never read
    /// again rather than needing active pruning.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - chrono::Duration::days(i64::from(self.retention_days));
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.recorded_at >= cutoff);
        before - records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgepipe_core::call_record::{CallOutcome, FallbackUsed};
    use forgepipe_core::ids::BuildId;

    fn record(cost: f64) -> CallRecord {
        CallRecord {
            correlation_id: CorrelationId::new(),
            build_id: BuildId::new(),
            tenant: TenantId::from("acme"),
            user: UserId::from("u1"),
            project: ProjectId::from("p1"),
            role: "code_generation".to_string(),
            provider: "acme-llm".to_string(),
            model: "v1".to_string(),
            input_tokens: 100,
            output_tokens: 200,
            cost,
            latency_ms: 500,
            cached: false,
            fallback_used: FallbackUsed::No,
            outcome: CallOutcome::Success,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn recording_updates_every_aggregate_dimension() {
        let tracker = CostTracker::new(30);
        let rec = record(1.5);
        let build = rec.build_id;
        let tenant = rec.tenant.clone();
        let user = rec.user.clone();
        tracker.record(rec).await;

        let today = Utc::now().date_naive();
        assert_eq!(tracker.global_daily(today).await, 1.5);
        assert_eq!(tracker.per_build(build).await, 1.5);
        assert_eq!(tracker.per_tenant_daily(today, &tenant).await, 1.5);
        assert_eq!(tracker.per_user_daily(today, &user).await, 1.5);
    }

    #[tokio::test]
    async fn replaying_the_same_correlation_id_does_not_double_count() {
        let tracker = CostTracker::new(30);
        let rec = record(2.0);
        let build = rec.build_id;
        assert!(tracker.record(rec.clone()).await);
        assert!(!tracker.record(rec).await);
        assert_eq!(tracker.per_build(build).await, 2.0);
    }

    #[tokio::test]
    async fn query_filters_by_dimension() {
        let tracker = CostTracker::new(30);
        let mut a = record(1.0);
        a.provider = "acme-llm".to_string();
        let mut b = record(3.0);
        b.provider = "other-llm".to_string();
        tracker.record(a).await;
        tracker.record(b).await;

        let summary = tracker
            .query(&CostFilter {
                provider: Some("acme-llm".to_string()),
                ..Default::default()
            })
            .await;
        assert_eq!(summary.total_cost, 1.0);
        assert_eq!(summary.call_count, 1);
    }
}
