//! KPI analytics for the seller and manager dashboards
//!
//! Period selection, bucket aggregation, derived KPIs and the anomaly check
//! run on KPI records already fetched from the backend. Everything in here
//! is synchronous and side-effect free apart from `tracing` output.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::error::CoreError;
use crate::models::{KpiRecord, KpiSums};

pub mod anomalies;
pub mod buckets;
pub mod derived;
pub mod period;


pub use anomalies::{
    check_anomalies, check_anomalies_with, AnomalyDirection, AnomalyThreshold, AnomalyWarning,
};
pub use buckets::{aggregate, summarize_team, Bucket, BucketKey, SellerSummary};
pub use derived::{derive_metrics, DerivedMetrics};
pub use period::{
    granularity_for_days, resolve_period, Granularity, PeriodSelection, ResolvedPeriod,
};

/// Everything a dashboard needs for one period
#[derive(Debug, Clone, Serialize)]
pub struct DashboardData {
    /// Period analyzed
    pub period: ResolvedPeriod,
    /// Chart series, ascending
    pub buckets: Vec<Bucket>,
    /// Sums over the whole period
    pub totals: KpiSums,
    /// Derived KPIs over the whole period
    pub metrics: DerivedMetrics,
    /// Per-seller totals (manager view)
    pub team: Vec<SellerSummary>,
    /// Timestamp of computation
    pub computed_at: DateTime<Utc>,
}

impl DashboardData {
    /// Resolve the period, keep matching records and aggregate them
    ///
    /// # Errors
    /// `CoreError::InvalidRange` for a custom range ending before it starts.
    pub fn compute(
        records: &[KpiRecord],
        selection: PeriodSelection,
        today: NaiveDate,
    ) -> Result<Self, CoreError> {
        let period = resolve_period(selection, today)?;
        let in_range = period.filter(records);

        if in_range.len() < records.len() {
            tracing::debug!(
                kept = in_range.len(),
                dropped = records.len() - in_range.len(),
                "Records outside period ignored"
            );
        }

        let totals = KpiSums::from_records(in_range.iter().copied());

        Ok(Self {
            buckets: aggregate(in_range.iter().copied(), period.granularity),
            team: summarize_team(in_range.iter().copied()),
            metrics: derive_metrics(&totals),
            totals,
            period,
            computed_at: Utc::now(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}
