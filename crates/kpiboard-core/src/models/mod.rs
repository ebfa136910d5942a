//! Data models for kpiboard

pub mod kpi;
pub mod tracked;

pub use kpi::{KpiCandidate, KpiRecord, KpiSums, Metric, SellerId};
pub use tracked::{KpiConfig, TrackedMetricSet};
