//! kpiboard-core - Core library for kpiboard
//!
//! Period aggregation and derived KPIs for retail sales dashboards, the
//! anomaly check run before a daily KPI entry is saved, and the ports to
//! the REST backend and to preference storage.

pub mod analytics;
pub mod backend;
pub mod error;
pub mod event;
pub mod export;
pub mod models;
pub mod preferences;
pub mod store;
pub mod submission;

pub use analytics::{
    aggregate, check_anomalies, derive_metrics, resolve_period, DashboardData, Granularity,
    PeriodSelection,
};
pub use backend::{BackendConfig, HttpBackend, KpiBackend};
pub use error::CoreError;
pub use event::{DataEvent, EventBus};
pub use export::{export_buckets_to_csv, export_dashboard_to_json, export_team_to_csv};
pub use preferences::{DashboardPreferences, JsonFileStore, KeyValueStore};
pub use store::KpiStore;
pub use submission::{KpiSubmission, SubmissionState};
