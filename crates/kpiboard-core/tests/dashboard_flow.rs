//! End-to-end flows against an in-process backend: fetch into the store,
//! overlapping fetches, dashboard computation and KPI entry submission.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use kpiboard_core::analytics::{DashboardData, Granularity, PeriodSelection};
use kpiboard_core::models::{KpiCandidate, KpiRecord, Metric, TrackedMetricSet};
use kpiboard_core::{CoreError, DataEvent, KpiBackend, KpiStore, KpiSubmission, SubmissionState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()
}

/// Backend keeping records in memory; the n-th fetch sleeps `delays[n]` ms
/// and stamps its records with `ca = n + 1` when `stamp_calls` is set.
#[derive(Default)]
struct InMemoryBackend {
    records: Mutex<HashMap<String, Vec<KpiRecord>>>,
    delays: Vec<u64>,
    stamp_calls: bool,
    calls: AtomicUsize,
    reject_saves: Option<String>,
}

impl InMemoryBackend {
    fn seeded(seller: &str, days: i64) -> Self {
        let records = (1..=days)
            .map(|i| {
                KpiRecord::new(
                    today() - Duration::days(i),
                    800.0 + (i % 5) as f64 * 50.0,
                    8 + (i % 3) as u64,
                    30,
                    14,
                )
            })
            .collect();
        let backend = Self::default();
        backend.records.lock().insert(seller.to_string(), records);
        backend
    }
}

#[async_trait]
impl KpiBackend for InMemoryBackend {
    async fn fetch_records(&self, seller: &str, days: u32) -> Result<Vec<KpiRecord>, CoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ms) = self.delays.get(call) {
            tokio::time::sleep(std::time::Duration::from_millis(*ms)).await;
        }

        let cutoff = today() - Duration::days(days as i64);
        let mut records: Vec<KpiRecord> = self
            .records
            .lock()
            .get(seller)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.date >= cutoff)
            .collect();
        if self.stamp_calls {
            for record in &mut records {
                record.ca = (call + 1) as f64;
            }
        }
        records.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(records)
    }

    async fn save_record(&self, seller: &str, record: &KpiRecord) -> Result<KpiRecord, CoreError> {
        if let Some(detail) = &self.reject_saves {
            return Err(CoreError::Backend {
                status: Some(409),
                detail: detail.clone(),
            });
        }
        let mut all = self.records.lock();
        let records = all.entry(seller.to_string()).or_default();
        records.retain(|r| r.date != record.date);
        records.push(record.clone());
        Ok(record.clone())
    }

    async fn fetch_tracked_metrics(&self, _seller: &str) -> Result<TrackedMetricSet, CoreError> {
        Ok(TrackedMetricSet::empty().with(Metric::Ca).with(Metric::Ventes))
    }
}

#[tokio::test]
async fn load_then_compute_dashboard() {
    let backend = InMemoryBackend::seeded("s-1", 60);
    let store = KpiStore::new();

    assert!(store.load(&backend, "s-1", 30).await.unwrap());
    let records = store.records("s-1");
    assert_eq!(records.len(), 30);
    assert!(records.windows(2).all(|w| w[0].date < w[1].date));

    let dashboard = DashboardData::compute(&records, PeriodSelection::Last30Days, today()).unwrap();
    assert_eq!(dashboard.period.granularity, Granularity::Weekly);
    assert_eq!(dashboard.totals.days, 30);
    assert_eq!(dashboard.team.len(), 1);
    assert_eq!(dashboard.team[0].seller_id, "s-1");
}

#[tokio::test(start_paused = true)]
async fn overlapping_fetches_keep_latest_request() {
    let mut backend = InMemoryBackend::seeded("s-1", 10);
    backend.delays = vec![500, 20];
    backend.stamp_calls = true;

    let store = KpiStore::new();
    let mut events = store.event_bus().subscribe();

    let (slow, fast) = tokio::join!(
        store.load(&backend, "s-1", 30),
        store.load(&backend, "s-1", 30)
    );

    assert!(!slow.unwrap(), "first request resolves last and is discarded");
    assert!(fast.unwrap());
    assert!(store.records("s-1").iter().all(|r| r.ca == 2.0));

    assert_eq!(events.recv().await.unwrap(), DataEvent::RecordsLoaded("s-1".to_string()));
    assert!(matches!(
        events.recv().await.unwrap(),
        DataEvent::StaleResponseDiscarded { .. }
    ));
}

#[tokio::test]
async fn submission_round_trip_with_anomaly_confirmation() {
    let backend = InMemoryBackend::seeded("s-1", 20);
    let store = KpiStore::new();
    store.load(&backend, "s-1", 30).await.unwrap();

    let tracked = backend.fetch_tracked_metrics("s-1").await.unwrap();
    let history = store.records("s-1");

    let mut submission = KpiSubmission::new();

    // ventes missing
    let err = submission
        .submit(
            KpiCandidate {
                date: Some(today()),
                ca: Some(900.0),
                ..Default::default()
            },
            &history,
            tracked,
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::MissingFields { ref fields } if fields == &vec![Metric::Ventes]));
    assert_eq!(submission.state(), &SubmissionState::Idle);

    // extra zero typed by mistake
    let candidate = KpiCandidate {
        date: Some(today()),
        ca: Some(9000.0),
        ventes: Some(9),
        ..Default::default()
    };
    submission.submit(candidate, &history, tracked).unwrap();
    assert_eq!(submission.warnings().len(), 1);
    assert_eq!(submission.warnings()[0].metric, Metric::Ca);

    submission.confirm().unwrap();
    let saved = submission.save(&backend, "s-1", today()).await.unwrap();
    store.upsert("s-1", saved);

    assert_eq!(store.records("s-1").last().map(|r| r.ca), Some(9000.0));
    assert!(matches!(submission.state(), SubmissionState::Saved(_)));
}

#[tokio::test]
async fn failed_save_surfaces_backend_detail() {
    let mut backend = InMemoryBackend::seeded("s-1", 5);
    backend.reject_saves = Some("Les KPI de cette date sont verrouillés".to_string());

    let mut submission = KpiSubmission::new();
    let candidate = KpiCandidate {
        date: Some(today()),
        ca: Some(850.0),
        ventes: Some(9),
        clients: Some(30),
        articles: Some(14),
    };
    submission
        .submit(candidate, &[], TrackedMetricSet::all())
        .unwrap();

    let err = submission.save(&backend, "s-1", today()).await.unwrap_err();
    assert_eq!(err.to_string(), "Les KPI de cette date sont verrouillés");
    assert_eq!(
        submission.state(),
        &SubmissionState::Failed("Les KPI de cette date sont verrouillés".to_string())
    );
}
