//! Per-seller KPI record cache with latest-request-wins fetches
//!
//! Each fetch is tagged with a monotonically increasing token. A response is
//! applied only if its token is still the latest issued for that seller, so
//! a slow early request can no longer overwrite the result of a faster,
//! later one.

use chrono::NaiveDate;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use crate::backend::KpiBackend;
use crate::error::CoreError;
use crate::event::{DataEvent, EventBus};
use crate::models::{KpiRecord, SellerId};

/// Ticket for one in-flight fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    seller: SellerId,
    id: u64,
}

impl RequestToken {
    pub fn seller(&self) -> &str {
        &self.seller
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Thread-safe cache of KPI records, keyed by seller
///
/// Records are kept sorted by date with at most one record per date.
pub struct KpiStore {
    records: DashMap<SellerId, BTreeMap<NaiveDate, KpiRecord>>,
    next_token: AtomicU64,
    latest: Mutex<HashMap<SellerId, u64>>,
    event_bus: EventBus,
}

impl Default for KpiStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KpiStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_token: AtomicU64::new(1),
            latest: Mutex::new(HashMap::new()),
            event_bus: EventBus::default(),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Issue a token for a new fetch; it supersedes earlier tokens for `seller`
    pub fn begin_fetch(&self, seller: &str) -> RequestToken {
        let id = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.latest.lock().insert(seller.to_string(), id);
        debug!(seller, token = id, "Fetch started");
        RequestToken {
            seller: seller.to_string(),
            id,
        }
    }

    /// Whether `token` is still the latest issued for its seller
    pub fn is_latest(&self, token: &RequestToken) -> bool {
        self.latest.lock().get(&token.seller) == Some(&token.id)
    }

    /// Apply a fetch response, replacing the seller's records
    ///
    /// Returns `false` (and leaves the cache untouched) when a newer fetch
    /// was started after `token` was issued.
    pub fn complete_fetch(&self, token: &RequestToken, records: Vec<KpiRecord>) -> bool {
        // Hold the lock while applying so a concurrent begin_fetch cannot
        // slip in between the check and the write.
        let latest = self.latest.lock();
        if latest.get(&token.seller) != Some(&token.id) {
            drop(latest);
            debug!(seller = %token.seller, token = token.id, "Discarding stale fetch response");
            self.event_bus.publish(DataEvent::StaleResponseDiscarded {
                seller: token.seller.clone(),
                token: token.id,
            });
            return false;
        }

        let by_date: BTreeMap<NaiveDate, KpiRecord> = records
            .into_iter()
            .map(|mut record| {
                record.seller_id = Some(token.seller.clone());
                (record.date, record)
            })
            .collect();
        let count = by_date.len();
        self.records.insert(token.seller.clone(), by_date);
        drop(latest);

        info!(seller = %token.seller, records = count, "KPI records loaded");
        self.event_bus
            .publish(DataEvent::RecordsLoaded(token.seller.clone()));
        true
    }

    /// Fetch from the backend and apply if still the latest request
    ///
    /// Returns `Ok(false)` when the response was discarded as stale.
    pub async fn load<B: KpiBackend + ?Sized>(
        &self,
        backend: &B,
        seller: &str,
        days: u32,
    ) -> Result<bool, CoreError> {
        let token = self.begin_fetch(seller);
        let records = backend.fetch_records(seller, days).await?;
        Ok(self.complete_fetch(&token, records))
    }

    /// Insert or replace the seller's record for `record.date`
    pub fn upsert(&self, seller: &str, mut record: KpiRecord) {
        record.seller_id = Some(seller.to_string());
        let replaced = self
            .records
            .entry(seller.to_string())
            .or_default()
            .insert(record.date, record)
            .is_some();
        debug!(seller, replaced, "KPI record upserted");
        self.event_bus
            .publish(DataEvent::RecordSaved(seller.to_string()));
    }

    /// Seller's records, ascending by date
    pub fn records(&self, seller: &str) -> Vec<KpiRecord> {
        self.records
            .get(seller)
            .map(|entry| entry.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Records of every cached seller, ascending by date within each seller
    pub fn all_records(&self) -> Vec<KpiRecord> {
        let mut sellers = self.sellers();
        sellers.sort();
        sellers
            .iter()
            .flat_map(|seller| self.records(seller))
            .collect()
    }

    pub fn sellers(&self) -> Vec<SellerId> {
        self.records.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn record_count(&self) -> usize {
        self.records.iter().map(|entry| entry.value().len()).sum()
    }
}
