//! Bucket aggregation
//!
//! Groups daily records into day / week / bi-week / month buckets, summing
//! the additive fields per seller and per bucket.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

use super::derived::{derive_metrics, DerivedMetrics};
use super::period::Granularity;
use crate::models::{KpiRecord, KpiSums, SellerId};

/// Aggregation key of a bucket
///
/// Derived ordering is chronological within one granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BucketKey {
    Day { date: NaiveDate },
    /// Weeks start on Sunday
    Week { start: NaiveDate },
    /// 14-day windows counted from January 1st, `index` is zero-based
    BiWeek { year: i32, index: u32 },
    Month { year: i32, month: u32 },
}

impl BucketKey {
    /// Key of the bucket containing `date`
    pub fn for_date(date: NaiveDate, granularity: Granularity) -> Self {
        match granularity {
            Granularity::Daily => Self::Day { date },
            Granularity::Weekly => Self::Week {
                start: date - Duration::days(date.weekday().num_days_from_sunday() as i64),
            },
            Granularity::BiWeekly => Self::BiWeek {
                year: date.year(),
                index: date.ordinal0() / 14,
            },
            Granularity::Monthly => Self::Month {
                year: date.year(),
                month: date.month(),
            },
        }
    }
}

/// First day covered by the bucket containing `date`
fn bucket_start(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    let offset = match granularity {
        Granularity::Daily => 0,
        Granularity::Weekly => date.weekday().num_days_from_sunday(),
        Granularity::BiWeekly => date.ordinal0() % 14,
        Granularity::Monthly => date.day0(),
    };
    date - Duration::days(offset as i64)
}

/// One aggregation window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub key: BucketKey,
    /// First calendar day covered by the bucket
    pub start: NaiveDate,
    /// Sums across all sellers
    pub total: KpiSums,
    /// Sums per seller ("" for records without a seller)
    pub entities: BTreeMap<SellerId, KpiSums>,
}

impl Bucket {
    fn new(key: BucketKey, start: NaiveDate) -> Self {
        Self {
            key,
            start,
            total: KpiSums::default(),
            entities: BTreeMap::new(),
        }
    }

    fn add(&mut self, record: &KpiRecord) {
        self.total.add(record);
        self.entities
            .entry(record.entity().to_string())
            .or_default()
            .add(record);
    }

    /// Derived KPIs for the whole bucket
    pub fn metrics(&self) -> DerivedMetrics {
        derive_metrics(&self.total)
    }

    /// Derived KPIs for one seller, `None` when the seller has no record here
    pub fn entity_metrics(&self, seller: &str) -> Option<DerivedMetrics> {
        self.entities.get(seller).map(derive_metrics)
    }

    /// Short chart label
    pub fn label(&self) -> String {
        match self.key {
            BucketKey::Day { date } => date.format("%d/%m").to_string(),
            BucketKey::Week { start } => format!("Sem. {}", start.format("%d/%m")),
            BucketKey::BiWeek { year, index } => format!("Quinz. {} {}", index + 1, year),
            BucketKey::Month { year, month } => format!("{} {}", month_name(month), year),
        }
    }
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "janv.",
        2 => "févr.",
        3 => "mars",
        4 => "avr.",
        5 => "mai",
        6 => "juin",
        7 => "juil.",
        8 => "août",
        9 => "sept.",
        10 => "oct.",
        11 => "nov.",
        12 => "déc.",
        _ => "?",
    }
}

/// Aggregate daily records into buckets
///
/// Pure and deterministic; output is sorted by bucket start. Input order
/// does not matter (the backend sends records newest first).
pub fn aggregate<'a>(
    records: impl IntoIterator<Item = &'a KpiRecord>,
    granularity: Granularity,
) -> Vec<Bucket> {
    let mut buckets: BTreeMap<BucketKey, Bucket> = BTreeMap::new();
    let mut count = 0usize;

    for record in records {
        let key = BucketKey::for_date(record.date, granularity);
        buckets
            .entry(key)
            .or_insert_with(|| Bucket::new(key, bucket_start(record.date, granularity)))
            .add(record);
        count += 1;
    }

    tracing::debug!(
        records = count,
        buckets = buckets.len(),
        %granularity,
        "Aggregated KPI records"
    );

    buckets.into_values().collect()
}

/// Period totals for one seller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SellerSummary {
    pub seller_id: SellerId,
    pub sums: KpiSums,
    pub metrics: DerivedMetrics,
}

/// Per-seller totals over the given records
///
/// Sorted by revenue (highest first), ties broken by seller id.
pub fn summarize_team<'a>(records: impl IntoIterator<Item = &'a KpiRecord>) -> Vec<SellerSummary> {
    let mut per_seller: BTreeMap<SellerId, KpiSums> = BTreeMap::new();
    for record in records {
        per_seller
            .entry(record.entity().to_string())
            .or_default()
            .add(record);
    }

    let mut summaries: Vec<SellerSummary> = per_seller
        .into_iter()
        .map(|(seller_id, sums)| SellerSummary {
            seller_id,
            metrics: derive_metrics(&sums),
            sums,
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.sums
            .ca
            .partial_cmp(&a.sums.ca)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.seller_id.cmp(&b.seller_id))
    });

    summaries
}
