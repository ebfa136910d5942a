//! Daily KPI records and their additive accumulators
//!
//! Only the additive fields (`ca`, `ventes`, `clients`, `articles`) are ever
//! stored or summed. Basket value, conversion rate and items-per-sale are
//! recomputed from sums, see [`crate::analytics::derive_metrics`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seller identifier as issued by the backend
pub type SellerId = String;

/// Additive KPI tracked per seller per day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Revenue (chiffre d'affaires)
    Ca,
    /// Completed sales
    Ventes,
    /// Prospects greeted
    Clients,
    /// Line items sold
    Articles,
}

impl Metric {
    /// All metrics in declaration order
    pub const ALL: [Metric; 4] = [Metric::Ca, Metric::Ventes, Metric::Clients, Metric::Articles];

    /// Short display label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ca => "CA",
            Self::Ventes => "Ventes",
            Self::Clients => "Clients",
            Self::Articles => "Articles",
        }
    }

    /// Wire / CLI key
    pub fn key(&self) -> &'static str {
        match self {
            Self::Ca => "ca",
            Self::Ventes => "ventes",
            Self::Clients => "clients",
            Self::Articles => "articles",
        }
    }

    /// Parse a wire / CLI key (accepts the backend's `nb_` prefixes)
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "ca" => Some(Self::Ca),
            "ventes" | "nb_ventes" => Some(Self::Ventes),
            "clients" | "nb_clients" | "prospects" => Some(Self::Clients),
            "articles" | "nb_articles" => Some(Self::Articles),
            _ => None,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One seller's KPIs for one calendar day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiRecord {
    pub date: NaiveDate,

    /// Revenue for the day
    #[serde(default)]
    pub ca: f64,

    #[serde(default, alias = "nb_ventes")]
    pub ventes: u64,

    #[serde(default, alias = "nb_clients", alias = "prospects")]
    pub clients: u64,

    #[serde(default, alias = "nb_articles")]
    pub articles: u64,

    /// Owning seller, absent in single-seller payloads
    #[serde(default, alias = "seller", skip_serializing_if = "Option::is_none")]
    pub seller_id: Option<SellerId>,
}

impl KpiRecord {
    pub fn new(date: NaiveDate, ca: f64, ventes: u64, clients: u64, articles: u64) -> Self {
        Self {
            date,
            ca,
            ventes,
            clients,
            articles,
            seller_id: None,
        }
    }

    pub fn with_seller(mut self, seller: impl Into<SellerId>) -> Self {
        self.seller_id = Some(seller.into());
        self
    }

    /// Value of a single metric as f64
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Ca => self.ca,
            Metric::Ventes => self.ventes as f64,
            Metric::Clients => self.clients as f64,
            Metric::Articles => self.articles as f64,
        }
    }

    /// Entity key used when bucketing per seller
    pub fn entity(&self) -> &str {
        self.seller_id.as_deref().unwrap_or("")
    }
}

/// A KPI entry as typed by the seller, fields possibly not filled in yet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiCandidate {
    pub date: Option<NaiveDate>,
    pub ca: Option<f64>,
    pub ventes: Option<u64>,
    pub clients: Option<u64>,
    pub articles: Option<u64>,
}

impl KpiCandidate {
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Ca => self.ca,
            Metric::Ventes => self.ventes.map(|v| v as f64),
            Metric::Clients => self.clients.map(|v| v as f64),
            Metric::Articles => self.articles.map(|v| v as f64),
        }
    }

    /// Metrics that have a value
    pub fn present(&self) -> impl Iterator<Item = Metric> + '_ {
        Metric::ALL
            .into_iter()
            .filter(move |m| self.value(*m).is_some())
    }

    /// Build the record to persist; untracked fields default to 0
    pub fn to_record(&self, fallback_date: NaiveDate) -> KpiRecord {
        KpiRecord::new(
            self.date.unwrap_or(fallback_date),
            self.ca.unwrap_or(0.0),
            self.ventes.unwrap_or(0),
            self.clients.unwrap_or(0),
            self.articles.unwrap_or(0),
        )
    }
}

/// Additive accumulator over one or more records
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiSums {
    pub ca: f64,
    pub ventes: u64,
    pub clients: u64,
    pub articles: u64,
    /// Number of contributing daily records
    pub days: u32,
}

impl KpiSums {
    pub fn add(&mut self, record: &KpiRecord) {
        self.ca += record.ca;
        self.ventes += record.ventes;
        self.clients += record.clients;
        self.articles += record.articles;
        self.days += 1;
    }

    pub fn merge(&mut self, other: &KpiSums) {
        self.ca += other.ca;
        self.ventes += other.ventes;
        self.clients += other.clients;
        self.articles += other.articles;
        self.days += other.days;
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a KpiRecord>) -> Self {
        let mut sums = Self::default();
        for record in records {
            sums.add(record);
        }
        sums
    }

    /// Summed value of one metric
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Ca => self.ca,
            Metric::Ventes => self.ventes as f64,
            Metric::Clients => self.clients as f64,
            Metric::Articles => self.articles as f64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.days == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_record_accepts_backend_aliases() {
        let json = r#"{"date":"2024-03-04","ca":1250.5,"nb_ventes":12,"nb_clients":40,"nb_articles":19,"seller":"s-1"}"#;
        let record: KpiRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.date, d(2024, 3, 4));
        assert_eq!(record.ventes, 12);
        assert_eq!(record.clients, 40);
        assert_eq!(record.articles, 19);
        assert_eq!(record.seller_id.as_deref(), Some("s-1"));
    }

    #[test]
    fn test_record_missing_fields_default_to_zero() {
        let record: KpiRecord = serde_json::from_str(r#"{"date":"2024-03-04"}"#).unwrap();
        assert_eq!(record.ca, 0.0);
        assert_eq!(record.ventes, 0);
        assert_eq!(record.entity(), "");
    }

    #[test]
    fn test_sums_accumulate_and_count_days() {
        let records = vec![
            KpiRecord::new(d(2024, 3, 4), 100.0, 10, 20, 15),
            KpiRecord::new(d(2024, 3, 5), 50.0, 5, 10, 6),
        ];
        let sums = KpiSums::from_records(&records);
        assert_eq!(sums.ca, 150.0);
        assert_eq!(sums.ventes, 15);
        assert_eq!(sums.clients, 30);
        assert_eq!(sums.articles, 21);
        assert_eq!(sums.days, 2);
    }

    #[test]
    fn test_metric_keys() {
        assert_eq!(Metric::from_key("nb_ventes"), Some(Metric::Ventes));
        assert_eq!(Metric::from_key(" CA "), Some(Metric::Ca));
        assert_eq!(Metric::from_key("panier"), None);
    }

    #[test]
    fn test_candidate_to_record_defaults() {
        let candidate = KpiCandidate {
            ca: Some(320.0),
            ventes: Some(4),
            ..Default::default()
        };
        let record = candidate.to_record(d(2024, 5, 1));
        assert_eq!(record.date, d(2024, 5, 1));
        assert_eq!(record.clients, 0);
        assert_eq!(candidate.present().collect::<Vec<_>>(), vec![Metric::Ca, Metric::Ventes]);
    }
}
