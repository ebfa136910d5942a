//! Typed set of the metrics a shop tracks
//!
//! Replaces the backend's loose `track_*` booleans. Both the submission gate
//! (required fields) and presenters (visible columns) read this set.

use super::kpi::{KpiCandidate, Metric};
use serde::{Deserialize, Serialize};

/// Bit set over [`Metric`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Metric>", into = "Vec<Metric>")]
pub struct TrackedMetricSet(u8);

impl TrackedMetricSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn all() -> Self {
        Self(0b1111)
    }

    const fn bit(metric: Metric) -> u8 {
        match metric {
            Metric::Ca => 1,
            Metric::Ventes => 1 << 1,
            Metric::Clients => 1 << 2,
            Metric::Articles => 1 << 3,
        }
    }

    pub fn with(mut self, metric: Metric) -> Self {
        self.insert(metric);
        self
    }

    pub fn insert(&mut self, metric: Metric) {
        self.0 |= Self::bit(metric);
    }

    pub fn remove(&mut self, metric: Metric) {
        self.0 &= !Self::bit(metric);
    }

    pub fn contains(&self, metric: Metric) -> bool {
        self.0 & Self::bit(metric) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Tracked metrics in declaration order
    pub fn iter(&self) -> impl Iterator<Item = Metric> + '_ {
        Metric::ALL.into_iter().filter(move |m| self.contains(*m))
    }

    /// Tracked metrics the candidate has no value for
    pub fn missing_in(&self, candidate: &KpiCandidate) -> Vec<Metric> {
        self.iter()
            .filter(|m| candidate.value(*m).is_none())
            .collect()
    }

    /// Parse a comma separated list of metric keys ("ca,ventes")
    pub fn parse_list(input: &str) -> Option<Self> {
        let mut set = Self::empty();
        for part in input.split(',').filter(|p| !p.trim().is_empty()) {
            set.insert(Metric::from_key(part)?);
        }
        Some(set)
    }
}

impl Default for TrackedMetricSet {
    fn default() -> Self {
        Self::all()
    }
}

impl From<Vec<Metric>> for TrackedMetricSet {
    fn from(metrics: Vec<Metric>) -> Self {
        metrics.into_iter().fold(Self::empty(), Self::with)
    }
}

impl From<TrackedMetricSet> for Vec<Metric> {
    fn from(set: TrackedMetricSet) -> Self {
        set.iter().collect()
    }
}

impl FromIterator<Metric> for TrackedMetricSet {
    fn from_iter<I: IntoIterator<Item = Metric>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

/// KPI configuration document as served by the backend
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct KpiConfig {
    #[serde(default)]
    pub track_ca: bool,
    #[serde(default)]
    pub track_ventes: bool,
    #[serde(default)]
    pub track_clients: bool,
    #[serde(default)]
    pub track_articles: bool,
}

impl From<KpiConfig> for TrackedMetricSet {
    fn from(config: KpiConfig) -> Self {
        let mut set = Self::empty();
        if config.track_ca {
            set.insert(Metric::Ca);
        }
        if config.track_ventes {
            set.insert(Metric::Ventes);
        }
        if config.track_clients {
            set.insert(Metric::Clients);
        }
        if config.track_articles {
            set.insert(Metric::Articles);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove_contains() {
        let mut set = TrackedMetricSet::empty();
        set.insert(Metric::Ca);
        set.insert(Metric::Articles);
        assert!(set.contains(Metric::Ca));
        assert!(!set.contains(Metric::Ventes));
        assert_eq!(set.len(), 2);

        set.remove(Metric::Ca);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Metric::Articles]);
    }

    #[test]
    fn test_from_backend_config() {
        let config: KpiConfig =
            serde_json::from_str(r#"{"track_ca":true,"track_ventes":true,"track_clients":false}"#)
                .unwrap();
        let set = TrackedMetricSet::from(config);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Metric::Ca, Metric::Ventes]);
    }

    #[test]
    fn test_serde_as_list() {
        let set = TrackedMetricSet::empty().with(Metric::Ventes).with(Metric::Ca);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["ca","ventes"]"#);
        let back: TrackedMetricSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_missing_in_candidate() {
        let candidate = KpiCandidate {
            ca: Some(10.0),
            ..Default::default()
        };
        let missing = TrackedMetricSet::all().missing_in(&candidate);
        assert_eq!(missing, vec![Metric::Ventes, Metric::Clients, Metric::Articles]);
    }

    #[test]
    fn test_parse_list() {
        let set = TrackedMetricSet::parse_list("ca, nb_ventes").unwrap();
        assert!(set.contains(Metric::Ca) && set.contains(Metric::Ventes));
        assert!(TrackedMetricSet::parse_list("ca,panier").is_none());
    }
}
