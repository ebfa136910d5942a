//! Anomaly check for a new daily KPI entry
//!
//! Compares each entered value against the seller's trailing average and
//! flags values outside the `[0.5x, 1.5x]` band, so typos (an extra zero,
//! a missing digit) get a confirmation prompt before the entry is saved.

use serde::Serialize;

use crate::models::{KpiCandidate, KpiRecord, Metric, TrackedMetricSet};

/// Minimum number of history records before any warning is produced
pub const MIN_HISTORY: usize = 5;

/// Number of most recent records the average is taken over
pub const HISTORY_WINDOW: usize = 30;

/// Multiplicative band around the trailing average
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyThreshold {
    pub low: f64,
    pub high: f64,
}

impl AnomalyThreshold {
    pub const DEFAULT: Self = Self {
        low: 0.5,
        high: 1.5,
    };
}

impl Default for AnomalyThreshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Which side of the band the value fell on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyDirection {
    Above,
    Below,
}

/// Entered value outside the expected band
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyWarning {
    pub metric: Metric,
    pub value: f64,
    pub average: f64,
    /// `(value / average - 1) * 100`, rounded
    pub percentage_delta: i64,
}

impl AnomalyWarning {
    pub fn direction(&self) -> AnomalyDirection {
        if self.value > self.average {
            AnomalyDirection::Above
        } else {
            AnomalyDirection::Below
        }
    }

    /// Format value based on metric type
    pub fn format_value(&self) -> String {
        match self.metric {
            Metric::Ca => format!("{:.2}€", self.value),
            _ => format!("{:.0}", self.value),
        }
    }

    /// Format deviation as percentage with sign
    pub fn format_deviation(&self) -> String {
        let sign = if self.percentage_delta >= 0 { "+" } else { "" };
        format!("{}{}%", sign, self.percentage_delta)
    }

    /// One-line message for the confirmation prompt
    pub fn message(&self) -> String {
        let average = match self.metric {
            Metric::Ca => format!("{:.2}€", self.average),
            _ => format!("{:.1}", self.average),
        };
        format!(
            "{}: {} ({} vs moyenne {})",
            self.metric,
            self.format_value(),
            self.format_deviation(),
            average
        )
    }
}

/// Check a candidate entry against the seller's history
///
/// # Algorithm
/// - Average each tracked metric over the 30 most recent history records
/// - Skip metrics whose average is not positive
/// - Flag when `value > avg * 1.5`, or `value < avg * 0.5` with `value > 0`
///
/// A value of exactly 0 is never flagged as low: it reads as "not entered
/// yet", not as an unusually bad day.
///
/// # Requirements
/// - At least 5 history records, otherwise returns an empty vec
///
/// # Returns
/// Warnings in metric declaration order
pub fn check_anomalies(
    candidate: &KpiCandidate,
    history: &[KpiRecord],
    tracked: TrackedMetricSet,
) -> Vec<AnomalyWarning> {
    check_anomalies_with(candidate, history, tracked, AnomalyThreshold::DEFAULT)
}

/// [`check_anomalies`] with an explicit band
pub fn check_anomalies_with(
    candidate: &KpiCandidate,
    history: &[KpiRecord],
    tracked: TrackedMetricSet,
    threshold: AnomalyThreshold,
) -> Vec<AnomalyWarning> {
    if history.len() < MIN_HISTORY {
        tracing::debug!(
            history = history.len(),
            "Not enough history for anomaly check"
        );
        return vec![];
    }

    let mut recent: Vec<&KpiRecord> = history.iter().collect();
    recent.sort_by(|a, b| b.date.cmp(&a.date));
    recent.truncate(HISTORY_WINDOW);

    let mut warnings = Vec::new();

    for metric in tracked.iter() {
        let Some(value) = candidate.value(metric) else {
            continue;
        };

        let average =
            recent.iter().map(|r| r.value(metric)).sum::<f64>() / recent.len() as f64;
        if average <= 0.0 {
            continue;
        }

        let too_high = value > average * threshold.high;
        let too_low = value < average * threshold.low && value > 0.0;

        if too_high || too_low {
            warnings.push(AnomalyWarning {
                metric,
                value,
                average,
                percentage_delta: ((value / average - 1.0) * 100.0).round() as i64,
            });
        }
    }

    if !warnings.is_empty() {
        tracing::info!(count = warnings.len(), "KPI entry outside usual range");
    }

    warnings
}
