//! Period selection
//!
//! Maps the dashboard's period control (7d / 30d / 90d / all / custom range)
//! to a concrete date range and a chart granularity.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::models::KpiRecord;

/// Chart aggregation granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Daily,
    Weekly,
    #[serde(rename = "biweekly")]
    BiWeekly,
    Monthly,
}

impl Granularity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::BiWeekly => "biweekly",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Granularity for a range spanning `days` days
///
/// `> 90` monthly, `> 30` bi-weekly, `> 14` weekly, otherwise daily.
pub fn granularity_for_days(days: i64) -> Granularity {
    if days > 90 {
        Granularity::Monthly
    } else if days > 30 {
        Granularity::BiWeekly
    } else if days > 14 {
        Granularity::Weekly
    } else {
        Granularity::Daily
    }
}

/// Period chosen in the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PeriodSelection {
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "90d")]
    Last90Days,
    All,
    Custom { start: NaiveDate, end: NaiveDate },
}

impl PeriodSelection {
    /// Display label
    pub fn display(&self) -> String {
        match self {
            Self::Last7Days => "7 derniers jours".to_string(),
            Self::Last30Days => "30 derniers jours".to_string(),
            Self::Last90Days => "3 derniers mois".to_string(),
            Self::All => "12 derniers mois".to_string(),
            Self::Custom { start, end } => {
                format!("Du {} au {}", start.format("%d/%m/%Y"), end.format("%d/%m/%Y"))
            }
        }
    }

    /// Token form, inverse of `FromStr`
    pub fn token(&self) -> String {
        match self {
            Self::Last7Days => "7d".to_string(),
            Self::Last30Days => "30d".to_string(),
            Self::Last90Days => "90d".to_string(),
            Self::All => "all".to_string(),
            Self::Custom { start, end } => format!("{}..{}", start, end),
        }
    }
}

impl Default for PeriodSelection {
    fn default() -> Self {
        Self::Last30Days
    }
}

impl FromStr for PeriodSelection {
    type Err = CoreError;

    /// Parse "7d", "30d", "90d", "all" or "YYYY-MM-DD..YYYY-MM-DD"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidPeriod {
            input: s.to_string(),
        };

        match s.trim() {
            "7d" => Ok(Self::Last7Days),
            "30d" => Ok(Self::Last30Days),
            "90d" => Ok(Self::Last90Days),
            "all" => Ok(Self::All),
            other => {
                let (start, end) = other.split_once("..").ok_or_else(invalid)?;
                let start =
                    NaiveDate::parse_from_str(start.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
                let end =
                    NaiveDate::parse_from_str(end.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
                Ok(Self::Custom { start, end })
            }
        }
    }
}

/// A selection resolved against a given "today"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub granularity: Granularity,
}

impl ResolvedPeriod {
    /// Inclusive on both ends
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Records falling inside the range
    pub fn filter<'a>(&self, records: &'a [KpiRecord]) -> Vec<&'a KpiRecord> {
        records.iter().filter(|r| self.contains(r.date)).collect()
    }
}

/// Resolve a period selection to a date range and granularity
///
/// The fixed 30d and 90d selections force weekly and bi-weekly buckets
/// respectively, which differs from what the day-count thresholds would
/// give for a custom range of the same length.
pub fn resolve_period(
    selection: PeriodSelection,
    today: NaiveDate,
) -> Result<ResolvedPeriod, CoreError> {
    let last = |days: i64, granularity| ResolvedPeriod {
        start: today - Duration::days(days),
        end: today,
        granularity,
    };

    let resolved = match selection {
        PeriodSelection::Last7Days => last(7, Granularity::Daily),
        PeriodSelection::Last30Days => last(30, Granularity::Weekly),
        PeriodSelection::Last90Days => last(90, Granularity::BiWeekly),
        PeriodSelection::All => last(365, Granularity::Monthly),
        PeriodSelection::Custom { start, end } => {
            if start > end {
                return Err(CoreError::InvalidRange { start, end });
            }
            ResolvedPeriod {
                start,
                end,
                granularity: granularity_for_days((end - start).num_days()),
            }
        }
    };

    tracing::debug!(
        period = %selection.token(),
        start = %resolved.start,
        end = %resolved.end,
        granularity = %resolved.granularity,
        "Resolved period"
    );

    Ok(resolved)
}
