//! Error types for kpiboard-core
//!
//! One error hierarchy (thiserror) shared by the period selector, the
//! submission gate, the backend port and the local file adapters.

use crate::models::Metric;
use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for kpiboard operations
#[derive(Error, Debug)]
pub enum CoreError {
    // ===================
    // Period Errors
    // ===================
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Invalid period '{input}' (expected 7d, 30d, 90d, all or YYYY-MM-DD..YYYY-MM-DD)")]
    InvalidPeriod { input: String },

    // ===================
    // Submission Errors
    // ===================
    #[error("Missing required fields: {}", join_metrics(.fields))]
    MissingFields { fields: Vec<Metric> },

    #[error("Invalid value for {metric}: {value} (expected a non-negative number)")]
    InvalidValue { metric: Metric, value: f64 },

    #[error("Cannot {action} while submission is {from}")]
    InvalidTransition { from: &'static str, action: &'static str },

    // ===================
    // Backend Errors
    // ===================
    /// Backend answered with an error; `detail` is passed through verbatim
    #[error("{detail}")]
    Backend { status: Option<u16>, detail: String },

    #[error("Network error: {message}")]
    Transport { message: String },

    // ===================
    // IO / Parse Errors
    // ===================
    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON in {path}: {message}")]
    JsonParse {
        path: PathBuf,
        message: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Preferences store error: {message}")]
    Preferences { message: String },
}

impl CoreError {
    /// Detail string suitable for display next to a failed save
    pub fn display_detail(&self) -> String {
        match self {
            CoreError::Backend { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

fn join_metrics(fields: &[Metric]) -> String {
    fields
        .iter()
        .map(|m| m.label())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => CoreError::Backend {
                status: Some(status.as_u16()),
                detail: e.to_string(),
            },
            None => CoreError::Transport {
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_lists_metric_names() {
        let err = CoreError::MissingFields {
            fields: vec![Metric::Ca, Metric::Articles],
        };
        assert_eq!(err.to_string(), "Missing required fields: CA, Articles");
    }

    #[test]
    fn test_invalid_value_names_metric() {
        let err = CoreError::InvalidValue {
            metric: Metric::Ca,
            value: -5.0,
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for CA: -5 (expected a non-negative number)"
        );
    }

    #[test]
    fn test_backend_detail_is_verbatim() {
        let err = CoreError::Backend {
            status: Some(422),
            detail: "Date déjà saisie".to_string(),
        };
        assert_eq!(err.to_string(), "Date déjà saisie");
        assert_eq!(err.display_detail(), "Date déjà saisie");
    }

    #[test]
    fn test_invalid_range_message() {
        let err = CoreError::InvalidRange {
            start: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        assert!(err.to_string().contains("2024-02-01"));
    }
}
