//! CLI helpers for KPI reports
//!
//! Input loading, argument parsing and table/JSON formatting shared by the
//! subcommands in `main.rs`.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};
use kpiboard_core::analytics::{
    AnomalyDirection, AnomalyWarning, Bucket, DashboardData, SellerSummary,
};
use kpiboard_core::models::{KpiCandidate, KpiRecord, Metric, TrackedMetricSet};
use kpiboard_core::preferences::DashboardPreferences;
use std::collections::BTreeMap;
use std::path::Path;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug)]
pub enum CliError {
    NoRecords {
        path: String,
    },
    UnknownMetric {
        input: String,
    },
    Other(anyhow::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::NoRecords { path } => {
                write!(f, "No KPI records in '{}'", path)
            }
            CliError::UnknownMetric { input } => {
                write!(
                    f,
                    "Unknown metric list '{}' (expected: ca,ventes,clients,articles)",
                    input
                )
            }
            CliError::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(e: anyhow::Error) -> Self {
        CliError::Other(e)
    }
}

// ============================================================================
// Input
// ============================================================================

/// Accepted input shapes: a flat array, or records grouped by seller id
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum RecordsFile {
    Flat(Vec<KpiRecord>),
    BySeller(BTreeMap<String, Vec<KpiRecord>>),
}

/// Parse KPI records from JSON text
///
/// In the grouped form, records without a seller id inherit their group key.
pub fn parse_records(content: &str) -> Result<Vec<KpiRecord>> {
    let file: RecordsFile = serde_json::from_str(content)
        .context("Invalid KPI records (expected an array or an object of arrays)")?;

    Ok(match file {
        RecordsFile::Flat(records) => records,
        RecordsFile::BySeller(groups) => groups
            .into_iter()
            .flat_map(|(seller, records)| {
                records.into_iter().map(move |mut record| {
                    if record.seller_id.is_none() {
                        record.seller_id = Some(seller.clone());
                    }
                    record
                })
            })
            .collect(),
    })
}

/// Load KPI records from a JSON file
pub fn load_records(path: &Path) -> Result<Vec<KpiRecord>, CliError> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read KPI records from {}", path.display()))?;
    let records = parse_records(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    if records.is_empty() {
        return Err(CliError::NoRecords {
            path: path.display().to_string(),
        });
    }

    tracing::info!(count = records.len(), path = %path.display(), "Loaded KPI records");
    Ok(records)
}

/// Parse a `--track` list; `None` means every metric
pub fn parse_tracked(input: Option<&str>) -> Result<TrackedMetricSet, CliError> {
    match input {
        None => Ok(TrackedMetricSet::all()),
        Some(list) => TrackedMetricSet::parse_list(list).ok_or_else(|| CliError::UnknownMetric {
            input: list.to_string(),
        }),
    }
}

/// Parse a `YYYY-MM-DD` argument
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}' (expected: YYYY-MM-DD)", input))
}

/// Build a candidate entry from the numeric flags
pub fn candidate_from_args(
    date: Option<NaiveDate>,
    ca: Option<f64>,
    ventes: Option<u64>,
    clients: Option<u64>,
    articles: Option<u64>,
) -> KpiCandidate {
    KpiCandidate {
        date,
        ca,
        ventes,
        clients,
        articles,
    }
}

// ============================================================================
// Formatting
// ============================================================================

fn header(labels: &[&str], no_color: bool) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| {
            let cell = Cell::new(label);
            if no_color {
                cell
            } else {
                cell.fg(Color::Cyan)
            }
        })
        .collect()
}

fn new_table() -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Format a dashboard report (human or JSON)
///
/// Only tracked metrics get a column; derived KPIs are always shown.
pub fn format_report(
    dashboard: &DashboardData,
    tracked: TrackedMetricSet,
    json: bool,
    no_color: bool,
) -> String {
    if json {
        return serde_json::to_string_pretty(dashboard).unwrap_or_else(|_| "{}".to_string());
    }

    if dashboard.is_empty() {
        return format!(
            "No KPI entries between {} and {}.",
            dashboard.period.start, dashboard.period.end
        );
    }

    let mut labels = vec!["Période"];
    labels.extend(tracked.iter().map(|m| m.label()));
    labels.extend(["Panier moyen", "Taux transfo", "IV"]);

    let mut table = new_table();
    table.set_header(header(&labels, no_color));

    for bucket in &dashboard.buckets {
        table.add_row(bucket_row(bucket, tracked));
    }

    let mut total = vec![Cell::new("Total")];
    total.extend(
        tracked
            .iter()
            .map(|m| Cell::new(format_metric(m, dashboard.totals.value(m)))),
    );
    total.extend([
        Cell::new(format_eur(dashboard.metrics.panier_moyen)),
        Cell::new(format_percent(dashboard.metrics.taux_transformation)),
        Cell::new(format!("{:.2}", dashboard.metrics.indice_vente)),
    ]);
    table.add_row(Row::from(total));

    format!(
        "{} → {} ({})\n{}",
        dashboard.period.start.format("%d/%m/%Y"),
        dashboard.period.end.format("%d/%m/%Y"),
        dashboard.period.granularity,
        table
    )
}

fn bucket_row(bucket: &Bucket, tracked: TrackedMetricSet) -> Row {
    let metrics = bucket.metrics();
    let mut cells = vec![bucket.label()];
    cells.extend(tracked.iter().map(|m| format_metric(m, bucket.total.value(m))));
    cells.extend([
        format_eur(metrics.panier_moyen),
        format_percent(metrics.taux_transformation),
        format!("{:.2}", metrics.indice_vente),
    ]);
    Row::from(cells)
}

/// Format the per-seller summary (human or JSON)
pub fn format_team(team: &[SellerSummary], json: bool, no_color: bool) -> String {
    if json {
        return serde_json::to_string_pretty(team).unwrap_or_else(|_| "[]".to_string());
    }

    if team.is_empty() {
        return "No sellers found.".to_string();
    }

    let mut table = new_table();
    table.set_header(header(
        &[
            "Vendeur",
            "Jours",
            "CA",
            "Ventes",
            "Clients",
            "Articles",
            "Panier moyen",
            "Taux transfo",
            "IV",
        ],
        no_color,
    ));

    for summary in team {
        table.add_row(Row::from(vec![
            summary.seller_id.clone(),
            summary.sums.days.to_string(),
            format_eur(summary.sums.ca),
            summary.sums.ventes.to_string(),
            summary.sums.clients.to_string(),
            summary.sums.articles.to_string(),
            format_eur(summary.metrics.panier_moyen),
            format_percent(summary.metrics.taux_transformation),
            format!("{:.2}", summary.metrics.indice_vente),
        ]));
    }

    table.to_string()
}

/// Format raw records, newest first (human or JSON)
pub fn format_records(records: &[KpiRecord], json: bool, no_color: bool) -> String {
    if json {
        return serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string());
    }

    if records.is_empty() {
        return "No KPI entries.".to_string();
    }

    let mut table = new_table();
    table.set_header(header(&["Date", "CA", "Ventes", "Clients", "Articles"], no_color));

    let mut sorted: Vec<&KpiRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));
    for record in sorted {
        table.add_row(Row::from(vec![
            record.date.format("%d/%m/%Y").to_string(),
            format_eur(record.ca),
            record.ventes.to_string(),
            record.clients.to_string(),
            record.articles.to_string(),
        ]));
    }

    table.to_string()
}

/// Format anomaly warnings (human or JSON)
///
/// The deviation column is highlighted unless colors are disabled.
pub fn format_warnings(warnings: &[AnomalyWarning], json: bool, no_color: bool) -> String {
    if json {
        return serde_json::to_string_pretty(warnings).unwrap_or_else(|_| "[]".to_string());
    }

    if warnings.is_empty() {
        return "No unusual values.".to_string();
    }

    let mut table = new_table();
    table.set_header(header(&["Métrique", "Saisie", "Écart", "Moyenne"], no_color));

    for warning in warnings {
        let marker = match warning.direction() {
            AnomalyDirection::Above => "▲",
            AnomalyDirection::Below => "▼",
        };
        let deviation = Cell::new(format!("{} {}", marker, warning.format_deviation()));
        let deviation = if no_color {
            deviation
        } else {
            deviation.fg(Color::Yellow)
        };

        table.add_row(Row::from(vec![
            Cell::new(warning.metric.label()),
            Cell::new(warning.format_value()),
            deviation,
            Cell::new(format_average(warning)),
        ]));
    }

    table.to_string()
}

fn format_average(warning: &AnomalyWarning) -> String {
    match warning.metric {
        Metric::Ca => format_eur(warning.average),
        _ => format!("{:.1}", warning.average),
    }
}

/// Format stored preferences (human or JSON)
pub fn format_preferences(prefs: &DashboardPreferences, json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(prefs).unwrap_or_else(|_| "{}".to_string());
    }

    let sections = prefs
        .section_order
        .iter()
        .map(|s| format!("{:?}", s).to_lowercase())
        .collect::<Vec<_>>()
        .join(" > ");
    let tracked = prefs
        .tracked
        .iter()
        .map(|m| m.key())
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "Period:   {} ({})\nSections: {}\nSeller:   {}\nTracked:  {}",
        prefs.period.token(),
        prefs.period.display(),
        sections,
        prefs.seller_filter.as_deref().unwrap_or("-"),
        tracked
    )
}

fn format_metric(metric: Metric, value: f64) -> String {
    match metric {
        Metric::Ca => format_eur(value),
        _ => format!("{}", value as u64),
    }
}

/// Format euros: 1234.5 → "1 234.50 €"
pub fn format_eur(value: f64) -> String {
    let raw = format!("{:.2}", value.abs());
    let (int_part, dec_part) = raw.split_once('.').unwrap_or((raw.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{} €", sign, grouped, dec_part)
}

/// Format a percentage with one decimal
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kpiboard_core::analytics::{check_anomalies, summarize_team, PeriodSelection};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_records_flat() {
        let json = r#"[
            {"date": "2024-03-04", "ca": 1200.5, "nb_ventes": 12, "nb_clients": 40, "nb_articles": 18},
            {"date": "2024-03-05", "ca": 800, "ventes": 8, "clients": 30, "articles": 10, "seller_id": "alice"}
        ]"#;
        let records = parse_records(json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].ventes, 12);
        assert_eq!(records[0].seller_id, None);
        assert_eq!(records[1].seller_id.as_deref(), Some("alice"));
    }

    #[test]
    fn test_parse_records_grouped_by_seller() {
        let json = r#"{
            "alice": [{"date": "2024-03-04", "ca": 100, "ventes": 1, "clients": 2, "articles": 1}],
            "bob": [{"date": "2024-03-04", "ca": 200, "ventes": 2, "clients": 3, "articles": 2}]
        }"#;
        let records = parse_records(json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].seller_id.as_deref(), Some("alice"));
        assert_eq!(records[1].seller_id.as_deref(), Some("bob"));
    }

    #[test]
    fn test_parse_records_invalid() {
        assert!(parse_records("{\"not\": 1}").is_err());
        assert!(parse_records("nope").is_err());
    }

    #[test]
    fn test_load_records_empty_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[]").unwrap();
        let err = load_records(file.path()).unwrap_err();
        assert!(matches!(err, CliError::NoRecords { .. }));
    }

    #[test]
    fn test_load_records_missing_file() {
        let err = load_records(Path::new("/nonexistent/kpi.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read KPI records"));
    }

    #[test]
    fn test_parse_tracked() {
        assert_eq!(parse_tracked(None).unwrap(), TrackedMetricSet::all());
        let tracked = parse_tracked(Some("ca,ventes")).unwrap();
        assert!(tracked.contains(Metric::Ca));
        assert!(!tracked.contains(Metric::Clients));
        assert!(matches!(
            parse_tracked(Some("ca,margin")),
            Err(CliError::UnknownMetric { .. })
        ));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-03-04").unwrap(), d(2024, 3, 4));
        assert!(parse_date("04/03/2024").is_err());
    }

    #[test]
    fn test_format_eur() {
        assert_eq!(format_eur(0.0), "0.00 €");
        assert_eq!(format_eur(999.999), "1 000.00 €");
        assert_eq!(format_eur(1234.5), "1 234.50 €");
        assert_eq!(format_eur(1234567.0), "1 234 567.00 €");
        assert_eq!(format_eur(-42.1), "-42.10 €");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(33.333), "33.3%");
    }

    #[test]
    fn test_format_report_json_and_table() {
        let records = vec![
            KpiRecord::new(d(2024, 3, 4), 100.0, 10, 30, 12),
            KpiRecord::new(d(2024, 3, 5), 0.0, 0, 0, 0),
        ];
        let dashboard =
            DashboardData::compute(&records, PeriodSelection::Last7Days, d(2024, 3, 6)).unwrap();

        let json = format_report(&dashboard, TrackedMetricSet::all(), true, true);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("buckets").is_some());

        let table = format_report(&dashboard, TrackedMetricSet::all(), false, true);
        assert!(table.contains("Total"));
        assert!(table.contains("10.00 €"));
        assert!(table.contains("33.3%"));
    }

    #[test]
    fn test_format_report_empty() {
        let records = vec![KpiRecord::new(d(2023, 1, 1), 100.0, 10, 30, 12)];
        let dashboard =
            DashboardData::compute(&records, PeriodSelection::Last7Days, d(2024, 3, 6)).unwrap();
        let out = format_report(&dashboard, TrackedMetricSet::all(), false, true);
        assert!(out.starts_with("No KPI entries"));
    }

    #[test]
    fn test_format_team() {
        let records = vec![
            KpiRecord::new(d(2024, 3, 4), 100.0, 10, 30, 12).with_seller("alice"),
            KpiRecord::new(d(2024, 3, 4), 300.0, 10, 20, 12).with_seller("bob"),
        ];
        let team = summarize_team(&records);
        let out = format_team(&team, false, true);
        let bob = out.find("bob").unwrap();
        let alice = out.find("alice").unwrap();
        assert!(bob < alice, "sorted by revenue");
        assert_eq!(format_team(&[], false, true), "No sellers found.");
    }

    #[test]
    fn test_format_warnings() {
        let history: Vec<_> = (1..=10)
            .map(|i| KpiRecord::new(d(2024, 1, i), 1000.0, 10, 30, 15))
            .collect();
        let candidate = KpiCandidate {
            ca: Some(2500.0),
            ..Default::default()
        };
        let warnings =
            check_anomalies(&candidate, &history, TrackedMetricSet::empty().with(Metric::Ca));

        let out = format_warnings(&warnings, false, true);
        assert!(out.contains("CA"));
        assert!(out.contains("2500.00€"));
        assert!(out.contains("▲ +150%"));
        assert!(out.contains("1 000.00 €"));
        assert!(!out.contains('\u{1b}'), "no escape codes with colors off");

        let low = KpiCandidate {
            ca: Some(100.0),
            ..Default::default()
        };
        let warnings = check_anomalies(&low, &history, TrackedMetricSet::empty().with(Metric::Ca));
        assert!(format_warnings(&warnings, false, false).contains("▼ -90%"));
        assert_eq!(format_warnings(&[], false, true), "No unusual values.");
    }

    #[test]
    fn test_format_records_newest_first() {
        let records = vec![
            KpiRecord::new(d(2024, 3, 4), 100.0, 1, 1, 1),
            KpiRecord::new(d(2024, 3, 6), 100.0, 1, 1, 1),
        ];
        let out = format_records(&records, false, true);
        assert!(out.find("06/03/2024").unwrap() < out.find("04/03/2024").unwrap());
    }

    #[test]
    fn test_format_preferences() {
        let out = format_preferences(&DashboardPreferences::default(), false);
        assert!(out.contains("30d"));
        assert!(out.contains("kpis > evolution"));
        assert!(out.contains("ca,ventes,clients,articles"));
    }
}
