//! Export of aggregated KPI series and team summaries
//!
//! CSV for spreadsheets, JSON for anything else. Numbers are written with
//! a `.` decimal separator.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::analytics::{Bucket, DashboardData, SellerSummary};

fn create_writer(path: &Path) -> Result<BufWriter<File>> {
    // Create parent directory if needed
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Export a bucket series to CSV
///
/// CSV columns: Period, Start, CA, Ventes, Clients, Articles, Panier moyen,
/// Taux transformation (%), Indice vente, Days
///
/// # Errors
/// Returns error if file creation or write operations fail
///
/// # Examples
///
/// ```no_run
/// use kpiboard_core::analytics::{aggregate, Granularity};
/// use kpiboard_core::export::export_buckets_to_csv;
/// use kpiboard_core::models::KpiRecord;
/// use std::path::Path;
///
/// let records: Vec<KpiRecord> = Vec::new(); // Fetched from the backend
/// let buckets = aggregate(&records, Granularity::Weekly);
/// export_buckets_to_csv(&buckets, Path::new("kpi-weekly.csv")).unwrap();
/// ```
pub fn export_buckets_to_csv(buckets: &[Bucket], path: &Path) -> Result<()> {
    let mut writer = create_writer(path)?;

    writeln!(
        writer,
        "Period,Start,CA,Ventes,Clients,Articles,Panier moyen,Taux transformation (%),Indice vente,Days"
    )
    .context("Failed to write CSV header")?;

    for bucket in buckets {
        let m = bucket.metrics();
        writeln!(
            writer,
            "\"{}\",{},{:.2},{},{},{},{:.2},{:.1},{:.2},{}",
            bucket.label(),
            bucket.start.format("%Y-%m-%d"),
            bucket.total.ca,
            bucket.total.ventes,
            bucket.total.clients,
            bucket.total.articles,
            m.panier_moyen,
            m.taux_transformation,
            m.indice_vente,
            bucket.total.days
        )
        .with_context(|| format!("Failed to write row for bucket {}", bucket.label()))?;
    }

    writer.flush().context("Failed to flush CSV writer")?;

    Ok(())
}

/// Export per-seller totals to CSV
///
/// CSV columns: Seller, CA, Ventes, Clients, Articles, Panier moyen,
/// Taux transformation (%), Indice vente, Days
pub fn export_team_to_csv(team: &[SellerSummary], path: &Path) -> Result<()> {
    let mut writer = create_writer(path)?;

    writeln!(
        writer,
        "Seller,CA,Ventes,Clients,Articles,Panier moyen,Taux transformation (%),Indice vente,Days"
    )
    .context("Failed to write CSV header")?;

    for seller in team {
        writeln!(
            writer,
            "\"{}\",{:.2},{},{},{},{:.2},{:.1},{:.2},{}",
            seller.seller_id.replace('"', "\"\""),
            seller.sums.ca,
            seller.sums.ventes,
            seller.sums.clients,
            seller.sums.articles,
            seller.metrics.panier_moyen,
            seller.metrics.taux_transformation,
            seller.metrics.indice_vente,
            seller.sums.days
        )
        .with_context(|| format!("Failed to write row for seller {}", seller.seller_id))?;
    }

    writer.flush().context("Failed to flush CSV writer")?;

    Ok(())
}

/// Export a full dashboard computation to pretty JSON
pub fn export_dashboard_to_json(dashboard: &DashboardData, path: &Path) -> Result<()> {
    let mut writer = create_writer(path)?;
    serde_json::to_writer_pretty(&mut writer, dashboard)
        .with_context(|| format!("Failed to write JSON to {}", path.display()))?;
    writer.flush().context("Failed to flush JSON writer")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{aggregate, summarize_team, Granularity, PeriodSelection};
    use crate::models::KpiRecord;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn records() -> Vec<KpiRecord> {
        vec![
            KpiRecord::new(d(4), 1000.0, 10, 40, 25).with_seller("alice"),
            KpiRecord::new(d(5), 500.0, 4, 20, 6).with_seller("bob"),
            KpiRecord::new(d(12), 0.0, 0, 8, 0).with_seller("alice"),
        ]
    }

    #[test]
    fn test_export_buckets_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("weekly.csv");

        export_buckets_to_csv(&aggregate(&records(), Granularity::Weekly), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3, "header + 2 weeks");
        assert!(lines[0].starts_with("Period,Start,CA"));
        assert_eq!(
            lines[1],
            "\"Sem. 03/03\",2024-03-03,1500.00,14,60,31,107.14,23.3,2.21,2"
        );
        assert_eq!(
            lines[2],
            "\"Sem. 10/03\",2024-03-10,0.00,0,8,0,0.00,0.0,0.00,1"
        );
    }

    #[test]
    fn test_export_team_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("team.csv");

        export_team_to_csv(&summarize_team(&records()), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("\"alice\",1000.00,10,48,25,100.00"));
        assert!(lines[2].starts_with("\"bob\",500.00,4,20,6,125.00,20.0,1.50"));
    }

    #[test]
    fn test_export_dashboard_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("dashboard.json");
        let dashboard =
            DashboardData::compute(&records(), PeriodSelection::Last30Days, d(20)).unwrap();

        export_dashboard_to_json(&dashboard, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["period"]["granularity"], "weekly");
        assert_eq!(value["buckets"].as_array().unwrap().len(), 2);
        assert_eq!(value["totals"]["ventes"], 14);
    }
}
