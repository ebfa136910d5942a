//! kpiboard - Retail sales KPI dashboard for the terminal

mod cli;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use kpiboard_core::analytics::{check_anomalies, DashboardData, PeriodSelection};
use kpiboard_core::backend::DEFAULT_API_URL;
use kpiboard_core::models::KpiRecord;
use kpiboard_core::preferences::DashboardSection;
use kpiboard_core::{
    export_buckets_to_csv, export_dashboard_to_json, export_team_to_csv, BackendConfig,
    DashboardPreferences, HttpBackend, JsonFileStore, KpiBackend, KpiStore, KpiSubmission,
    SubmissionState,
};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Days of history fetched before a KPI entry is checked
const SUBMIT_HISTORY_DAYS: u32 = 60;

#[derive(Parser)]
#[command(
    name = "kpiboard",
    version,
    about = "Retail sales KPI dashboard",
    long_about = "Period reports, team summaries and daily KPI entry for retail sellers.\n\
                  \n\
                  Aggregates daily KPI entries (CA, ventes, clients, articles) into daily,\n\
                  weekly, bi-weekly or monthly buckets and recomputes basket value,\n\
                  conversion rate and items per sale from the sums.\n\
                  \n\
                  Examples:\n\
                    kpiboard report --input kpi.json                 # Period from preferences\n\
                    kpiboard report --input kpi.json --period 90d    # Bi-weekly buckets\n\
                    kpiboard team --input team.json --period all     # Per-seller totals\n\
                    kpiboard check --input kpi.json --ca 9000        # Anomaly check only\n\
                    kpiboard submit --seller s-1 --ca 850 --ventes 9 # Save today's entry\n\
                    kpiboard fetch --seller s-1 --days 30            # Show stored entries\n\
                  \n\
                  Environment Variables:\n\
                    KPIBOARD_API_URL                 # Backend base URL\n\
                    KPIBOARD_API_TOKEN               # Bearer token\n\
                    KPIBOARD_CACHE_DIR               # Preferences directory\n\
                    KPIBOARD_NON_INTERACTIVE         # Disable interactive prompts (CI/CD)\n\
                    KPIBOARD_NO_COLOR                # Disable ANSI colors (log-friendly)\n\
                    RUST_LOG                         # Log filter (default: warn)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Backend base URL
    #[arg(long, env = "KPIBOARD_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Backend bearer token
    #[arg(long, env = "KPIBOARD_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Directory for stored preferences (default: platform cache dir)
    #[arg(long, env = "KPIBOARD_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Disable interactive prompts (CI/CD mode)
    #[arg(long, env = "KPIBOARD_NON_INTERACTIVE")]
    non_interactive: bool,

    /// Disable ANSI colors (log-friendly)
    #[arg(long, env = "KPIBOARD_NO_COLOR")]
    no_color: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Aggregate KPI entries over a period
    Report {
        /// JSON file with KPI entries
        #[arg(long, short = 'i')]
        input: PathBuf,
        /// Period: 7d, 30d, 90d, all or YYYY-MM-DD..YYYY-MM-DD
        #[arg(long, short = 'p')]
        period: Option<PeriodSelection>,
        /// Reference day (default: today)
        #[arg(long)]
        today: Option<String>,
        /// Only this seller's entries
        #[arg(long, short = 's')]
        seller: Option<String>,
        /// Metric columns, e.g. "ca,ventes"
        #[arg(long)]
        track: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Also write the buckets as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Also write the whole dashboard as JSON
        #[arg(long)]
        export_json: Option<PathBuf>,
    },
    /// Per-seller totals over a period (manager view)
    Team {
        /// JSON file with KPI entries
        #[arg(long, short = 'i')]
        input: PathBuf,
        /// Period: 7d, 30d, 90d, all or YYYY-MM-DD..YYYY-MM-DD
        #[arg(long, short = 'p')]
        period: Option<PeriodSelection>,
        /// Reference day (default: today)
        #[arg(long)]
        today: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Also write the summary as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Check a KPI entry against past entries without saving it
    Check {
        /// JSON file with past KPI entries
        #[arg(long, short = 'i')]
        input: PathBuf,
        /// Only compare with this seller's entries
        #[arg(long, short = 's')]
        seller: Option<String>,
        #[arg(long)]
        ca: Option<f64>,
        #[arg(long)]
        ventes: Option<u64>,
        #[arg(long)]
        clients: Option<u64>,
        #[arg(long)]
        articles: Option<u64>,
        /// Metrics to check, e.g. "ca,ventes" (default: all)
        #[arg(long)]
        track: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate and save a daily KPI entry to the backend
    Submit {
        /// Seller ID
        #[arg(long, short = 's')]
        seller: String,
        /// Entry day (default: today)
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        ca: Option<f64>,
        #[arg(long)]
        ventes: Option<u64>,
        #[arg(long)]
        clients: Option<u64>,
        #[arg(long)]
        articles: Option<u64>,
        /// Save unusual values without asking
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Show a seller's entries stored in the backend
    Fetch {
        /// Seller ID
        #[arg(long, short = 's')]
        seller: String,
        /// Days of history
        #[arg(long, short = 'd', default_value = "30")]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change stored dashboard preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },
}

#[derive(Subcommand)]
enum PrefsAction {
    /// Print current preferences
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Default period for reports
    SetPeriod {
        /// 7d, 30d, 90d, all or YYYY-MM-DD..YYYY-MM-DD
        period: PeriodSelection,
    },
    /// Move a dashboard section (kpis, evolution, objectives, challenges, debriefs, team)
    Move {
        section: String,
        /// Target position, 0-based
        index: usize,
    },
    /// Restrict reports to one seller, or clear with no argument
    Seller { seller: Option<String> },
    /// Metrics shown in reports, e.g. "ca,ventes"
    Track { metrics: String },
    /// Drop stored preferences
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(!cli.no_color)
        .init();

    let cache_dir = cli
        .cache_dir
        .clone()
        .or_else(|| dirs::cache_dir().map(|d: PathBuf| d.join("kpiboard")))
        .context("Could not determine cache directory")?;

    let backend_config = BackendConfig::new(cli.api_url.as_str()).with_token(cli.api_token.clone());

    // Extract flags for command handlers
    let no_color = cli.no_color;
    let non_interactive = cli.non_interactive;

    match cli.command {
        Command::Report {
            input,
            period,
            today,
            seller,
            track,
            json,
            csv,
            export_json,
        } => {
            run_report(
                &cache_dir,
                &input,
                period,
                today.as_deref(),
                seller,
                track.as_deref(),
                json,
                csv.as_deref(),
                export_json.as_deref(),
                no_color,
            )?;
        }
        Command::Team {
            input,
            period,
            today,
            json,
            csv,
        } => {
            run_team(
                &cache_dir,
                &input,
                period,
                today.as_deref(),
                json,
                csv.as_deref(),
                no_color,
            )?;
        }
        Command::Check {
            input,
            seller,
            ca,
            ventes,
            clients,
            articles,
            track,
            json,
        } => {
            let candidate = cli::candidate_from_args(None, ca, ventes, clients, articles);
            run_check(&input, seller, candidate, track.as_deref(), json, no_color)?;
        }
        Command::Submit {
            seller,
            date,
            ca,
            ventes,
            clients,
            articles,
            yes,
        } => {
            let date = date.as_deref().map(cli::parse_date).transpose()?;
            let candidate = cli::candidate_from_args(date, ca, ventes, clients, articles);
            let backend = HttpBackend::new(backend_config)?;
            run_submit(&backend, &seller, candidate, yes, non_interactive, no_color).await?;
        }
        Command::Fetch { seller, days, json } => {
            let backend = HttpBackend::new(backend_config)?;
            run_fetch(&backend, &seller, days, json, no_color).await?;
        }
        Command::Prefs { action } => {
            run_prefs(&cache_dir, action)?;
        }
    }

    Ok(())
}

fn resolve_today(today: Option<&str>) -> Result<NaiveDate> {
    match today {
        Some(s) => cli::parse_date(s),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_report(
    cache_dir: &Path,
    input: &Path,
    period: Option<PeriodSelection>,
    today: Option<&str>,
    seller: Option<String>,
    track: Option<&str>,
    json: bool,
    csv: Option<&Path>,
    export_json: Option<&Path>,
    no_color: bool,
) -> Result<()> {
    let prefs = DashboardPreferences::load(&JsonFileStore::new(cache_dir));
    let today = resolve_today(today)?;
    let selection = period.unwrap_or(prefs.period);
    let tracked = match track {
        Some(_) => cli::parse_tracked(track)?,
        None => prefs.tracked,
    };

    let mut records = cli::load_records(input)?;
    if let Some(seller) = seller.or(prefs.seller_filter) {
        records.retain(|r| r.entity() == seller);
        tracing::debug!(seller = %seller, kept = records.len(), "Filtered by seller");
    }

    let dashboard = DashboardData::compute(&records, selection, today)?;

    if let Some(path) = csv {
        export_buckets_to_csv(&dashboard.buckets, path)?;
        eprintln!("Buckets written to {}", path.display());
    }
    if let Some(path) = export_json {
        export_dashboard_to_json(&dashboard, path)?;
        eprintln!("Dashboard written to {}", path.display());
    }

    if !json {
        println!("{}", selection.display());
    }
    println!("{}", cli::format_report(&dashboard, tracked, json, no_color));
    Ok(())
}

fn run_team(
    cache_dir: &Path,
    input: &Path,
    period: Option<PeriodSelection>,
    today: Option<&str>,
    json: bool,
    csv: Option<&Path>,
    no_color: bool,
) -> Result<()> {
    let prefs = DashboardPreferences::load(&JsonFileStore::new(cache_dir));
    let today = resolve_today(today)?;
    let selection = period.unwrap_or(prefs.period);

    let records = cli::load_records(input)?;
    let dashboard = DashboardData::compute(&records, selection, today)?;

    if let Some(path) = csv {
        export_team_to_csv(&dashboard.team, path)?;
        eprintln!("Team summary written to {}", path.display());
    }

    if !json {
        println!("{}", selection.display());
    }
    println!("{}", cli::format_team(&dashboard.team, json, no_color));
    Ok(())
}

fn run_check(
    input: &Path,
    seller: Option<String>,
    candidate: kpiboard_core::models::KpiCandidate,
    track: Option<&str>,
    json: bool,
    no_color: bool,
) -> Result<()> {
    let tracked = cli::parse_tracked(track)?;
    let mut history: Vec<KpiRecord> = cli::load_records(input)?;
    if let Some(seller) = seller {
        history.retain(|r| r.entity() == seller);
    }

    let missing = tracked.missing_in(&candidate);
    if !missing.is_empty() {
        tracing::debug!(?missing, "Unchecked metrics without a value");
    }

    let warnings = check_anomalies(&candidate, &history, tracked);
    println!("{}", cli::format_warnings(&warnings, json, no_color));
    Ok(())
}

async fn run_submit(
    backend: &HttpBackend,
    seller: &str,
    candidate: kpiboard_core::models::KpiCandidate,
    yes: bool,
    non_interactive: bool,
    no_color: bool,
) -> Result<()> {
    let today = chrono::Local::now().date_naive();
    let tracked = backend
        .fetch_tracked_metrics(seller)
        .await
        .context("Failed to fetch tracked metrics")?;

    let store = KpiStore::new();
    store
        .load(backend, seller, SUBMIT_HISTORY_DAYS)
        .await
        .context("Failed to fetch KPI history")?;
    let history = store.records(seller);

    let mut submission = KpiSubmission::new();
    let pending = matches!(
        submission.submit(candidate, &history, tracked)?,
        SubmissionState::AnomalyPending(_)
    );

    if pending {
        println!(
            "{}",
            cli::format_warnings(submission.warnings(), false, no_color)
        );

        let confirmed = if yes {
            true
        } else if non_interactive {
            bail!("Unusual values need confirmation (use --yes)");
        } else {
            confirm("Save anyway? [y/N] ")?
        };

        if !confirmed {
            submission.cancel()?;
            println!("Entry not saved.");
            return Ok(());
        }
        submission.confirm()?;
    }

    let saved = submission.save(backend, seller, today).await?;
    println!(
        "Saved {} for {}: CA {}, {} ventes, {} clients, {} articles",
        saved.date.format("%d/%m/%Y"),
        seller,
        cli::format_eur(saved.ca),
        saved.ventes,
        saved.clients,
        saved.articles
    );
    store.upsert(seller, saved);
    Ok(())
}

async fn run_fetch(
    backend: &HttpBackend,
    seller: &str,
    days: u32,
    json: bool,
    no_color: bool,
) -> Result<()> {
    let store = KpiStore::new();
    store
        .load(backend, seller, days)
        .await
        .with_context(|| format!("Failed to fetch KPI entries for {}", seller))?;

    let records = store.records(seller);
    println!("{}", cli::format_records(&records, json, no_color));
    Ok(())
}

fn run_prefs(cache_dir: &Path, action: PrefsAction) -> Result<()> {
    let store = JsonFileStore::new(cache_dir);
    let mut prefs = DashboardPreferences::load(&store);

    match action {
        PrefsAction::Show { json } => {
            println!("{}", cli::format_preferences(&prefs, json));
            return Ok(());
        }
        PrefsAction::SetPeriod { period } => prefs.period = period,
        PrefsAction::Move { section, index } => {
            let section: DashboardSection =
                serde_json::from_value(serde_json::Value::String(section.to_lowercase()))
                    .with_context(|| format!("Unknown section '{}'", section))?;
            prefs.move_section(section, index);
        }
        PrefsAction::Seller { seller } => prefs.seller_filter = seller,
        PrefsAction::Track { metrics } => prefs.tracked = cli::parse_tracked(Some(&metrics))?,
        PrefsAction::Reset => {
            DashboardPreferences::reset(&store)?;
            println!("Preferences reset ({})", store.path().display());
            return Ok(());
        }
    }

    prefs.save(&store)?;
    println!("{}", cli::format_preferences(&prefs, false));
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read answer")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes" | "o" | "oui"))
}
