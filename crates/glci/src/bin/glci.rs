//! Command-line interface for the GLCI pipeline.
//!
//! Fetches raw series into the artifact store, computes composite indices and
//! regime-conditioned risk metrics, and exports the static JSON API tree.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use glci_config::{GLCI_INDEX_ID, IndexConfig, Registry};
use glci_export::JsonExporter;
use glci_features::{CachedSource, StoreSource};
use glci_fetch::{FetchError, Fetcher};
use glci_index::{Aggregator, GlciComputer, GlciOptions};
use glci_primitives::{Date, parse_date};
use glci_risk::RiskComputer;
use glci_storage::DataStore;
use tracing_subscriber::EnvFilter;

/// Configuration or credential problem.
const EXIT_CONFIG: u8 = 1;
/// Malformed user input.
const EXIT_USAGE: u8 = 2;
/// Every fetch retry exhausted.
const EXIT_FETCH: u8 = 3;

/// Default look-back window for fetch and compute, in days.
const DEFAULT_WINDOW_DAYS: i64 = 365 * 3;

#[derive(Parser)]
#[command(name = "glci")]
#[command(about = "Global Liquidity & Credit Index pipeline", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch raw series from their providers
    Fetch {
        /// Series ids to fetch
        #[arg(long, short, num_args = 1..)]
        series: Vec<String>,
        /// Fetch every series of one source (fred, worldbank, yahoo)
        #[arg(long)]
        source: Option<String>,
        /// Fetch every configured series
        #[arg(long)]
        all: bool,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
        /// Append results to the raw store
        #[arg(long)]
        save: bool,
    },
    /// Compute composite indices
    Compute {
        /// Index ids to compute
        #[arg(long, short, num_args = 1..)]
        index: Vec<String>,
        /// Compute every configured index
        #[arg(long)]
        all: bool,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
        /// Persist curated artifacts
        #[arg(long)]
        save: bool,
        /// Print the pillar breakdown (composite only)
        #[arg(long)]
        pillars: bool,
        /// Print the regime distribution (composite only)
        #[arg(long)]
        regime: bool,
    },
    /// List configured series, indices, or stored artifacts
    List {
        /// What to list
        #[arg(value_enum)]
        what: ListKind,
    },
    /// Show stored data for one series
    Show {
        /// Series id
        series_id: String,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
        /// Rows to print
        #[arg(long, default_value_t = 20)]
        tail: usize,
    },
    /// Export curated artifacts to the static JSON API tree
    Export {
        /// Output directory (default: <data>/export/latest)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also copy the tree to a dated snapshot
        #[arg(long)]
        snapshot: bool,
    },
    /// Scheduled refresh: fetch, compute, export
    Update,
}

#[derive(Clone, Copy, ValueEnum)]
enum ListKind {
    Series,
    Indices,
    Stored,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let registry = match load_registry() {
        Ok(registry) => registry,
        Err(err) => {
            eprintln!("Error: could not load configuration: {err}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    let store = match DataStore::open(data_root()) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("Error: could not open data store: {err}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let code = match cli.command {
        Commands::Fetch { series, source, all, start, end, save } => {
            cmd_fetch(&registry, &store, series, source, all, start, end, save).await
        }
        Commands::Compute { index, all, start, end, save, pillars, regime } => {
            cmd_compute(&registry, &store, index, all, start, end, save, pillars, regime)
        }
        Commands::List { what } => cmd_list(&registry, &store, what),
        Commands::Show { series_id, start, end, tail } => {
            cmd_show(&registry, &store, &series_id, start, end, tail)
        }
        Commands::Export { output, snapshot } => cmd_export(&registry, &store, output, snapshot),
        Commands::Update => cmd_update(&registry, &store).await,
    };
    ExitCode::from(code)
}

fn load_registry() -> Result<Registry, glci_config::ConfigError> {
    let local = PathBuf::from("config/series.yml");
    if local.exists() { Registry::from_path(local) } else { Registry::default_config() }
}

fn data_root() -> PathBuf {
    std::env::var("DATA_PATH").map_or_else(|_| PathBuf::from("data"), PathBuf::from)
}

fn parse_window(
    start: Option<String>,
    end: Option<String>,
) -> Result<(Option<Date>, Option<Date>), String> {
    let parse = |value: Option<String>| -> Result<Option<Date>, String> {
        value
            .map(|s| parse_date(&s).map_err(|e| format!("invalid date '{s}': {e}")))
            .transpose()
    };
    Ok((parse(start)?, parse(end)?))
}

fn default_window(start: Option<Date>, end: Option<Date>) -> (Option<Date>, Option<Date>) {
    let today = Utc::now().date_naive();
    (
        Some(start.unwrap_or(today - Duration::days(DEFAULT_WINDOW_DAYS))),
        Some(end.unwrap_or(today)),
    )
}

#[allow(clippy::too_many_arguments)]
async fn cmd_fetch(
    registry: &Registry,
    store: &DataStore,
    series: Vec<String>,
    source: Option<String>,
    all: bool,
    start: Option<String>,
    end: Option<String>,
    save: bool,
) -> u8 {
    let (start, end) = match parse_window(start, end) {
        Ok(window) => default_window(window.0, window.1),
        Err(err) => {
            eprintln!("Error: {err}");
            return EXIT_USAGE;
        }
    };

    let fetcher = match Fetcher::new(registry.clone()) {
        Ok(fetcher) => fetcher,
        Err(err) => {
            eprintln!("Error: {err}");
            return EXIT_CONFIG;
        }
    };

    let ids: Vec<String> = if all {
        fetcher.series_ids(None)
    } else if let Some(source) = source {
        fetcher.series_ids(Some(&source))
    } else if !series.is_empty() {
        series
    } else {
        eprintln!("Specify --series, --source, or --all");
        return EXIT_USAGE;
    };
    if ids.is_empty() {
        eprintln!("No series matched the selection");
        return EXIT_USAGE;
    }

    println!("Fetching {} series...", ids.len());
    let outcomes = fetcher.fetch_many(&ids, start, end).await;

    let mut fetched = 0usize;
    let mut credential_error = false;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(df) => {
                println!("  {}: {} observations", outcome.series_id, df.height());
                fetched += 1;
                if save && df.height() > 0 {
                    let source = registry
                        .series(&outcome.series_id)
                        .map(|cfg| cfg.source.clone())
                        .unwrap_or_default();
                    match store.append_raw(df, &source, &outcome.series_id) {
                        Ok(_) => println!("    saved to storage"),
                        Err(err) => eprintln!("    save failed: {err}"),
                    }
                }
            }
            Err(err) => {
                eprintln!("  {}: {err}", outcome.series_id);
                if matches!(err, FetchError::MissingCredential(_)) {
                    credential_error = true;
                }
            }
        }
    }
    println!("\nFetched {fetched}/{} series", outcomes.len());

    if fetched > 0 {
        0
    } else if credential_error {
        EXIT_CONFIG
    } else {
        EXIT_FETCH
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_compute(
    registry: &Registry,
    store: &DataStore,
    index: Vec<String>,
    all: bool,
    start: Option<String>,
    end: Option<String>,
    save: bool,
    pillars: bool,
    regime: bool,
) -> u8 {
    let (start, end) = match parse_window(start, end) {
        Ok(window) => window,
        Err(err) => {
            eprintln!("Error: {err}");
            return EXIT_USAGE;
        }
    };

    let ids: Vec<String> = if all {
        registry.all_indices().map(|(id, _)| id.to_string()).collect()
    } else if !index.is_empty() {
        index
    } else {
        eprintln!("Specify --index or --all");
        return EXIT_USAGE;
    };

    let source = CachedSource::new(StoreSource::new(registry, store));
    let mut computed = 0usize;

    for id in &ids {
        match registry.index(id) {
            Ok(IndexConfig::Pillarized { .. }) => {
                let computer = GlciComputer::for_index(registry, &source, store, id);
                let options = GlciOptions { start, end, save_output: save, ..Default::default() };
                match computer.compute(&options) {
                    Ok(result) => {
                        computed += 1;
                        print_glci_summary(id, &result, pillars, regime);
                    }
                    Err(err) => eprintln!("  {id}: {err}"),
                }
            }
            Ok(IndexConfig::Arithmetic { .. }) => {
                let aggregator = Aggregator::new(registry, &source);
                match aggregator.compute_index(id, start, end) {
                    Ok(df) => {
                        computed += 1;
                        let values =
                            glci_transforms::numeric_values(&df, "value").unwrap_or_default();
                        let latest = values.last().copied().unwrap_or(f64::NAN);
                        println!("  {id}: {} observations, latest={latest:.2}", df.height());
                        if save {
                            let meta = serde_json_meta(start, end);
                            if let Err(err) =
                                store.save_curated(&df, "indices", id, Some(&meta))
                            {
                                eprintln!("    save failed: {err}");
                            } else {
                                println!("    saved to storage");
                            }
                        }
                    }
                    Err(err) => eprintln!("  {id}: {err}"),
                }
            }
            Err(err) => eprintln!("  {id}: {err}"),
        }
    }

    println!("\nComputed {computed}/{} indices", ids.len());
    if computed > 0 { 0 } else { EXIT_CONFIG }
}

fn serde_json_meta(start: Option<Date>, end: Option<Date>) -> serde_json::Value {
    serde_json::json!({
        "computed_at": Utc::now().to_rfc3339(),
        "start_date": start.map(|d| d.format("%Y-%m-%d").to_string()),
        "end_date": end.map(|d| d.format("%Y-%m-%d").to_string()),
    })
}

fn print_glci_summary(id: &str, result: &glci_index::GlciResult, pillars: bool, regime: bool) {
    println!("  {id}: {} observations", result.glci.height());
    if let Some(current) = result.metadata.get("current_regime") {
        println!(
            "    latest value {:.2}, regime {}",
            current["value"].as_f64().unwrap_or(0.0),
            current["regime_label"].as_str().unwrap_or("unknown")
        );
    }
    if !result.missing_pillars.is_empty() {
        println!("    missing pillars: {}", result.missing_pillars.join(", "));
    }

    if pillars {
        println!("    pillar breakdown:");
        for outcome in &result.pillar_results {
            println!(
                "      {}: method={}, explained={:.1}%, features={}",
                outcome.name,
                outcome.method,
                outcome.explained_variance * 100.0,
                outcome.n_variables
            );
        }
    }

    if regime {
        if let Ok(regimes) = glci_transforms::numeric_values(&result.glci, "regime") {
            let total = regimes.len().max(1);
            for (label, code) in [("tight", -1.0), ("neutral", 0.0), ("loose", 1.0)] {
                let count = regimes.iter().filter(|r| **r == code).count();
                println!(
                    "      {label}: {count} periods ({:.1}%)",
                    count as f64 / total as f64 * 100.0
                );
            }
        }
    }
}

fn cmd_list(registry: &Registry, store: &DataStore, what: ListKind) -> u8 {
    match what {
        ListKind::Series => {
            let mut by_source: Vec<(&str, Vec<&str>)> = Vec::new();
            for (id, cfg) in registry.all_series() {
                match by_source.iter_mut().find(|(source, _)| *source == cfg.source) {
                    Some((_, ids)) => ids.push(id),
                    None => by_source.push((cfg.source.as_str(), vec![id])),
                }
            }
            println!("Configured series ({}):\n", registry.all_series().count());
            for (source, ids) in by_source {
                println!("[{}]", source.to_uppercase());
                for id in ids {
                    let cfg = registry.series(id).expect("listed id resolves");
                    println!("  {id:<32} {:<10} {}", cfg.frequency.to_string(), cfg.description);
                }
                println!();
            }
        }
        ListKind::Indices => {
            println!("Configured indices ({}):\n", registry.all_indices().count());
            for (id, cfg) in registry.all_indices() {
                let kind = match cfg {
                    IndexConfig::Pillarized { .. } => "pillarized",
                    IndexConfig::Arithmetic { .. } => "arithmetic",
                };
                println!("  {id:<32} {kind:<12} {} components", cfg.component_count());
                if !cfg.description().is_empty() {
                    println!("    {}", cfg.description());
                }
            }
        }
        ListKind::Stored => {
            println!("Stored raw data:");
            match store.list_raw_series(None) {
                Ok(entries) => {
                    for entry in entries {
                        println!("  {}/{}", entry.group, entry.name);
                    }
                }
                Err(err) => eprintln!("  error: {err}"),
            }
            println!("\nStored curated data:");
            match store.list_curated(None) {
                Ok(entries) => {
                    for entry in entries {
                        println!("  {}/{}", entry.group, entry.name);
                    }
                }
                Err(err) => eprintln!("  error: {err}"),
            }
        }
    }
    0
}

fn cmd_show(
    registry: &Registry,
    store: &DataStore,
    series_id: &str,
    start: Option<String>,
    end: Option<String>,
    tail: usize,
) -> u8 {
    if registry.series(series_id).is_err() {
        eprintln!("Error: unknown series '{series_id}'");
        return EXIT_USAGE;
    }
    let (start, end) = match parse_window(start, end) {
        Ok(window) => window,
        Err(err) => {
            eprintln!("Error: {err}");
            return EXIT_USAGE;
        }
    };

    let source = StoreSource::new(registry, store);
    use glci_features::SeriesSource as _;
    match source.series(series_id, start, end) {
        Ok(df) if df.height() > 0 => {
            let values = glci_transforms::numeric_values(&df, "value").unwrap_or_default();
            let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();

            println!("\n{series_id}");
            println!("Observations: {}", df.height());
            println!("{}", df.tail(Some(tail)));
            if let (Some(min), Some(max)) = (
                finite.iter().copied().reduce(f64::min),
                finite.iter().copied().reduce(f64::max),
            ) {
                let mean = finite.iter().sum::<f64>() / finite.len() as f64;
                println!("\nStats:");
                println!("  Latest: {:.4}", finite.last().copied().unwrap_or(f64::NAN));
                println!("  Min:    {min:.4}");
                println!("  Max:    {max:.4}");
                println!("  Mean:   {mean:.4}");
            }
            0
        }
        Ok(_) => {
            eprintln!("No stored data for {series_id} in the requested window");
            EXIT_CONFIG
        }
        Err(err) => {
            eprintln!("Error: {err}");
            EXIT_CONFIG
        }
    }
}

fn cmd_export(
    registry: &Registry,
    store: &DataStore,
    output: Option<PathBuf>,
    snapshot: bool,
) -> u8 {
    let output = output.unwrap_or_else(|| data_root().join("export").join("latest"));
    let exporter = JsonExporter::new(registry, store, &output);
    match exporter.export_all(snapshot) {
        Ok(status) => {
            println!(
                "Exported {} series ({} skipped), {} indices to {}",
                status.series_written,
                status.series_skipped,
                status.indices_written,
                output.display()
            );
            if !status.glci_written {
                println!("Skipped composite endpoints (missing curated data)");
            }
            if !status.risk_written {
                println!("Skipped risk endpoints (missing curated data)");
            }
            0
        }
        Err(err) => {
            eprintln!("Error: export failed: {err}");
            EXIT_CONFIG
        }
    }
}

/// The scheduled refresh: fetch everything, recompute, re-export.
async fn cmd_update(registry: &Registry, store: &DataStore) -> u8 {
    println!("[1/4] Fetching raw data...");
    let fetch_code =
        cmd_fetch(registry, store, Vec::new(), None, true, None, None, true).await;
    if fetch_code != 0 {
        eprintln!("Update aborted: fetch produced no data");
        return fetch_code;
    }

    println!("\n[2/4] Computing indices...");
    let compute_code = cmd_compute(
        registry,
        store,
        Vec::new(),
        true,
        None,
        None,
        true,
        false,
        false,
    );
    if compute_code != 0 {
        eprintln!("Update aborted: no index could be computed");
        return compute_code;
    }

    println!("\n[3/4] Computing risk metrics...");
    let source = CachedSource::new(StoreSource::new(registry, store));
    let risk = RiskComputer::new(&source, store);
    match risk.compute(None, None, true) {
        Ok(dashboard) => {
            println!("  {} assets, current regime: {}", dashboard.assets.len(), dashboard.current_regime);
        }
        Err(err) => eprintln!("  risk metrics failed: {err}"),
    }

    println!("\n[4/4] Exporting JSON tree...");
    let code = cmd_export(registry, store, None, false);

    // Health check: flag components that have gone quiet.
    let glci_source = CachedSource::new(StoreSource::new(registry, store));
    let computer = GlciComputer::for_index(registry, &glci_source, store, GLCI_INDEX_ID);
    if let Ok(entries) = computer.data_freshness() {
        let stale: Vec<_> = entries.iter().filter(|e| e.is_stale).collect();
        if stale.is_empty() {
            println!("\nAll component data is fresh");
        } else {
            println!("\nStale components:");
            for entry in stale {
                println!("  {} ({}): {} days old", entry.series_id, entry.pillar, entry.days_old);
            }
        }
    }
    code
}
