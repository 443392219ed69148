//! The fetch orchestrator: config resolution, retry, standardization.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use futures::{StreamExt, stream};
use glci_config::Registry;
use glci_primitives::Date;
use glci_transforms::series_frame;
use polars::prelude::{Column, DataFrame};
use tracing::{info, warn};

use crate::{FetchError, FetchWindow, FredClient, SeriesProvider, WorldBankClient, YahooClient};

/// Per-request deadline for every provider call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounded retry at the fetch boundary; the core never sees transient errors.
const MAX_ATTEMPTS: usize = 3;

/// Concurrent in-flight fetches in `fetch_many`.
const FETCH_FANOUT: usize = 4;

/// Result of one series fetch within a batch.
#[derive(Debug)]
pub struct FetchOutcome {
    /// Configured series id.
    pub series_id: String,
    /// The standardized table, or the terminal error.
    pub result: Result<DataFrame, FetchError>,
}

/// Resolves configured series to providers and standardizes their output.
#[derive(Debug)]
pub struct Fetcher {
    registry: Registry,
    providers: HashMap<&'static str, Box<dyn SeriesProvider>>,
}

impl Fetcher {
    /// Build a fetcher with the default provider set.
    ///
    /// The FRED client is only registered when `FRED_API_KEY` is set;
    /// fetching a FRED series without it surfaces a credential error.
    pub fn new(registry: Registry) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("glci/0.1")
            .build()?;

        let mut providers: HashMap<&'static str, Box<dyn SeriesProvider>> = HashMap::new();
        if let Ok(key) = std::env::var("FRED_API_KEY") {
            if !key.trim().is_empty() {
                providers.insert("fred", Box::new(FredClient::new(key, client.clone())?));
            }
        }
        providers.insert("worldbank", Box::new(WorldBankClient::new(client.clone())));
        providers.insert("yahoo", Box::new(YahooClient::new(client)));

        Ok(Self { registry, providers })
    }

    /// The registry this fetcher resolves ids against.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Fetch one configured series as a standardized table.
    ///
    /// Columns: `date`, `value`, plus provenance (`source`, `series_id`,
    /// `fetched_at`) and descriptor metadata (`config_id`, `country`,
    /// `frequency`, `unit`). Transient failures are retried with backoff up
    /// to three attempts.
    pub async fn fetch_series(
        &self,
        series_id: &str,
        start: Option<Date>,
        end: Option<Date>,
    ) -> Result<DataFrame, FetchError> {
        let cfg = self.registry.series(series_id)?;
        let provider = self.providers.get(cfg.source.as_str()).ok_or_else(|| {
            if cfg.source == "fred" {
                FetchError::MissingCredential("FRED_API_KEY".to_string())
            } else {
                FetchError::UnknownSource(cfg.source.clone())
            }
        })?;

        let window = FetchWindow { start, end };
        let mut last_error = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match provider.fetch(&cfg.source_id, &cfg.country, window).await {
                Ok(points) => {
                    info!(series_id, points = points.len(), attempt, "fetched series");
                    return standardize(points, series_id, cfg);
                }
                Err(err @ FetchError::MissingCredential(_)) => return Err(err),
                Err(err) => {
                    warn!(series_id, attempt, error = %err, "fetch attempt failed");
                    last_error = Some(err);
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
                    }
                }
            }
        }

        Err(FetchError::Exhausted {
            series: series_id.to_string(),
            attempts: MAX_ATTEMPTS,
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    /// Fetch several series with bounded fan-out.
    ///
    /// Failures are per-series; the batch always completes.
    pub async fn fetch_many(
        &self,
        series_ids: &[String],
        start: Option<Date>,
        end: Option<Date>,
    ) -> Vec<FetchOutcome> {
        stream::iter(series_ids.iter().cloned())
            .map(|series_id| async move {
                let result = self.fetch_series(&series_id, start, end).await;
                FetchOutcome { series_id, result }
            })
            .buffer_unordered(FETCH_FANOUT)
            .collect()
            .await
    }

    /// Ids of every configured series, optionally restricted to one source.
    #[must_use]
    pub fn series_ids(&self, source: Option<&str>) -> Vec<String> {
        self.registry
            .all_series()
            .filter(|(_, cfg)| source.is_none_or(|s| cfg.source == s))
            .map(|(id, _)| id.to_string())
            .collect()
    }
}

/// Build the standardized table from provider points and the descriptor.
fn standardize(
    points: Vec<(Date, f64)>,
    series_id: &str,
    cfg: &glci_config::SeriesConfig,
) -> Result<DataFrame, FetchError> {
    let (dates, values): (Vec<Date>, Vec<f64>) = points.into_iter().unzip();
    let n = dates.len();
    let mut df =
        series_frame(&dates, &values).map_err(|e| FetchError::Parse(e.to_string()))?;

    let fetched_at = Utc::now().to_rfc3339();
    let columns = [
        ("source", cfg.source.as_str()),
        ("series_id", series_id),
        ("fetched_at", fetched_at.as_str()),
        ("config_id", series_id),
        ("country", cfg.country.as_str()),
        ("frequency", cfg.frequency.code()),
        ("unit", cfg.unit.as_str()),
    ];
    for (name, value) in columns {
        df.with_column(Column::new(name.into(), vec![value.to_string(); n]))
            .map_err(|e| FetchError::Parse(e.to_string()))?;
    }
    Ok(df)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn standardized_table_carries_provenance() {
        let registry = Registry::default_config().unwrap();
        let cfg = registry.series("vix").unwrap();

        let points = vec![
            (NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 13.2),
            (NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(), 14.0),
        ];
        let df = standardize(points, "vix", cfg).unwrap();

        assert_eq!(df.height(), 2);
        for col in ["date", "value", "source", "series_id", "fetched_at", "country"] {
            assert!(
                df.get_column_names().iter().any(|c| c.as_str() == col),
                "missing column {col}"
            );
        }
    }

    #[test]
    fn series_ids_filter_by_source() {
        let registry = Registry::default_config().unwrap();
        let fetcher_ids: Vec<String> = registry
            .all_series()
            .filter(|(_, cfg)| cfg.source == "yahoo")
            .map(|(id, _)| id.to_string())
            .collect();
        assert!(fetcher_ids.contains(&"sp500_price".to_string()));
        assert!(!fetcher_ids.contains(&"vix".to_string()));
    }
}
