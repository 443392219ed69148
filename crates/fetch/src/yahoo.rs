//! Yahoo Finance chart client for asset prices.

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::Value;
use tracing::debug;

use crate::{
    FetchError, SeriesPoint, SeriesProvider,
    provider::{FetchWindow, clip_window},
};

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Client for Yahoo Finance daily close prices.
#[derive(Debug)]
pub struct YahooClient {
    client: reqwest::Client,
}

impl YahooClient {
    /// Client over a shared HTTP client.
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Parse the chart payload into daily close observations.
    ///
    /// Adjusted closes are preferred when present; the raw close series is
    /// the fallback. Null entries (market holidays, halted rows) are skipped.
    fn parse_chart(payload: &Value) -> Result<Vec<SeriesPoint>, FetchError> {
        let result = payload["chart"]["result"]
            .get(0)
            .ok_or_else(|| FetchError::Parse("no chart result in Yahoo response".to_string()))?;

        let timestamps = result["timestamp"]
            .as_array()
            .ok_or_else(|| FetchError::Parse("no timestamps in Yahoo response".to_string()))?;

        let adjclose = result["indicators"]["adjclose"]
            .get(0)
            .and_then(|a| a["adjclose"].as_array());
        let close = result["indicators"]["quote"]
            .get(0)
            .and_then(|q| q["close"].as_array());
        let values = adjclose
            .or(close)
            .ok_or_else(|| FetchError::Parse("no close series in Yahoo response".to_string()))?;

        let mut points = Vec::with_capacity(timestamps.len());
        for (ts, value) in timestamps.iter().zip(values.iter()) {
            let (Some(ts), Some(value)) = (ts.as_i64(), value.as_f64()) else {
                continue;
            };
            // Timestamps are exchange-local seconds; the calendar day in UTC
            // is what the pipeline keys on.
            if let Some(datetime) = DateTime::from_timestamp(ts, 0) {
                points.push((datetime.date_naive(), value));
            }
        }
        Ok(points)
    }
}

#[async_trait]
impl SeriesProvider for YahooClient {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch(
        &self,
        source_id: &str,
        _country: &str,
        window: FetchWindow,
    ) -> Result<Vec<SeriesPoint>, FetchError> {
        let period1 = window
            .start
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map_or(0, |dt| dt.and_utc().timestamp());
        let period2 = window
            .end
            .and_then(|d| d.and_hms_opt(23, 59, 59))
            .map_or_else(|| chrono::Utc::now().timestamp(), |dt| dt.and_utc().timestamp());

        let encoded = source_id.replace('^', "%5E");
        let url = format!(
            "{BASE_URL}/{encoded}?period1={period1}&period2={period2}&interval=1d&events=history"
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let payload: Value = response.json().await?;
        let points = Self::parse_chart(&payload)?;
        debug!(source_id, points = points.len(), "fetched Yahoo series");
        Ok(clip_window(points, window))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_chart_with_adjclose() {
        let payload = json!({
            "chart": {
                "result": [{
                    "timestamp": [1704153600, 1704240000],
                    "indicators": {
                        "quote": [{ "close": [100.0, 101.0] }],
                        "adjclose": [{ "adjclose": [99.0, 100.5] }]
                    }
                }]
            }
        });

        let points = YahooClient::parse_chart(&payload).unwrap();
        assert_eq!(points.len(), 2);
        // Adjusted close wins over raw close.
        assert_eq!(points[0].1, 99.0);
    }

    #[test]
    fn falls_back_to_raw_close() {
        let payload = json!({
            "chart": {
                "result": [{
                    "timestamp": [1704153600],
                    "indicators": { "quote": [{ "close": [100.0] }] }
                }]
            }
        });

        let points = YahooClient::parse_chart(&payload).unwrap();
        assert_eq!(points[0].1, 100.0);
    }

    #[test]
    fn null_rows_are_skipped() {
        let payload = json!({
            "chart": {
                "result": [{
                    "timestamp": [1704153600, 1704240000],
                    "indicators": { "quote": [{ "close": [100.0, null] }] }
                }]
            }
        });

        let points = YahooClient::parse_chart(&payload).unwrap();
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn missing_chart_is_rejected() {
        let payload = json!({ "chart": { "error": "Not Found" } });
        assert!(YahooClient::parse_chart(&payload).is_err());
    }
}
