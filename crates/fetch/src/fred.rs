//! FRED (St. Louis Fed) observations client.

use async_trait::async_trait;
use glci_primitives::parse_date;
use serde_json::Value;
use tracing::debug;

use crate::{
    FetchError, SeriesPoint, SeriesProvider,
    provider::{FetchWindow, clip_window},
};

const BASE_URL: &str = "https://api.stlouisfed.org/fred/series/observations";

/// Client for the FRED observations API.
#[derive(Debug)]
pub struct FredClient {
    api_key: String,
    client: reqwest::Client,
}

impl FredClient {
    /// Client using the given API key.
    pub fn new(api_key: impl Into<String>, client: reqwest::Client) -> Result<Self, FetchError> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(FetchError::MissingCredential("FRED_API_KEY".to_string()));
        }
        Ok(Self { api_key, client })
    }

    /// Parse the `observations` array of a FRED payload.
    ///
    /// FRED encodes missing values as the string `"."`; those observations
    /// are skipped rather than emitted as NaN.
    fn parse_observations(payload: &Value) -> Result<Vec<SeriesPoint>, FetchError> {
        let observations = payload["observations"]
            .as_array()
            .ok_or_else(|| FetchError::Parse("no observations array in FRED response".to_string()))?;

        let mut points = Vec::with_capacity(observations.len());
        for obs in observations {
            let (Some(date_str), Some(value_str)) = (obs["date"].as_str(), obs["value"].as_str())
            else {
                continue;
            };
            if value_str == "." {
                continue;
            }
            let date = parse_date(date_str)
                .map_err(|e| FetchError::Parse(format!("bad FRED date '{date_str}': {e}")))?;
            if let Ok(value) = value_str.parse::<f64>() {
                points.push((date, value));
            }
        }
        Ok(points)
    }
}

#[async_trait]
impl SeriesProvider for FredClient {
    fn name(&self) -> &'static str {
        "fred"
    }

    async fn fetch(
        &self,
        source_id: &str,
        _country: &str,
        window: FetchWindow,
    ) -> Result<Vec<SeriesPoint>, FetchError> {
        let mut url = format!(
            "{BASE_URL}?series_id={source_id}&api_key={}&file_type=json",
            self.api_key
        );
        if let Some(start) = window.start {
            url.push_str(&format!("&observation_start={}", start.format("%Y-%m-%d")));
        }
        if let Some(end) = window.end {
            url.push_str(&format!("&observation_end={}", end.format("%Y-%m-%d")));
        }

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
        let points = Self::parse_observations(&payload)?;
        debug!(source_id, points = points.len(), "fetched FRED series");
        Ok(clip_window(points, window))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_valid_observations() {
        let payload = json!({
            "observations": [
                { "date": "2023-01-01", "value": "123.45" },
                { "date": "2023-01-02", "value": "124.56" }
            ]
        });

        let points = FredClient::parse_observations(&payload).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].1, 123.45);
    }

    #[test]
    fn skips_missing_markers() {
        let payload = json!({
            "observations": [
                { "date": "2023-01-01", "value": "." },
                { "date": "2023-01-02", "value": "100.0" }
            ]
        });

        let points = FredClient::parse_observations(&payload).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].1, 100.0);
    }

    #[test]
    fn rejects_malformed_payload() {
        let payload = json!({ "error_message": "Bad Request" });
        assert!(FredClient::parse_observations(&payload).is_err());
    }

    #[test]
    fn empty_key_is_a_credential_error() {
        let result = FredClient::new("  ", reqwest::Client::new());
        assert!(matches!(result, Err(FetchError::MissingCredential(_))));
    }
}
