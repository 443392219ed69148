//! World Bank indicators client.

use async_trait::async_trait;
use glci_primitives::Date;
use serde_json::Value;
use tracing::debug;

use crate::{
    FetchError, SeriesPoint, SeriesProvider,
    provider::{FetchWindow, clip_window},
};

const BASE_URL: &str = "https://api.worldbank.org/v2";

/// Client for World Bank country indicators.
///
/// Indicator ids are shared across countries, so the configured country code
/// selects the path. Observations are annual and get stamped on December 31
/// of their year.
#[derive(Debug)]
pub struct WorldBankClient {
    client: reqwest::Client,
}

impl WorldBankClient {
    /// Client over a shared HTTP client.
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Parse the `[metadata, observations]` payload shape.
    fn parse_payload(payload: &Value) -> Result<Vec<SeriesPoint>, FetchError> {
        let rows = payload
            .get(1)
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::Parse("no data array in World Bank response".to_string()))?;

        let mut points = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(year_str) = row["date"].as_str() else { continue };
            let Some(value) = row["value"].as_f64() else { continue };
            let year: i32 = year_str
                .parse()
                .map_err(|_| FetchError::Parse(format!("bad World Bank year '{year_str}'")))?;
            if let Some(date) = Date::from_ymd_opt(year, 12, 31) {
                points.push((date, value));
            }
        }
        Ok(points)
    }

    /// Map an empty country code to the world aggregate.
    fn country_path(country: &str) -> &str {
        if country.is_empty() { "WLD" } else { country }
    }
}

#[async_trait]
impl SeriesProvider for WorldBankClient {
    fn name(&self) -> &'static str {
        "worldbank"
    }

    async fn fetch(
        &self,
        source_id: &str,
        country: &str,
        window: FetchWindow,
    ) -> Result<Vec<SeriesPoint>, FetchError> {
        let url = format!(
            "{BASE_URL}/country/{}/indicator/{source_id}?format=json&per_page=2000",
            Self::country_path(country)
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
        let points = Self::parse_payload(&payload)?;
        debug!(source_id, country, points = points.len(), "fetched World Bank series");
        Ok(clip_window(points, window))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_indicator_rows() {
        let payload = json!([
            { "page": 1, "pages": 1 },
            [
                { "date": "2022", "value": 25_460_000_000_000.0 },
                { "date": "2021", "value": null },
                { "date": "2020", "value": 21_060_000_000_000.0 }
            ]
        ]);

        let points = WorldBankClient::parse_payload(&payload).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].0, Date::from_ymd_opt(2022, 12, 31).unwrap());
    }

    #[test]
    fn error_payload_is_rejected() {
        let payload = json!([{ "message": [{ "id": "120", "value": "Invalid indicator" }] }]);
        assert!(WorldBankClient::parse_payload(&payload).is_err());
    }

    #[test]
    fn empty_country_maps_to_world() {
        assert_eq!(WorldBankClient::country_path(""), "WLD");
        assert_eq!(WorldBankClient::country_path("US"), "US");
    }
}
