//! Serialized endpoint shapes.
//!
//! Field declaration order is the wire order; struct serialization keeps it
//! stable across runs.

use serde::Serialize;

/// One observation in a series payload.
#[derive(Debug, Clone, Serialize)]
pub struct DataPoint {
    /// Calendar date, `YYYY-MM-DD`.
    pub date: String,
    /// Observation value.
    pub value: f64,
}

/// Entry of the series list endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesSummary {
    /// Configured series id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Upper-cased source name.
    pub source: String,
    /// Display category bucket.
    pub category: String,
    /// Native frequency word.
    pub frequency: String,
    /// Unit of the raw values.
    pub unit: String,
}

/// Full single-series payload.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesPayload {
    /// Configured series id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Upper-cased source name.
    pub source: String,
    /// Unit of the raw values.
    pub unit: String,
    /// Observations with missing rows dropped.
    pub data: Vec<DataPoint>,
}

/// Latest-point payload of a series.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesLatest {
    /// Configured series id.
    pub id: String,
    /// Date of the latest observation.
    pub date: String,
    /// Latest value.
    pub value: f64,
    /// Percent change versus seven observations earlier.
    pub change: f64,
    /// Unit of the raw values.
    pub unit: String,
}

/// Entry of the index list endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    /// Configured index id.
    pub id: String,
    /// Title-cased display name.
    pub name: String,
    /// Description from configuration.
    pub description: String,
    /// Target frequency code.
    pub frequency: String,
    /// Number of components (pillars for the composite).
    pub components: usize,
}

/// Full single-index payload.
#[derive(Debug, Clone, Serialize)]
pub struct IndexPayload {
    /// Configured index id.
    pub id: String,
    /// Title-cased display name.
    pub name: String,
    /// Description from configuration.
    pub description: String,
    /// Observations with missing rows dropped.
    pub data: Vec<DataPoint>,
}

/// One pillar in the composite breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct PillarSlice {
    /// Pillar name.
    pub name: String,
    /// Latest factor value (0 when missing).
    pub value: f64,
    /// Normalized pillar weight.
    pub weight: f64,
    /// `value * weight`.
    pub contribution: f64,
}

/// The main composite payload.
#[derive(Debug, Clone, Serialize)]
pub struct GlciPayload {
    /// Latest composite value.
    pub value: f64,
    /// Latest rolling z-score.
    pub zscore: f64,
    /// Latest regime label.
    pub regime: String,
    /// Latest regime code.
    pub regime_code: i32,
    /// Date of the latest observation.
    pub date: String,
    /// Latest momentum.
    pub momentum: f64,
    /// Latest regime-change probability.
    pub prob_regime_change: f64,
    /// Latest pillar breakdown.
    pub pillars: Vec<PillarSlice>,
    /// Full composite history.
    pub data: Vec<DataPoint>,
    /// Full pillar factor histories keyed by pillar name.
    pub pillar_data: serde_json::Map<String, serde_json::Value>,
}

/// The compact latest-point composite payload.
#[derive(Debug, Clone, Serialize)]
pub struct GlciLatest {
    /// Date of the latest observation.
    pub date: String,
    /// Latest composite value.
    pub value: f64,
    /// Latest rolling z-score.
    pub zscore: f64,
    /// Latest regime code.
    pub regime: i32,
    /// Latest regime label.
    pub regime_label: String,
    /// Latest momentum.
    pub momentum: f64,
}

/// One contiguous run of a regime label.
#[derive(Debug, Clone, Serialize)]
pub struct RegimePeriod {
    /// Regime label of the run.
    pub regime: String,
    /// First date of the run.
    pub start: String,
    /// First date of the following run (last observed date for the final
    /// run).
    pub end: String,
}

/// Freshness of one composite component.
#[derive(Debug, Clone, Serialize)]
pub struct FreshnessItem {
    /// Configured series id.
    pub series_id: String,
    /// Pillar the component belongs to.
    pub pillar: String,
    /// Last stored date, or `unknown`.
    pub last_date: String,
    /// Days since the last observation; -1 when unknown.
    pub days_old: i64,
    /// Stale for composite purposes (older than 14 days or unknown).
    pub is_stale: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_order_is_stable() {
        let latest = GlciLatest {
            date: "2024-06-07".to_string(),
            value: 101.5,
            zscore: 0.3,
            regime: 0,
            regime_label: "neutral".to_string(),
            momentum: 0.8,
        };
        let json = serde_json::to_string(&latest).unwrap();
        let date_pos = json.find("\"date\"").unwrap();
        let value_pos = json.find("\"value\"").unwrap();
        let momentum_pos = json.find("\"momentum\"").unwrap();
        assert!(date_pos < value_pos && value_pos < momentum_pos);
    }
}
