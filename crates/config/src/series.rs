//! Per-series descriptor records.

use glci_primitives::{Frequency, Sign};
use serde::{Deserialize, Serialize};

/// Broad classification of what a series measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesType {
    /// Balance-sheet or aggregate level (e.g. central bank assets).
    Level,
    /// Interest rate or spread.
    Rate,
    /// Credit spread.
    Spread,
    /// Volatility or stress gauge.
    Stress,
    /// Tradable asset price.
    Price,
    /// Exchange rate.
    Fx,
    /// Credit stock or flow.
    Credit,
    /// Anything else.
    Other,
}

impl Default for SeriesType {
    fn default() -> Self {
        Self::Other
    }
}

/// Declarative descriptor for one configured series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Provider that serves the series (`fred`, `worldbank`, `yahoo`, ...).
    pub source: String,
    /// Identifier of the series at the provider.
    pub source_id: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// ISO country code, when the series is country-specific.
    #[serde(default)]
    pub country: String,
    /// Native observation frequency.
    pub frequency: Frequency,
    /// Unit of the raw values.
    #[serde(default)]
    pub unit: String,
    /// What the series measures.
    #[serde(default, rename = "type")]
    pub series_type: SeriesType,
    /// Expected sign of co-movement with its pillar, when configured.
    #[serde(default)]
    pub sign: Option<Sign>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_descriptor() {
        let yaml = r"
source: fred
source_id: WALCL
frequency: weekly
";
        let cfg: SeriesConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.source, "fred");
        assert_eq!(cfg.frequency, Frequency::Weekly);
        assert_eq!(cfg.series_type, SeriesType::Other);
        assert!(cfg.sign.is_none());
    }

    #[test]
    fn deserializes_full_descriptor() {
        let yaml = r"
source: fred
source_id: BAMLH0A0HYM2
description: ICE BofA US High Yield spread
country: US
frequency: daily
unit: percent
type: spread
sign: -1
";
        let cfg: SeriesConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.series_type, SeriesType::Spread);
        assert_eq!(cfg.sign, Some(Sign::Negative));
    }
}
