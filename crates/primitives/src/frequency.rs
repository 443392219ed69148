//! Observation frequency and the window lookups derived from it.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Observation frequency of a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// Daily observations.
    Daily,
    /// Weekly observations.
    Weekly,
    /// Monthly observations.
    Monthly,
    /// Quarterly observations.
    Quarterly,
    /// Annual observations.
    Annual,
}

impl Frequency {
    /// Single-letter code used in columnar artifacts and CLI output.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Daily => "D",
            Self::Weekly => "W",
            Self::Monthly => "M",
            Self::Quarterly => "Q",
            Self::Annual => "A",
        }
    }

    /// Approximate calendar days between consecutive observations.
    #[must_use]
    pub const fn approx_days(self) -> u32 {
        match self {
            Self::Daily => 1,
            Self::Weekly => 7,
            Self::Monthly => 30,
            Self::Quarterly => 91,
            Self::Annual => 365,
        }
    }

    /// Number of observations in roughly one year at this frequency.
    #[must_use]
    pub const fn periods_per_year(self) -> usize {
        match self {
            Self::Daily => 252,
            Self::Weekly => 52,
            Self::Monthly => 12,
            Self::Quarterly => 4,
            Self::Annual => 1,
        }
    }

    /// Rolling window (in ticks) for z-score features, roughly two years.
    #[must_use]
    pub const fn zscore_window(self) -> usize {
        match self {
            Self::Daily => 252,
            Self::Weekly => 104,
            Self::Monthly => 24,
            Self::Quarterly => 8,
            Self::Annual => 4,
        }
    }

    /// Look-back (in ticks) for year-over-year growth features.
    #[must_use]
    pub const fn growth_periods(self) -> usize {
        self.periods_per_year()
    }

    /// Rolling window (in ticks) for trailing-mean gap features.
    #[must_use]
    pub const fn gap_window(self) -> usize {
        match self {
            Self::Daily => 504,
            Self::Weekly => 104,
            Self::Monthly => 24,
            Self::Quarterly => 8,
            Self::Annual => 4,
        }
    }

    /// Smoothing parameter for the Hodrick-Prescott trend at this frequency.
    #[must_use]
    pub const fn hp_lambda(self) -> f64 {
        match self {
            Self::Monthly => 129_600.0,
            Self::Annual => 6.25,
            _ => 1_600.0,
        }
    }

    /// Bounded fill limits `(forward, backward)` in ticks.
    ///
    /// Forward fill spans at most one quarter and backward fill at most one
    /// month, so stale observations cannot dominate the ragged edge.
    #[must_use]
    pub const fn fill_limits(self) -> (usize, usize) {
        match self {
            Self::Daily => (63, 21),
            Self::Weekly => (13, 4),
            Self::Monthly => (3, 1),
            Self::Quarterly | Self::Annual => (1, 1),
        }
    }

    /// Classify a median inter-observation gap (in days) into a frequency.
    #[must_use]
    pub const fn from_median_gap_days(days: i64) -> Self {
        if days <= 3 {
            Self::Daily
        } else if days <= 10 {
            Self::Weekly
        } else if days <= 45 {
            Self::Monthly
        } else if days <= 120 {
            Self::Quarterly
        } else {
            Self::Annual
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "d" | "daily" => Ok(Self::Daily),
            "w" | "weekly" => Ok(Self::Weekly),
            "m" | "monthly" => Ok(Self::Monthly),
            "q" | "quarterly" => Ok(Self::Quarterly),
            "a" | "y" | "annual" | "yearly" => Ok(Self::Annual),
            other => Err(format!("unknown frequency: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("daily", Frequency::Daily)]
    #[case("W", Frequency::Weekly)]
    #[case("monthly", Frequency::Monthly)]
    #[case("q", Frequency::Quarterly)]
    #[case("annual", Frequency::Annual)]
    fn parses_config_strings(#[case] input: &str, #[case] expected: Frequency) {
        assert_eq!(input.parse::<Frequency>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_strings() {
        assert!("fortnightly".parse::<Frequency>().is_err());
    }

    #[rstest]
    #[case(1, Frequency::Daily)]
    #[case(7, Frequency::Weekly)]
    #[case(30, Frequency::Monthly)]
    #[case(91, Frequency::Quarterly)]
    #[case(365, Frequency::Annual)]
    fn gap_classification(#[case] days: i64, #[case] expected: Frequency) {
        assert_eq!(Frequency::from_median_gap_days(days), expected);
    }

    #[test]
    fn weekly_windows() {
        assert_eq!(Frequency::Weekly.zscore_window(), 104);
        assert_eq!(Frequency::Weekly.growth_periods(), 52);
        assert_eq!(Frequency::Weekly.fill_limits(), (13, 4));
    }

    #[test]
    fn display_uses_single_letter() {
        assert_eq!(Frequency::Quarterly.to_string(), "Q");
    }
}
