//! Regime labels derived from composite z-scores.

use serde::{Deserialize, Serialize};

/// Tri-valued liquidity regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regime {
    /// Conditions tighter than one standard deviation below trend.
    Tight,
    /// Conditions within one standard deviation of trend.
    Neutral,
    /// Conditions looser than one standard deviation above trend.
    Loose,
}

/// Z-score thresholds `(low, high)` separating the regimes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeThresholds {
    /// Below this z-score the regime is tight.
    pub low: f64,
    /// Above this z-score the regime is loose.
    pub high: f64,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self { low: -1.0, high: 1.0 }
    }
}

impl Regime {
    /// Integer code stored in columnar artifacts (-1, 0, 1).
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Tight => -1,
            Self::Neutral => 0,
            Self::Loose => 1,
        }
    }

    /// Human-readable label used in JSON payloads.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Tight => "tight",
            Self::Neutral => "neutral",
            Self::Loose => "loose",
        }
    }

    /// Decode a stored integer code; unknown codes map to neutral.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            -1 => Self::Tight,
            1 => Self::Loose,
            _ => Self::Neutral,
        }
    }

    /// Classify a z-score against thresholds using strict inequalities.
    #[must_use]
    pub fn classify(zscore: f64, thresholds: RegimeThresholds) -> Self {
        if zscore < thresholds.low {
            Self::Tight
        } else if zscore > thresholds.high {
            Self::Loose
        } else {
            Self::Neutral
        }
    }

    /// All regimes in heatmap ordering.
    pub const ALL: [Self; 3] = [Self::Tight, Self::Neutral, Self::Loose];
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(-1.2, Regime::Tight)]
    #[case(-1.0, Regime::Neutral)]
    #[case(0.0, Regime::Neutral)]
    #[case(1.0, Regime::Neutral)]
    #[case(1.1, Regime::Loose)]
    fn thresholds_are_strict(#[case] z: f64, #[case] expected: Regime) {
        assert_eq!(Regime::classify(z, RegimeThresholds::default()), expected);
    }

    #[test]
    fn code_round_trip() {
        for regime in Regime::ALL {
            assert_eq!(Regime::from_code(regime.code()), regime);
        }
    }

    #[test]
    fn unknown_code_is_neutral() {
        assert_eq!(Regime::from_code(7), Regime::Neutral);
    }
}
