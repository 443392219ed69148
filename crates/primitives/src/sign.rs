//! Expected sign of a series' co-movement with its pillar factor.

use serde::{Deserialize, Serialize};

/// Expected direction of co-movement (+1 or -1).
///
/// Components declared with a negative sign are flipped before factor
/// extraction, so downstream code only ever sees positive effective signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Sign {
    /// Moves with the factor.
    Positive,
    /// Moves against the factor.
    Negative,
}

impl Sign {
    /// Numeric value (+1 or -1).
    #[must_use]
    pub const fn value(self) -> i8 {
        match self {
            Self::Positive => 1,
            Self::Negative => -1,
        }
    }

    /// Product of two signs.
    #[must_use]
    pub const fn product(self, other: Self) -> Self {
        match (self, other) {
            (Self::Positive, Self::Positive) | (Self::Negative, Self::Negative) => Self::Positive,
            _ => Self::Negative,
        }
    }

    /// Whether this sign requires flipping the series.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        matches!(self, Self::Negative)
    }
}

impl Default for Sign {
    fn default() -> Self {
        Self::Positive
    }
}

impl TryFrom<i8> for Sign {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Positive),
            -1 => Ok(Self::Negative),
            other => Err(format!("sign must be 1 or -1, got {other}")),
        }
    }
}

impl From<Sign> for i8 {
    fn from(sign: Sign) -> Self {
        sign.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_table() {
        assert_eq!(Sign::Positive.product(Sign::Positive), Sign::Positive);
        assert_eq!(Sign::Positive.product(Sign::Negative), Sign::Negative);
        assert_eq!(Sign::Negative.product(Sign::Positive), Sign::Negative);
        assert_eq!(Sign::Negative.product(Sign::Negative), Sign::Positive);
    }

    #[test]
    fn serde_round_trip() {
        let json = serde_json::to_string(&Sign::Negative).unwrap();
        assert_eq!(json, "-1");
        let back: Sign = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Sign::Negative);
    }

    #[test]
    fn rejects_zero() {
        assert!(serde_json::from_str::<Sign>("0").is_err());
    }
}
