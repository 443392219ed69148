//! Composite index descriptors.

use glci_primitives::{Frequency, Sign};
use serde::{Deserialize, Serialize};

use crate::ordered::OrderedMap;

/// Aggregation method for arithmetic-form indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    /// Signed sum of components.
    Arithmetic,
    /// Weighted average of rolling z-scores.
    ZscoreAverage,
    /// Weighted sum of currency-normalized levels.
    SumNormalized,
    /// GDP-weighted average across countries.
    WeightedAverage,
}

/// Arithmetic operation applied by one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Add the weighted component.
    Add,
    /// Subtract the weighted component.
    Subtract,
    /// Multiply by the weighted component.
    Multiply,
}

impl Default for Operation {
    fn default() -> Self {
        Self::Add
    }
}

/// One component of an arithmetic-form index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentOp {
    /// Configured series id.
    pub series: String,
    /// Operation combining the component into the index.
    #[serde(default)]
    pub operation: Operation,
    /// Component weight (or FX conversion factor for sum_normalized).
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Country code used to look up GDP weights.
    #[serde(default)]
    pub country: String,
}

const fn default_weight() -> f64 {
    1.0
}

/// Transform applied to a pillar component before factor extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    /// Standardized raw level.
    Level,
    /// Rolling z-score.
    Zscore,
    /// Year-over-year growth.
    Growth,
    /// Deviation from trailing mean.
    Gap,
    /// Credit impulse (second difference).
    Impulse,
    /// Hodrick-Prescott filter gap.
    HpGap,
}

impl TransformKind {
    /// Name used in feature column suffixes and metadata.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Level => "level",
            Self::Zscore => "zscore",
            Self::Growth => "growth",
            Self::Gap => "gap",
            Self::Impulse => "impulse",
            Self::HpGap => "hp_gap",
        }
    }
}

/// One or many transforms, as configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransformsSpec {
    /// A single transform.
    One(TransformKind),
    /// A list of transforms.
    Many(Vec<TransformKind>),
}

impl TransformsSpec {
    /// Normalize to a list.
    #[must_use]
    pub fn to_vec(&self) -> Vec<TransformKind> {
        match self {
            Self::One(kind) => vec![*kind],
            Self::Many(kinds) => kinds.clone(),
        }
    }
}

/// One component of a pillar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PillarComponent {
    /// Configured series id.
    pub series: String,
    /// Country code, when country-specific.
    #[serde(default)]
    pub country: String,
    /// Expected sign relative to the pillar factor.
    #[serde(default)]
    pub sign: Sign,
    /// Component-specific transform override.
    #[serde(default)]
    pub transform: Option<TransformsSpec>,
}

/// Configuration of one thematic pillar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PillarConfig {
    /// Weight of the pillar in the composite (normalized at read time).
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Pillar-level sign; stress pillars are inverted.
    #[serde(default)]
    pub sign: Sign,
    /// Default transforms applied to every component.
    #[serde(default)]
    pub transforms: Vec<TransformKind>,
    /// Component series.
    pub components: Vec<PillarComponent>,
}

/// Target moments for the rescaled composite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Target mean of the rescaled index.
    pub mean: f64,
    /// Target standard deviation of the rescaled index.
    pub stdev: f64,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self { mean: 100.0, stdev: 10.0 }
    }
}

/// Composite index descriptor: arithmetic composition or pillarized factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexConfig {
    /// Pillarized form: latent factor per pillar, combined by weight.
    Pillarized {
        /// Target frequency of the composite.
        frequency: Frequency,
        /// Human-readable description.
        #[serde(default)]
        description: String,
        /// Target moments for rescaling.
        #[serde(default)]
        normalize: NormalizeConfig,
        /// Pillars keyed by name.
        pillars: OrderedMap<PillarConfig>,
    },
    /// Arithmetic form: direct composition of component series.
    Arithmetic {
        /// Aggregation method.
        method: AggregationMethod,
        /// Target frequency of the composite.
        frequency: Frequency,
        /// Human-readable description.
        #[serde(default)]
        description: String,
        /// Component series and operations.
        components: Vec<ComponentOp>,
    },
}

impl IndexConfig {
    /// Description of the index.
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::Pillarized { description, .. } | Self::Arithmetic { description, .. } => {
                description
            }
        }
    }

    /// Target frequency of the index.
    #[must_use]
    pub const fn frequency(&self) -> Frequency {
        match self {
            Self::Pillarized { frequency, .. } | Self::Arithmetic { frequency, .. } => *frequency,
        }
    }

    /// Number of components (pillars for the pillarized form).
    #[must_use]
    pub fn component_count(&self) -> usize {
        match self {
            Self::Pillarized { pillars, .. } => pillars.len(),
            Self::Arithmetic { components, .. } => components.len(),
        }
    }
}
