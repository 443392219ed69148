//! The loaded configuration registry.

use std::collections::BTreeMap;
use std::path::Path;

use glci_primitives::Sign;
use serde::{Deserialize, Serialize};

use crate::{ConfigError, IndexConfig, PillarConfig, SeriesConfig, ordered::OrderedMap};

/// Id of the pillarized composite this pipeline exists to produce.
pub const GLCI_INDEX_ID: &str = "global_liquidity_credit_index";

/// The default configuration document shipped with the crate.
const DEFAULT_CONFIG: &str = include_str!("../../../config/series.yml");

/// Declarative registry of series, indices, and country weights.
///
/// Loaded once at process start; treated as immutable afterwards. Live reload,
/// if ever added, must swap the whole registry behind a pointer rather than
/// mutate in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    /// Series descriptors keyed by id.
    #[serde(default)]
    series: OrderedMap<SeriesConfig>,
    /// Index descriptors keyed by id.
    #[serde(default)]
    indices: OrderedMap<IndexConfig>,
    /// Country GDP weights keyed by ISO code.
    #[serde(default)]
    country_weights: BTreeMap<String, f64>,
}

impl Registry {
    /// Parse a registry from a YAML document.
    pub fn from_yaml(doc: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(doc)?)
    }

    /// Load a registry from a YAML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let doc = std::fs::read_to_string(path)?;
        Self::from_yaml(&doc)
    }

    /// The configuration shipped with the crate.
    pub fn default_config() -> Result<Self, ConfigError> {
        Self::from_yaml(DEFAULT_CONFIG)
    }

    /// Look up a series descriptor.
    pub fn series(&self, id: &str) -> Result<&SeriesConfig, ConfigError> {
        self.series.get(id).ok_or_else(|| ConfigError::UnknownSeries(id.to_string()))
    }

    /// Look up an index descriptor.
    pub fn index(&self, id: &str) -> Result<&IndexConfig, ConfigError> {
        self.indices.get(id).ok_or_else(|| ConfigError::UnknownIndex(id.to_string()))
    }

    /// All configured series in declaration order.
    pub fn all_series(&self) -> impl Iterator<Item = (&str, &SeriesConfig)> {
        self.series.iter()
    }

    /// All configured indices in declaration order.
    pub fn all_indices(&self) -> impl Iterator<Item = (&str, &IndexConfig)> {
        self.indices.iter()
    }

    /// Country GDP weights.
    #[must_use]
    pub const fn country_weights(&self) -> &BTreeMap<String, f64> {
        &self.country_weights
    }

    /// Pillars of a pillarized index, in declaration order.
    pub fn pillars(&self, index_id: &str) -> Result<&OrderedMap<PillarConfig>, ConfigError> {
        match self.index(index_id)? {
            IndexConfig::Pillarized { pillars, .. } => Ok(pillars),
            IndexConfig::Arithmetic { .. } => {
                Err(ConfigError::WrongIndexForm(index_id.to_string(), "pillarized"))
            }
        }
    }

    /// Look up one pillar of a pillarized index.
    pub fn pillar(&self, index_id: &str, pillar: &str) -> Result<&PillarConfig, ConfigError> {
        self.pillars(index_id)?
            .get(pillar)
            .ok_or_else(|| ConfigError::UnknownPillar(pillar.to_string(), index_id.to_string()))
    }

    /// Pillar weights normalized to sum to one.
    pub fn pillar_weights(&self, index_id: &str) -> Result<Vec<(String, f64)>, ConfigError> {
        let pillars = self.pillars(index_id)?;
        let total: f64 = pillars.iter().map(|(_, p)| p.weight).sum();
        if total <= 0.0 {
            return Err(ConfigError::InvalidWeights(index_id.to_string(), total));
        }
        Ok(pillars.iter().map(|(name, p)| (name.to_string(), p.weight / total)).collect())
    }

    /// Pillar-level signs keyed by pillar name.
    pub fn pillar_signs(&self, index_id: &str) -> Result<Vec<(String, Sign)>, ConfigError> {
        let pillars = self.pillars(index_id)?;
        Ok(pillars.iter().map(|(name, p)| (name.to_string(), p.sign)).collect())
    }

    /// Effective signs (pillar sign x component sign) for one pillar's series.
    pub fn component_signs(
        &self,
        index_id: &str,
        pillar: &str,
    ) -> Result<Vec<(String, Sign)>, ConfigError> {
        let cfg = self.pillar(index_id, pillar)?;
        Ok(cfg
            .components
            .iter()
            .map(|c| (c.series.clone(), cfg.sign.product(c.sign)))
            .collect())
    }
}
