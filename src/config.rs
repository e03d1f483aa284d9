use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cluster::{ClusteringStrategy, DensityClustering};
use crate::combiner::SimilarityPolicy;
use crate::error::{EngineError, Result};
use crate::features::SignalKind;

/// Relative weight per signal. Need not sum to 1; zero disables a signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub phash: f64,
    pub dhash: f64,
    pub ahash: f64,
    pub whash: f64,
    pub color: f64,
    pub embedding: f64,
}

impl SignalWeights {
    pub fn get(&self, kind: SignalKind) -> f64 {
        match kind {
            SignalKind::Phash => self.phash,
            SignalKind::Dhash => self.dhash,
            SignalKind::Ahash => self.ahash,
            SignalKind::Whash => self.whash,
            SignalKind::Color => self.color,
            SignalKind::Embedding => self.embedding,
        }
    }

    fn entries(&self) -> [(&'static str, f64); 6] {
        [
            ("weights.phash", self.phash),
            ("weights.dhash", self.dhash),
            ("weights.ahash", self.ahash),
            ("weights.whash", self.whash),
            ("weights.color", self.color),
            ("weights.embedding", self.embedding),
        ]
    }
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            phash: 0.4,
            dhash: 0.2,
            ahash: 0.2,
            whash: 0.2,
            color: 0.3,
            embedding: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    WeightedAverage,
    PrimaryWithVeto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    UnionFind,
    Density,
}

impl PolicyKind {
    pub fn name(self) -> &'static str {
        match self {
            PolicyKind::WeightedAverage => "weighted-average",
            PolicyKind::PrimaryWithVeto => "primary-with-veto",
        }
    }
}

impl StrategyKind {
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::UnionFind => "union-find",
            StrategyKind::Density => "density",
        }
    }
}

/// Tunables for one grouping pass. The numeric defaults are starting points,
/// not calibrated constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub weights: SignalWeights,
    pub policy: PolicyKind,
    /// Combined-distance cutoff for the weighted-average policy.
    pub accept_threshold: f64,
    pub primary_signal: SignalKind,
    /// Minimum primary similarity under primary-with-veto.
    pub primary_threshold: f64,
    pub secondary_signal: SignalKind,
    /// Minimum secondary similarity under primary-with-veto.
    pub veto_floor: f64,
    pub max_group_size: usize,
    pub strategy: StrategyKind,
    pub eps: f64,
    pub min_samples: usize,
    /// Score candidate pairs on the rayon pool.
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            policy: PolicyKind::WeightedAverage,
            accept_threshold: 0.15,
            primary_signal: SignalKind::Embedding,
            primary_threshold: 0.80,
            secondary_signal: SignalKind::Color,
            veto_floor: 0.75,
            max_group_size: 10,
            strategy: StrategyKind::UnionFind,
            eps: 0.15,
            min_samples: 1,
            parallel: true,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/logomatch/config.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("logomatch").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        for (name, weight) in self.weights.entries() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(EngineError::invalid(name, "must be a finite non-negative number"));
            }
        }

        for (name, value) in [
            ("accept_threshold", self.accept_threshold),
            ("primary_threshold", self.primary_threshold),
            ("veto_floor", self.veto_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::invalid(name, "must lie in [0, 1]"));
            }
        }

        if self.primary_signal == self.secondary_signal {
            return Err(EngineError::invalid(
                "secondary_signal",
                "must differ from primary_signal",
            ));
        }
        if self.max_group_size == 0 {
            return Err(EngineError::invalid("max_group_size", "must be at least 1"));
        }
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(EngineError::invalid("eps", "must be positive"));
        }
        if self.min_samples == 0 {
            return Err(EngineError::invalid("min_samples", "must be at least 1"));
        }
        Ok(())
    }

    pub fn similarity_policy(&self) -> SimilarityPolicy {
        match self.policy {
            PolicyKind::WeightedAverage => SimilarityPolicy::WeightedAverage {
                weights: self.weights.clone(),
                accept_threshold: self.accept_threshold,
            },
            PolicyKind::PrimaryWithVeto => SimilarityPolicy::PrimaryWithVeto {
                primary: self.primary_signal,
                primary_threshold: self.primary_threshold,
                secondary: self.secondary_signal,
                veto_floor: self.veto_floor,
            },
        }
    }

    pub fn clustering_strategy(&self) -> ClusteringStrategy {
        match self.strategy {
            StrategyKind::UnionFind => ClusteringStrategy::UnionFind,
            StrategyKind::Density => {
                ClusteringStrategy::DensityBased(DensityClustering::new(self.eps, self.min_samples))
            }
        }
    }

    /// True when the pass needs a dominant color per entity.
    pub fn uses_color(&self) -> bool {
        match self.policy {
            PolicyKind::WeightedAverage => self.weights.color > 0.0,
            PolicyKind::PrimaryWithVeto => {
                self.primary_signal == SignalKind::Color
                    || self.secondary_signal == SignalKind::Color
            }
        }
    }
}
