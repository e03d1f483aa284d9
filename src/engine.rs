use log::{debug, info, warn};
use rayon::prelude::*;
use std::time::Instant;

use crate::candidates::{self, CandidatePair};
use crate::cluster::{
    ClusteringStrategy, DistanceMatrix, Group, OversizeGuard, order_groups, union_find_partition,
};
use crate::color::ColorCache;
use crate::combiner::{Combiner, Decision, ResolvedFeatures, Verdict};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::features::{EntityTable, ImageMap, NearDuplicateMap};

/// Runs grouping passes with one configuration.
///
/// The engine owns the color cache; it lives for exactly one pass and is
/// cleared when the next [`Engine::run`] starts.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    combiner: Combiner,
    strategy: ClusteringStrategy,
    guard: OversizeGuard,
    colors: ColorCache,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            combiner: Combiner::new(config.similarity_policy()),
            strategy: config.clustering_strategy(),
            guard: OversizeGuard::new(config.max_group_size),
            colors: ColorCache::new(),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn color_cache(&self) -> &ColorCache {
        &self.colors
    }

    /// Partition the websites of `table` into logo groups.
    ///
    /// With `near_duplicates` only the pairs it reports are compared;
    /// without it every pair is. Entities lacking a usable feature
    /// representation are left out of the result.
    pub fn run(
        &mut self,
        table: &EntityTable,
        images: &ImageMap,
        near_duplicates: Option<&NearDuplicateMap>,
    ) -> Result<Vec<Group>> {
        if table.is_empty() {
            return Err(EngineError::EmptyInput);
        }
        if near_duplicates.is_some() && self.strategy.needs_full_matrix() {
            return Err(EngineError::invalid(
                "strategy",
                "density clustering needs every pair; run without a near-duplicate map",
            ));
        }

        let start = Instant::now();
        self.colors.clear();

        let usable = table.usable_subset();
        if usable.len() < table.len() {
            warn!(
                "{} of {} entities have no usable features and are excluded",
                table.len() - usable.len(),
                table.len()
            );
        }
        if usable.is_empty() {
            return Ok(Vec::new());
        }

        let colors = self.resolve_colors(&usable, images);

        let candidates = match near_duplicates {
            Some(map) => candidates::prefiltered(map, &usable, images),
            None => candidates::exhaustive(usable.len()),
        };
        info!(
            "Scoring {} candidate pairs over {} entities",
            candidates.len(),
            usable.len()
        );

        let decisions = self.score(&usable, &colors, &candidates);
        let accepted = decisions.iter().filter(|d| d.accepted()).count();

        let raw = match &self.strategy {
            ClusteringStrategy::UnionFind => union_find_partition(
                usable.len(),
                candidates
                    .iter()
                    .zip(decisions.iter())
                    .filter(|(_, d)| d.accepted())
                    .map(|(p, _)| (p.a, p.b)),
            ),
            ClusteringStrategy::DensityBased(density) => {
                let mut matrix = DistanceMatrix::new(usable.len());
                for (pair, decision) in candidates.iter().zip(decisions.iter()) {
                    matrix.set(pair.a, pair.b, neighbor_distance(decision));
                }
                density.partition(&matrix)?
            }
        };

        let ordered = order_groups(self.guard.apply(raw));
        let groups: Vec<Group> = ordered
            .into_iter()
            .enumerate()
            .map(|(i, members)| Group {
                id: i + 1,
                average_color: average_color(members.iter().filter_map(|&m| colors[m])),
                members: members.iter().map(|&m| usable.id(m).to_string()).collect(),
            })
            .collect();

        info!(
            "{} strategy: {} accepted pairs -> {} groups (largest {}) in {:.2?}",
            self.strategy.name(),
            accepted,
            groups.len(),
            groups.first().map_or(0, Group::len),
            start.elapsed()
        );
        Ok(groups)
    }

    /// Dominant color per entity: the feature value when present, else the
    /// image sampled through the cache when some signal needs color.
    fn resolve_colors(
        &mut self,
        table: &EntityTable,
        images: &ImageMap,
    ) -> Vec<Option<[f64; 3]>> {
        let sample = self.config.uses_color();
        let mut colors = Vec::with_capacity(table.len());
        for (_, id, features) in table.iter() {
            let color = match features.color() {
                Some(color) => Some(color),
                None if sample => images.get(id).and_then(|path| self.colors.get_or_load(path)),
                None => None,
            };
            colors.push(color);
        }
        colors
    }

    fn score(
        &self,
        table: &EntityTable,
        colors: &[Option<[f64; 3]>],
        candidates: &[CandidatePair],
    ) -> Vec<Decision> {
        let resolved: Vec<ResolvedFeatures<'_>> = colors
            .iter()
            .enumerate()
            .map(|(i, &color)| ResolvedFeatures::with_color(table.features(i), color))
            .collect();
        let decide = |pair: &CandidatePair| {
            let decision = self
                .combiner
                .decide(&resolved[pair.a], &resolved[pair.b], pair.primary_score);
            if decision.verdict == Verdict::Invalid {
                debug!(
                    "Comparison {} / {} produced a non-finite distance",
                    table.id(pair.a),
                    table.id(pair.b)
                );
            }
            decision
        };

        if self.config.parallel {
            candidates.par_iter().map(decide).collect()
        } else {
            candidates.iter().map(decide).collect()
        }
    }
}

/// Distance a decision contributes to the density matrix. Pairs the
/// combiner refused outright are never neighbors, whatever `eps` is.
fn neighbor_distance(decision: &Decision) -> f64 {
    match decision.verdict {
        Verdict::Accepted | Verdict::AboveThreshold => decision.distance,
        Verdict::NoSignals
        | Verdict::Invalid
        | Verdict::PrimaryBelowThreshold
        | Verdict::Vetoed => f64::INFINITY,
    }
}

fn average_color(colors: impl Iterator<Item = [f64; 3]>) -> Option<[f64; 3]> {
    let mut sum = [0.0; 3];
    let mut count = 0usize;
    for color in colors {
        for (s, c) in sum.iter_mut().zip(color) {
            *s += c;
        }
        count += 1;
    }
    (count > 0).then(|| sum.map(|s| s / count as f64))
}
