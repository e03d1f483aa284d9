//! Turning accepted pairs into groups.
//!
//! Two strategies are available:
//!
//! - **Union-find**: transitive closure over the accepted candidate pairs.
//!   Works on sparse pre-filtered pairs and is order independent.
//! - **Density**: neighborhood-density grouping over the full distance
//!   matrix. Only usable on the exhaustive path.
//!
//! Either way the result passes through the [`OversizeGuard`] and
//! [`order_groups`] before it leaves the engine.

mod density;
mod guard;
mod union_find;

use serde::Serialize;

pub use density::{DensityClustering, DistanceMatrix};
pub use guard::OversizeGuard;
pub use union_find::{UnionFind, union_find_partition};

#[derive(Debug, Clone, PartialEq)]
pub enum ClusteringStrategy {
    UnionFind,
    DensityBased(DensityClustering),
}

impl ClusteringStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ClusteringStrategy::UnionFind => "union-find",
            ClusteringStrategy::DensityBased(_) => "density",
        }
    }

    /// Whether the strategy needs every pairwise distance.
    pub fn needs_full_matrix(&self) -> bool {
        matches!(self, ClusteringStrategy::DensityBased(_))
    }
}

/// A set of websites believed to share one logo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    /// 1-based, in output order.
    pub id: usize,
    /// In first-seen order.
    pub members: Vec<String>,
    /// Mean dominant color over members whose color is known.
    pub average_color: Option<[f64; 3]>,
}

impl Group {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Sort members ascending, then groups by descending size with ties broken
/// by smallest member. Empty groups are dropped.
pub fn order_groups(groups: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = groups
        .into_iter()
        .filter(|g| !g.is_empty())
        .map(|mut g| {
            g.sort_unstable();
            g
        })
        .collect();
    groups.sort_by(|x, y| y.len().cmp(&x.len()).then_with(|| x[0].cmp(&y[0])));
    groups
}
