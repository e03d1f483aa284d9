//! Density-based grouping over a precomputed distance matrix.
//!
//! A point is *core* when at least `min_samples` other points lie within
//! `eps` of it. Clusters grow outward from core points; a non-core point
//! within `eps` of a core point joins that cluster as a border point.
//! Points reached by no cluster are noise and each becomes its own group.
//!
//! Needs every pairwise distance, so it is O(n²) in time and memory and only
//! fits the exhaustive candidate path.

use crate::error::{EngineError, Result};

/// Symmetric pairwise distances stored as a condensed upper triangle.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    data: Vec<f64>,
}

impl DistanceMatrix {
    /// All off-diagonal distances start at the maximum, 1.0.
    pub fn new(n: usize) -> Self {
        Self {
            n,
            data: vec![1.0; n * n.saturating_sub(1) / 2],
        }
    }

    pub fn from_fn(n: usize, mut dist: impl FnMut(usize, usize) -> f64) -> Self {
        let mut matrix = Self::new(n);
        for i in 0..n {
            for j in (i + 1)..n {
                matrix.set(i, j, dist(i, j));
            }
        }
        matrix
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[inline]
    fn offset(&self, i: usize, j: usize) -> usize {
        debug_assert!(i < j && j < self.n);
        i * self.n - i * (i + 1) / 2 + (j - i - 1)
    }

    pub fn set(&mut self, i: usize, j: usize, distance: f64) {
        if i == j {
            return;
        }
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        let at = self.offset(i, j);
        self.data[at] = distance;
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i == j {
            return 0.0;
        }
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        self.data[self.offset(i, j)]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DensityClustering {
    eps: f64,
    min_samples: usize,
}

impl DensityClustering {
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }

    pub fn eps(&self) -> f64 {
        self.eps
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    fn region_query(&self, matrix: &DistanceMatrix, point: usize) -> Vec<usize> {
        (0..matrix.len())
            .filter(|&other| other != point && matrix.get(point, other) <= self.eps)
            .collect()
    }

    /// Partition `0..n`, each group sorted ascending.
    pub fn partition(&self, matrix: &DistanceMatrix) -> Result<Vec<Vec<usize>>> {
        let n = matrix.len();
        if n == 0 {
            return Err(EngineError::EmptyInput);
        }
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(EngineError::invalid("eps", "must be positive"));
        }
        if self.min_samples == 0 {
            return Err(EngineError::invalid("min_samples", "must be at least 1"));
        }

        let mut labels: Vec<Option<usize>> = vec![None; n];
        let mut visited = vec![false; n];
        let mut clusters = 0usize;

        for point in 0..n {
            if visited[point] {
                continue;
            }
            visited[point] = true;

            let neighbors = self.region_query(matrix, point);
            if neighbors.len() < self.min_samples {
                // noise for now; a later core point may still claim it
                continue;
            }

            let cluster = clusters;
            clusters += 1;
            labels[point] = Some(cluster);

            let mut to_process = neighbors;
            while let Some(next) = to_process.pop() {
                // Label before the visited check so earlier noise can become
                // a border point.
                if labels[next].is_none() {
                    labels[next] = Some(cluster);
                }
                if visited[next] {
                    continue;
                }
                visited[next] = true;

                let next_neighbors = self.region_query(matrix, next);
                if next_neighbors.len() >= self.min_samples {
                    to_process.extend(next_neighbors.into_iter().filter(|&nn| !visited[nn]));
                }
            }
        }

        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); clusters];
        for (point, label) in labels.into_iter().enumerate() {
            match label {
                Some(cluster) => groups[cluster].push(point),
                None => groups.push(vec![point]),
            }
        }
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Points on a line; distance is their absolute difference.
    fn line(points: &[f64]) -> DistanceMatrix {
        DistanceMatrix::from_fn(points.len(), |i, j| (points[i] - points[j]).abs())
    }

    fn sorted(mut groups: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
        groups.sort();
        groups
    }

    #[test]
    fn test_matrix_symmetry() {
        let mut m = DistanceMatrix::new(4);
        m.set(2, 1, 0.3);
        assert_eq!(m.get(1, 2), 0.3);
        assert_eq!(m.get(2, 1), 0.3);
        assert_eq!(m.get(3, 3), 0.0);
        assert_eq!(m.get(0, 3), 1.0);
    }

    #[test]
    fn test_two_clusters_and_noise() {
        let m = line(&[0.0, 0.05, 0.1, 0.5, 0.55, 0.9]);
        let groups = DensityClustering::new(0.06, 1).partition(&m).unwrap();
        assert_eq!(
            sorted(groups),
            vec![vec![0, 1, 2], vec![3, 4], vec![5]]
        );
    }

    #[test]
    fn test_min_samples_counts_other_points() {
        // 1 has two neighbors, 0 and 2 have one each
        let m = line(&[0.0, 0.1, 0.2]);
        let groups = DensityClustering::new(0.1, 2).partition(&m).unwrap();
        assert_eq!(groups, vec![vec![0, 1, 2]]);

        let groups = DensityClustering::new(0.1, 3).partition(&m).unwrap();
        assert_eq!(sorted(groups), vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn test_border_point_joins_first_cluster() {
        // 0.15 is within eps of a core point on either side but has only two
        // neighbors itself, so whichever cluster reaches it first keeps it
        let left = [0.0, 0.02, 0.04, 0.06];
        let right = [0.24, 0.26, 0.28, 0.30];

        let points: Vec<f64> = left.iter().chain(&[0.15]).chain(&right).copied().collect();
        let groups = DensityClustering::new(0.1, 3).partition(&line(&points)).unwrap();
        assert_eq!(groups, vec![vec![0, 1, 2, 3, 4], vec![5, 6, 7, 8]]);

        let points: Vec<f64> = right.iter().chain(&[0.15]).chain(&left).copied().collect();
        let groups = DensityClustering::new(0.1, 3).partition(&line(&points)).unwrap();
        assert_eq!(groups, vec![vec![0, 1, 2, 3, 4], vec![5, 6, 7, 8]]);
    }

    #[test]
    fn test_infinite_distance_is_never_a_neighbor() {
        let mut m = DistanceMatrix::new(2);
        m.set(0, 1, f64::INFINITY);
        let groups = DensityClustering::new(5.0, 1).partition(&m).unwrap();
        assert_eq!(groups, vec![vec![0], vec![1]]);
    }

    #[test]
    fn test_chain_connects() {
        let points: Vec<f64> = (0..10).map(|i| i as f64 * 0.03).collect();
        let groups = DensityClustering::new(0.05, 1).partition(&line(&points)).unwrap();
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_invalid_params() {
        let m = line(&[0.0]);
        assert!(DensityClustering::new(0.0, 1).partition(&m).is_err());
        assert!(DensityClustering::new(0.1, 0).partition(&m).is_err());
        assert!(matches!(
            DensityClustering::new(0.1, 1).partition(&DistanceMatrix::new(0)),
            Err(EngineError::EmptyInput)
        ));
    }
}
