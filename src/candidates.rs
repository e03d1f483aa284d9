//! Candidate pairs: every pair for small inputs, or only the pairs an
//! upstream near-duplicate search reported.

use log::{debug, info};
use std::collections::{BTreeMap, HashMap};

use crate::features::{Embedding, EntityTable, ImageMap, NearDuplicateMap};

/// An unordered pair of distinct entities, stored with `a < b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidatePair {
    pub a: usize,
    pub b: usize,
    /// Primary-signal similarity supplied by the generator, if any.
    pub primary_score: Option<f64>,
}

impl CandidatePair {
    /// `None` for a self-pair.
    pub fn new(x: usize, y: usize, primary_score: Option<f64>) -> Option<Self> {
        match x.cmp(&y) {
            std::cmp::Ordering::Less => Some(Self {
                a: x,
                b: y,
                primary_score,
            }),
            std::cmp::Ordering::Greater => Some(Self {
                a: y,
                b: x,
                primary_score,
            }),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// All n·(n−1)/2 pairs in lexicographic order.
pub fn exhaustive(n: usize) -> Vec<CandidatePair> {
    let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for a in 0..n {
        for b in (a + 1)..n {
            pairs.push(CandidatePair {
                a,
                b,
                primary_score: None,
            });
        }
    }
    pairs
}

/// Maps image references used by the near-duplicate search back to entity
/// indices. A reference resolves by full path, by file name, or by an
/// entity's embedding handle.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    lookup: HashMap<String, usize>,
}

impl ReferenceIndex {
    pub fn build(table: &EntityTable, images: &ImageMap) -> Self {
        let mut lookup = HashMap::new();
        // Table order so a file name shared by two entities resolves to the
        // first one seen.
        for (idx, id, features) in table.iter() {
            if let Some(path) = images.get(id) {
                lookup
                    .entry(path.to_string_lossy().into_owned())
                    .or_insert(idx);
                if let Some(name) = path.file_name() {
                    lookup
                        .entry(name.to_string_lossy().into_owned())
                        .or_insert(idx);
                }
            }
            if let Some(Embedding::Reference(handle)) = &features.embedding {
                lookup.entry(handle.clone()).or_insert(idx);
            }
        }
        Self { lookup }
    }

    pub fn resolve(&self, reference: &str) -> Option<usize> {
        self.lookup.get(reference).copied()
    }
}

/// Pairs reported by the near-duplicate map, translated to entity indices.
///
/// References that do not resolve to an entity of `table` are skipped. A
/// pair reported more than once is kept once, with its highest score.
pub fn prefiltered(
    near_duplicates: &NearDuplicateMap,
    table: &EntityTable,
    images: &ImageMap,
) -> Vec<CandidatePair> {
    let index = ReferenceIndex::build(table, images);
    let mut pairs: BTreeMap<(usize, usize), Option<f64>> = BTreeMap::new();
    let mut unresolved = 0usize;

    for (reference, matches) in near_duplicates {
        let Some(x) = index.resolve(reference) else {
            debug!("Skipping unresolved image reference {:?}", reference);
            unresolved += 1;
            continue;
        };

        for (other, score) in matches {
            let Some(y) = index.resolve(other) else {
                debug!("Skipping unresolved image reference {:?}", other);
                unresolved += 1;
                continue;
            };
            let score = score.is_finite().then_some(*score);
            let Some(pair) = CandidatePair::new(x, y, score) else {
                continue;
            };

            pairs
                .entry((pair.a, pair.b))
                .and_modify(|kept| *kept = max_score(*kept, score))
                .or_insert(score);
        }
    }

    info!(
        "Pre-filter produced {} candidate pairs ({} unresolved references skipped)",
        pairs.len(),
        unresolved
    );

    pairs
        .into_iter()
        .map(|((a, b), primary_score)| CandidatePair {
            a,
            b,
            primary_score,
        })
        .collect()
}

fn max_score(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureSet;
    use std::path::PathBuf;

    fn table(ids: &[&str]) -> EntityTable {
        let mut table = EntityTable::new();
        for id in ids {
            table.insert(
                *id,
                FeatureSet {
                    phash: Some("ff".into()),
                    ..Default::default()
                },
            );
        }
        table
    }

    #[test]
    fn test_exhaustive_counts() {
        assert!(exhaustive(0).is_empty());
        assert!(exhaustive(1).is_empty());
        assert_eq!(exhaustive(5).len(), 10);
        assert!(exhaustive(6).iter().all(|p| p.a < p.b));
    }

    #[test]
    fn test_pair_never_self() {
        assert!(CandidatePair::new(3, 3, None).is_none());
        let pair = CandidatePair::new(4, 1, Some(0.5)).unwrap();
        assert_eq!((pair.a, pair.b), (1, 4));
    }

    #[test]
    fn test_prefiltered_resolves_and_dedupes() {
        let table = table(&["a.com", "b.com", "c.com"]);
        let mut images = ImageMap::new();
        images.insert("a.com".into(), PathBuf::from("/tmp/images/a.com.jpg"));
        images.insert("b.com".into(), PathBuf::from("/tmp/images/b.com.jpg"));
        images.insert("c.com".into(), PathBuf::from("/tmp/images/c.com.jpg"));

        let mut dups = NearDuplicateMap::new();
        dups.insert(
            "a.com.jpg".into(),
            vec![
                ("b.com.jpg".into(), 0.91),
                ("a.com.jpg".into(), 1.0),
                ("gone.jpg".into(), 0.99),
            ],
        );
        dups.insert("/tmp/images/b.com.jpg".into(), vec![("a.com.jpg".into(), 0.95)]);
        dups.insert("orphan.jpg".into(), vec![("c.com.jpg".into(), 0.9)]);

        let pairs = prefiltered(&dups, &table, &images);
        assert_eq!(pairs.len(), 1);
        assert_eq!((pairs[0].a, pairs[0].b), (0, 1));
        assert_eq!(pairs[0].primary_score, Some(0.95));
    }

    #[test]
    fn test_prefiltered_skips_entities_outside_table() {
        // "b.com" has an image but was filtered out of the table
        let table = table(&["a.com", "c.com"]);
        let mut images = ImageMap::new();
        images.insert("a.com".into(), PathBuf::from("a.jpg"));
        images.insert("b.com".into(), PathBuf::from("b.jpg"));
        images.insert("c.com".into(), PathBuf::from("c.jpg"));

        let mut dups = NearDuplicateMap::new();
        dups.insert("a.jpg".into(), vec![("b.jpg".into(), 0.9), ("c.jpg".into(), f64::NAN)]);

        let pairs = prefiltered(&dups, &table, &images);
        assert_eq!(pairs.len(), 1);
        assert_eq!((pairs[0].a, pairs[0].b), (0, 1));
        assert_eq!(pairs[0].primary_score, None);
    }

    #[test]
    fn test_embedding_handle_resolves() {
        let mut table = EntityTable::new();
        table.insert(
            "x.com",
            FeatureSet {
                embedding: Some(Embedding::Reference("x-logo".into())),
                ..Default::default()
            },
        );
        table.insert(
            "y.com",
            FeatureSet {
                embedding: Some(Embedding::Reference("y-logo".into())),
                ..Default::default()
            },
        );

        let mut dups = NearDuplicateMap::new();
        dups.insert("x-logo".into(), vec![("y-logo".into(), 0.97)]);

        let pairs = prefiltered(&dups, &table, &ImageMap::new());
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].primary_score, Some(0.97));
    }
}
