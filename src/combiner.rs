//! Merges per-signal distances into one accept/reject decision.

use crate::config::SignalWeights;
use crate::features::{FeatureSet, HashKind, SignalKind};
use crate::similarity::{color_distance, cosine_distance, embedding_distance, normalized_hamming};

const SIGNAL_ORDER: [SignalKind; 6] = [
    SignalKind::Phash,
    SignalKind::Dhash,
    SignalKind::Ahash,
    SignalKind::Whash,
    SignalKind::Color,
    SignalKind::Embedding,
];

/// How per-signal distances turn into a decision.
#[derive(Debug, Clone, PartialEq)]
pub enum SimilarityPolicy {
    /// Weighted mean of the available signal distances, accepted at or below
    /// `accept_threshold`.
    WeightedAverage {
        weights: SignalWeights,
        accept_threshold: f64,
    },
    /// `primary` must reach `primary_threshold` similarity; a `secondary`
    /// similarity below `veto_floor` then rejects the pair anyway.
    PrimaryWithVeto {
        primary: SignalKind,
        primary_threshold: f64,
        secondary: SignalKind,
        veto_floor: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    AboveThreshold,
    NoSignals,
    PrimaryBelowThreshold,
    Vetoed,
    Invalid,
}

/// The combiner's verdict for one pair.
///
/// Under the weighted-average policy `distance` is the combined distance
/// whether or not the pair was accepted. Under primary-with-veto it is the
/// primary distance for accepted pairs and 1.0 otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub distance: f64,
    pub verdict: Verdict,
    pub signals: usize,
}

impl Decision {
    fn reject(verdict: Verdict, signals: usize) -> Self {
        Self {
            distance: 1.0,
            verdict,
            signals,
        }
    }

    pub fn accepted(&self) -> bool {
        self.verdict == Verdict::Accepted
    }
}

/// One side of a comparison: the entity's features plus the dominant color
/// resolved for this pass, which may come from the image rather than the
/// feature set.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedFeatures<'a> {
    pub features: &'a FeatureSet,
    pub color: Option<[f64; 3]>,
}

impl<'a> ResolvedFeatures<'a> {
    pub fn new(features: &'a FeatureSet) -> Self {
        Self {
            features,
            color: features.color(),
        }
    }

    pub fn with_color(features: &'a FeatureSet, color: Option<[f64; 3]>) -> Self {
        Self { features, color }
    }
}

/// Distance for a single signal, `None` when either side lacks it.
pub fn signal_distance(
    kind: SignalKind,
    a: &ResolvedFeatures<'_>,
    b: &ResolvedFeatures<'_>,
    primary_score: Option<f64>,
) -> Option<f64> {
    let hash = |k: HashKind| normalized_hamming(a.features.hash(k)?, b.features.hash(k)?);
    match kind {
        SignalKind::Phash => hash(HashKind::Phash),
        SignalKind::Dhash => hash(HashKind::Dhash),
        SignalKind::Ahash => hash(HashKind::Ahash),
        SignalKind::Whash => hash(HashKind::Whash),
        SignalKind::Color => Some(color_distance(a.color.as_ref()?, b.color.as_ref()?)),
        SignalKind::Embedding => primary_score.and_then(embedding_distance).or_else(|| {
            let va = a.features.embedding.as_ref()?.as_vector()?;
            let vb = b.features.embedding.as_ref()?.as_vector()?;
            cosine_distance(va, vb)
        }),
    }
}

/// Similarity for a single signal. An external embedding score is used as
/// given (clamped) so thresholds compare against the score itself.
pub fn signal_similarity(
    kind: SignalKind,
    a: &ResolvedFeatures<'_>,
    b: &ResolvedFeatures<'_>,
    primary_score: Option<f64>,
) -> Option<f64> {
    if kind == SignalKind::Embedding {
        if let Some(score) = primary_score.filter(|s| s.is_finite()) {
            return Some(score.clamp(0.0, 1.0));
        }
    }
    signal_distance(kind, a, b, primary_score).map(|d| 1.0 - d)
}

#[derive(Debug, Clone)]
pub struct Combiner {
    policy: SimilarityPolicy,
}

impl Combiner {
    pub fn new(policy: SimilarityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SimilarityPolicy {
        &self.policy
    }

    /// Decide one pair. Never fails: anything that cannot be computed is a
    /// rejection.
    pub fn decide(
        &self,
        a: &ResolvedFeatures<'_>,
        b: &ResolvedFeatures<'_>,
        primary_score: Option<f64>,
    ) -> Decision {
        match &self.policy {
            SimilarityPolicy::WeightedAverage {
                weights,
                accept_threshold,
            } => weighted_average(weights, *accept_threshold, a, b, primary_score),
            SimilarityPolicy::PrimaryWithVeto {
                primary,
                primary_threshold,
                secondary,
                veto_floor,
            } => {
                let Some(primary_similarity) = signal_similarity(*primary, a, b, primary_score)
                else {
                    return Decision::reject(Verdict::NoSignals, 0);
                };
                let secondary_similarity = signal_similarity(*secondary, a, b, primary_score);
                let signals = 1 + usize::from(secondary_similarity.is_some());

                if !primary_similarity.is_finite() {
                    return Decision::reject(Verdict::Invalid, signals);
                }
                if primary_similarity < *primary_threshold {
                    return Decision::reject(Verdict::PrimaryBelowThreshold, signals);
                }
                match secondary_similarity {
                    Some(sim) if !sim.is_finite() || sim < *veto_floor => {
                        Decision::reject(Verdict::Vetoed, signals)
                    }
                    _ => Decision {
                        distance: 1.0 - primary_similarity,
                        verdict: Verdict::Accepted,
                        signals,
                    },
                }
            }
        }
    }
}

fn weighted_average(
    weights: &SignalWeights,
    accept_threshold: f64,
    a: &ResolvedFeatures<'_>,
    b: &ResolvedFeatures<'_>,
    primary_score: Option<f64>,
) -> Decision {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    let mut signals = 0;

    for kind in SIGNAL_ORDER {
        let weight = weights.get(kind);
        if !(weight.is_finite() && weight > 0.0) {
            continue;
        }
        if let Some(distance) = signal_distance(kind, a, b, primary_score) {
            weighted_sum += distance * weight;
            total_weight += weight;
            signals += 1;
        }
    }

    if signals == 0 {
        return Decision::reject(Verdict::NoSignals, 0);
    }

    let combined = weighted_sum / total_weight;
    if !combined.is_finite() {
        return Decision::reject(Verdict::Invalid, signals);
    }

    let verdict = if combined <= accept_threshold {
        Verdict::Accepted
    } else {
        Verdict::AboveThreshold
    };
    Decision {
        distance: combined,
        verdict,
        signals,
    }
}
