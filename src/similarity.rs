//! Pairwise distance functions.
//!
//! Every function here reports a *distance* in `[0, 1]`, 0 meaning
//! identical. Similarity is `1 - distance` and is only computed at the
//! boundary where a policy states thresholds as similarities.

use crate::features::is_valid_hex;

/// Largest Euclidean distance inside the RGB cube.
pub const MAX_COLOR_DISTANCE: f64 = 441.672_955_930_063_7; // sqrt(3) * 255

/// Normalized Hamming distance between two hex-encoded bit hashes.
///
/// `None` when either hash is empty, holds a non-hex character, or the two
/// differ in length.
pub fn normalized_hamming(a: &str, b: &str) -> Option<f64> {
    if a.len() != b.len() || !is_valid_hex(a) || !is_valid_hex(b) {
        return None;
    }

    let mut differing = 0u32;
    for (x, y) in a.chars().zip(b.chars()) {
        let x = x.to_digit(16)?;
        let y = y.to_digit(16)?;
        differing += (x ^ y).count_ones();
    }

    let total_bits = (a.len() * 4) as f64;
    Some(f64::from(differing) / total_bits)
}

/// Like [`normalized_hamming`] but reports the worst case, 1.0, for hashes
/// that cannot be compared.
pub fn hash_distance(a: &str, b: &str) -> f64 {
    normalized_hamming(a, b).unwrap_or(1.0)
}

/// Euclidean distance between two RGB colors, scaled into `[0, 1]`.
pub fn color_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
    (sq.sqrt() / MAX_COLOR_DISTANCE).clamp(0.0, 1.0)
}

pub fn color_similarity(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    1.0 - color_distance(a, b)
}

/// Distance for an externally supplied similarity score.
pub fn embedding_distance(score: f64) -> Option<f64> {
    score.is_finite().then(|| 1.0 - score.clamp(0.0, 1.0))
}

/// Cosine distance `1 - cos`, clamped into `[0, 1]`.
///
/// Only used when no external score exists for the pair.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    let distance = 1.0 - dot / (norm_a.sqrt() * norm_b.sqrt());
    distance.is_finite().then(|| distance.clamp(0.0, 1.0))
}
