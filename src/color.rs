//! Dominant-color sampling and the per-pass color cache.

use image::{DynamicImage, imageops::FilterType};
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::Result;

const SAMPLE_SIZE: u32 = 64;
const BUCKET_SHIFT: u8 = 5;
const BACKGROUND_FLOOR: u8 = 240;

/// Most common color of an image, quantized to 8 levels per channel and
/// averaged inside the winning bucket.
///
/// Near-white pixels are skipped unless nothing else is left, since logos
/// arrive with their transparency flattened onto white.
pub fn dominant_color(img: &DynamicImage) -> Option<[f64; 3]> {
    let thumb = img
        .resize(SAMPLE_SIZE, SAMPLE_SIZE, FilterType::Triangle)
        .to_rgb8();
    let pixels: Vec<[u8; 3]> = thumb.pixels().map(|p| p.0).collect();
    if pixels.is_empty() {
        return None;
    }

    let foreground: Vec<[u8; 3]> = pixels
        .iter()
        .copied()
        .filter(|p| p.iter().any(|&c| c < BACKGROUND_FLOOR))
        .collect();
    let sample = if foreground.is_empty() {
        &pixels
    } else {
        &foreground
    };

    let mut buckets: BTreeMap<[u8; 3], (u64, [u64; 3])> = BTreeMap::new();
    for p in sample {
        let key = [p[0] >> BUCKET_SHIFT, p[1] >> BUCKET_SHIFT, p[2] >> BUCKET_SHIFT];
        let entry = buckets.entry(key).or_insert((0, [0; 3]));
        entry.0 += 1;
        for (sum, &c) in entry.1.iter_mut().zip(p.iter()) {
            *sum += u64::from(c);
        }
    }

    // Ties go to the lowest bucket key.
    let mut best: Option<(u64, [u64; 3])> = None;
    for &(count, sums) in buckets.values() {
        if best.is_none_or(|(c, _)| count > c) {
            best = Some((count, sums));
        }
    }

    best.map(|(count, sums)| sums.map(|s| s as f64 / count as f64))
}

/// Decode an image from disk and sample its dominant color.
pub fn sample_dominant_color(path: &Path) -> Result<Option<[f64; 3]>> {
    let img = image::open(path)?;
    Ok(dominant_color(&img))
}

/// Memoized dominant colors keyed by image path.
///
/// Owned by one [`crate::Engine`] and cleared at the start of every pass.
/// Failed samples are cached as `None` so a broken file is decoded once.
#[derive(Debug, Default)]
pub struct ColorCache {
    entries: HashMap<PathBuf, Option<[f64; 3]>>,
    hits: usize,
    misses: usize,
}

impl ColorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, path: &Path) -> Option<Option<[f64; 3]>> {
        self.entries.get(path).copied()
    }

    pub fn insert(&mut self, path: PathBuf, color: Option<[f64; 3]>) {
        self.entries.insert(path, color);
    }

    /// Cached color for `path`, sampling the file on first access.
    pub fn get_or_load(&mut self, path: &Path) -> Option<[f64; 3]> {
        if let Some(color) = self.lookup(path) {
            self.hits += 1;
            return color;
        }

        self.misses += 1;
        let color = match sample_dominant_color(path) {
            Ok(color) => color,
            Err(e) => {
                debug!("Color sampling failed for {}: {}", path.display(), e);
                None
            }
        };
        self.insert(path.to_path_buf(), color);
        color
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}
