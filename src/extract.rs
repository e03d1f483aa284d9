//! Feature extraction from a directory of downloaded logo images.
//!
//! Produces the [`EntityRecord`] rows the engine consumes: perceptual
//! hashes as hex strings and a dominant color per image. The website
//! identifier is the image's file stem.

use image::ImageReader;
use image_hasher::{HashAlg, Hasher, HasherConfig};
use log::warn;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::color::dominant_color;
use crate::error::Result;
use crate::features::{EntityRecord, FeatureSet};

pub const DEFAULT_HASH_SIZE: u32 = 16;

const ALLOWED_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp"];

/// Recursively walk `dir`, returning image file paths in sorted order.
pub fn scan_directory(dir: &Path) -> Vec<PathBuf> {
    let mut images: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        })
        .collect();
    images.sort();
    images
}

pub struct FeatureExtractor {
    phash: Hasher,
    dhash: Hasher,
    ahash: Hasher,
}

impl FeatureExtractor {
    pub fn new(hash_size: u32) -> Self {
        let config = || HasherConfig::new().hash_size(hash_size, hash_size);
        Self {
            phash: config().hash_alg(HashAlg::Mean).preproc_dct().to_hasher(),
            dhash: config().hash_alg(HashAlg::Gradient).to_hasher(),
            ahash: config().hash_alg(HashAlg::Mean).to_hasher(),
        }
    }

    /// Decode one image and compute its features.
    pub fn extract(&self, path: &Path) -> Result<FeatureSet> {
        let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        Ok(FeatureSet {
            phash: Some(to_hex(self.phash.hash_image(&img).as_bytes())),
            dhash: Some(to_hex(self.dhash.hash_image(&img).as_bytes())),
            ahash: Some(to_hex(self.ahash.hash_image(&img).as_bytes())),
            whash: None,
            dominant_color: dominant_color(&img),
            embedding: None,
        })
    }

    /// Extract every image in parallel. Files that fail to decode are
    /// skipped with a warning.
    pub fn extract_all(&self, paths: &[PathBuf]) -> Vec<EntityRecord> {
        paths
            .par_iter()
            .filter_map(|path| {
                let entity = path.file_stem()?.to_string_lossy().into_owned();
                match self.extract(path) {
                    Ok(features) => Some(EntityRecord {
                        entity,
                        image: Some(path.clone()),
                        features,
                    }),
                    Err(e) => {
                        warn!("Skipping {}: {}", path.display(), e);
                        None
                    }
                }
            })
            .collect()
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_SIZE)
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::normalized_hamming;
    use image::{Rgb, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    fn logo(width: u32, height: u32, fg: [u8; 3]) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            if x < width / 2 && y < height / 2 {
                Rgb(fg)
            } else {
                Rgb([255, 255, 255])
            }
        })
    }

    #[test]
    fn test_scan_directory_filters_extensions() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        logo(8, 8, [0, 0, 0]).save(temp_dir.path().join("b.png")).unwrap();
        logo(8, 8, [0, 0, 0]).save(nested.join("a.PNG")).unwrap();
        fs::write(temp_dir.path().join("notes.txt"), b"hi").unwrap();

        let images = scan_directory(temp_dir.path());
        assert_eq!(images.len(), 2);
        assert!(images.iter().all(|p| p.extension().unwrap() != "txt"));
    }

    #[test]
    fn test_hashes_are_hex_of_expected_length() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("site.com.png");
        logo(64, 64, [10, 10, 200]).save(&path).unwrap();

        let features = FeatureExtractor::new(8).extract(&path).unwrap();
        let phash = features.phash.unwrap();
        assert_eq!(phash.len(), 16);
        assert!(phash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(features.dhash.unwrap().len(), 16);
        assert!(features.dominant_color.is_some());
    }

    #[test]
    fn test_resized_copy_hashes_close() {
        let temp_dir = TempDir::new().unwrap();
        let small = temp_dir.path().join("small.png");
        let large = temp_dir.path().join("large.png");
        logo(64, 64, [0, 0, 0]).save(&small).unwrap();
        logo(256, 256, [0, 0, 0]).save(&large).unwrap();

        let extractor = FeatureExtractor::default();
        let a = extractor.extract(&small).unwrap();
        let b = extractor.extract(&large).unwrap();
        let distance = normalized_hamming(&a.ahash.unwrap(), &b.ahash.unwrap()).unwrap();
        assert!(distance < 0.1, "distance {distance}");
    }

    #[test]
    fn test_extract_all_skips_broken_files() {
        let temp_dir = TempDir::new().unwrap();
        let good = temp_dir.path().join("good.com.png");
        let bad = temp_dir.path().join("bad.com.png");
        logo(32, 32, [0, 0, 0]).save(&good).unwrap();
        fs::write(&bad, b"not an image").unwrap();

        let records = FeatureExtractor::default().extract_all(&[good, bad]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entity, "good.com");
    }
}
