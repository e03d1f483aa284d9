//! Per-website feature representations and the lookup tables the engine
//! consumes.
//!
//! Feature values are produced elsewhere (see [`crate::extract`] or an
//! external embedding service) and are treated here as opaque comparable
//! values. Nothing in this module compares them.

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Perceptual hash families carried as hex strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashKind {
    Phash,
    Dhash,
    Ahash,
    Whash,
}

impl HashKind {
    pub const ALL: [HashKind; 4] = [
        HashKind::Phash,
        HashKind::Dhash,
        HashKind::Ahash,
        HashKind::Whash,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HashKind::Phash => "phash",
            HashKind::Dhash => "dhash",
            HashKind::Ahash => "ahash",
            HashKind::Whash => "whash",
        }
    }
}

/// One kind of comparable signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Phash,
    Dhash,
    Ahash,
    Whash,
    Color,
    Embedding,
}

impl SignalKind {
    pub fn name(self) -> &'static str {
        match self {
            SignalKind::Phash => "phash",
            SignalKind::Dhash => "dhash",
            SignalKind::Ahash => "ahash",
            SignalKind::Whash => "whash",
            SignalKind::Color => "color",
            SignalKind::Embedding => "embedding",
        }
    }
}

impl From<HashKind> for SignalKind {
    fn from(kind: HashKind) -> Self {
        match kind {
            HashKind::Phash => SignalKind::Phash,
            HashKind::Dhash => SignalKind::Dhash,
            HashKind::Ahash => SignalKind::Ahash,
            HashKind::Whash => SignalKind::Whash,
        }
    }
}

/// A learned embedding: either the vector itself or an opaque handle whose
/// similarity is only known through the near-duplicate pre-filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Embedding {
    Vector(Vec<f32>),
    Reference(String),
}

impl Embedding {
    pub fn as_vector(&self) -> Option<&[f32]> {
        match self {
            Embedding::Vector(v) if !v.is_empty() && v.iter().all(|x| x.is_finite()) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ahash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whash: Option<String>,
    /// RGB, 0-255 per channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_color: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Embedding>,
}

impl FeatureSet {
    pub fn hash(&self, kind: HashKind) -> Option<&str> {
        match kind {
            HashKind::Phash => self.phash.as_deref(),
            HashKind::Dhash => self.dhash.as_deref(),
            HashKind::Ahash => self.ahash.as_deref(),
            HashKind::Whash => self.whash.as_deref(),
        }
    }

    /// The dominant color, if present and inside the 0-255 cube.
    pub fn color(&self) -> Option<[f64; 3]> {
        self.dominant_color.filter(|c| is_valid_color(c))
    }

    /// True when at least one signal could take part in a comparison.
    pub fn is_usable(&self) -> bool {
        HashKind::ALL
            .iter()
            .any(|&k| self.hash(k).is_some_and(is_valid_hex))
            || self.color().is_some()
            || match &self.embedding {
                Some(e @ Embedding::Vector(_)) => e.as_vector().is_some(),
                Some(Embedding::Reference(r)) => !r.is_empty(),
                None => false,
            }
    }
}

pub(crate) fn is_valid_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

pub(crate) fn is_valid_color(c: &[f64; 3]) -> bool {
    c.iter().all(|v| v.is_finite() && (0.0..=255.0).contains(v))
}

/// One input row: a website, its local logo image and its features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
    #[serde(default)]
    pub features: FeatureSet,
}

/// Website identifier -> locally stored logo image.
pub type ImageMap = HashMap<String, PathBuf>;

/// Image reference -> near-duplicates reported by an upstream search, as
/// `(other reference, similarity score)`.
pub type NearDuplicateMap = BTreeMap<String, Vec<(String, f64)>>;

/// Entities in first-seen order, addressable by dense index.
#[derive(Debug, Clone, Default)]
pub struct EntityTable {
    ids: Vec<String>,
    features: Vec<FeatureSet>,
    index: HashMap<String, usize>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity. A repeated identifier is ignored and `false` returned.
    pub fn insert(&mut self, id: impl Into<String>, features: FeatureSet) -> bool {
        let id = id.into();
        if self.index.contains_key(&id) {
            return false;
        }
        self.index.insert(id.clone(), self.ids.len());
        self.ids.push(id);
        self.features.push(features);
        true
    }

    /// Build the table and the image map from input rows, keeping the first
    /// row for any repeated website.
    pub fn from_records(records: Vec<EntityRecord>) -> (Self, ImageMap) {
        let mut table = Self::new();
        let mut images = ImageMap::new();
        for record in records {
            if !table.insert(record.entity.clone(), record.features) {
                warn!("Duplicate entity {:?} ignored", record.entity);
                continue;
            }
            if let Some(image) = record.image {
                images.insert(record.entity, image);
            }
        }
        (table, images)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id(&self, idx: usize) -> &str {
        &self.ids[idx]
    }

    pub fn features(&self, idx: usize) -> &FeatureSet {
        &self.features[idx]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str, &FeatureSet)> {
        self.ids
            .iter()
            .zip(self.features.iter())
            .enumerate()
            .map(|(i, (id, f))| (i, id.as_str(), f))
    }

    /// A new table holding only entities with a usable representation, in
    /// the same relative order.
    pub fn usable_subset(&self) -> Self {
        let mut out = Self::new();
        for (_, id, features) in self.iter() {
            if features.is_usable() {
                out.insert(id, features.clone());
            }
        }
        out
    }
}

pub fn load_records(path: &Path) -> Result<Vec<EntityRecord>> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn load_near_duplicates(path: &Path) -> Result<NearDuplicateMap> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_usable_requires_a_well_formed_signal() {
        assert!(!FeatureSet::default().is_usable());

        let bad_hash = FeatureSet {
            phash: Some("not-hex".into()),
            ..Default::default()
        };
        assert!(!bad_hash.is_usable());

        let good_hash = FeatureSet {
            dhash: Some("ff00AA".into()),
            ..Default::default()
        };
        assert!(good_hash.is_usable());

        let out_of_range = FeatureSet {
            dominant_color: Some([300.0, 0.0, 0.0]),
            ..Default::default()
        };
        assert!(!out_of_range.is_usable());

        let reference = FeatureSet {
            embedding: Some(Embedding::Reference("a.jpg".into())),
            ..Default::default()
        };
        assert!(reference.is_usable());

        let empty_vector = FeatureSet {
            embedding: Some(Embedding::Vector(vec![])),
            ..Default::default()
        };
        assert!(!empty_vector.is_usable());
    }

    #[test]
    fn test_table_keeps_first_seen_order() {
        let records = vec![
            EntityRecord {
                entity: "b.com".into(),
                image: Some(PathBuf::from("img/b.jpg")),
                features: FeatureSet::default(),
            },
            EntityRecord {
                entity: "a.com".into(),
                image: None,
                features: FeatureSet::default(),
            },
            EntityRecord {
                entity: "b.com".into(),
                image: Some(PathBuf::from("img/other.jpg")),
                features: FeatureSet::default(),
            },
        ];

        let (table, images) = EntityTable::from_records(records);
        assert_eq!(table.len(), 2);
        assert_eq!(table.id(0), "b.com");
        assert_eq!(table.id(1), "a.com");
        assert_eq!(table.index_of("a.com"), Some(1));
        assert_eq!(images.get("b.com"), Some(&PathBuf::from("img/b.jpg")));
        assert!(!images.contains_key("a.com"));
    }

    #[test]
    fn test_usable_subset_drops_empty_entities() {
        let mut table = EntityTable::new();
        table.insert("x.com", FeatureSet::default());
        table.insert(
            "y.com",
            FeatureSet {
                ahash: Some("abcd".into()),
                ..Default::default()
            },
        );

        let usable = table.usable_subset();
        assert_eq!(usable.len(), 1);
        assert_eq!(usable.id(0), "y.com");
    }

    #[test]
    fn test_load_records_and_near_duplicates() {
        let temp_dir = TempDir::new().unwrap();
        let records_path = temp_dir.path().join("features.json");
        fs::write(
            &records_path,
            r#"[
                {"entity": "a.com", "image": "a.jpg", "features": {"phash": "ff00", "dominant_color": [10, 20, 30]}},
                {"entity": "b.com", "features": {"embedding": [0.1, 0.2]}},
                {"entity": "c.com", "features": {"embedding": "c.jpg"}}
            ]"#,
        )
        .unwrap();

        let records = load_records(&records_path).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].features.color(), Some([10.0, 20.0, 30.0]));
        assert_eq!(
            records[1].features.embedding,
            Some(Embedding::Vector(vec![0.1, 0.2]))
        );
        assert_eq!(
            records[2].features.embedding,
            Some(Embedding::Reference("c.jpg".into()))
        );

        let dup_path = temp_dir.path().join("dups.json");
        fs::write(&dup_path, r#"{"a.jpg": [["c.jpg", 0.91]], "c.jpg": []}"#).unwrap();
        let dups = load_near_duplicates(&dup_path).unwrap();
        assert_eq!(dups["a.jpg"], vec![("c.jpg".to_string(), 0.91)]);
        assert!(dups["c.jpg"].is_empty());
    }
}
