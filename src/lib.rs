//! Logo deduplication across websites.
//!
//! Given a feature representation per website (perceptual hashes, a
//! dominant color, a learned embedding or a handle to one), `logomatch`
//! decides which websites show the same logo and partitions them into
//! groups.
//!
//! ```rust
//! use logomatch::{Engine, EngineConfig, EntityTable, FeatureSet, ImageMap};
//!
//! let mut table = EntityTable::new();
//! for (site, hash) in [("a.com", "ff00ff00"), ("b.com", "ff00ff01"), ("c.com", "00ff00ff")] {
//!     table.insert(site, FeatureSet { phash: Some(hash.into()), ..Default::default() });
//! }
//!
//! let mut engine = Engine::new(EngineConfig::default()).unwrap();
//! let groups = engine.run(&table, &ImageMap::new(), None).unwrap();
//! assert_eq!(groups[0].members, vec!["a.com", "b.com"]);
//! assert_eq!(groups[1].members, vec!["c.com"]);
//! ```

#![forbid(unsafe_code)]

pub mod candidates;
pub mod cluster;
pub mod color;
pub mod combiner;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod features;
pub mod report;
pub mod similarity;

pub use cluster::{ClusteringStrategy, Group};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use features::{EntityTable, FeatureSet, ImageMap, NearDuplicateMap};
