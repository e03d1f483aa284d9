use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cluster::Group;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::features::ImageMap;

/// Groups listed in the text summary.
const SUMMARY_GROUPS: usize = 20;
/// Members listed per group in the text summary.
const SUMMARY_MEMBERS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Entities passed in.
    pub total: usize,
    /// Entities that ended up in a group.
    pub usable: usize,
    pub groups: usize,
    pub largest: usize,
    pub strategy: String,
    pub policy: String,
    pub accept_threshold: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsiteEntry {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupEntry {
    pub group_id: String,
    pub size: usize,
    pub websites: Vec<WebsiteEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_dominant_color: Option<[u8; 3]>,
}

/// The JSON document written by `logomatch group --output`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupReport {
    pub metadata: ReportMetadata,
    pub groups: Vec<GroupEntry>,
}

impl GroupReport {
    pub fn new(groups: &[Group], total: usize, images: &ImageMap, config: &EngineConfig) -> Self {
        let metadata = ReportMetadata {
            total,
            usable: groups.iter().map(Group::len).sum(),
            groups: groups.len(),
            largest: groups.first().map_or(0, Group::len),
            strategy: config.strategy.name().to_string(),
            policy: config.policy.name().to_string(),
            accept_threshold: config.accept_threshold,
            timestamp: Utc::now().to_rfc3339(),
        };

        let groups = groups
            .iter()
            .map(|group| GroupEntry {
                group_id: format!("group_{}", group.id),
                size: group.len(),
                websites: group
                    .members
                    .iter()
                    .map(|url| WebsiteEntry {
                        url: url.clone(),
                        image: images.get(url).cloned(),
                    })
                    .collect(),
                average_dominant_color: group
                    .average_color
                    .map(|c| c.map(|v| v.round().clamp(0.0, 255.0) as u8)),
            })
            .collect();

        Self { metadata, groups }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Plain-text digest: run totals, then the largest groups with their
    /// first few members.
    pub fn summary(&self) -> String {
        let rule = "=".repeat(80);
        let mut out = format!("{rule}\nLOGO GROUPS\n{rule}\n\n");
        out.push_str(&format!("Input: {}\n", self.metadata.total));
        out.push_str(&format!("Usable: {}\n", self.metadata.usable));
        out.push_str(&format!("Groups: {}\n", self.metadata.groups));
        out.push_str(&format!(
            "Strategy: {} ({}, threshold {})\n\n",
            self.metadata.strategy, self.metadata.policy, self.metadata.accept_threshold
        ));
        out.push_str(&format!("Top Groups:\n{}\n", "-".repeat(40)));

        for (i, group) in self.groups.iter().take(SUMMARY_GROUPS).enumerate() {
            out.push_str(&format!("\nGroup {} ({} websites):\n", i + 1, group.size));
            for site in group.websites.iter().take(SUMMARY_MEMBERS) {
                out.push_str(&format!("  - {}\n", site.url));
            }
            if group.size > SUMMARY_MEMBERS {
                out.push_str(&format!("  ... +{} more\n", group.size - SUMMARY_MEMBERS));
            }
        }
        out
    }

    pub fn write_summary(&self, path: &Path) -> Result<()> {
        fs::write(path, self.summary())?;
        Ok(())
    }
}
