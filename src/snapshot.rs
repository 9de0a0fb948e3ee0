//! One complete, internally consistent batch of fetched facet data.
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::model::{
    IssueCounts, PendingRelease, PrCounts, RegistryEntry, ReleaseInfo, Repo, Traffic,
    WorkflowTimeline,
};

/// Immutable result of a single refresh cycle. Every facet map is keyed by
/// repository name; a missing key is an explicit absence, not a zero value.
/// A snapshot is replaced wholesale on refresh, never patched, so nothing
/// downstream can ever observe data from two different batches at once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<Utc>,
    pub repos: Vec<Repo>,
    /// Per repo, the ordered list of workflow timelines in first-seen order.
    #[serde(default)]
    pub workflows: HashMap<String, Vec<WorkflowTimeline>>,
    #[serde(default)]
    pub issue_counts: HashMap<String, IssueCounts>,
    #[serde(default)]
    pub pr_counts: HashMap<String, PrCounts>,
    #[serde(default)]
    pub releases: HashMap<String, ReleaseInfo>,
    #[serde(default)]
    pub registry: HashMap<String, RegistryEntry>,
    #[serde(default)]
    pub pending_releases: HashMap<String, PendingRelease>,
    #[serde(default)]
    pub coverage: HashMap<String, f64>,
    #[serde(default)]
    pub traffic: HashMap<String, Traffic>,
}

impl DashboardSnapshot {
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            repos: Vec::new(),
            workflows: HashMap::new(),
            issue_counts: HashMap::new(),
            pr_counts: HashMap::new(),
            releases: HashMap::new(),
            registry: HashMap::new(),
            pending_releases: HashMap::new(),
            coverage: HashMap::new(),
            traffic: HashMap::new(),
        }
    }

    /// True when the fetch itself found no repositories. Distinct from an
    /// over-restrictive filter producing no matches downstream.
    pub fn has_no_repos(&self) -> bool {
        self.repos.is_empty()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid snapshot JSON in {}", path.display()))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let content = serde_json::to_string_pretty(self).context("failed to encode snapshot")?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write snapshot {}", path.display()))
    }
}
