use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a workflow run as reported by the CI platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
        }
    }
}

/// Terminal outcome of a completed run. A run that is still queued or in
/// progress has no conclusion (`None`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    Success,
    Failure,
    Cancelled,
}

impl Conclusion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Conclusion::Success => "success",
            Conclusion::Failure => "failure",
            Conclusion::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobBreakdown {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
}

/// Per-run detail. Most runs carry nothing beyond their conclusion; runs for
/// which the provider fetched job-level results carry a breakdown that the
/// renderer turns into a stacked bar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(untagged)]
pub enum RunDetail {
    Jobs(JobBreakdown),
    #[default]
    Plain,
}

impl RunDetail {
    pub fn is_plain(&self) -> bool {
        matches!(self, RunDetail::Plain)
    }

    pub fn jobs(&self) -> Option<&JobBreakdown> {
        match self {
            RunDetail::Jobs(j) => Some(j),
            RunDetail::Plain => None,
        }
    }
}

/// One workflow run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub status: RunStatus,
    pub conclusion: Option<Conclusion>,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, rename = "jobs", skip_serializing_if = "RunDetail::is_plain")]
    pub detail: RunDetail,
}

/// Ordered run history (oldest to newest) for one named workflow of one repo.
/// Ordering is owned by the data provider and trusted as-is downstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowTimeline {
    pub name: String,
    pub runs: Vec<RunSummary>,
}

impl WorkflowTimeline {
    /// Chronologically last run of the timeline.
    pub fn latest(&self) -> Option<&RunSummary> {
        self.runs.last()
    }
}

/// Static per-repository facts. Replaced wholesale on every refresh, never
/// mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Repo {
    pub name: String,
    pub html_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub private: bool,
    pub default_branch: String,
    pub pushed_at: DateTime<Utc>,
    #[serde(default)]
    pub has_pages: bool,
    #[serde(default)]
    pub archived: bool,
}

impl Repo {
    pub fn visibility(&self) -> &'static str {
        if self.private {
            "private"
        } else {
            "public"
        }
    }
}

/// A published release. After aggregation there is at most one of these per
/// repo, whether it came from a platform release or a registry entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseInfo {
    #[serde(rename = "tag_name")]
    pub tag: String,
    pub html_url: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// Registry-provenance release data. Only the aggregator ever sees this; it
/// is folded into a `ReleaseInfo` before anything downstream runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryEntry {
    pub version: String,
    pub registry_url: String,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// An in-flight registry submission. Distinct from a published release; a
/// repo may show both at once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingRelease {
    pub version: String,
    pub html_url: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssueCounts {
    pub open: u64,
    pub closed: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrCounts {
    pub open: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Traffic {
    pub views: u64,
    pub uniques: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn run(detail: RunDetail) -> RunSummary {
        RunSummary {
            status: RunStatus::Completed,
            conclusion: Some(Conclusion::Success),
            html_url: "https://example.com/run/1".into(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            detail,
        }
    }

    #[test]
    fn plain_run_omits_jobs_field() {
        let json = serde_json::to_value(run(RunDetail::Plain)).unwrap();
        assert!(json.get("jobs").is_none());
        let back: RunSummary = serde_json::from_value(json).unwrap();
        assert!(back.detail.is_plain());
    }

    #[test]
    fn jobs_run_serializes_breakdown_inline() {
        let breakdown = JobBreakdown {
            total: 5,
            passed: 4,
            failed: 1,
        };
        let json = serde_json::to_value(run(RunDetail::Jobs(breakdown))).unwrap();
        assert_eq!(json["jobs"]["total"], 5);
        let back: RunSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back.detail.jobs(), Some(&breakdown));
    }

    #[test]
    fn release_uses_platform_field_names() {
        let json = serde_json::json!({
            "tag_name": "v1.2.0",
            "html_url": "https://example.com/releases/v1.2.0",
            "published_at": null,
        });
        let rel: ReleaseInfo = serde_json::from_value(json).unwrap();
        assert_eq!(rel.tag, "v1.2.0");
        assert!(rel.published_at.is_none());
    }

    #[test]
    fn timeline_latest_is_last_entry() {
        let mut first = run(RunDetail::Plain);
        first.conclusion = Some(Conclusion::Failure);
        let tl = WorkflowTimeline {
            name: "CI".into(),
            runs: vec![first, run(RunDetail::Plain)],
        };
        assert_eq!(tl.latest().unwrap().conclusion, Some(Conclusion::Success));
    }
}
