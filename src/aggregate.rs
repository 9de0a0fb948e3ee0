//! Reconciles the per-facet maps of a snapshot into one view record per repo.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{
    Conclusion, IssueCounts, PendingRelease, PrCounts, RegistryEntry, ReleaseInfo, Repo,
    RunSummary, Traffic, WorkflowTimeline,
};
use crate::snapshot::DashboardSnapshot;

/// Display name of the primary workflow.
pub const CI_WORKFLOW: &str = "CI";

static DOCS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)docs|documentation").expect("valid docs pattern"));

/// Whether a workflow display name identifies the documentation workflow.
/// Case-insensitive substring match; when several workflows match, the first
/// one in timeline insertion order wins.
pub fn is_docs_workflow(name: &str) -> bool {
    DOCS_PATTERN.is_match(name)
}

/// Fully resolved per-repository view. Owned by the aggregator and rebuilt
/// from scratch on every refresh; `None` always means "no data", never "zero".
#[derive(Debug, Clone, PartialEq)]
pub struct RepoView {
    pub repo: Repo,
    /// All timelines for the repo, or `None` when the workflow facet had no
    /// entry at all (distinct from an empty list of timelines).
    pub workflows: Option<Vec<WorkflowTimeline>>,
    pub release: Option<ReleaseInfo>,
    pub pending: Option<PendingRelease>,
    pub issues: Option<IssueCounts>,
    pub prs: Option<PrCounts>,
    pub coverage: Option<f64>,
    pub traffic: Option<Traffic>,
}

impl RepoView {
    pub fn timeline(&self, name: &str) -> Option<&WorkflowTimeline> {
        self.workflows
            .as_deref()?
            .iter()
            .find(|tl| tl.name == name)
    }

    pub fn ci_timeline(&self) -> Option<&WorkflowTimeline> {
        self.timeline(CI_WORKFLOW)
    }

    /// First docs-matching timeline in insertion order.
    pub fn docs_timeline(&self) -> Option<&WorkflowTimeline> {
        self.workflows
            .as_deref()?
            .iter()
            .find(|tl| is_docs_workflow(&tl.name))
    }

    pub fn latest_ci(&self) -> Option<&RunSummary> {
        self.ci_timeline().and_then(WorkflowTimeline::latest)
    }

    pub fn latest_docs(&self) -> Option<&RunSummary> {
        self.docs_timeline().and_then(WorkflowTimeline::latest)
    }

    pub fn ci_conclusion(&self) -> Option<Conclusion> {
        self.latest_ci().and_then(|run| run.conclusion)
    }
}

/// Prefix a registry version with `v` unless it already carries one.
pub fn ensure_v_prefix(version: &str) -> String {
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{version}")
    }
}

/// Synthesize a release record from a registry entry. Used only when the repo
/// has no platform release; the two provenances are never field-merged.
pub fn release_from_registry(entry: &RegistryEntry) -> ReleaseInfo {
    ReleaseInfo {
        tag: ensure_v_prefix(&entry.version),
        html_url: entry.registry_url.clone(),
        published_at: entry.published_at,
    }
}

/// Build one `RepoView` per repository from a settled snapshot. Pure function
/// of its input; views come out in `snapshot.repos` order.
pub fn aggregate(snapshot: &DashboardSnapshot) -> Vec<RepoView> {
    snapshot
        .repos
        .iter()
        .map(|repo| {
            let name = repo.name.as_str();
            let release = snapshot.releases.get(name).cloned().or_else(|| {
                snapshot.registry.get(name).map(release_from_registry)
            });
            RepoView {
                repo: repo.clone(),
                workflows: snapshot.workflows.get(name).cloned(),
                release,
                pending: snapshot.pending_releases.get(name).cloned(),
                issues: snapshot.issue_counts.get(name).copied(),
                prs: snapshot.pr_counts.get(name).copied(),
                coverage: snapshot.coverage.get(name).copied(),
                traffic: snapshot.traffic.get(name).copied(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RunDetail, RunStatus};
    use chrono::{TimeZone, Utc};

    fn repo(name: &str) -> Repo {
        Repo {
            name: name.into(),
            html_url: format!("https://github.com/acme/{name}"),
            description: None,
            language: Some("Julia".into()),
            private: false,
            default_branch: "main".into(),
            pushed_at: Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap(),
            has_pages: false,
            archived: false,
        }
    }

    fn run(conclusion: Option<Conclusion>) -> RunSummary {
        RunSummary {
            status: RunStatus::Completed,
            conclusion,
            html_url: "https://example.com/run".into(),
            created_at: Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap(),
            detail: RunDetail::Plain,
        }
    }

    fn snapshot_with(repos: Vec<Repo>) -> DashboardSnapshot {
        let mut snap =
            DashboardSnapshot::empty(Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap());
        snap.repos = repos;
        snap
    }

    #[test]
    fn platform_release_wins_over_registry() {
        let mut snap = snapshot_with(vec![repo("Foo.jl")]);
        snap.releases.insert(
            "Foo.jl".into(),
            ReleaseInfo {
                tag: "v1.0.0".into(),
                html_url: "https://github.com/acme/Foo.jl/releases/v1.0.0".into(),
                published_at: Some(Utc.with_ymd_and_hms(2026, 7, 1, 0, 0, 0).unwrap()),
            },
        );
        snap.registry.insert(
            "Foo.jl".into(),
            RegistryEntry {
                version: "0.9.0".into(),
                registry_url: "https://example.com/registry/Foo".into(),
                published_at: None,
            },
        );

        let views = aggregate(&snap);
        let release = views[0].release.as_ref().unwrap();
        assert_eq!(release.tag, "v1.0.0");
        assert_eq!(
            release.html_url,
            "https://github.com/acme/Foo.jl/releases/v1.0.0"
        );
        assert!(release.published_at.is_some());
    }

    #[test]
    fn registry_entry_is_synthesized_when_no_platform_release() {
        let mut snap = snapshot_with(vec![repo("Bar.jl")]);
        snap.registry.insert(
            "Bar.jl".into(),
            RegistryEntry {
                version: "2.1.0".into(),
                registry_url: "https://example.com/registry/Bar".into(),
                published_at: None,
            },
        );

        let views = aggregate(&snap);
        let release = views[0].release.as_ref().unwrap();
        assert_eq!(release.tag, "v2.1.0");
        assert_eq!(release.html_url, "https://example.com/registry/Bar");
        assert!(release.published_at.is_none());
    }

    #[test]
    fn v_prefix_is_idempotent() {
        assert_eq!(ensure_v_prefix("1.2.3"), "v1.2.3");
        assert_eq!(ensure_v_prefix("v1.2.3"), "v1.2.3");
    }

    #[test]
    fn docs_predicate_matches_case_insensitive_substring() {
        assert!(is_docs_workflow("Docs"));
        assert!(is_docs_workflow("Build documentation"));
        assert!(is_docs_workflow("docs-deploy"));
        assert!(!is_docs_workflow("CI"));
        assert!(!is_docs_workflow("Release"));
    }

    #[test]
    fn first_docs_timeline_wins() {
        let mut snap = snapshot_with(vec![repo("Foo.jl")]);
        snap.workflows.insert(
            "Foo.jl".into(),
            vec![
                WorkflowTimeline {
                    name: "CI".into(),
                    runs: vec![run(Some(Conclusion::Success))],
                },
                WorkflowTimeline {
                    name: "Docs".into(),
                    runs: vec![run(Some(Conclusion::Failure))],
                },
                WorkflowTimeline {
                    name: "Documentation nightly".into(),
                    runs: vec![run(Some(Conclusion::Success))],
                },
            ],
        );

        let views = aggregate(&snap);
        let docs = views[0].docs_timeline().unwrap();
        assert_eq!(docs.name, "Docs");
        assert_eq!(
            views[0].latest_docs().unwrap().conclusion,
            Some(Conclusion::Failure)
        );
    }

    #[test]
    fn absent_facets_stay_absent() {
        let snap = snapshot_with(vec![repo("Quux")]);
        let views = aggregate(&snap);
        let view = &views[0];
        assert!(view.workflows.is_none());
        assert!(view.release.is_none());
        assert!(view.pending.is_none());
        assert!(view.issues.is_none());
        assert!(view.prs.is_none());
        assert!(view.coverage.is_none());
        assert!(view.traffic.is_none());
        assert!(view.ci_conclusion().is_none());
    }

    #[test]
    fn views_follow_snapshot_repo_order() {
        let snap = snapshot_with(vec![repo("B"), repo("A"), repo("C")]);
        let views = aggregate(&snap);
        let names: Vec<&str> = views.iter().map(|v| v.repo.name.as_str()).collect();
        assert_eq!(names, ["B", "A", "C"]);
    }
}
