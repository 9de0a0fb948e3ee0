//! Filtering, ordering and grouping of aggregated repo views.
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::aggregate::RepoView;
use crate::model::{Conclusion, RunStatus, RunSummary};

pub const GROUP_PACKAGES: &str = "Julia Packages";
pub const GROUP_OTHER: &str = "Other";

/// Whether a repo belongs to the tracked package ecosystem, by the naming
/// convention of its registry (e.g. the `.jl` suffix).
pub fn is_package_repo(name: &str, suffix: &str) -> bool {
    name.ends_with(suffix)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Name,
    Pushed,
    Status,
    Docs,
    Release,
    Issues,
    Prs,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Pushed => "pushed",
            SortKey::Status => "status",
            SortKey::Docs => "docs",
            SortKey::Release => "release",
            SortKey::Issues => "issues",
            SortKey::Prs => "prs",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "name" => Some(SortKey::Name),
            "pushed" => Some(SortKey::Pushed),
            "status" => Some(SortKey::Status),
            "docs" => Some(SortKey::Docs),
            "release" => Some(SortKey::Release),
            "issues" => Some(SortKey::Issues),
            "prs" => Some(SortKey::Prs),
            _ => None,
        }
    }

    /// Direction a key starts in when newly selected.
    pub fn default_dir(&self) -> SortDir {
        match self {
            SortKey::Name => SortDir::Asc,
            _ => SortDir::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn flip(&self) -> Self {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }

    fn apply(&self, ord: Ordering) -> Ordering {
        match self {
            SortDir::Asc => ord,
            SortDir::Desc => ord.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReleasedFilter {
    #[default]
    Any,
    Yes,
    No,
}

impl ReleasedFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleasedFilter::Any => "",
            ReleasedFilter::Yes => "yes",
            ReleasedFilter::No => "no",
        }
    }

    /// Empty string means no filtering.
    pub fn parse(s: &str) -> Self {
        match s {
            "yes" => ReleasedFilter::Yes,
            "no" => ReleasedFilter::No,
            _ => ReleasedFilter::Any,
        }
    }
}

/// Active filter dimensions. `None`/`Any` dimensions are no-ops; active ones
/// combine conjunctively.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Filters {
    pub language: Option<String>,
    pub visibility: Option<String>,
    pub released: ReleasedFilter,
}

impl Filters {
    fn keeps(&self, view: &RepoView) -> bool {
        if let Some(lang) = &self.language {
            if view.repo.language.as_deref() != Some(lang.as_str()) {
                return false;
            }
        }
        if let Some(vis) = &self.visibility {
            if view.repo.visibility() != vis {
                return false;
            }
        }
        match self.released {
            ReleasedFilter::Any => true,
            ReleasedFilter::Yes => view.release.is_some(),
            ReleasedFilter::No => view.release.is_none(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewQuery {
    pub filters: Filters,
    pub sort_key: SortKey,
    pub sort_dir: SortDir,
}

impl Default for ViewQuery {
    fn default() -> Self {
        Self {
            filters: Filters::default(),
            sort_key: SortKey::Pushed,
            sort_dir: SortDir::Desc,
        }
    }
}

impl ViewQuery {
    /// Selecting the active key flips direction; selecting a new key resets
    /// direction to that key's default.
    pub fn toggle_sort(&mut self, key: SortKey) {
        if self.sort_key == key {
            self.sort_dir = self.sort_dir.flip();
        } else {
            self.sort_key = key;
            self.sort_dir = key.default_dir();
        }
    }
}

/// Severity rank of a workflow's latest run: failing builds first, healthy
/// ones last when ascending. Absent or still-unknown outcomes sit between
/// queued and cancelled.
fn run_rank(run: Option<&RunSummary>) -> u8 {
    let Some(run) = run else { return 3 };
    match run.conclusion {
        Some(Conclusion::Failure) => 0,
        None => match run.status {
            RunStatus::InProgress => 1,
            RunStatus::Queued => 2,
            RunStatus::Completed => 3,
        },
        Some(Conclusion::Cancelled) => 4,
        Some(Conclusion::Success) => 5,
    }
}

/// Docs rank: repos with no docs workflow at all sort after everything that
/// has one.
fn docs_rank(view: &RepoView) -> u8 {
    match view.docs_timeline() {
        Some(tl) => run_rank(tl.latest()),
        None => 6,
    }
}

fn compare(a: &RepoView, b: &RepoView, key: SortKey, dir: SortDir) -> Ordering {
    match key {
        SortKey::Name => dir.apply(
            a.repo
                .name
                .to_lowercase()
                .cmp(&b.repo.name.to_lowercase()),
        ),
        SortKey::Pushed => dir.apply(a.repo.pushed_at.cmp(&b.repo.pushed_at)),
        // Severity ranks compare ascending regardless of the requested
        // direction: failures stay at the attention-worthy end.
        SortKey::Status => run_rank(a.latest_ci()).cmp(&run_rank(b.latest_ci())),
        SortKey::Docs => docs_rank(a).cmp(&docs_rank(b)),
        SortKey::Release => {
            let ta = a.release.as_ref().map(|r| r.tag.as_str()).unwrap_or("");
            let tb = b.release.as_ref().map(|r| r.tag.as_str()).unwrap_or("");
            dir.apply(ta.cmp(tb))
        }
        SortKey::Issues => {
            let oa = a.issues.map(|c| c.open).unwrap_or(0);
            let ob = b.issues.map(|c| c.open).unwrap_or(0);
            dir.apply(oa.cmp(&ob))
        }
        SortKey::Prs => {
            let oa = a.prs.map(|c| c.open).unwrap_or(0);
            let ob = b.prs.map(|c| c.open).unwrap_or(0);
            dir.apply(oa.cmp(&ob))
        }
    }
}

/// One named, ordered partition of the filtered result.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewGroup {
    pub label: &'static str,
    pub views: Vec<RepoView>,
}

/// Filter, sort and partition the views. Returns the two fixed groups in
/// display order; both may be empty. The sort is stable, and grouping never
/// re-sorts within a group.
pub fn apply(views: &[RepoView], query: &ViewQuery, package_suffix: &str) -> Vec<ViewGroup> {
    let mut filtered: Vec<RepoView> = views
        .iter()
        .filter(|v| query.filters.keeps(v))
        .cloned()
        .collect();

    filtered.sort_by(|a, b| compare(a, b, query.sort_key, query.sort_dir));

    let (packages, other): (Vec<RepoView>, Vec<RepoView>) = filtered
        .into_iter()
        .partition(|v| is_package_repo(&v.repo.name, package_suffix));

    vec![
        ViewGroup {
            label: GROUP_PACKAGES,
            views: packages,
        },
        ViewGroup {
            label: GROUP_OTHER,
            views: other,
        },
    ]
}

/// Distinct primary languages across the (unfiltered) view set, for the
/// language filter control.
pub fn collect_languages(views: &[RepoView]) -> Vec<String> {
    let mut langs: Vec<String> = views
        .iter()
        .filter_map(|v| v.repo.language.clone())
        .collect();
    langs.sort();
    langs.dedup();
    langs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReleaseInfo, Repo, RunDetail};
    use chrono::{Duration, TimeZone, Utc};

    fn view(name: &str) -> RepoView {
        RepoView {
            repo: Repo {
                name: name.into(),
                html_url: format!("https://github.com/acme/{name}"),
                description: None,
                language: Some("Julia".into()),
                private: false,
                default_branch: "main".into(),
                pushed_at: Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap(),
                has_pages: false,
                archived: false,
            },
            workflows: None,
            release: None,
            pending: None,
            issues: None,
            prs: None,
            coverage: None,
            traffic: None,
        }
    }

    fn with_ci(mut v: RepoView, conclusion: Option<Conclusion>, status: RunStatus) -> RepoView {
        v.workflows = Some(vec![crate::model::WorkflowTimeline {
            name: "CI".into(),
            runs: vec![RunSummary {
                status,
                conclusion,
                html_url: "https://example.com/run".into(),
                created_at: Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap(),
                detail: RunDetail::Plain,
            }],
        }]);
        v
    }

    fn with_release(mut v: RepoView, tag: &str) -> RepoView {
        v.release = Some(ReleaseInfo {
            tag: tag.into(),
            html_url: "https://example.com/release".into(),
            published_at: None,
        });
        v
    }

    fn names(group: &ViewGroup) -> Vec<&str> {
        group.views.iter().map(|v| v.repo.name.as_str()).collect()
    }

    #[test]
    fn failures_sort_before_successes_and_ties_are_stable() {
        let views = vec![
            with_ci(view("a"), Some(Conclusion::Success), RunStatus::Completed),
            with_ci(view("b"), Some(Conclusion::Failure), RunStatus::Completed),
            with_ci(view("c"), Some(Conclusion::Failure), RunStatus::Completed),
            view("d"), // absent -> rank 3
            with_ci(view("e"), None, RunStatus::InProgress),
        ];
        let query = ViewQuery {
            sort_key: SortKey::Status,
            sort_dir: SortDir::Asc,
            ..Default::default()
        };
        let groups = apply(&views, &query, ".jl");
        assert_eq!(names(&groups[1]), ["b", "c", "e", "d", "a"]);

        // Direction multiplier is ignored for severity ranks.
        let query = ViewQuery {
            sort_key: SortKey::Status,
            sort_dir: SortDir::Desc,
            ..Default::default()
        };
        let groups = apply(&views, &query, ".jl");
        assert_eq!(names(&groups[1]), ["b", "c", "e", "d", "a"]);
    }

    #[test]
    fn docs_rank_puts_repos_without_docs_last() {
        let mut a = view("a");
        a.workflows = Some(vec![crate::model::WorkflowTimeline {
            name: "Docs".into(),
            runs: vec![RunSummary {
                status: RunStatus::Completed,
                conclusion: Some(Conclusion::Cancelled),
                html_url: "https://example.com/run".into(),
                created_at: Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap(),
                detail: RunDetail::Plain,
            }],
        }]);
        let b = with_ci(view("b"), Some(Conclusion::Success), RunStatus::Completed); // no docs
        let query = ViewQuery {
            sort_key: SortKey::Docs,
            sort_dir: SortDir::Asc,
            ..Default::default()
        };
        let groups = apply(&[b, a], &query, ".jl");
        assert_eq!(names(&groups[1]), ["a", "b"]);
    }

    #[test]
    fn toggle_flips_active_key_and_resets_new_key() {
        let mut query = ViewQuery::default();
        assert_eq!(query.sort_key, SortKey::Pushed);
        assert_eq!(query.sort_dir, SortDir::Desc);

        query.toggle_sort(SortKey::Pushed);
        assert_eq!(query.sort_dir, SortDir::Asc);
        query.toggle_sort(SortKey::Pushed);
        assert_eq!(query.sort_dir, SortDir::Desc);

        query.toggle_sort(SortKey::Name);
        assert_eq!(query.sort_key, SortKey::Name);
        assert_eq!(query.sort_dir, SortDir::Asc);

        query.toggle_sort(SortKey::Issues);
        assert_eq!(query.sort_dir, SortDir::Desc);
    }

    #[test]
    fn released_yes_and_no_partition_the_input() {
        let views = vec![
            with_release(view("Foo.jl"), "v1.0.0"),
            view("Bar"),
            view("Baz.jl"),
        ];

        let yes = ViewQuery {
            filters: Filters {
                released: ReleasedFilter::Yes,
                ..Default::default()
            },
            ..Default::default()
        };
        let no = ViewQuery {
            filters: Filters {
                released: ReleasedFilter::No,
                ..Default::default()
            },
            ..Default::default()
        };

        let kept_yes: Vec<String> = apply(&views, &yes, ".jl")
            .iter()
            .flat_map(|g| g.views.iter().map(|v| v.repo.name.clone()))
            .collect();
        let kept_no: Vec<String> = apply(&views, &no, ".jl")
            .iter()
            .flat_map(|g| g.views.iter().map(|v| v.repo.name.clone()))
            .collect();

        assert_eq!(kept_yes, ["Foo.jl"]);
        assert!(!kept_no.contains(&"Foo.jl".to_string()));
        let mut union: Vec<String> = kept_yes.into_iter().chain(kept_no).collect();
        union.sort();
        assert_eq!(union, ["Bar", "Baz.jl", "Foo.jl"]);
    }

    #[test]
    fn language_and_visibility_filters_are_conjunctive() {
        let mut a = view("a");
        a.repo.language = Some("Rust".into());
        let mut b = view("b");
        b.repo.language = Some("Rust".into());
        b.repo.private = true;
        let c = view("c");

        let query = ViewQuery {
            filters: Filters {
                language: Some("Rust".into()),
                visibility: Some("public".into()),
                released: ReleasedFilter::Any,
            },
            ..Default::default()
        };
        let groups = apply(&[a, b, c], &query, ".jl");
        assert_eq!(names(&groups[1]), ["a"]);
    }

    #[test]
    fn grouping_is_exhaustive_and_disjoint() {
        let mut views = Vec::new();
        for name in ["Foo.jl", "Bar", "Baz.jl", "Qux", "Zed.jl"] {
            views.push(view(name));
        }
        let groups = apply(&views, &ViewQuery::default(), ".jl");
        let total: usize = groups.iter().map(|g| g.views.len()).sum();
        assert_eq!(total, views.len());
        for v in &groups[0].views {
            assert!(v.repo.name.ends_with(".jl"));
        }
        for v in &groups[1].views {
            assert!(!v.repo.name.ends_with(".jl"));
        }
    }

    #[test]
    fn default_query_orders_by_recency_within_groups() {
        let now = Utc.with_ymd_and_hms(2026, 8, 27, 12, 0, 0).unwrap();
        let mut foo = with_release(view("Foo.jl"), "v1.0.0");
        foo.repo.pushed_at = now - Duration::hours(2);
        let mut bar = view("Bar");
        bar.repo.pushed_at = now - Duration::days(1);
        let mut baz = view("Baz.jl");
        baz.repo.pushed_at = now - Duration::hours(3);
        baz.pending = Some(crate::model::PendingRelease {
            version: "v2.0.0".into(),
            html_url: "https://example.com/pr/9".into(),
            title: None,
        });

        let groups = apply(&[foo, bar, baz], &ViewQuery::default(), ".jl");
        assert_eq!(groups[0].label, GROUP_PACKAGES);
        assert_eq!(names(&groups[0]), ["Foo.jl", "Baz.jl"]);
        assert_eq!(groups[1].label, GROUP_OTHER);
        assert_eq!(names(&groups[1]), ["Bar"]);
    }

    #[test]
    fn release_sort_treats_absent_as_empty_string() {
        let views = vec![with_release(view("a"), "v0.1.0"), view("b")];
        let query = ViewQuery {
            sort_key: SortKey::Release,
            sort_dir: SortDir::Asc,
            ..Default::default()
        };
        let groups = apply(&views, &query, ".jl");
        assert_eq!(names(&groups[1]), ["b", "a"]);
    }
}
