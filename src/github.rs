//! GitHub REST data provider: paginated listings, per-facet fetches and a
//! freshness-windowed response cache. All fetches return `Ok(None)` for a
//! missing resource so that callers can record an explicit absence.
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::Config;
use crate::model::{
    Conclusion, IssueCounts, JobBreakdown, PendingRelease, PrCounts, RegistryEntry, ReleaseInfo,
    Repo, RunDetail, RunStatus, RunSummary, Traffic, WorkflowTimeline,
};

/// Registry submission PRs are titled "New package: Name vX.Y.Z" or
/// "New version: Name vX.Y.Z".
static SUBMISSION_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^New (?:package|version): (\S+) (v\S+)$").expect("valid pattern"));

pub struct GithubClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
    org: String,
    registry_repo: String,
    package_suffix: String,
    pages_base: String,
    runs_per_workflow: usize,
    cache_ttl: Duration,
    cache: Mutex<HashMap<String, (Instant, Value)>>,
}

impl fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubClient")
            .field("base_url", &self.base_url)
            .field("org", &self.org)
            .finish_non_exhaustive()
    }
}

impl GithubClient {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let base_url = Url::parse(&cfg.github.api_base).context("invalid github.api_base")?;
        Ok(Self::with_base_url(cfg, base_url))
    }

    pub fn with_base_url(cfg: &Config, base_url: Url) -> Self {
        let http = Client::builder()
            .user_agent("repo-radar/0.1")
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            token: cfg.github.resolved_token(),
            org: cfg.github.org.clone(),
            registry_repo: cfg.registry.repo.clone(),
            package_suffix: cfg.registry.package_suffix.clone(),
            pages_base: cfg.registry.pages_base.clone(),
            runs_per_workflow: cfg.github.runs_per_workflow,
            cache_ttl: Duration::from_secs(cfg.app.cache_ttl_seconds),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Drop every cached response. A manual refresh calls this first so it
    /// sees current data instead of the freshness window.
    pub fn invalidate(&self) {
        self.cache.lock().expect("cache lock").clear();
    }

    pub fn build_request(&self, url: Url) -> Result<reqwest::Request> {
        let mut req = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        req.build().context("failed to build GitHub request")
    }

    /// GET a JSON resource. Statuses listed in `tolerate` (plus 404) map to
    /// `Ok(None)`; other non-success statuses are errors. Responses are
    /// served from the freshness cache when still within the TTL.
    async fn get_json(&self, url: Url, tolerate: &[StatusCode]) -> Result<Option<Value>> {
        let cache_key = url.as_str().to_string();
        if self.cache_ttl > Duration::ZERO {
            let cache = self.cache.lock().expect("cache lock");
            if let Some((fetched_at, value)) = cache.get(&cache_key) {
                if fetched_at.elapsed() < self.cache_ttl {
                    debug!(url = %cache_key, "cache hit");
                    return Ok(Some(value.clone()));
                }
            }
        }

        let request = self.build_request(url)?;
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach GitHub")?;
        let status = res.status();

        if status == StatusCode::NOT_FOUND || tolerate.contains(&status) {
            return Ok(None);
        }
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "GitHub rate limit or access denial: {}", body);
            return Err(anyhow!("github error {status}: {body}"));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("github error {status}: {body}"));
        }

        let value: Value = res.json().await.context("invalid GitHub response JSON")?;
        if self.cache_ttl > Duration::ZERO {
            self.cache
                .lock()
                .expect("cache lock")
                .insert(cache_key, (Instant::now(), value.clone()));
        }
        Ok(Some(value))
    }

    fn api_url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("invalid GitHub endpoint {path}"))
    }

    /// All repositories of the organization, paginated.
    pub async fn fetch_org_repos(&self) -> Result<Vec<Repo>> {
        let mut all = Vec::new();
        let mut page = 1u32;
        loop {
            let mut url = self.api_url(&format!("orgs/{}/repos", self.org))?;
            url.query_pairs_mut()
                .append_pair("per_page", "100")
                .append_pair("sort", "pushed")
                .append_pair("page", &page.to_string());
            let Some(value) = self.get_json(url, &[]).await? else {
                break;
            };
            let repos: Vec<Repo> =
                serde_json::from_value(value).context("invalid repository list payload")?;
            let count = repos.len();
            all.extend(repos);
            if count < 100 {
                break;
            }
            page += 1;
        }
        Ok(all)
    }

    /// Run history for one repo, grouped by workflow display name in
    /// first-seen order, each timeline capped and ordered oldest to newest.
    /// The newest run of each timeline gets a job breakdown when one can be
    /// fetched.
    pub async fn fetch_workflow_runs(
        &self,
        repo: &str,
        branch: &str,
    ) -> Result<Option<Vec<WorkflowTimeline>>> {
        let mut url = self.api_url(&format!("repos/{}/{}/actions/runs", self.org, repo))?;
        url.query_pairs_mut()
            .append_pair("per_page", "50")
            .append_pair("branch", branch);
        let Some(value) = self.get_json(url, &[]).await? else {
            return Ok(None);
        };
        let payload: RunsPayload =
            serde_json::from_value(value).context("invalid workflow runs payload")?;
        if payload.workflow_runs.is_empty() {
            return Ok(None);
        }

        let grouped = group_runs(payload.workflow_runs, self.runs_per_workflow);
        let mut timelines = Vec::with_capacity(grouped.len());
        for (name, runs) in grouped {
            let mut summaries: Vec<RunSummary> = runs.iter().map(RunPayload::to_summary).collect();
            // Job-level detail only for the newest run keeps the call count
            // bounded by the number of workflows.
            if let Some(latest) = runs.last() {
                match self.fetch_run_jobs(repo, latest.id).await {
                    Ok(Some(breakdown)) if breakdown.total > 0 => {
                        if let Some(last) = summaries.last_mut() {
                            last.detail = RunDetail::Jobs(breakdown);
                        }
                    }
                    Ok(_) => {}
                    Err(err) => warn!(?err, repo, run = latest.id, "job fetch failed"),
                }
            }
            timelines.push(WorkflowTimeline {
                name,
                runs: summaries,
            });
        }
        Ok(Some(timelines))
    }

    async fn fetch_run_jobs(&self, repo: &str, run_id: u64) -> Result<Option<JobBreakdown>> {
        let url = self.api_url(&format!(
            "repos/{}/{}/actions/runs/{}/jobs",
            self.org, repo, run_id
        ))?;
        let Some(value) = self.get_json(url, &[]).await? else {
            return Ok(None);
        };
        let payload: JobsPayload =
            serde_json::from_value(value).context("invalid jobs payload")?;
        let total = payload.jobs.len() as u32;
        let passed = payload
            .jobs
            .iter()
            .filter(|j| j.conclusion.as_deref() == Some("success"))
            .count() as u32;
        let failed = payload
            .jobs
            .iter()
            .filter(|j| j.conclusion.as_deref() == Some("failure"))
            .count() as u32;
        Ok(Some(JobBreakdown {
            total,
            passed,
            failed,
        }))
    }

    pub async fn fetch_latest_release(&self, repo: &str) -> Result<Option<ReleaseInfo>> {
        let url = self.api_url(&format!("repos/{}/{}/releases/latest", self.org, repo))?;
        let Some(value) = self.get_json(url, &[]).await? else {
            return Ok(None);
        };
        let release: ReleaseInfo =
            serde_json::from_value(value).context("invalid release payload")?;
        Ok(Some(release))
    }

    async fn search_issues(&self, query: &str, per_page: u32) -> Result<Option<SearchPayload>> {
        let mut url = self.api_url("search/issues")?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("per_page", &per_page.to_string());
        let Some(value) = self.get_json(url, &[]).await? else {
            return Ok(None);
        };
        let payload: SearchPayload =
            serde_json::from_value(value).context("invalid search payload")?;
        Ok(Some(payload))
    }

    async fn search_count(&self, query: &str) -> Result<u64> {
        Ok(self
            .search_issues(query, 1)
            .await?
            .map(|p| p.total_count)
            .unwrap_or(0))
    }

    pub async fn fetch_issue_counts(&self, repo: &str) -> Result<Option<IssueCounts>> {
        let open = self
            .search_count(&format!("repo:{}/{repo} type:issue state:open", self.org))
            .await?;
        let closed = self
            .search_count(&format!("repo:{}/{repo} type:issue state:closed", self.org))
            .await?;
        Ok(Some(IssueCounts { open, closed }))
    }

    pub async fn fetch_pr_counts(&self, repo: &str) -> Result<Option<PrCounts>> {
        let open = self
            .search_count(&format!("repo:{}/{repo} type:pr state:open", self.org))
            .await?;
        Ok(Some(PrCounts { open, closed: None }))
    }

    /// Open registry submissions mentioning the org, keyed by the repo name
    /// the submission maps to.
    pub async fn fetch_pending_registrations(&self) -> Result<HashMap<String, PendingRelease>> {
        let query = format!(
            "repo:{} type:pr state:open {}",
            self.registry_repo, self.org
        );
        let Some(payload) = self.search_issues(&query, 100).await? else {
            return Ok(HashMap::new());
        };
        let mut pending = HashMap::new();
        for item in payload.items {
            let Some((pkg, version)) = parse_submission_title(&item.title) else {
                continue;
            };
            let repo_name = package_repo_name(&pkg, &self.package_suffix);
            pending.insert(
                repo_name,
                PendingRelease {
                    version,
                    html_url: item.html_url,
                    title: Some(item.title),
                },
            );
        }
        Ok(pending)
    }

    /// Latest merged registry submission for one repo, as a release-equivalent
    /// entry. Used as the fallback when the repo publishes no platform
    /// releases.
    pub async fn fetch_registry_entry(&self, repo: &str) -> Result<Option<RegistryEntry>> {
        let pkg = repo
            .strip_suffix(&self.package_suffix)
            .unwrap_or(repo)
            .to_string();
        let query = format!(
            "repo:{} type:pr is:merged in:title {pkg}",
            self.registry_repo
        );
        let Some(payload) = self.search_issues(&query, 30).await? else {
            return Ok(None);
        };

        let mut best: Option<RegistryEntry> = None;
        for item in payload.items {
            let Some((name, version)) = parse_submission_title(&item.title) else {
                continue;
            };
            if name != pkg {
                continue;
            }
            let candidate = RegistryEntry {
                version,
                registry_url: item.html_url,
                published_at: item.closed_at,
            };
            let newer = match (&best, &candidate.published_at) {
                (None, _) => true,
                (Some(b), ts) => ts > &b.published_at,
            };
            if newer {
                best = Some(candidate);
            }
        }
        Ok(best)
    }

    /// Two-week view counts. Needs push access; a 403 is an absence, not an
    /// error.
    pub async fn fetch_traffic(&self, repo: &str) -> Result<Option<Traffic>> {
        let url = self.api_url(&format!("repos/{}/{}/traffic/views", self.org, repo))?;
        let Some(value) = self.get_json(url, &[StatusCode::FORBIDDEN]).await? else {
            return Ok(None);
        };
        let payload: TrafficPayload =
            serde_json::from_value(value).context("invalid traffic payload")?;
        Ok(Some(Traffic {
            views: payload.count,
            uniques: payload.uniques,
        }))
    }

    /// Coverage percentage published alongside a repo's docs site.
    pub async fn fetch_coverage(&self, repo: &str) -> Result<Option<f64>> {
        let url = Url::parse(&format!("{}{}/dev/coverage.json", self.pages_base, repo))
            .context("invalid pages coverage URL")?;
        let Some(value) = self.get_json(url, &[]).await? else {
            return Ok(None);
        };
        let payload: CoveragePayload =
            serde_json::from_value(value).context("invalid coverage payload")?;
        Ok(Some(payload.percent))
    }
}

/// Group raw runs (newest first, as the API returns them) by workflow name in
/// first-seen order, cap each timeline, and flip it to oldest-first.
fn group_runs(runs: Vec<RunPayload>, cap: usize) -> Vec<(String, Vec<RunPayload>)> {
    let mut order: Vec<String> = Vec::new();
    let mut by_name: HashMap<String, Vec<RunPayload>> = HashMap::new();
    for run in runs {
        let entry = by_name.entry(run.name.clone()).or_insert_with(|| {
            order.push(run.name.clone());
            Vec::new()
        });
        if entry.len() < cap {
            entry.push(run);
        }
    }
    order
        .into_iter()
        .map(|name| {
            let mut runs = by_name.remove(&name).unwrap_or_default();
            runs.reverse();
            (name, runs)
        })
        .collect()
}

fn parse_submission_title(title: &str) -> Option<(String, String)> {
    let caps = SUBMISSION_TITLE.captures(title)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

fn package_repo_name(pkg: &str, suffix: &str) -> String {
    if pkg.ends_with(suffix) {
        pkg.to_string()
    } else {
        format!("{pkg}{suffix}")
    }
}

/// Statuses outside the known set collapse to `Queued` unless the run already
/// completed; conclusions outside the known set are treated as unknown.
fn parse_status(raw: &str) -> RunStatus {
    match raw {
        "completed" => RunStatus::Completed,
        "in_progress" => RunStatus::InProgress,
        _ => RunStatus::Queued,
    }
}

fn parse_conclusion(raw: Option<&str>) -> Option<Conclusion> {
    match raw {
        Some("success") => Some(Conclusion::Success),
        Some("failure") => Some(Conclusion::Failure),
        Some("cancelled") => Some(Conclusion::Cancelled),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct RunsPayload {
    workflow_runs: Vec<RunPayload>,
}

#[derive(Debug, Clone, Deserialize)]
struct RunPayload {
    id: u64,
    name: String,
    status: String,
    conclusion: Option<String>,
    html_url: String,
    created_at: DateTime<Utc>,
}

impl RunPayload {
    fn to_summary(&self) -> RunSummary {
        RunSummary {
            status: parse_status(&self.status),
            conclusion: parse_conclusion(self.conclusion.as_deref()),
            html_url: self.html_url.clone(),
            created_at: self.created_at,
            detail: RunDetail::Plain,
        }
    }
}

#[derive(Debug, Deserialize)]
struct JobsPayload {
    jobs: Vec<JobPayload>,
}

#[derive(Debug, Deserialize)]
struct JobPayload {
    conclusion: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    total_count: u64,
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    title: String,
    html_url: String,
    #[serde(default)]
    closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TrafficPayload {
    count: u64,
    uniques: u64,
}

#[derive(Debug, Deserialize)]
struct CoveragePayload {
    percent: f64,
}
