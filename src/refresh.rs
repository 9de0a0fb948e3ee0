//! Builds one settled snapshot per refresh cycle.
//!
//! The repository listing is the only fatal fetch: without it there is no
//! batch. Every other facet is fanned out concurrently across repos and
//! across facets, and an individual failure degrades to an absence for that
//! repo and facet instead of aborting the cycle. The snapshot is assembled
//! only after everything has settled, so no partially refreshed state is
//! ever observable.
use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use std::collections::HashMap;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::github::GithubClient;
use crate::query::is_package_repo;
use crate::snapshot::DashboardSnapshot;

fn settle<T>(target: &mut HashMap<String, T>, results: Vec<(String, Result<Option<T>>)>, facet: &str) {
    for (name, res) in results {
        match res {
            Ok(Some(value)) => {
                target.insert(name, value);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(?err, repo = %name, facet, "facet fetch failed; treating as absent");
            }
        }
    }
}

#[instrument(skip_all)]
pub async fn build_snapshot(client: &GithubClient, cfg: &Config) -> Result<DashboardSnapshot> {
    let generated_at = Utc::now();
    let repos = client
        .fetch_org_repos()
        .await
        .context("failed to list organization repositories")?;
    info!(count = repos.len(), "fetched repository list");

    let mut snapshot = DashboardSnapshot::empty(generated_at);
    if repos.is_empty() {
        return Ok(snapshot);
    }

    let suffix = cfg.registry.package_suffix.as_str();
    let packages: Vec<_> = repos
        .iter()
        .filter(|r| is_package_repo(&r.name, suffix))
        .collect();

    let workflow_futs = join_all(repos.iter().map(|r| async move {
        let res = client.fetch_workflow_runs(&r.name, &r.default_branch).await;
        (r.name.clone(), res)
    }));
    let release_futs = join_all(repos.iter().map(|r| async move {
        (r.name.clone(), client.fetch_latest_release(&r.name).await)
    }));
    let issue_futs = join_all(repos.iter().map(|r| async move {
        (r.name.clone(), client.fetch_issue_counts(&r.name).await)
    }));
    let pr_futs = join_all(repos.iter().map(|r| async move {
        (r.name.clone(), client.fetch_pr_counts(&r.name).await)
    }));
    let traffic_futs = join_all(repos.iter().map(|r| async move {
        (r.name.clone(), client.fetch_traffic(&r.name).await)
    }));
    let registry_futs = join_all(packages.iter().map(|r| async move {
        (r.name.clone(), client.fetch_registry_entry(&r.name).await)
    }));
    let coverage_futs = join_all(
        packages
            .iter()
            .filter(|r| r.has_pages)
            .map(|r| async move { (r.name.clone(), client.fetch_coverage(&r.name).await) }),
    );
    let pending_fut = client.fetch_pending_registrations();

    let (workflows, releases, issues, prs, traffic, registry, coverage, pending) = tokio::join!(
        workflow_futs,
        release_futs,
        issue_futs,
        pr_futs,
        traffic_futs,
        registry_futs,
        coverage_futs,
        pending_fut
    );

    settle(&mut snapshot.workflows, workflows, "workflows");
    settle(&mut snapshot.releases, releases, "releases");
    settle(&mut snapshot.issue_counts, issues, "issues");
    settle(&mut snapshot.pr_counts, prs, "prs");
    settle(&mut snapshot.traffic, traffic, "traffic");
    settle(&mut snapshot.registry, registry, "registry");
    settle(&mut snapshot.coverage, coverage, "coverage");
    match pending {
        Ok(map) => snapshot.pending_releases = map,
        Err(err) => warn!(?err, "pending registration fetch failed; treating as absent"),
    }

    snapshot.repos = repos;
    info!(
        workflows = snapshot.workflows.len(),
        releases = snapshot.releases.len(),
        pending = snapshot.pending_releases.len(),
        "snapshot assembled"
    );
    Ok(snapshot)
}
