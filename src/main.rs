use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

use repo_radar::aggregate;
use repo_radar::config::{self, Config};
use repo_radar::github::GithubClient;
use repo_radar::query::{self, ViewQuery};
use repo_radar::refresh;
use repo_radar::render::{self, RenderContext};
use repo_radar::snapshot::DashboardSnapshot;
use repo_radar::state::{SqliteStateStore, StateStore, ViewState};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Run a single manual refresh (bypassing the freshness cache) and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/state.db", cfg.app.data_dir));
    let store = SqliteStateStore::connect(&database_url).await?;
    let client = GithubClient::from_config(&cfg)?;

    if args.once {
        client.invalidate();
        run_cycle(&client, &cfg, &store).await?;
        return Ok(());
    }

    info!(
        interval_minutes = cfg.app.refresh_minutes,
        "starting dashboard refresh loop"
    );
    let mut interval = tokio::time::interval(Duration::from_secs(cfg.app.refresh_minutes * 60));
    loop {
        interval.tick().await;
        if let Err(err) = run_cycle(&client, &cfg, &store).await {
            error!(?err, "refresh cycle failed");
            if let Err(write_err) = write_error_page(&cfg, &err).await {
                error!(?write_err, "failed to write error page");
            }
        }
    }
}

async fn run_cycle(client: &GithubClient, cfg: &Config, store: &dyn StateStore) -> Result<()> {
    let snapshot = refresh::build_snapshot(client, cfg).await?;
    let state = store.load().await?;
    write_site(cfg, &snapshot, &state).await
}

async fn write_site(cfg: &Config, snapshot: &DashboardSnapshot, state: &ViewState) -> Result<()> {
    let view_query = ViewQuery {
        filters: state.filters.clone(),
        ..Default::default()
    };
    let ctx = RenderContext {
        now: Utc::now(),
        pages_base: &cfg.registry.pages_base,
        package_suffix: &cfg.registry.package_suffix,
        query: &view_query,
    };

    let views = aggregate::aggregate(snapshot);
    let inner = if snapshot.has_no_repos() {
        render::no_repos_fragment()
    } else {
        let groups = query::apply(&views, &view_query, &cfg.registry.package_suffix);
        render::render_dashboard(&groups, state.mode, &ctx)
    };
    let languages = query::collect_languages(&views);
    let page = render::render_page(
        &inner,
        &languages,
        state.mode,
        Some(snapshot.generated_at),
        &ctx,
    );

    let index_path = write_pages(&cfg.app.data_dir, &page).await?;
    info!(
        repos = snapshot.repos.len(),
        path = %index_path.display(),
        "dashboard written"
    );
    Ok(())
}

async fn write_error_page(cfg: &Config, err: &anyhow::Error) -> Result<()> {
    let view_query = ViewQuery::default();
    let ctx = RenderContext {
        now: Utc::now(),
        pages_base: &cfg.registry.pages_base,
        package_suffix: &cfg.registry.package_suffix,
        query: &view_query,
    };
    let inner = render::error_fragment(&format!("{err:#}"));
    let page = render::render_page(&inner, &[], Default::default(), None, &ctx);
    write_pages(&cfg.app.data_dir, &page).await?;
    Ok(())
}

async fn write_pages(data_dir: &str, page: &str) -> Result<PathBuf> {
    let out_dir = Path::new(data_dir).join("site");
    let static_dir = out_dir.join("static");
    tokio::fs::create_dir_all(&static_dir).await?;
    let index_path = out_dir.join("index.html");
    tokio::fs::write(&index_path, page).await?;
    tokio::fs::write(static_dir.join("style.css"), render::STYLESHEET).await?;
    Ok(index_path)
}
