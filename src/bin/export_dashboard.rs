use anyhow::{anyhow, Result};
use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};

use repo_radar::aggregate;
use repo_radar::config;
use repo_radar::github::GithubClient;
use repo_radar::query::{self, SortKey, ViewQuery};
use repo_radar::refresh;
use repo_radar::render::{self, RenderContext, RenderMode};
use repo_radar::snapshot::DashboardSnapshot;
use repo_radar::state::{SqliteStateStore, StateStore, ViewStatePatch};

#[derive(Debug, Parser)]
#[command(
    about = "Render the dashboard from an existing snapshot (or live data) to static HTML. \
             Mode and filter flags are persisted for subsequent runs."
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Snapshot file to render; defaults to <data_dir>/data.json
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Fetch fresh data instead of reading a snapshot file
    #[arg(long)]
    live: bool,

    /// Render mode: cards, table or compact
    #[arg(long)]
    mode: Option<String>,

    /// Keep only repos with this primary language (empty clears)
    #[arg(long)]
    language: Option<String>,

    /// Keep only repos with this visibility: public or private (empty clears)
    #[arg(long)]
    visibility: Option<String>,

    /// Keep only released ("yes") or unreleased ("no") repos (empty clears)
    #[arg(long)]
    released: Option<String>,

    /// Sort column; toggles direction when it is already the active column
    #[arg(long)]
    sort: Option<String>,

    /// Output directory; defaults to <data_dir>/site
    #[arg(long)]
    out: Option<PathBuf>,
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

    let mode = match &args.mode {
        Some(raw) => Some(RenderMode::parse(raw).ok_or_else(|| anyhow!("unknown mode '{raw}'"))?),
        None => None,
    };
    store
        .save(&ViewStatePatch {
            mode,
            language: args.language.clone(),
            visibility: args.visibility.clone(),
            released: args.released.as_deref().map(query::ReleasedFilter::parse),
        })
        .await?;
    let state = store.load().await?;

    let snapshot = if args.live {
        let client = GithubClient::from_config(&cfg)?;
        client.invalidate();
        refresh::build_snapshot(&client, &cfg).await?
    } else {
        let path = args
            .snapshot
            .unwrap_or_else(|| PathBuf::from(&cfg.app.data_dir).join("data.json"));
        DashboardSnapshot::load(&path)?
    };

    let mut view_query = ViewQuery {
        filters: state.filters.clone(),
        ..Default::default()
    };
    if let Some(raw) = &args.sort {
        let key = SortKey::parse(raw).ok_or_else(|| anyhow!("unknown sort key '{raw}'"))?;
        view_query.toggle_sort(key);
    }

    let ctx = RenderContext {
        now: Utc::now(),
        pages_base: &cfg.registry.pages_base,
        package_suffix: &cfg.registry.package_suffix,
        query: &view_query,
    };
    let views = aggregate::aggregate(&snapshot);
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

    let out_dir = args
        .out
        .unwrap_or_else(|| Path::new(&cfg.app.data_dir).join("site"));
    let static_dir = out_dir.join("static");
    tokio::fs::create_dir_all(&static_dir).await?;
    let index_path = out_dir.join("index.html");
    tokio::fs::write(&index_path, &page).await?;
    tokio::fs::write(static_dir.join("style.css"), render::STYLESHEET).await?;

    println!("Wrote {}", index_path.display());
    Ok(())
}
