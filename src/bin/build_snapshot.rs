use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use repo_radar::config;
use repo_radar::github::GithubClient;
use repo_radar::refresh;

#[derive(Debug, Parser)]
#[command(about = "Fetch every repository facet once and write a snapshot JSON file.")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output path; defaults to <data_dir>/data.json
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

    let client = GithubClient::from_config(&cfg)?;
    let snapshot = refresh::build_snapshot(&client, &cfg).await?;
    info!(
        repos = snapshot.repos.len(),
        pending = snapshot.pending_releases.len(),
        "snapshot built"
    );

    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(&cfg.app.data_dir).join("data.json"));
    snapshot.write(&out)?;
    println!("Wrote {}", out.display());
    Ok(())
}
