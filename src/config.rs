//! Configuration loader and validator for the dashboard.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub app: App,
    pub github: Github,
    pub registry: Registry,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct App {
    pub data_dir: String,
    pub refresh_minutes: u64,
    pub cache_ttl_seconds: u64,
}

/// GitHub API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Github {
    pub org: String,
    pub api_base: String,
    /// Optional token; falls back to `GITHUB_TOKEN` when empty.
    #[serde(default)]
    pub token: String,
    pub runs_per_workflow: usize,
}

/// Package-registry and docs-site conventions for the tracked ecosystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Registry {
    /// Repository whose open pull requests are pending registry submissions.
    pub repo: String,
    /// Name suffix marking a repo as a package of the tracked ecosystem.
    pub package_suffix: String,
    /// Base URL of the published documentation sites, one subpath per repo.
    pub pages_base: String,
}

impl Github {
    /// Token from config, or the `GITHUB_TOKEN` environment variable.
    pub fn resolved_token(&self) -> Option<String> {
        if !self.token.trim().is_empty() {
            return Some(self.token.clone());
        }
        std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.trim().is_empty())
    }
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.refresh_minutes == 0 {
        return Err(ConfigError::Invalid("app.refresh_minutes must be > 0"));
    }

    if cfg.github.org.trim().is_empty() {
        return Err(ConfigError::Invalid("github.org must be non-empty"));
    }
    if cfg.github.api_base.trim().is_empty() {
        return Err(ConfigError::Invalid("github.api_base must be non-empty"));
    }
    if cfg.github.runs_per_workflow == 0 || cfg.github.runs_per_workflow > 50 {
        return Err(ConfigError::Invalid(
            "github.runs_per_workflow must be in 1..=50",
        ));
    }

    if cfg.registry.repo.trim().is_empty() {
        return Err(ConfigError::Invalid("registry.repo must be non-empty"));
    }
    if cfg.registry.package_suffix.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "registry.package_suffix must be non-empty",
        ));
    }
    if cfg.registry.pages_base.trim().is_empty() {
        return Err(ConfigError::Invalid("registry.pages_base must be non-empty"));
    }

    Ok(())
}

/// Returns the example YAML content shipped with the project.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  refresh_minutes: 5
  cache_ttl_seconds: 300

github:
  org: "RallypointOne"
  api_base: "https://api.github.com/"
  token: ""
  runs_per_workflow: 10

registry:
  repo: "JuliaRegistries/General"
  package_suffix: ".jl"
  pages_base: "https://rallypointone.github.io/"
"#
}
