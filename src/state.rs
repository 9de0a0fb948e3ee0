//! Durable store for the last-chosen render mode and filters.
use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::query::{Filters, ReleasedFilter};
use crate::render::RenderMode;

pub const KEY_MODE: &str = "view.mode";
pub const KEY_LANGUAGE: &str = "filter.language";
pub const KEY_VISIBILITY: &str = "filter.visibility";
pub const KEY_RELEASED: &str = "filter.released";

/// Persisted UI preferences. Missing or unrecognized values fall back to the
/// documented defaults: table mode, no filters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewState {
    pub mode: RenderMode,
    pub filters: Filters,
}

/// Partial update; `None` fields are left untouched. Filter strings save an
/// empty string to clear the dimension, matching the control values.
#[derive(Debug, Clone, Default)]
pub struct ViewStatePatch {
    pub mode: Option<RenderMode>,
    pub language: Option<String>,
    pub visibility: Option<String>,
    pub released: Option<ReleasedFilter>,
}

/// Injected persistence capability so the engine and renderer stay free of
/// any storage concern and tests can swap in an in-memory database.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> Result<ViewState>;
    async fn save(&self, patch: &ViewStatePatch) -> Result<()>;
}

pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) the store at the given SQLite URL and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let normalized = prepare_sqlite_url(database_url);
        let pool = SqlitePool::connect(&normalized).await?;
        sqlx::query("PRAGMA journal_mode=WAL;").execute(&pool).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM view_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO view_state (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Expand a leading `~/` in file-backed SQLite URLs and make sure the parent
/// directory exists. In-memory URLs pass through untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }
    let rest = url["sqlite:".len()..].trim_start_matches("//");
    let (path_part, query_part) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }
    let expanded = match path_part.strip_prefix("~/") {
        Some(tail) => match std::env::var("HOME") {
            Ok(home) => format!("{}/{}", home.trim_end_matches('/'), tail),
            Err(_) => path_part.to_string(),
        },
        None => path_part.to_string(),
    };
    if let Some(parent) = std::path::Path::new(&expanded).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
    let mut rebuilt = format!("sqlite://{expanded}?mode=rwc");
    if let Some(q) = query_part {
        rebuilt = format!("sqlite://{expanded}?{q}");
    }
    rebuilt
}

fn filter_value(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.trim().is_empty())
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn load(&self) -> Result<ViewState> {
        let mode = self
            .get(KEY_MODE)
            .await?
            .and_then(|v| RenderMode::parse(&v))
            .unwrap_or_default();
        let language = filter_value(self.get(KEY_LANGUAGE).await?);
        let visibility = filter_value(self.get(KEY_VISIBILITY).await?);
        let released = self
            .get(KEY_RELEASED)
            .await?
            .map(|v| ReleasedFilter::parse(&v))
            .unwrap_or_default();
        Ok(ViewState {
            mode,
            filters: Filters {
                language,
                visibility,
                released,
            },
        })
    }

    async fn save(&self, patch: &ViewStatePatch) -> Result<()> {
        if let Some(mode) = patch.mode {
            self.put(KEY_MODE, mode.as_str()).await?;
        }
        if let Some(language) = &patch.language {
            self.put(KEY_LANGUAGE, language).await?;
        }
        if let Some(visibility) = &patch.visibility {
            self.put(KEY_VISIBILITY, visibility).await?;
        }
        if let Some(released) = patch.released {
            self.put(KEY_RELEASED, released.as_str()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SqliteStateStore {
        SqliteStateStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn missing_keys_yield_defaults() {
        let store = memory_store().await;
        let state = store.load().await.unwrap();
        assert_eq!(state.mode, RenderMode::Table);
        assert_eq!(state.filters, Filters::default());
    }

    #[tokio::test]
    async fn saved_patch_is_immediately_observable() {
        let store = memory_store().await;
        store
            .save(&ViewStatePatch {
                mode: Some(RenderMode::Compact),
                language: Some("Julia".into()),
                released: Some(ReleasedFilter::Yes),
                ..Default::default()
            })
            .await
            .unwrap();

        let state = store.load().await.unwrap();
        assert_eq!(state.mode, RenderMode::Compact);
        assert_eq!(state.filters.language.as_deref(), Some("Julia"));
        assert_eq!(state.filters.released, ReleasedFilter::Yes);
        assert!(state.filters.visibility.is_none());
    }

    #[tokio::test]
    async fn empty_string_clears_a_filter() {
        let store = memory_store().await;
        store
            .save(&ViewStatePatch {
                language: Some("Rust".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .save(&ViewStatePatch {
                language: Some(String::new()),
                ..Default::default()
            })
            .await
            .unwrap();
        let state = store.load().await.unwrap();
        assert!(state.filters.language.is_none());
    }

    #[tokio::test]
    async fn unrecognized_mode_falls_back_to_table() {
        let store = memory_store().await;
        store.put(KEY_MODE, "holographic").await.unwrap();
        let state = store.load().await.unwrap();
        assert_eq!(state.mode, RenderMode::Table);
    }

    #[tokio::test]
    async fn partial_patch_leaves_other_keys_alone() {
        let store = memory_store().await;
        store
            .save(&ViewStatePatch {
                mode: Some(RenderMode::Cards),
                visibility: Some("private".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .save(&ViewStatePatch {
                mode: Some(RenderMode::Compact),
                ..Default::default()
            })
            .await
            .unwrap();
        let state = store.load().await.unwrap();
        assert_eq!(state.mode, RenderMode::Compact);
        assert_eq!(state.filters.visibility.as_deref(), Some("private"));
    }
}
