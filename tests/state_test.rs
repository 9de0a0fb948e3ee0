//! View-state persistence across separate store connections.
use repo_radar::query::ReleasedFilter;
use repo_radar::render::RenderMode;
use repo_radar::state::{SqliteStateStore, StateStore, ViewStatePatch};
use tempfile::tempdir;

#[tokio::test]
async fn preferences_survive_a_reconnect() {
    let td = tempdir().unwrap();
    let url = format!("sqlite://{}/state.db", td.path().display());

    {
        let store = SqliteStateStore::connect(&url).await.unwrap();
        store
            .save(&ViewStatePatch {
                mode: Some(RenderMode::Cards),
                language: Some("Julia".into()),
                released: Some(ReleasedFilter::No),
                ..Default::default()
            })
            .await
            .unwrap();
    }

    let store = SqliteStateStore::connect(&url).await.unwrap();
    let state = store.load().await.unwrap();
    assert_eq!(state.mode, RenderMode::Cards);
    assert_eq!(state.filters.language.as_deref(), Some("Julia"));
    assert_eq!(state.filters.released, ReleasedFilter::No);
}

#[tokio::test]
async fn connect_creates_missing_parent_directories() {
    let td = tempdir().unwrap();
    let url = format!("sqlite://{}/nested/deeper/state.db", td.path().display());
    let store = SqliteStateStore::connect(&url).await.unwrap();
    let state = store.load().await.unwrap();
    assert_eq!(state.mode, RenderMode::Table);
}

#[tokio::test]
async fn store_works_behind_the_capability_trait() {
    let store = SqliteStateStore::connect("sqlite::memory:").await.unwrap();
    let dyn_store: &dyn StateStore = &store;
    dyn_store
        .save(&ViewStatePatch {
            visibility: Some("public".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    let state = dyn_store.load().await.unwrap();
    assert_eq!(state.filters.visibility.as_deref(), Some("public"));
}
