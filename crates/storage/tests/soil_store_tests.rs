//! Soil profiles read from an SQLite database built from fixtures.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use storage::{SoilProfileCache, SoilProfileStore, SqliteSoilStore};
use test_utils::assert_approx_eq;
use test_utils::fixtures::soil;

async fn fixture_store() -> SqliteSoilStore {
    let options = SqliteConnectOptions::new()
        .filename(":memory:")
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    sqlx::query(soil::SCHEMA_SQL).execute(&pool).await.unwrap();
    sqlx::query(soil::ROWS_SQL).execute(&pool).await.unwrap();
    SqliteSoilStore::from_pool(pool)
}

#[tokio::test]
async fn test_profile_layers_and_flags() {
    let store = fixture_store().await;

    let loam = store.profile(1001).await.unwrap();
    assert_eq!(loam.layers.len(), 3);
    assert_approx_eq!(loam.layers[2].thickness, 1.4, 1e-12);
    assert_eq!(loam.layers[0].texture_class.as_deref(), Some("Ls3"));
    assert_eq!(loam.groundwater_depth(), 20.0);
    assert_eq!(loam.impenetrable_depth(), None);

    let sand = store.profile(1002).await.unwrap();
    assert!(sand.layers[1].is_in_groundwater);
    assert_approx_eq!(sand.groundwater_depth(), 0.4, 1e-12);
    assert_approx_eq!(sand.impenetrable_depth().unwrap(), 0.9, 1e-12);
}

#[tokio::test]
async fn test_unknown_soil_is_empty() {
    let store = fixture_store().await;
    assert!(store.profile(1003).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cache_over_database() {
    let mut cache = SoilProfileCache::new(fixture_store().await);
    for id in soil::SOIL_IDS.iter().chain(soil::SOIL_IDS.iter()) {
        cache.get(*id).await.unwrap();
    }
    let stats = cache.stats();
    assert_eq!(stats.misses, 3);
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.entries, 3);
}

#[tokio::test]
async fn test_open_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("soil.sqlite");

    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    sqlx::query(soil::SCHEMA_SQL).execute(&pool).await.unwrap();
    sqlx::query(soil::ROWS_SQL).execute(&pool).await.unwrap();
    pool.close().await;

    let store = SqliteSoilStore::open(&path).await.unwrap();
    assert_eq!(store.profile(1002).await.unwrap().layers.len(), 3);
}
