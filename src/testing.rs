//! Fixtures shared by unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use sea_orm::{ConnectionTrait, Statement};
use uuid::Uuid;

use crate::{
    AppState,
    cache::{KeyValueCache, SqliteCache},
    clock::ManualClock,
    config::Config,
    db,
    error::{AppError, AppResult},
    models::{Artist, MovieRecord, Role, User},
    store::Store,
};

pub fn epoch() -> Timestamp {
    "2025-03-01T12:00:00Z".parse().unwrap()
}

/// Store over a fresh in-memory database, with its clock pinned at `epoch()`.
pub async fn store() -> (Store, ManualClock) {
    let clock = ManualClock::new(epoch());
    let store = Store::new(db::memory().await, Arc::new(clock.clone()));
    (store, clock)
}

pub fn record(title: &str, genres: &[&str], artists: &[&str]) -> MovieRecord {
    MovieRecord {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        description: format!("{title}, the movie"),
        duration: 120,
        watch_url: format!("https://watch.example/{}", title.to_lowercase()),
        genres: genres.iter().map(|g| g.to_string()).collect(),
        artists: artists
            .iter()
            .map(|name| Artist { id: Uuid::new_v4().to_string(), name: name.to_string() })
            .collect(),
    }
}

pub async fn set_views(store: &Store, movie_id: &str, views: i64) {
    let db = store.db();
    db.execute(Statement::from_sql_and_values(
        db.get_database_backend(),
        "INSERT INTO movie_views (movie_id, view_count, last_viewed_at) VALUES (?, ?, 0) \
         ON CONFLICT (movie_id) DO UPDATE SET view_count = excluded.view_count",
        [movie_id.into(), views.into()],
    ))
    .await
    .unwrap();
}

/// Fully wired state over a fresh database, using the SQLite cache.
pub async fn state() -> (Arc<AppState>, ManualClock) {
    let clock = ManualClock::new(epoch());
    let db = db::memory().await;
    let cache = SqliteCache::new(db.clone(), Arc::new(clock.clone()));
    let config = Config {
        addr: "127.0.0.1:0".parse().unwrap(),
        database_url: "sqlite::memory:".to_string(),
        cache_url: None,
        cache_expiration: SignedDuration::from_mins(10),
        jwt_secret: "test-secret".to_string(),
        jwt_expiry: SignedDuration::from_hours(24),
        request_timeout_secs: 5,
        admin: None,
    };
    let state = AppState::new(db, Arc::new(cache), Arc::new(clock.clone()), &config);
    (Arc::new(state), clock)
}

/// A cache whose every call fails, as if its server were unreachable.
pub struct BrokenCache;

#[async_trait]
impl KeyValueCache for BrokenCache {
    async fn get(&self, _key: &str) -> AppResult<Option<String>> {
        Err(AppError::Cache("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: SignedDuration) -> AppResult<()> {
        Err(AppError::Cache("connection refused".into()))
    }
}

pub async fn user(store: &Store, username: &str) -> User {
    store.create_user(username, "not-a-real-hash", Role::User).await.unwrap()
}
