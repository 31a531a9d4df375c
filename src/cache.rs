use std::sync::Arc;

use async_trait::async_trait;
use jiff::SignedDuration;
use redis::{AsyncCommands, aio::ConnectionManager};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, sea_query::OnConflict,
};
use tracing::{debug, warn};

use crate::{
    clock::Clock,
    entities::cache_entries,
    error::{AppError, AppResult},
    models::Movie,
    store::Store,
};

/// String key-value storage with per-entry expiry. A missing or expired key
/// is `Ok(None)`, not an error.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: SignedDuration) -> AppResult<()>;
}

/// Cache kept in the `cache_entries` table of the main database.
#[derive(Clone)]
pub struct SqliteCache {
    db: DatabaseConnection,
    clock: Arc<dyn Clock>,
}

impl SqliteCache {
    pub fn new(db: DatabaseConnection, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    fn is_fresh(&self, expires_at: i64) -> bool {
        expires_at > self.clock.now().as_second()
    }
}

#[async_trait]
impl KeyValueCache for SqliteCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let entry = cache_entries::Entity::find_by_id(key.to_string())
            .one(&self.db)
            .await
            .map_err(|err| AppError::Cache(err.to_string()))?;
        Ok(entry.filter(|e| self.is_fresh(e.expires_at)).map(|e| e.value))
    }

    /// Also sweeps every expired entry, so the table holds only live keys
    /// plus whatever expired since the last write.
    async fn set(&self, key: &str, value: &str, ttl: SignedDuration) -> AppResult<()> {
        let now = self.clock.now().as_second();
        let swept = cache_entries::Entity::delete_many()
            .filter(cache_entries::Column::ExpiresAt.lte(now))
            .exec(&self.db)
            .await
            .map_err(|err| AppError::Cache(err.to_string()))?;
        if swept.rows_affected > 0 {
            debug!(swept = swept.rows_affected, "expired cache entries removed");
        }

        let expires_at = now.saturating_add(ttl.as_secs());
        let model = cache_entries::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            expires_at: Set(expires_at),
        };

        cache_entries::Entity::insert(model)
            .on_conflict(
                OnConflict::column(cache_entries::Column::Key)
                    .update_columns([cache_entries::Column::Value, cache_entries::Column::ExpiresAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(|err| AppError::Cache(err.to_string()))?;

        Ok(())
    }
}

/// Cache backed by a Redis server; expiry is enforced by Redis itself.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> AppResult<Self> {
        let client = redis::Client::open(url).map_err(|err| AppError::Cache(err.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|err| AppError::Cache(err.to_string()))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KeyValueCache for RedisCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(key).await.map_err(|err| AppError::Cache(err.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: SignedDuration) -> AppResult<()> {
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(0).max(1);
        let mut conn = self.conn.clone();
        conn.pset_ex::<_, _, ()>(key, value, millis)
            .await
            .map_err(|err| AppError::Cache(err.to_string()))
    }
}

/// Read-through cache in front of the movie listing.
///
/// Entries are never invalidated on writes; a listing can be stale for up
/// to `expiration` after a movie is created or updated.
#[derive(Clone)]
pub struct ListingCache {
    store: Store,
    cache: Arc<dyn KeyValueCache>,
    expiration: SignedDuration,
}

impl ListingCache {
    pub fn new(store: Store, cache: Arc<dyn KeyValueCache>, expiration: SignedDuration) -> Self {
        Self { store, cache, expiration }
    }

    /// Cache failures of any sort degrade to a store read; only store errors
    /// reach the caller.
    pub async fn get_all_movies(&self, limit: u64, offset: u64) -> AppResult<Vec<Movie>> {
        let key = listing_key(limit, offset);

        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Movie>>(&raw) {
                Ok(movies) => {
                    debug!(%key, "listing cache hit");
                    return Ok(movies);
                },
                Err(err) => warn!(%key, error = %err, "discarding undecodable cache entry"),
            },
            Ok(None) => debug!(%key, "listing cache miss"),
            Err(err) => warn!(%key, error = %err, "cache read failed"),
        }

        let movies = self.store.get_all_movies(limit, offset).await?;

        match serde_json::to_string(&movies) {
            Ok(raw) => {
                if let Err(err) = self.cache.set(&key, &raw, self.expiration).await {
                    warn!(%key, error = %err, "cache write failed");
                }
            },
            Err(err) => warn!(%key, error = %err, "could not encode listing"),
        }

        Ok(movies)
    }
}

fn listing_key(limit: u64, offset: u64) -> String {
    format!("movies:limit={limit}:offset={offset}")
}

#[cfg(test)]
mod tests {
    use sea_orm::PaginatorTrait;

    use super::*;
    use crate::{
        clock::ManualClock,
        testing::{self, BrokenCache, record},
    };

    fn sqlite_cache(store: &Store, clock: &ManualClock) -> Arc<SqliteCache> {
        Arc::new(SqliteCache::new(store.db().clone(), Arc::new(clock.clone())))
    }

    #[test]
    fn key_is_derived_from_page_window() {
        assert_eq!(listing_key(10, 0), "movies:limit=10:offset=0");
        assert_eq!(listing_key(5, 20), "movies:limit=5:offset=20");
    }

    #[tokio::test]
    async fn sqlite_entries_expire() {
        let (store, clock) = testing::store().await;
        let cache = sqlite_cache(&store, &clock);

        cache.set("k", "v1", SignedDuration::from_secs(5)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v1"));

        cache.set("k", "v2", SignedDuration::from_secs(5)).await.unwrap();
        clock.advance(SignedDuration::from_secs(4));
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v2"));

        clock.advance(SignedDuration::from_secs(1));
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn writes_sweep_expired_entries() {
        let (store, clock) = testing::store().await;
        let cache = sqlite_cache(&store, &clock);

        for i in 0..100 {
            cache.set(&format!("revoked:{i}"), "true", SignedDuration::from_secs(5)).await.unwrap();
        }
        cache.set("live", "v", SignedDuration::from_hours(72)).await.unwrap();
        assert_eq!(cache_entries::Entity::find().count(store.db()).await.unwrap(), 101);

        clock.advance(SignedDuration::from_hours(48));
        cache.set("revoked:next", "true", SignedDuration::from_secs(5)).await.unwrap();

        assert_eq!(cache_entries::Entity::find().count(store.db()).await.unwrap(), 2);
        assert_eq!(cache.get("live").await.unwrap().as_deref(), Some("v"));
        assert_eq!(cache.get("revoked:next").await.unwrap().as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn listing_is_served_from_cache_until_expiry() {
        let (store, clock) = testing::store().await;
        let listing =
            ListingCache::new(store.clone(), sqlite_cache(&store, &clock), SignedDuration::from_mins(10));

        store.create_movie(&record("Inception", &["Sci-Fi"], &["Leonardo"])).await.unwrap();
        let first = listing.get_all_movies(10, 0).await.unwrap();
        assert_eq!(first.len(), 1);

        // Written behind the cache's back, so only a store read can see it.
        store.create_movie(&record("Heat", &["Crime"], &["Al"])).await.unwrap();

        clock.advance(SignedDuration::from_mins(9));
        let second = listing.get_all_movies(10, 0).await.unwrap();
        assert_eq!(second, first);

        clock.advance(SignedDuration::from_mins(1));
        let third = listing.get_all_movies(10, 0).await.unwrap();
        assert_eq!(third.len(), 2);
    }

    #[tokio::test]
    async fn pages_are_cached_independently() {
        let (store, clock) = testing::store().await;
        let listing =
            ListingCache::new(store.clone(), sqlite_cache(&store, &clock), SignedDuration::from_mins(10));

        for title in ["A", "B", "C"] {
            store.create_movie(&record(title, &["Drama"], &["Crew"])).await.unwrap();
        }

        assert_eq!(listing.get_all_movies(2, 0).await.unwrap().len(), 2);
        assert_eq!(listing.get_all_movies(2, 2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn undecodable_entry_falls_back_to_store() {
        let (store, clock) = testing::store().await;
        let cache = sqlite_cache(&store, &clock);
        cache.set(&listing_key(10, 0), "{not json", SignedDuration::from_mins(1)).await.unwrap();

        store.create_movie(&record("Inception", &["Sci-Fi"], &["Leonardo"])).await.unwrap();
        let listing = ListingCache::new(store, cache.clone(), SignedDuration::from_mins(10));

        assert_eq!(listing.get_all_movies(10, 0).await.unwrap().len(), 1);
        let repaired = cache.get(&listing_key(10, 0)).await.unwrap().unwrap();
        assert!(repaired.contains("Inception"));
    }

    #[tokio::test]
    async fn broken_cache_never_fails_the_listing() {
        let (store, _clock) = testing::store().await;
        store.create_movie(&record("Inception", &["Sci-Fi"], &["Leonardo"])).await.unwrap();

        let listing = ListingCache::new(store, Arc::new(BrokenCache), SignedDuration::from_mins(10));
        let movies = listing.get_all_movies(10, 0).await.unwrap();
        assert_eq!(movies[0].title, "Inception");
    }
}
