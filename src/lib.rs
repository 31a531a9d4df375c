pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod models;
pub mod movies;
pub mod routes;
pub mod store;
pub mod tokens;
pub mod users;
pub mod votes;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    cache::{KeyValueCache, ListingCache},
    clock::Clock,
    config::Config,
    movies::MovieService,
    store::Store,
    tokens::TokenAuthority,
    users::UserService,
    votes::VoteLedger,
};

pub struct AppState {
    pub movies: MovieService,
    pub votes: VoteLedger,
    pub users: UserService,
    pub tokens: TokenAuthority,
}

impl AppState {
    /// Wires every service over one database and one key-value cache. The
    /// cache holds both listing snapshots and token revocations.
    pub fn new(
        db: DatabaseConnection,
        cache: Arc<dyn KeyValueCache>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        let store = Store::new(db, clock.clone());
        let listing = ListingCache::new(store.clone(), cache.clone(), config.cache_expiration);
        let tokens = TokenAuthority::new(&config.jwt_secret, config.jwt_expiry, cache, clock);

        Self {
            movies: MovieService::new(store.clone(), listing),
            votes: VoteLedger::new(store.clone()),
            users: UserService::new(store, tokens.clone()),
            tokens,
        }
    }
}
