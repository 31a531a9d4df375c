use std::{sync::Arc, time::Duration};

use moviefest::{
    AppState,
    cache::{KeyValueCache, RedisCache, SqliteCache},
    clock::{Clock, SystemClock},
    config::Config,
    db,
    error::{AppError, ErrorKind},
    routes,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,moviefest=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Config::from_env()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let db = db::connect_and_migrate(&config.database_url).await?;

    let cache: Arc<dyn KeyValueCache> = match config.cache_url.as_deref() {
        Some(url) if url.starts_with("redis://") || url.starts_with("rediss://") => {
            tracing::info!("using redis cache");
            Arc::new(RedisCache::connect(url).await?)
        },
        other => {
            if let Some(url) = other {
                tracing::warn!(%url, "CACHE_URL is not a redis url, ignoring");
            }
            tracing::info!("using sqlite cache");
            Arc::new(SqliteCache::new(db.clone(), clock.clone()))
        },
    };

    let state = Arc::new(AppState::new(db, cache, clock, &config));

    if let Some((username, password)) = &config.admin {
        match state.users.create_admin(username, password).await {
            Ok(user) => tracing::info!(user_id = %user.id, "bootstrap admin created"),
            Err(AppError::UsernameTaken) => tracing::debug!(%username, "bootstrap admin exists"),
            Err(err) if err.kind() == ErrorKind::Validation => {
                anyhow::bail!("ADMIN_USERNAME/ADMIN_PASSWORD: {err}")
            },
            Err(err) => return Err(err.into()),
        }
    }

    let app = routes::router(state, Duration::from_secs(config.request_timeout_secs));

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
