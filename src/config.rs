use std::net::SocketAddr;

use anyhow::{Context, bail};
use jiff::SignedDuration;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub cache_url: Option<String>,
    pub cache_expiration: SignedDuration,
    pub jwt_secret: String,
    pub jwt_expiry: SignedDuration,
    pub request_timeout_secs: u64,
    pub admin: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "8080".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://moviefest.db?mode=rwc".to_string());

        let cache_url = std::env::var("CACHE_URL").ok().filter(|s| !s.trim().is_empty());

        let cache_expiration = duration_var("CACHE_DEFAULT_EXPIRATION", "10m")?;

        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }
        let jwt_expiry = duration_var("JWT_EXPIRY", "24h")?;

        let request_timeout_secs: u64 =
            std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(30);

        let admin = match (std::env::var("ADMIN_USERNAME"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(user), Ok(pass)) => Some((user, pass)),
            _ => None,
        };

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            cache_url,
            cache_expiration,
            jwt_secret,
            jwt_expiry,
            request_timeout_secs,
            admin,
        })
    }
}

fn duration_var(key: &str, default: &str) -> anyhow::Result<SignedDuration> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    parse_duration(&raw).with_context(|| format!("{key}={raw:?}"))
}

fn parse_duration(raw: &str) -> anyhow::Result<SignedDuration> {
    let duration: SignedDuration = raw.trim().parse()?;
    if !duration.is_positive() {
        bail!("duration must be positive");
    }
    Ok(duration)
}
