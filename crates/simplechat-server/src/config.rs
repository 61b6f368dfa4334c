use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};
use simplechat_core::ContactPolicy;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug)]
pub struct Config {
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub policy: ContactPolicy,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = get("SIMPLECHAT_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("SIMPLECHAT_JWT_SECRET is unset or still a placeholder");
        }

        let db_path = get("SIMPLECHAT_DB_PATH").unwrap_or_else(|| "simplechat.db".into());
        let host = get("SIMPLECHAT_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("SIMPLECHAT_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("SIMPLECHAT_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {host}:{port}"))?;

        let ttl_minutes: i64 = get("SIMPLECHAT_TOKEN_TTL_MINUTES")
            .unwrap_or_else(|| "15".into())
            .parse()
            .context("SIMPLECHAT_TOKEN_TTL_MINUTES must be a whole number")?;
        if ttl_minutes <= 0 {
            bail!("SIMPLECHAT_TOKEN_TTL_MINUTES must be positive, got {ttl_minutes}");
        }

        let allow_accept_after_reject = get("SIMPLECHAT_ALLOW_ACCEPT_AFTER_REJECT")
            .map(|v| v.parse::<bool>())
            .transpose()
            .context("SIMPLECHAT_ALLOW_ACCEPT_AFTER_REJECT must be true or false")?
            .unwrap_or(ContactPolicy::default().allow_accept_after_reject);

        Ok(Self {
            db_path: db_path.into(),
            addr,
            jwt_secret,
            token_ttl: chrono::Duration::minutes(ttl_minutes),
            policy: ContactPolicy {
                allow_accept_after_reject,
            },
        })
    }
}
