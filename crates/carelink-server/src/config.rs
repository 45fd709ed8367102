use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::info;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct Config {
    /// Shared with the identity service that signs bearer tokens.
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Allowed browser origin. Permissive CORS when unset.
    pub cors_origin: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("CARELINK_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("CARELINK_JWT_SECRET is unset or still a placeholder; it must match the identity service's secret");
        }

        let db_path = lookup("CARELINK_DB_PATH").unwrap_or_else(|| "carelink.db".into()).into();
        let host = lookup("CARELINK_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match lookup("CARELINK_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("CARELINK_PORT is not a valid port: '{}'", raw))?,
            None => {
                info!("CARELINK_PORT not set, using default: 3000");
                3000
            }
        };
        let cors_origin = lookup("CARELINK_CORS_ORIGIN").filter(|v| !v.is_empty());

        Ok(Self {
            jwt_secret,
            db_path,
            host,
            port,
            cors_origin,
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
