use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use confetti_types::entitlement::DEFAULT_GUEST_QUOTA;
use confetti_types::validation::resolve_guest_quota;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me",
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    /// Origin that signed media URLs point at.
    pub public_url: String,
    pub guest_quota: u32,
    pub signed_url_ttl_secs: i64,
    pub max_upload_bytes: usize,
    pub sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("CONFETTI_JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("CONFETTI_JWT_SECRET is unset or still a placeholder");
        }

        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());

        let guest_quota = parse(&lookup, "CONFETTI_GUEST_QUOTA", DEFAULT_GUEST_QUOTA)?;
        resolve_guest_quota(Some(guest_quota), DEFAULT_GUEST_QUOTA)
            .context("CONFETTI_GUEST_QUOTA is out of range")?;

        let signed_url_ttl_secs = parse(&lookup, "CONFETTI_SIGNED_URL_TTL_SECS", 3600)?;
        if signed_url_ttl_secs <= 0 {
            bail!("CONFETTI_SIGNED_URL_TTL_SECS must be positive");
        }
        let sweep_interval_secs = parse(&lookup, "CONFETTI_SWEEP_INTERVAL_SECS", 3600)?;
        if sweep_interval_secs == 0 {
            bail!("CONFETTI_SWEEP_INTERVAL_SECS must be positive");
        }

        Ok(Self {
            jwt_secret,
            host: string("CONFETTI_HOST", "0.0.0.0"),
            port: parse(&lookup, "CONFETTI_PORT", 3000)?,
            db_path: string("CONFETTI_DB_PATH", "confetti.db").into(),
            media_dir: string("CONFETTI_MEDIA_DIR", "./media").into(),
            public_url: string("CONFETTI_PUBLIC_URL", "http://localhost:3000"),
            guest_quota,
            signed_url_ttl_secs,
            max_upload_bytes: parse(&lookup, "CONFETTI_MAX_UPLOAD_BYTES", 25 * 1024 * 1024)?,
            sweep_interval_secs,
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}
