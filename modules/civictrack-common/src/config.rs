use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

pub const DEFAULT_MAX_SEARCH_RADIUS_KM: f64 = 5.0;
pub const DEFAULT_SEARCH_RADIUS_KM: f64 = 3.0;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // Web server
    pub web_host: String,
    pub web_port: u16,
    pub allowed_origins: Vec<String>,

    // Auth
    pub jwt_secret: String,
    pub jwt_issuer: String,

    // Uploads
    pub upload_dir: PathBuf,

    // Nearby search policy
    pub max_search_radius_km: f64,
    pub default_search_radius_km: f64,
}

impl Config {
    /// Load configuration from the environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://civictrack.sqlite?mode=rwc".to_string()),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: parse_env("WEB_PORT", 8000)?,
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET environment variable is required")?,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "civictrack".to_string()),
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
            max_search_radius_km: parse_env("MAX_SEARCH_RADIUS_KM", DEFAULT_MAX_SEARCH_RADIUS_KM)?,
            default_search_radius_km: parse_env("DEFAULT_SEARCH_RADIUS_KM", DEFAULT_SEARCH_RADIUS_KM)?,
        };

        config.check()?;
        config.log_summary();
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if !(self.max_search_radius_km.is_finite() && self.max_search_radius_km > 0.0) {
            bail!("MAX_SEARCH_RADIUS_KM must be a positive finite number");
        }
        if !(self.default_search_radius_km > 0.0
            && self.default_search_radius_km <= self.max_search_radius_km)
        {
            bail!(
                "DEFAULT_SEARCH_RADIUS_KM must be in (0, {}]",
                self.max_search_radius_km
            );
        }
        if self.jwt_secret.is_empty() {
            bail!("JWT_SECRET must not be empty");
        }
        Ok(())
    }

    fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: {}", self.database_url);
        tracing::info!("  LISTEN: {}:{}", self.web_host, self.web_port);
        tracing::info!("  UPLOAD_DIR: {}", self.upload_dir.display());
        tracing::info!(
            "  SEARCH RADIUS: default {} km, max {} km",
            self.default_search_radius_km,
            self.max_search_radius_km
        );
        tracing::info!("  JWT_SECRET: <{} chars>", self.jwt_secret.len());
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
