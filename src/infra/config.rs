use std::net::SocketAddr;

use axum::http::HeaderValue;
use env_helpers::get_env_default;
use secrecy::SecretString;
use strum::{AsRefStr, EnumString};

use super::InfraError;
use crate::use_cases::subscription_cache::DEFAULT_TTL_SECS;

/// Where subscription snapshots are cached between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CacheBackendKind {
    Memory,
    Redis,
}

pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: SecretString,
    pub bind_addr: SocketAddr,
    pub cors_origin: HeaderValue,
    pub redis_url: String,
    pub cache_backend: CacheBackendKind,
    pub subscription_cache_ttl_secs: i64,
    /// Link returned with every denial so clients can send users to billing.
    pub upgrade_url: String,
    /// Caller role allowed to use the administrative endpoints.
    pub admin_role: String,
    pub cancellation_poll_secs: u64,
    /// 0 disables the overshoot reconciliation scan.
    pub reconciliation_interval_secs: u64,
    /// JSON log file. Console-only logging when set to an empty value.
    pub log_file: Option<String>,
}

fn required(var: &'static str) -> Result<String, InfraError> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(InfraError::ConfigMissing { var })
}

impl AppConfig {
    pub fn from_env() -> Result<Self, InfraError> {
        let database_url = required("DATABASE_URL")?;
        let jwt_secret = SecretString::new(required("JWT_SECRET")?.into());

        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3001)));
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .map_err(|_| InfraError::ConfigInvalid { var: "CORS_ORIGIN" })?;
        let redis_url: String = get_env_default("REDIS_URL", "redis://127.0.0.1:6379".to_string());
        let cache_backend: CacheBackendKind =
            get_env_default("CACHE_BACKEND", String::from("memory"))
                .parse()
                .map_err(|_| InfraError::ConfigInvalid { var: "CACHE_BACKEND" })?;
        let subscription_cache_ttl_secs: i64 =
            get_env_default("SUBSCRIPTION_CACHE_TTL_SECS", DEFAULT_TTL_SECS);
        if subscription_cache_ttl_secs <= 0 {
            return Err(InfraError::ConfigInvalid {
                var: "SUBSCRIPTION_CACHE_TTL_SECS",
            });
        }
        let upgrade_url: String =
            get_env_default("UPGRADE_URL", "/settings/billing".to_string());
        let admin_role: String = get_env_default("ADMIN_ROLE", "admin".to_string());
        let cancellation_poll_secs: u64 = get_env_default("CANCELLATION_POLL_SECS", 60);
        let reconciliation_interval_secs: u64 =
            get_env_default("RECONCILIATION_INTERVAL_SECS", 3600);
        let log_file: String = get_env_default("LOG_FILE", "app.log".to_string());

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr,
            cors_origin,
            redis_url,
            cache_backend,
            subscription_cache_ttl_secs,
            upgrade_url,
            admin_role,
            cancellation_poll_secs: cancellation_poll_secs.max(1),
            reconciliation_interval_secs,
            log_file: (!log_file.trim().is_empty()).then_some(log_file),
        })
    }
}
