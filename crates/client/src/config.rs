//! Client configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use storefront_core::TenantId;

pub const ENV_API_URL: &str = "STOREFRONT_API_URL";
pub const ENV_DATA_DIR: &str = "STOREFRONT_DATA_DIR";
pub const ENV_TENANT_ID: &str = "STOREFRONT_TENANT_ID";
pub const ENV_API_TOKEN: &str = "STOREFRONT_API_TOKEN";
pub const ENV_SYNC_INTERVAL_SECS: &str = "STOREFRONT_SYNC_INTERVAL_SECS";
pub const ENV_FETCH_MAX_AGE_SECS: &str = "STOREFRONT_FETCH_MAX_AGE_SECS";

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_FETCH_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {var} '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("no platform data directory; set STOREFRONT_DATA_DIR")]
    NoDataDir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the storefront API, without trailing slash.
    pub api_url: String,
    /// Root of all local state; each tenant gets its own subdirectory.
    pub data_dir: PathBuf,
    pub tenant_id: TenantId,
    pub api_token: Option<String>,
    pub sync_interval: Duration,
    pub fetch_max_age: Duration,
}

impl ClientConfig {
    /// Defaults for everything but the tenant.
    pub fn new(tenant_id: TenantId, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            data_dir: data_dir.into(),
            tenant_id,
            api_token: None,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            fetch_max_age: DEFAULT_FETCH_MAX_AGE,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from `lookup(var)`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let raw_tenant = get(ENV_TENANT_ID).ok_or(ConfigError::Missing(ENV_TENANT_ID))?;
        let tenant_id = raw_tenant
            .trim()
            .parse::<TenantId>()
            .map_err(|e| ConfigError::Invalid {
                var: ENV_TENANT_ID,
                value: raw_tenant.clone(),
                reason: e.to_string(),
            })?;

        let data_dir = match get(ENV_DATA_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .map(|dir| dir.join("storefront"))
                .ok_or(ConfigError::NoDataDir)?,
        };

        let api_url = match get(ENV_API_URL) {
            Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
                url.trim_end_matches('/').to_string()
            }
            Some(url) => {
                return Err(ConfigError::Invalid {
                    var: ENV_API_URL,
                    value: url,
                    reason: "expected an http(s) URL".into(),
                });
            }
            None => DEFAULT_API_URL.to_string(),
        };

        Ok(Self {
            api_url,
            data_dir,
            tenant_id,
            api_token: get(ENV_API_TOKEN),
            sync_interval: secs(get(ENV_SYNC_INTERVAL_SECS), ENV_SYNC_INTERVAL_SECS)?
                .unwrap_or(DEFAULT_SYNC_INTERVAL),
            fetch_max_age: secs(get(ENV_FETCH_MAX_AGE_SECS), ENV_FETCH_MAX_AGE_SECS)?
                .unwrap_or(DEFAULT_FETCH_MAX_AGE),
        })
    }
}

fn secs(value: Option<String>, var: &'static str) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            var,
            value,
            reason: "must be greater than zero".into(),
        }),
        Ok(n) => Ok(Some(Duration::from_secs(n))),
        Err(e) => Err(ConfigError::Invalid {
            var,
            value,
            reason: e.to_string(),
        }),
    }
}
