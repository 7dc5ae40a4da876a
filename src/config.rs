use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::retry::{DEFAULT_DELAY, DEFAULT_MAX_ATTEMPTS, RetryPolicy};

pub const DEFAULT_CONFIG_FILE: &str = "opendata-sync.json";
pub const DEFAULT_API_URL: &str = "https://dados.mg.gov.br/api/3/action/package_show?id=despesa";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;

pub const ACCESS_KEY_ID_VAR: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_ACCESS_KEY_VAR: &str = "AWS_SECRET_ACCESS_KEY";
pub const REGION_VARS: [&str; 2] = ["REGION", "AWS_REGION"];

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub base_output_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub metadata_file: Option<Utf8PathBuf>,
    #[serde(default)]
    pub data_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub staging_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub remote_prefix: Option<String>,
    #[serde(default)]
    pub retry: Option<RetryEntry>,
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RetryEntry {
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub delay_secs: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub api_url: String,
    pub base_output_dir: Utf8PathBuf,
    pub metadata_file: Utf8PathBuf,
    pub data_dir: Utf8PathBuf,
    pub staging_dir: Utf8PathBuf,
    pub bucket: String,
    pub remote_prefix: String,
    pub retry: RetryPolicy,
    pub http_timeout: Duration,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `opendata-sync.json` when none is given. A missing default file
    /// resolves to the built-in defaults; a missing explicit file is an error.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, SyncError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            tracing::debug!("no config file, using defaults");
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| SyncError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| SyncError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, SyncError> {
        let retry = config.retry.unwrap_or_default();
        let max_attempts = retry.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if max_attempts == 0 {
            return Err(SyncError::ConfigParse(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        let delay = match retry.delay_secs {
            Some(secs) => Duration::try_from_secs_f64(secs)
                .map_err(|err| SyncError::ConfigParse(format!("retry.delay_secs: {err}")))?,
            None => DEFAULT_DELAY,
        };

        Ok(ResolvedConfig {
            api_url: config
                .api_url
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            base_output_dir: config
                .base_output_dir
                .unwrap_or_else(|| Utf8PathBuf::from("data/raw")),
            metadata_file: config
                .metadata_file
                .unwrap_or_else(|| Utf8PathBuf::from("data/metadados_despesa.json")),
            data_dir: config.data_dir.unwrap_or_else(|| Utf8PathBuf::from("data")),
            staging_dir: config
                .staging_dir
                .unwrap_or_else(|| Utf8PathBuf::from("data/raw")),
            bucket: config
                .bucket
                .unwrap_or_else(|| "credencial-datalake".to_string()),
            remote_prefix: config
                .remote_prefix
                .unwrap_or_else(|| "despesas-mg".to_string()),
            retry: RetryPolicy::new(max_attempts, delay),
            http_timeout: Duration::from_secs(
                config.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            ),
        })
    }
}

#[derive(Clone)]
pub struct ObjectStoreCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl std::fmt::Debug for ObjectStoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

impl ObjectStoreCredentials {
    /// Loads `.env` if present, then reads credentials from the process environment.
    pub fn from_env() -> Result<Self, SyncError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<L>(lookup: L) -> Result<Self, SyncError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| SyncError::MissingCredential(key.to_string()))
        };
        let access_key_id = require(ACCESS_KEY_ID_VAR)?;
        let secret_access_key = require(SECRET_ACCESS_KEY_VAR)?;
        let region = REGION_VARS
            .iter()
            .find_map(|key| require(*key).ok())
            .ok_or_else(|| SyncError::MissingCredential(REGION_VARS.join(" or ")))?;
        Ok(Self {
            access_key_id,
            secret_access_key,
            region,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.api_url, DEFAULT_API_URL);
        assert_eq!(resolved.retry, RetryPolicy::default());
        assert_eq!(resolved.staging_dir, "data/raw");
    }

    #[test]
    fn credentials_fall_back_to_aws_region() {
        let creds = ObjectStoreCredentials::from_lookup(|key| match key {
            ACCESS_KEY_ID_VAR => Some("AKIA".to_string()),
            SECRET_ACCESS_KEY_VAR => Some("secret".to_string()),
            "AWS_REGION" => Some("sa-east-1".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(creds.region, "sa-east-1");
        assert!(!format!("{creds:?}").contains("\"secret\""));
    }
}
