//! Client configuration (environment-driven).

use std::path::PathBuf;

use thiserror::Error;
use villadmin_auth::TokenStore;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const BASE_URL_ENV: &str = "VILLADMIN_API_BASE_URL";
pub const TOKEN_FILE_ENV: &str = "VILLADMIN_TOKEN_FILE";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid API base URL '{0}': must start with http:// or https://")]
    InvalidBaseUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: String,
    storage_path: Option<PathBuf>,
}

impl ClientConfig {
    /// Config for `base_url` with the default token file location.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: normalize_base_url(base_url.into())?,
            storage_path: default_storage_path(),
        })
    }

    /// Read `VILLADMIN_API_BASE_URL` and `VILLADMIN_TOKEN_FILE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let mut config = Self::new(base_url)?;
        if let Ok(path) = std::env::var(TOKEN_FILE_ENV) {
            config.storage_path = Some(PathBuf::from(path));
        }
        Ok(config)
    }

    pub fn with_storage_path(mut self, path: Option<PathBuf>) -> Self {
        self.storage_path = path;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn storage_path(&self) -> Option<&PathBuf> {
        self.storage_path.as_ref()
    }

    /// File-backed store, or a headless one when no location is configured.
    pub fn token_store(&self) -> TokenStore {
        match &self.storage_path {
            Some(path) => TokenStore::file(path),
            None => {
                tracing::debug!("no token storage location; running headless");
                TokenStore::headless()
            }
        }
    }
}

fn normalize_base_url(raw: String) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(ConfigError::InvalidBaseUrl(raw));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

/// `<data dir>/villadmin/session.json`, when the platform has a data dir.
pub fn default_storage_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("villadmin").join("session.json"))
}
