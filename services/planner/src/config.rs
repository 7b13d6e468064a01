//! services/planner/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub storage_dir: PathBuf,
    pub log_level: Level,
    /// Base URL of the realtime database. Without it favorites stay local.
    pub remote_db_url: Option<String>,
    pub remote_db_auth: Option<String>,
    pub firebase_api_key: Option<String>,
    pub auth_base_url: String,
    /// Secure token service used to renew a stored session.
    pub token_base_url: String,
    pub google_maps_api_key: Option<String>,
    pub maps_base_url: String,
    pub maps_language: String,
    pub places_limit: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Local Storage and Logging ---
        let storage_dir = lookup("STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Remote Favorites and Auth ---
        let remote_db_url = lookup("REMOTE_DB_URL")
            .filter(|url| !url.trim().is_empty())
            .map(|url| url.trim_end_matches('/').to_string());
        let remote_db_auth = lookup("REMOTE_DB_AUTH");
        let firebase_api_key = lookup("FIREBASE_API_KEY");
        let auth_base_url = lookup("AUTH_BASE_URL")
            .unwrap_or_else(|| "https://identitytoolkit.googleapis.com".to_string());
        let token_base_url = lookup("TOKEN_BASE_URL")
            .unwrap_or_else(|| "https://securetoken.googleapis.com".to_string());

        // --- Maps Provider ---
        let google_maps_api_key = lookup("GOOGLE_MAPS_API_KEY");
        let maps_base_url =
            lookup("MAPS_BASE_URL").unwrap_or_else(|| "https://maps.googleapis.com".to_string());
        let maps_language = lookup("MAPS_LANGUAGE").unwrap_or_else(|| "pt-BR".to_string());
        let places_limit = match lookup("PLACES_LIMIT") {
            Some(raw) => raw.parse::<usize>().map_err(|e| {
                ConfigError::InvalidValue("PLACES_LIMIT".to_string(), e.to_string())
            })?,
            None => 5,
        };

        Ok(Self {
            storage_dir,
            log_level,
            remote_db_url,
            remote_db_auth,
            firebase_api_key,
            auth_base_url,
            token_base_url,
            google_maps_api_key,
            maps_base_url,
            maps_language,
            places_limit,
        })
    }

    pub fn require_maps_key(&self) -> Result<&str, ConfigError> {
        self.google_maps_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVar("GOOGLE_MAPS_API_KEY".to_string()))
    }

    pub fn require_firebase_key(&self) -> Result<&str, ConfigError> {
        self.firebase_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVar("FIREBASE_API_KEY".to_string()))
    }
}
