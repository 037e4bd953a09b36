//! Configuration management for the OS2Phonebook service.
//!
//! All configuration comes from environment variables (optionally via a
//! `.env` file) and is validated once at startup.

use crate::error::{ConfigError, ConfigResult};
use std::env;
use std::path::PathBuf;

/// Basic-auth credentials for the data-load endpoints.
///
/// "No credentials configured" is an explicit disabled state: the load
/// endpoints reject every request instead of silently comparing against an
/// empty user map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataloadAuth {
    /// Load endpoints reject all requests
    Disabled,

    /// Single dataloader account
    Basic { username: String, password: String },
}

impl DataloadAuth {
    /// Check a username/password pair against the configured credentials.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        match self {
            DataloadAuth::Disabled => false,
            DataloadAuth::Basic {
                username: expected_user,
                password: expected_pass,
            } => username == expected_user && password == expected_pass,
        }
    }
}

/// Configuration for the OS2Phonebook service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Organisation name shown by the status endpoint
    pub company_name: String,

    /// Directory holding the import cache files
    pub cache_root: PathBuf,

    /// Bind address for the HTTP service (default: "0.0.0.0:8000")
    pub bind_addr: String,

    /// OS2MO service base URL
    pub mo_url: String,

    /// Optional OS2MO session token
    pub mo_token: Option<String>,

    /// Search index backend host
    pub datastore_host: String,

    /// Search index backend port
    pub datastore_port: u16,

    /// Credentials for the load endpoints
    pub dataload_auth: DataloadAuth,

    /// Bounded worker pool size for import enrichment (default: 10)
    pub import_concurrency: usize,

    /// HTTP request timeout in seconds (default: 10)
    pub request_timeout: u64,

    /// Logging level (default: "info")
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `OS2PHONEBOOK_COMPANY_NAME`: Organisation name for the status endpoint
    /// - `OS2PHONEBOOK_CACHE_ROOT`: Directory for the import cache files
    /// - `MO_SERVICE_URL`: Base URL of the OS2MO service API
    /// - `ELASTICSEARCH_HOST` / `ELASTICSEARCH_PORT`: Index backend address
    ///
    /// Optional environment variables:
    /// - `OS2PHONEBOOK_BIND_ADDR`: HTTP bind address (default: "0.0.0.0:8000")
    /// - `MO_API_TOKEN`: Session token for OS2MO
    /// - `OS2PHONEBOOK_DATALOADER_USERNAME` / `_PASSWORD`: Load endpoint
    ///   credentials; both must be given or both omitted
    /// - `IMPORT_CONCURRENCY`: Enrichment worker pool size (default: 10)
    /// - `REQUEST_TIMEOUT`: HTTP timeout in seconds (default: 10)
    /// - `LOG_LEVEL`: Logging level (default: "info")
    pub fn from_env() -> ConfigResult<Self> {
        // Load .env if present; missing file is not an error
        let _ = dotenvy::dotenv();

        let company_name = Self::require("OS2PHONEBOOK_COMPANY_NAME")?;
        let cache_root = PathBuf::from(Self::require("OS2PHONEBOOK_CACHE_ROOT")?);
        let mo_url = Self::require("MO_SERVICE_URL")?;

        if !mo_url.starts_with("http://") && !mo_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                var: "MO_SERVICE_URL".to_string(),
                reason: "Must start with http:// or https://".to_string(),
            });
        }

        let datastore_host = Self::require("ELASTICSEARCH_HOST")?;
        let datastore_port = Self::require("ELASTICSEARCH_PORT")?
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue {
                var: "ELASTICSEARCH_PORT".to_string(),
                reason: "Must be a port number".to_string(),
            })?;

        let dataload_auth = match (
            env::var("OS2PHONEBOOK_DATALOADER_USERNAME").ok(),
            env::var("OS2PHONEBOOK_DATALOADER_PASSWORD").ok(),
        ) {
            (Some(username), Some(password)) => DataloadAuth::Basic { username, password },
            (None, None) => DataloadAuth::Disabled,
            _ => {
                return Err(ConfigError::InvalidValue {
                    var: "OS2PHONEBOOK_DATALOADER_USERNAME".to_string(),
                    reason: "Username and password must be configured together".to_string(),
                })
            }
        };

        Ok(Config {
            company_name,
            cache_root,
            bind_addr: env::var("OS2PHONEBOOK_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            mo_url,
            mo_token: env::var("MO_API_TOKEN").ok().filter(|t| !t.trim().is_empty()),
            datastore_host,
            datastore_port,
            dataload_auth,
            import_concurrency: Self::parse_env_usize("IMPORT_CONCURRENCY", 10)?,
            request_timeout: Self::parse_env_u64("REQUEST_TIMEOUT", 10)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Base URL of the index backend.
    pub fn datastore_url(&self) -> String {
        format!("http://{}:{}", self.datastore_host, self.datastore_port)
    }

    fn require(var_name: &str) -> ConfigResult<String> {
        match env::var(var_name) {
            Ok(val) if !val.trim().is_empty() => Ok(val),
            _ => Err(ConfigError::MissingVar(var_name.to_string())),
        }
    }

    /// Parse an environment variable as u64 with a default value.
    fn parse_env_u64(var_name: &str, default: u64) -> ConfigResult<u64> {
        match env::var(var_name) {
            Ok(val) => val.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                var: var_name.to_string(),
                reason: format!("Must be a positive number, got: {}", val),
            }),
            Err(_) => Ok(default),
        }
    }

    /// Parse an environment variable as usize with a default value.
    fn parse_env_usize(var_name: &str, default: usize) -> ConfigResult<usize> {
        match env::var(var_name) {
            Ok(val) => val.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                var: var_name.to_string(),
                reason: format!("Must be a positive number, got: {}", val),
            }),
            Err(_) => Ok(default),
        }
    }
}
