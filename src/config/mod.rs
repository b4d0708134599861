//! Application configuration management

use std::env;
use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_API_URL: &str = "https://api.airtable.com/v0";

/// Application configuration loaded from environment variables
#[derive(Clone)]
pub struct Config {
    /// Server bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Airtable personal access token
    pub airtable_api_key: String,

    /// Airtable base identifier (appXXXXXXXXXXXXXX)
    pub airtable_base_id: String,

    /// Airtable REST API root, overridable for testing against a mock server
    pub airtable_api_url: String,

    /// Per-request timeout for calls to Airtable
    pub airtable_timeout: Duration,

    /// Outbound request budget per second (Airtable allows 5 per base)
    pub airtable_requests_per_second: u32,

    /// Attempts made when Airtable answers 429 Too Many Requests
    pub airtable_max_retries: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{key} is required"))
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),

            port: lookup("PORT")
                .unwrap_or_else(|| "8000".to_string())
                .parse()
                .context("Invalid PORT")?,

            airtable_api_key: required("AIRTABLE_API_KEY")?,

            airtable_base_id: required("AIRTABLE_BASE_ID")?,

            airtable_api_url: lookup("AIRTABLE_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),

            airtable_timeout: Duration::from_secs(
                lookup("AIRTABLE_TIMEOUT_SECS")
                    .unwrap_or_else(|| "30".to_string())
                    .parse()
                    .context("Invalid AIRTABLE_TIMEOUT_SECS")?,
            ),

            airtable_requests_per_second: lookup("AIRTABLE_REQUESTS_PER_SECOND")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .context("Invalid AIRTABLE_REQUESTS_PER_SECOND")?,

            airtable_max_retries: lookup("AIRTABLE_MAX_RETRIES")
                .unwrap_or_else(|| "3".to_string())
                .parse()
                .context("Invalid AIRTABLE_MAX_RETRIES")?,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("airtable_api_key", &"<redacted>")
            .field("airtable_base_id", &self.airtable_base_id)
            .field("airtable_api_url", &self.airtable_api_url)
            .field("airtable_timeout", &self.airtable_timeout)
            .field("airtable_requests_per_second", &self.airtable_requests_per_second)
            .field("airtable_max_retries", &self.airtable_max_retries)
            .finish()
    }
}
