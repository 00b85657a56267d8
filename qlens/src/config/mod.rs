//! Configuration management for qlens
//!
//! Default config location: ~/.qlens/config.toml

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::aggs::interval::DEFAULT_BAR_TARGET;
use crate::search::MissingTimeFieldPolicy;
use crate::time::{check_date_format, PPL_DATE_FORMAT};

/// Main configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Where the query backend lives and how long to wait for it
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Data source forwarded with every request, if any
    #[serde(default)]
    pub data_source_id: Option<String>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5601".to_string()
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_connect_timeout() -> u64 {
    5_000
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout(),
            connect_timeout_ms: default_connect_timeout(),
            data_source_id: None,
        }
    }
}

/// Backend paths, one per query language plus query assist
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_ppl_path")]
    pub ppl: String,
    #[serde(default = "default_sql_path")]
    pub sql: String,
    #[serde(default = "default_sql_async_path")]
    pub sql_async: String,
    #[serde(default = "default_assist_path")]
    pub query_assist: String,
}

fn default_ppl_path() -> String {
    "/api/pplql/search".to_string()
}

fn default_sql_path() -> String {
    "/api/sqlql/search".to_string()
}

fn default_sql_async_path() -> String {
    "/api/sqlasyncql/jobs".to_string()
}

fn default_assist_path() -> String {
    "/api/ql/query_assist/generate".to_string()
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            ppl: default_ppl_path(),
            sql: default_sql_path(),
            sql_async: default_sql_async_path(),
            query_assist: default_assist_path(),
        }
    }
}

/// Query translation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// strftime format for time filter literals
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Approximate bar count for automatically sized histograms
    #[serde(default = "default_bar_target")]
    pub histogram_bar_target: u32,
    /// What to do when a PPL schema has no time field
    #[serde(default)]
    pub missing_time_field: MissingTimeFieldPolicy,
}

fn default_date_format() -> String {
    PPL_DATE_FORMAT.to_string()
}

fn default_bar_target() -> u32 {
    DEFAULT_BAR_TARGET
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            date_format: default_date_format(),
            histogram_bar_target: default_bar_target(),
            missing_time_field: MissingTimeFieldPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log output format: "pretty" or "json"
    /// Override with LOG_FORMAT env var
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter string
    /// Override with RUST_LOG env var
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_log_level() -> String {
    "info,qlens=debug".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".qlens")
        .join("config.toml")
}

/// Expand ~ to home directory in path
pub fn expand_tilde(path: &Path) -> Result<PathBuf> {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
        Ok(home.join(rest))
    } else if s == "~" {
        dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))
    } else {
        Ok(path.to_path_buf())
    }
}

impl Config {
    /// Load config from default location (~/.qlens/config.toml)
    pub fn load() -> Result<Self> {
        Self::load_from(&default_config_path())
    }

    /// Load config from a file, falling back to defaults if it is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        let path = expand_tilde(path)?;
        let config = if path.exists() {
            let content = fs::read_to_string(&path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Load config from file path, or create default
    pub fn load_or_create(config_path: &Path) -> Result<Self> {
        let config_path = expand_tilde(config_path)?;
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            if let Err(e) = config.save(&config_path) {
                tracing::warn!(path = %config_path.display(), "Failed to write default config: {}", e);
            }
            Ok(config)
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.backend.base_url)
            .map_err(|e| anyhow!("invalid backend.base_url '{}': {}", self.backend.base_url, e))?;
        if self.search.histogram_bar_target == 0 {
            return Err(anyhow!("search.histogram_bar_target must be at least 1"));
        }
        check_date_format(&self.search.date_format)
            .map_err(|e| anyhow!("search.date_format: {}", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.endpoints.ppl, "/api/pplql/search");
        assert_eq!(config.endpoints.sql_async, "/api/sqlasyncql/jobs");
        assert_eq!(config.search.date_format, "%Y-%m-%d %H:%M:%S");
        assert_eq!(config.search.histogram_bar_target, 50);
        assert_eq!(config.search.missing_time_field, MissingTimeFieldPolicy::Omit);
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [backend]
            base_url = "https://dashboards.example.com"

            [search]
            missing_time_field = "reject"
            "#,
        )
        .unwrap();
        assert_eq!(config.backend.base_url, "https://dashboards.example.com");
        assert_eq!(config.backend.request_timeout_ms, 30_000);
        assert_eq!(config.search.missing_time_field, MissingTimeFieldPolicy::Reject);
        assert_eq!(config.endpoints, EndpointsConfig::default());
    }

    #[test]
    fn test_expand_tilde_passthrough() {
        let p = Path::new("/etc/qlens.toml");
        assert_eq!(expand_tilde(p).unwrap(), p);
    }
}
