//! Configuration management for sitesearch
//!
//! Handles loading and validating configuration from TOML files.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sites to crawl and index
    #[serde(default)]
    pub sites: Vec<SiteEntry>,

    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Fetch configuration
    #[serde(default)]
    pub fetch: FetchConfig,

    /// REST server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// One configured site: the crawl root and a display name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteEntry {
    pub url: String,
    pub name: String,
}

/// HTTP fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Referrer header value
    #[serde(default = "default_referrer")]
    pub referrer: String,

    /// Request timeout in seconds
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
}

/// REST server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            referrer: default_referrer(),
            timeout_secs: default_fetch_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sites: Vec::new(),
            database_path: default_database_path(),
            fetch: FetchConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults so that read-only commands still
    /// work; an unreadable or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        debug!("Loading config from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate site entries: every root must be an absolute http(s) URL.
    pub fn validate(&self) -> Result<()> {
        for site in &self.sites {
            let url = Url::parse(&site.url)
                .map_err(|e| Error::Config(format!("Bad site url {}: {}", site.url, e)))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(Error::Config(format!(
                    "Site url {} must use http or https",
                    site.url
                )));
            }
            if url.host_str().is_none() {
                return Err(Error::Config(format!("Site url {} has no host", site.url)));
            }
        }
        Ok(())
    }

    /// Find the configured site whose root covers the given URL, if any.
    pub fn site_for_url(&self, url: &str) -> Option<&SiteEntry> {
        self.sites
            .iter()
            .find(|s| crate::link::is_in_scope(url, &s.url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            database_path = "/tmp/search.db"

            [[sites]]
            url = "https://example.com/"
            name = "Example"

            [fetch]
            user_agent = "test-agent"
            referrer = "https://referrer.example"
            timeout_secs = 30

            [server]
            host = "0.0.0.0"
            port = 9090
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();

        assert_eq!(config.sites.len(), 1);
        assert_eq!(config.sites[0].name, "Example");
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database_path, PathBuf::from("/tmp/search.db"));
    }

    #[test]
    fn test_defaults_applied() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.sites.is_empty());
        assert_eq!(config.fetch.timeout_secs, 60);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_validate_rejects_bad_scheme() {
        let config = Config {
            sites: vec![SiteEntry {
                url: "ftp://example.com/".to_string(),
                name: "Bad".to_string(),
            }],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_site_for_url() {
        let config = Config {
            sites: vec![SiteEntry {
                url: "https://example.com/".to_string(),
                name: "Example".to_string(),
            }],
            ..Default::default()
        };
        assert!(config.site_for_url("https://example.com/page").is_some());
        assert!(config.site_for_url("https://other.com/page").is_none());
    }
}
