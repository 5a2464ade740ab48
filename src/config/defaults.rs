//! Default values for configuration

use std::path::PathBuf;

/// Default SQLite database location
pub fn default_database_path() -> PathBuf {
    PathBuf::from("sitesearch.db")
}

/// Default user agent sent with every fetch
pub fn default_user_agent() -> String {
    format!("sitesearch/{} (Site Indexer)", env!("CARGO_PKG_VERSION"))
}

/// Default referrer sent with every fetch
pub fn default_referrer() -> String {
    "https://www.google.com".to_string()
}

/// Default request timeout in seconds
pub fn default_fetch_timeout() -> u64 {
    60
}

/// Default bind host for the REST server
pub fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

/// Default bind port for the REST server
pub fn default_server_port() -> u16 {
    8080
}
