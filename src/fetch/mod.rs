//! Page fetching with a status-code-shaped failure taxonomy
//!
//! Every fetch attempt resolves to a [`FetchOutcome`] rather than an error:
//! transport failures are classified into the same code space as HTTP
//! statuses at the point of failure, and callers persist the code verbatim.
//! 200 is the sole code that triggers downstream indexing.

use crate::config::FetchConfig;
use crate::error::Result;
use crate::parse;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Timeout (request did not complete within the configured budget)
pub const CODE_TIMEOUT: i64 = 408;
/// TLS handshake failure
pub const CODE_TLS: i64 = 525;
/// Malformed URL or unparsable response
pub const CODE_MALFORMED: i64 = 404;
/// Unsupported content type (non-HTML document)
pub const CODE_UNSUPPORTED_TYPE: i64 = 415;
/// Connection refused
pub const CODE_REFUSED: i64 = 500;
/// Unclassified failure
pub const CODE_UNCLASSIFIED: i64 = -1;

/// Result of one fetch attempt.
///
/// `content` is the raw markup when the status is 200, otherwise empty.
/// `links` holds the absolute anchor targets found in the markup, empty
/// unless the status is 200.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub status_code: i64,
    pub content: String,
    pub links: HashSet<String>,
}

impl FetchOutcome {
    fn failed(status_code: i64) -> Self {
        Self {
            status_code,
            content: String::new(),
            links: HashSet::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// HTTP fetcher configured once per indexing run
pub struct Fetcher {
    client: Client,
    referrer: String,
}

impl Fetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self {
            client,
            referrer: config.referrer.clone(),
        })
    }

    /// Fetch one URL, classifying every failure into the code taxonomy
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        if Url::parse(url).is_err() {
            return FetchOutcome::failed(CODE_MALFORMED);
        }

        debug!("Fetching: {}", url);

        let response = match self
            .client
            .get(url)
            .header(reqwest::header::REFERER, &self.referrer)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => return FetchOutcome::failed(classify(&e)),
        };

        let status = response.status().as_u16() as i64;
        if status != 200 {
            return FetchOutcome::failed(status);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();
        if !content_type.starts_with("text/html") {
            return FetchOutcome::failed(CODE_UNSUPPORTED_TYPE);
        }

        let content = match response.text().await {
            Ok(c) => c,
            Err(e) => return FetchOutcome::failed(classify(&e)),
        };

        let links = parse::extract_links(&content, url);
        FetchOutcome {
            status_code: 200,
            content,
            links,
        }
    }
}

/// Map a transport error to the failure taxonomy.
///
/// Classification inspects the typed error at the point of failure; the code
/// is never reconstructed downstream from message text.
fn classify(err: &reqwest::Error) -> i64 {
    if err.is_timeout() {
        return CODE_TIMEOUT;
    }
    if err.is_connect() {
        return match io_error_kind(err) {
            Some(std::io::ErrorKind::ConnectionRefused) => CODE_REFUSED,
            Some(std::io::ErrorKind::TimedOut) => CODE_TIMEOUT,
            // the TLS handshake happens inside the connect phase; a connect
            // failure that is not a refused or timed-out socket is one
            _ => CODE_TLS,
        };
    }
    if err.is_builder() {
        return CODE_MALFORMED;
    }
    if err.is_decode() || err.is_body() {
        return CODE_MALFORMED;
    }
    CODE_UNCLASSIFIED
}

/// First `std::io::Error` kind in the error's source chain
fn io_error_kind(err: &reqwest::Error) -> Option<std::io::ErrorKind> {
    let mut source = std::error::Error::source(err);
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            return Some(io.kind());
        }
        source = e.source();
    }
    None
}
