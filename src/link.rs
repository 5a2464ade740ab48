//! URL validation and canonical path derivation
//!
//! Crawl scope is content pages only: links carrying query strings or
//! fragments are excluded so parameter-driven URL spaces cannot blow up the
//! crawl frontier.

use crate::error::{Error, Result};
use url::Url;

/// Derive the canonical path of `url` relative to a site root.
///
/// Strips query and fragment, collapses a trailing slash (except for the
/// root itself) and rejects URLs without a scheme or host.
pub fn canonical_path(url: &str) -> Result<String> {
    let parsed = parse_absolute(url)?;
    let path = parsed.path();
    if path.is_empty() || path == "/" {
        return Ok("/".to_string());
    }
    Ok(path.trim_end_matches('/').to_string())
}

/// True iff `candidate` is an in-scope content link for the site rooted at
/// `site_root`: same scheme and host, no query, no fragment.
pub fn is_in_scope(candidate: &str, site_root: &str) -> bool {
    let (candidate, root) = match (parse_absolute(candidate), parse_absolute(site_root)) {
        (Ok(c), Ok(r)) => (c, r),
        _ => return false,
    };
    if candidate.scheme() != root.scheme() || candidate.host_str() != root.host_str() {
        return false;
    }
    candidate.query().is_none() && candidate.fragment().is_none()
}

fn parse_absolute(url: &str) -> Result<Url> {
    if url.trim().is_empty() {
        return Err(Error::InvalidUrl("blank URL".to_string()));
    }
    let parsed = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;
    if parsed.host_str().is_none() {
        return Err(Error::InvalidUrl(format!("{}: no host", url)));
    }
    Ok(parsed)
}
