//! Site crawler and lemma-based full-text search engine.
//!
//! Crawls the configured sites, builds a site-scoped inverted index of
//! lemma frequencies and per-page ranks in SQLite, and serves ranked
//! full-text search with highlighted snippets over a REST API.

pub mod config;
pub mod crawl;
pub mod error;
pub mod fetch;
pub mod index;
pub mod lemma;
pub mod link;
pub mod morph;
pub mod parse;
pub mod search;
pub mod server;
pub mod store;

pub use error::{Error, Result};
