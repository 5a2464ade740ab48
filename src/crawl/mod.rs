//! Concurrent site crawling with cancellation
//!
//! A site crawl is a tree of units: one unit fetches a single path, persists
//! the attempt, hands successful pages to the indexer and spawns a child unit
//! per in-scope link. A parent waits only on its own children. The visited
//! set is the sole structure mutated concurrently across a site's units; the
//! run-wide indexing flag is the sole cancellation mechanism.

mod flag;

pub use flag::IndexingFlag;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::index::Indexer;
use crate::link;
use crate::store::{SearchDb, Site, SiteStatus};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

/// Message recorded on sites interrupted by the user
const STOPPED_BY_USER: &str = "Indexing stopped by user";

/// Shared state of one site's crawl, passed by reference to every unit
struct CrawlContext {
    store: SearchDb,
    fetcher: Arc<Fetcher>,
    indexer: Arc<Indexer>,
    flag: Arc<IndexingFlag>,
    site: Site,
    visited: RwLock<HashSet<String>>,
}

/// Crawl coordinator for a full indexing run
pub struct Crawler {
    store: SearchDb,
    config: Arc<Config>,
    indexer: Arc<Indexer>,
    flag: Arc<IndexingFlag>,
}

impl Crawler {
    pub fn new(
        store: SearchDb,
        config: Arc<Config>,
        indexer: Arc<Indexer>,
        flag: Arc<IndexingFlag>,
    ) -> Self {
        Self {
            store,
            config,
            indexer,
            flag,
        }
    }

    /// Run a full indexing pass over every configured site.
    ///
    /// Site rows are reset and recreated in INDEXING status, all sites crawl
    /// concurrently, and each is finalized independently: INDEXED on success,
    /// FAILED with the captured message on error or user cancellation. The
    /// run flag is cleared once every site has finished.
    pub async fn run(&self) -> Result<()> {
        self.store.reset_sites().await?;

        let mut sites = Vec::new();
        for entry in &self.config.sites {
            let site = self
                .store
                .insert_site(&entry.url, &entry.name, SiteStatus::Indexing)
                .await?;
            info!("Indexing site id: {} url: {}", site.id, site.url);
            sites.push(site);
        }

        let fetcher = Arc::new(Fetcher::new(&self.config.fetch)?);

        let mut tasks = JoinSet::new();
        for site in sites {
            let ctx = Arc::new(CrawlContext {
                store: self.store.clone(),
                fetcher: fetcher.clone(),
                indexer: self.indexer.clone(),
                flag: self.flag.clone(),
                site,
                visited: RwLock::new(HashSet::new()),
            });
            tasks.spawn(crawl_site(ctx));
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!("Site crawl task panicked: {}", e);
            }
        }

        self.flag.finish();
        info!("Indexing run finished");
        Ok(())
    }

    /// Re-index a single page by URL.
    ///
    /// The URL must fall inside one of the configured sites. An existing
    /// (site, path) page row is overwritten in place, otherwise a new row is
    /// inserted; either way the indexer's refresh operation reverses the
    /// page's prior contribution before reapplying.
    pub async fn refresh_page(&self, url: &str) -> Result<()> {
        let entry = self
            .config
            .site_for_url(url)
            .ok_or_else(|| Error::UrlOutsideSites(url.to_string()))?;
        let path = link::canonical_path(url)?;

        let site = match self.store.find_site_by_url(&entry.url).await? {
            Some(site) => site,
            None => {
                self.store
                    .insert_site(&entry.url, &entry.name, SiteStatus::Indexed)
                    .await?
            }
        };

        info!("Refreshing page {} of site {}", path, site.url);
        let fetcher = Fetcher::new(&self.config.fetch)?;
        let outcome = fetcher.fetch(url).await;

        let page = self
            .store
            .upsert_page(site.id, &path, outcome.status_code, &outcome.content)
            .await?;
        self.store.touch_site(site.id).await?;
        self.indexer.refresh_index(&page).await?;
        Ok(())
    }
}

/// Crawl one site from its root and finalize its status
async fn crawl_site(ctx: Arc<CrawlContext>) {
    let result = crawl_unit(ctx.clone(), "/".to_string()).await;

    let (status, message) = if let Err(e) = &result {
        warn!("Site {} failed: {}", ctx.site.url, e);
        (SiteStatus::Failed, Some(e.to_string()))
    } else if !ctx.flag.is_active() {
        warn!("Site {} interrupted by user", ctx.site.url);
        (SiteStatus::Failed, Some(STOPPED_BY_USER.to_string()))
    } else {
        info!("Site {} indexed", ctx.site.url);
        (SiteStatus::Indexed, None)
    };
    if let Err(e) = ctx
        .store
        .set_site_status(ctx.site.id, status, message.as_deref())
        .await
    {
        warn!("Failed to finalize site {}: {}", ctx.site.url, e);
    }
}

/// One unit of work: fetch a path, persist the attempt, index on success and
/// fan out into child units for every in-scope unvisited link.
///
/// Boxed because the recursion goes through spawned child tasks.
fn crawl_unit(ctx: Arc<CrawlContext>, path: String) -> BoxFuture<'static, Result<()>> {
    async move {
        if !ctx.flag.is_active() {
            return Ok(());
        }
        // atomic check-and-mark: a path reached via two referring pages is
        // fetched exactly once
        if !ctx.visited.write().await.insert(path.clone()) {
            return Ok(());
        }

        let url = page_url(&ctx.site.url, &path)?;
        let outcome = ctx.fetcher.fetch(&url).await;
        debug!("Fetched {} -> {}", url, outcome.status_code);

        // every attempt is recorded, success or failure
        let page = ctx
            .store
            .upsert_page(ctx.site.id, &path, outcome.status_code, &outcome.content)
            .await?;
        ctx.store.touch_site(ctx.site.id).await?;

        if !ctx.flag.is_active() {
            return Ok(());
        }
        if !outcome.is_success() || outcome.content.is_empty() {
            return Ok(());
        }

        // best-effort per page: an indexing failure never aborts siblings
        if let Err(e) = ctx.indexer.index_page(&page).await {
            warn!("Indexing failed for {}: {}", page.path, e);
        }

        let mut children = JoinSet::new();
        for candidate in &outcome.links {
            if !ctx.flag.is_active() {
                break;
            }
            if !link::is_in_scope(candidate, &ctx.site.url) {
                continue;
            }
            let Ok(child_path) = link::canonical_path(candidate) else {
                continue;
            };
            if ctx.visited.read().await.contains(&child_path) {
                continue;
            }
            children.spawn(crawl_unit(ctx.clone(), child_path));
        }

        // a parent joins only its own children
        let mut first_err = None;
        while let Some(joined) = children.join_next().await {
            match joined {
                Ok(Err(e)) if first_err.is_none() => first_err = Some(e),
                Ok(_) => {}
                Err(e) => warn!("Crawl unit panicked: {}", e),
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
    .boxed()
}

/// Absolute URL of a path under a site root
fn page_url(site_root: &str, path: &str) -> Result<String> {
    let root = Url::parse(site_root).map_err(|e| Error::Crawl(format!("{}: {}", site_root, e)))?;
    let url = root
        .join(path)
        .map_err(|e| Error::Crawl(format!("{}: {}", path, e)))?;
    Ok(url.to_string())
}
