//! Ranked full-text search over the lemma index
//!
//! A query is lemmatized with the same pipeline that built the index, overly
//! common lemmas are discarded, candidate pages are intersected starting from
//! the rarest lemma, and survivors are scored by their summed ranks relative
//! to the best page of the result set.

mod snippet;

use crate::error::{Error, Result};
use crate::lemma::Lemmatizer;
use crate::parse;
use crate::store::{SearchDb, Site, SiteStatus};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Lemmas present on more than this share of pages carry no signal
const FREQUENCY_CUTOFF_PERCENT: f64 = 80.0;

/// One ranked search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Root URL of the site the page belongs to
    pub site: String,
    pub site_name: String,
    /// Site-relative path of the page
    pub uri: String,
    pub title: String,
    pub snippet: String,
    pub relevance: f64,
}

/// A page of results plus the full pre-pagination hit count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub count: usize,
    pub data: Vec<SearchResult>,
}

impl SearchOutcome {
    fn empty() -> Self {
        Self {
            count: 0,
            data: Vec::new(),
        }
    }
}

struct CachedQuery {
    query: String,
    site: Option<String>,
    results: Vec<SearchResult>,
}

/// Query execution engine over the persisted index
pub struct SearchEngine {
    store: SearchDb,
    lemmatizer: Arc<Lemmatizer>,
    last_query: Mutex<Option<CachedQuery>>,
}

impl SearchEngine {
    pub fn new(store: SearchDb, lemmatizer: Arc<Lemmatizer>) -> Self {
        Self {
            store,
            lemmatizer,
            last_query: Mutex::new(None),
        }
    }

    /// Execute a search, optionally restricted to one site root.
    ///
    /// A non-zero offset repeating the previous (query, site) pair is served
    /// from the cached result list, so walking pages of one query never
    /// recomputes or reshuffles it. Index readiness is verified on every
    /// call, cached or not.
    pub async fn search(
        &self,
        query: &str,
        site: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> Result<SearchOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::EmptyQuery);
        }

        let scope = self.resolve_scope(site).await?;

        if offset != 0 {
            let cached = self.last_query.lock().await;
            if let Some(last) = cached.as_ref() {
                if last.query == query && last.site.as_deref() == site {
                    debug!("Serving offset {} of cached query {:?}", offset, query);
                    return Ok(paginate(&last.results, offset, limit));
                }
            }
        }

        let results = self.execute(query, scope).await?;

        let mut cached = self.last_query.lock().await;
        *cached = Some(CachedQuery {
            query: query.to_string(),
            site: site.map(str::to_string),
            results: results.clone(),
        });
        Ok(paginate(&results, offset, limit))
    }

    /// Resolve the scope site id and require every site in scope to be fully
    /// indexed
    async fn resolve_scope(&self, site: Option<&str>) -> Result<Option<i64>> {
        match site {
            Some(url) => {
                let site = self
                    .store
                    .find_site_by_url(url)
                    .await?
                    .ok_or_else(|| Error::SiteNotFound(url.to_string()))?;
                if site.status()? != SiteStatus::Indexed {
                    return Err(Error::IndexNotReady);
                }
                Ok(Some(site.id))
            }
            None => {
                let sites = self.store.all_sites().await?;
                if sites.is_empty() {
                    return Err(Error::IndexNotReady);
                }
                for site in &sites {
                    if site.status()? != SiteStatus::Indexed {
                        return Err(Error::IndexNotReady);
                    }
                }
                Ok(None)
            }
        }
    }

    /// Compute the full ranked result list for a query
    async fn execute(&self, query: &str, scope: Option<i64>) -> Result<Vec<SearchResult>> {
        let counts = self.lemmatizer.lemmas_from_text(query);
        if counts.is_empty() {
            return Ok(Vec::new());
        }
        let total_pages = self.store.count_pages(scope).await?;
        if total_pages == 0 {
            return Ok(Vec::new());
        }

        // drop absent lemmas and ones too common to discriminate, keep the
        // rest ordered rarest first
        let mut lemmas: Vec<(String, i64)> = Vec::new();
        for lemma in counts.keys() {
            let freq = self.store.sum_lemma_frequency(lemma, scope).await?;
            if freq == 0 {
                continue;
            }
            let share = freq as f64 / total_pages as f64 * 100.0;
            if share > FREQUENCY_CUTOFF_PERCENT {
                debug!("Lemma {:?} on {:.0}% of pages, skipping", lemma, share);
                continue;
            }
            lemmas.push((lemma.clone(), freq));
        }
        lemmas.sort_by_key(|(_, freq)| *freq);
        if lemmas.is_empty() {
            return Ok(Vec::new());
        }
        let lemma_texts: Vec<String> = lemmas.into_iter().map(|(l, _)| l).collect();

        // intersect page id sets starting from the rarest lemma
        let mut pages = self.store.pages_with_lemma(&lemma_texts[0], scope).await?;
        for lemma in &lemma_texts[1..] {
            if pages.is_empty() {
                break;
            }
            let next: HashSet<i64> = self
                .store
                .pages_with_lemma(lemma, scope)
                .await?
                .into_iter()
                .collect();
            pages.retain(|id| next.contains(id));
        }
        if pages.is_empty() {
            return Ok(Vec::new());
        }

        // absolute relevance per page, then the global max before dividing
        let mut scored = Vec::new();
        for page_id in pages {
            let abs = self.store.page_rank_sum(page_id, &lemma_texts).await?;
            scored.push((page_id, abs));
        }
        let max = scored.iter().map(|(_, abs)| *abs).max().unwrap_or(0);
        if max == 0 {
            return Ok(Vec::new());
        }

        let lemma_set: HashSet<String> = lemma_texts.iter().cloned().collect();
        let mut site_cache: HashMap<i64, Site> = HashMap::new();
        let mut results = Vec::new();
        for (page_id, abs) in scored {
            let Some(page) = self.store.get_page(page_id).await? else {
                continue;
            };
            let site = match site_cache.get(&page.site_id) {
                Some(site) => site.clone(),
                None => {
                    let Some(site) = self.store.get_site(page.site_id).await? else {
                        continue;
                    };
                    site_cache.insert(page.site_id, site.clone());
                    site
                }
            };
            let text = parse::extract_text(&page.content);
            results.push(SearchResult {
                site: site.url.trim_end_matches('/').to_string(),
                site_name: site.name,
                uri: page.path,
                title: parse::extract_title(&page.content).unwrap_or_default(),
                snippet: snippet::build_snippet(&text, &lemma_set, &self.lemmatizer),
                relevance: abs as f64 / max as f64,
            });
        }
        results.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(Ordering::Equal)
        });
        Ok(results)
    }
}

/// Slice the full result list for one response page.
///
/// An offset past the end always yields an empty page; otherwise a list that
/// fits within the limit is returned whole. The count always reflects the
/// full list.
fn paginate(results: &[SearchResult], offset: usize, limit: usize) -> SearchOutcome {
    let total = results.len();
    let data = if offset >= total {
        Vec::new()
    } else if total <= limit {
        results.to_vec()
    } else {
        results[offset..(offset + limit).min(total)].to_vec()
    };
    SearchOutcome { count: total, data }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Indexer;
    use crate::morph::Passthrough;
    use crate::store::tests::setup_test_db;
    use tempfile::TempDir;

    async fn setup() -> (SearchDb, SearchEngine, Indexer, TempDir) {
        let (db, tmp) = setup_test_db().await;
        let lemmatizer = Arc::new(Lemmatizer::new(Arc::new(Passthrough)));
        let engine = SearchEngine::new(db.clone(), lemmatizer.clone());
        let indexer = Indexer::new(db.clone(), lemmatizer);
        (db, engine, indexer, tmp)
    }

    async fn add_page(db: &SearchDb, indexer: &Indexer, site_id: i64, path: &str, body: &str) {
        let html = format!("<html><head><title>{}</title></head><body>{}</body></html>", path, body);
        let page = db.upsert_page(site_id, path, 200, &html).await.unwrap();
        indexer.index_page(&page).await.unwrap();
    }

    #[tokio::test]
    async fn test_blank_query_rejected() {
        let (_db, engine, _indexer, _tmp) = setup().await;
        assert!(matches!(
            engine.search("   ", None, 0, 20).await,
            Err(Error::EmptyQuery)
        ));
    }

    #[tokio::test]
    async fn test_unfinished_index_rejected() {
        let (db, engine, _indexer, _tmp) = setup().await;
        db.insert_site("https://a.com/", "A", SiteStatus::Indexing)
            .await
            .unwrap();
        assert!(matches!(
            engine.search("лес", None, 0, 20).await,
            Err(Error::IndexNotReady)
        ));
    }

    #[tokio::test]
    async fn test_relevance_is_relative_to_best_page() {
        let (db, engine, indexer, _tmp) = setup().await;
        let site = db
            .insert_site("https://a.com/", "A", SiteStatus::Indexed)
            .await
            .unwrap();
        add_page(&db, &indexer, site.id, "/1", &"лес ".repeat(5)).await;
        add_page(&db, &indexer, site.id, "/2", &"лес ".repeat(2)).await;
        add_page(&db, &indexer, site.id, "/3", "лес").await;
        for i in 0..8 {
            add_page(&db, &indexer, site.id, &format!("/f{}", i), "поле").await;
        }

        let outcome = engine.search("лес", None, 0, 20).await.unwrap();
        assert_eq!(outcome.count, 3);
        let relevances: Vec<f64> = outcome.data.iter().map(|r| r.relevance).collect();
        assert_eq!(relevances, vec![1.0, 0.4, 0.2]);
        assert_eq!(outcome.data[0].uri, "/1");
        assert_eq!(outcome.data[0].site, "https://a.com");
        assert_eq!(outcome.data[0].title, "/1");
        assert!(outcome.data[0].snippet.contains("<b>лес</b>"));
    }

    #[tokio::test]
    async fn test_multi_lemma_query_intersects() {
        let (db, engine, indexer, _tmp) = setup().await;
        let site = db
            .insert_site("https://a.com/", "A", SiteStatus::Indexed)
            .await
            .unwrap();
        add_page(&db, &indexer, site.id, "/both", "лес поле").await;
        add_page(&db, &indexer, site.id, "/one", "лес").await;
        add_page(&db, &indexer, site.id, "/x1", "трава").await;
        add_page(&db, &indexer, site.id, "/x2", "трава").await;

        let outcome = engine.search("лес поле", None, 0, 20).await.unwrap();
        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.data[0].uri, "/both");
    }

    #[tokio::test]
    async fn test_overly_common_lemma_dropped_from_query() {
        let (db, engine, indexer, _tmp) = setup().await;
        let site = db
            .insert_site("https://a.com/", "A", SiteStatus::Indexed)
            .await
            .unwrap();
        // "лес" sits on 9 of 10 pages and stops discriminating; "поле" on one
        for i in 0..9 {
            add_page(&db, &indexer, site.id, &format!("/{}", i), "лес").await;
        }
        add_page(&db, &indexer, site.id, "/rare", "поле").await;

        let outcome = engine.search("лес поле", None, 0, 20).await.unwrap();
        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.data[0].uri, "/rare");

        // on its own the common lemma yields nothing at all
        let alone = engine.search("лес", None, 0, 20).await.unwrap();
        assert_eq!(alone.count, 0);
        assert!(alone.data.is_empty());
    }

    #[tokio::test]
    async fn test_site_scope_restricts_results() {
        let (db, engine, indexer, _tmp) = setup().await;
        let a = db
            .insert_site("https://a.com/", "A", SiteStatus::Indexed)
            .await
            .unwrap();
        let b = db
            .insert_site("https://b.com/", "B", SiteStatus::Indexed)
            .await
            .unwrap();
        add_page(&db, &indexer, a.id, "/a", "лес").await;
        add_page(&db, &indexer, b.id, "/b", "лес").await;
        add_page(&db, &indexer, b.id, "/b2", "поле").await;

        let outcome = engine
            .search("лес", Some("https://b.com/"), 0, 20)
            .await
            .unwrap();
        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.data[0].site_name, "B");

        assert!(matches!(
            engine.search("лес", Some("https://c.com/"), 0, 20).await,
            Err(Error::SiteNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pagination_slices() {
        let (db, engine, indexer, _tmp) = setup().await;
        let site = db
            .insert_site("https://a.com/", "A", SiteStatus::Indexed)
            .await
            .unwrap();
        add_page(&db, &indexer, site.id, "/1", &"лес ".repeat(3)).await;
        add_page(&db, &indexer, site.id, "/2", &"лес ".repeat(2)).await;
        add_page(&db, &indexer, site.id, "/3", "лес").await;
        for i in 0..5 {
            add_page(&db, &indexer, site.id, &format!("/f{}", i), "поле").await;
        }

        // the list fits in a large limit and is returned whole
        let all = engine.search("лес", None, 2, 20).await.unwrap();
        assert_eq!(all.data.len(), 3);

        let first = engine.search("лес", None, 0, 2).await.unwrap();
        assert_eq!(first.count, 3);
        assert_eq!(first.data.len(), 2);
        assert_eq!(first.data[0].uri, "/1");

        let second = engine.search("лес", None, 2, 2).await.unwrap();
        assert_eq!(second.data.len(), 1);
        assert_eq!(second.data[0].uri, "/3");

        let past_end = engine.search("лес", None, 10, 2).await.unwrap();
        assert!(past_end.data.is_empty());
        assert_eq!(past_end.count, 3);

        // an offset past the end stays empty even when the limit would have
        // covered the whole list
        let past_end_large_limit = engine.search("лес", None, 100, 20).await.unwrap();
        assert!(past_end_large_limit.data.is_empty());
        assert_eq!(past_end_large_limit.count, 3);
    }

    #[tokio::test]
    async fn test_offset_replays_cached_results() {
        let (db, engine, indexer, _tmp) = setup().await;
        let site = db
            .insert_site("https://a.com/", "A", SiteStatus::Indexed)
            .await
            .unwrap();
        add_page(&db, &indexer, site.id, "/1", &"лес ".repeat(3)).await;
        add_page(&db, &indexer, site.id, "/2", &"лес ".repeat(2)).await;
        add_page(&db, &indexer, site.id, "/3", "лес").await;
        for i in 0..5 {
            add_page(&db, &indexer, site.id, &format!("/f{}", i), "поле").await;
        }

        let first = engine.search("лес", None, 0, 1).await.unwrap();
        assert_eq!(first.data[0].uri, "/1");

        // the index grows a better page, but paging the same query stays
        // on the list computed at offset 0
        add_page(&db, &indexer, site.id, "/0", &"лес ".repeat(4)).await;
        let second = engine.search("лес", None, 1, 1).await.unwrap();
        assert_eq!(second.count, 3);
        assert_eq!(second.data[0].uri, "/2");
    }

    #[tokio::test]
    async fn test_unready_index_rejected_even_for_cached_offsets() {
        let (db, engine, indexer, _tmp) = setup().await;
        let site = db
            .insert_site("https://a.com/", "A", SiteStatus::Indexed)
            .await
            .unwrap();
        add_page(&db, &indexer, site.id, "/1", &"лес ".repeat(2)).await;
        add_page(&db, &indexer, site.id, "/2", "лес").await;
        for i in 0..3 {
            add_page(&db, &indexer, site.id, &format!("/f{}", i), "поле").await;
        }

        let first = engine.search("лес", None, 0, 1).await.unwrap();
        assert_eq!(first.count, 2);

        // a re-crawl takes the site out of INDEXED; paging the same query
        // must now be rejected, not replayed from the cache
        db.set_site_status(site.id, SiteStatus::Indexing, None)
            .await
            .unwrap();
        assert!(matches!(
            engine.search("лес", None, 1, 1).await,
            Err(Error::IndexNotReady)
        ));
    }
}
