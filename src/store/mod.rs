//! Search index storage using SQLite
//!
//! Holds all persisted state: sites, pages, per-site lemma frequencies and
//! page/lemma rank entries. Lemma and rank upserts are single idempotent
//! statements so concurrent indexers never lose updates.

mod schema;

pub use schema::*;

use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Site indexing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SiteStatus {
    Indexing,
    Indexed,
    Failed,
}

impl std::fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SiteStatus::Indexing => write!(f, "INDEXING"),
            SiteStatus::Indexed => write!(f, "INDEXED"),
            SiteStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for SiteStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "INDEXING" => Ok(SiteStatus::Indexing),
            "INDEXED" => Ok(SiteStatus::Indexed),
            "FAILED" => Ok(SiteStatus::Failed),
            _ => Err(Error::Config(format!("Unknown site status: {}", s))),
        }
    }
}

/// A crawled site
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub status: String,
    pub status_time: String,
    pub last_error: Option<String>,
}

impl Site {
    pub fn status(&self) -> Result<SiteStatus> {
        self.status.parse()
    }
}

/// A fetched page, recorded for every fetch attempt
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub site_id: i64,
    pub path: String,
    pub response_code: i64,
    pub content: String,
}

/// A per-site lemma with its running frequency
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lemma {
    pub id: i64,
    pub site_id: i64,
    pub lemma: String,
    pub frequency: i64,
}

/// A page/lemma association: rank = occurrences on that page
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PageLemma {
    pub id: i64,
    pub page_id: i64,
    pub lemma_id: i64,
    pub rank: i64,
}

/// Per-site page and lemma counts for the statistics endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteStats {
    pub page_count: i64,
    pub lemma_count: i64,
}

/// Search index database handle
#[derive(Clone)]
pub struct SearchDb {
    pool: SqlitePool,
}

impl SearchDb {
    /// Open (creating if missing) the index database and apply the schema
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        Ok(Self { pool })
    }

    // ===== Site Operations =====

    /// Delete every site; pages, lemmas and rank rows cascade
    pub async fn reset_sites(&self) -> Result<()> {
        sqlx::query("DELETE FROM sites").execute(&self.pool).await?;
        Ok(())
    }

    /// Insert a site in the given status
    pub async fn insert_site(&self, url: &str, name: &str, status: SiteStatus) -> Result<Site> {
        let site = sqlx::query_as::<_, Site>(
            r#"
            INSERT INTO sites (url, name, status, status_time)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(url)
        .bind(name)
        .bind(status.to_string())
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        Ok(site)
    }

    pub async fn find_site_by_url(&self, url: &str) -> Result<Option<Site>> {
        let site = sqlx::query_as::<_, Site>("SELECT * FROM sites WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(site)
    }

    pub async fn get_site(&self, id: i64) -> Result<Option<Site>> {
        let site = sqlx::query_as::<_, Site>("SELECT * FROM sites WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(site)
    }

    pub async fn all_sites(&self) -> Result<Vec<Site>> {
        let sites = sqlx::query_as::<_, Site>("SELECT * FROM sites ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(sites)
    }

    /// Transition a site's status, recording the error message if any
    pub async fn set_site_status(
        &self,
        id: i64,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE sites SET status = ?, status_time = ?, last_error = ? WHERE id = ?",
        )
        .bind(status.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(last_error)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Bump a site's status_time after a persisted mutation
    pub async fn touch_site(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE sites SET status_time = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ===== Page Operations =====

    /// Insert a page or overwrite the existing (site, path) row in place
    pub async fn upsert_page(
        &self,
        site_id: i64,
        path: &str,
        response_code: i64,
        content: &str,
    ) -> Result<Page> {
        let page = sqlx::query_as::<_, Page>(
            r#"
            INSERT INTO pages (site_id, path, response_code, content)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(site_id, path) DO UPDATE SET
                response_code = excluded.response_code,
                content = excluded.content
            RETURNING *
            "#,
        )
        .bind(site_id)
        .bind(path)
        .bind(response_code)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        Ok(page)
    }

    pub async fn find_page_by_site_path(
        &self,
        site_id: i64,
        path: &str,
    ) -> Result<Option<Page>> {
        let page = sqlx::query_as::<_, Page>(
            "SELECT * FROM pages WHERE site_id = ? AND path = ?",
        )
        .bind(site_id)
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(page)
    }

    pub async fn get_page(&self, id: i64) -> Result<Option<Page>> {
        let page = sqlx::query_as::<_, Page>("SELECT * FROM pages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(page)
    }

    /// Count pages, optionally restricted to one site
    pub async fn count_pages(&self, site_id: Option<i64>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pages WHERE (? IS NULL OR site_id = ?)",
        )
        .bind(site_id)
        .bind(site_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // ===== Lemma Operations =====

    /// Insert-or-increment a site-scoped lemma by `delta`, returning its id.
    ///
    /// A single statement, so two concurrent indexers both land their
    /// contribution without a read-modify-write race.
    pub async fn upsert_lemma(&self, site_id: i64, lemma: &str, delta: i64) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO lemmas (site_id, lemma, frequency)
            VALUES (?, ?, ?)
            ON CONFLICT(site_id, lemma) DO UPDATE SET
                frequency = frequency + excluded.frequency
            RETURNING id
            "#,
        )
        .bind(site_id)
        .bind(lemma)
        .bind(delta)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Reverse a prior rank contribution
    pub async fn decrement_lemma(&self, lemma_id: i64, delta: i64) -> Result<()> {
        sqlx::query("UPDATE lemmas SET frequency = frequency - ? WHERE id = ?")
            .bind(delta)
            .bind(lemma_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_lemma(&self, id: i64) -> Result<Option<Lemma>> {
        let lemma = sqlx::query_as::<_, Lemma>("SELECT * FROM lemmas WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lemma)
    }

    pub async fn count_lemmas(&self, site_id: Option<i64>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM lemmas WHERE (? IS NULL OR site_id = ?)",
        )
        .bind(site_id)
        .bind(site_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Total frequency of a lemma text, summed across matching sites
    pub async fn sum_lemma_frequency(
        &self,
        lemma: &str,
        site_id: Option<i64>,
    ) -> Result<i64> {
        let sum: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(frequency), 0) FROM lemmas
            WHERE lemma = ? AND (? IS NULL OR site_id = ?)
            "#,
        )
        .bind(lemma)
        .bind(site_id)
        .bind(site_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(sum)
    }

    // ===== Page/Lemma Association Operations =====

    /// Add `rank` occurrences to the (page, lemma) association
    pub async fn upsert_page_lemma(
        &self,
        page_id: i64,
        lemma_id: i64,
        rank: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO page_lemmas (page_id, lemma_id, rank)
            VALUES (?, ?, ?)
            ON CONFLICT(page_id, lemma_id) DO UPDATE SET
                rank = rank + excluded.rank
            "#,
        )
        .bind(page_id)
        .bind(lemma_id)
        .bind(rank)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_page_lemmas(&self, page_id: i64) -> Result<Vec<PageLemma>> {
        let rows = sqlx::query_as::<_, PageLemma>(
            "SELECT * FROM page_lemmas WHERE page_id = ?",
        )
        .bind(page_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn delete_page_lemmas(&self, page_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM page_lemmas WHERE page_id = ?")
            .bind(page_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Pages (ids) that carry at least one rank entry for the lemma text
    pub async fn pages_with_lemma(
        &self,
        lemma: &str,
        site_id: Option<i64>,
    ) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT pl.page_id FROM page_lemmas pl
            JOIN lemmas l ON pl.lemma_id = l.id
            WHERE l.lemma = ? AND (? IS NULL OR l.site_id = ?)
            "#,
        )
        .bind(lemma)
        .bind(site_id)
        .bind(site_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Sum of a page's ranks restricted to the given lemma texts
    pub async fn page_rank_sum(&self, page_id: i64, lemmas: &[String]) -> Result<i64> {
        if lemmas.is_empty() {
            return Ok(0);
        }
        let placeholders = lemmas.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = format!(
            r#"
            SELECT COALESCE(SUM(pl.rank), 0) FROM page_lemmas pl
            JOIN lemmas l ON pl.lemma_id = l.id
            WHERE pl.page_id = ? AND l.lemma IN ({})
            "#,
            placeholders
        );
        let mut q = sqlx::query_scalar::<_, i64>(&query).bind(page_id);
        for lemma in lemmas {
            q = q.bind(lemma);
        }
        let sum = q.fetch_one(&self.pool).await?;
        Ok(sum)
    }

    // ===== Statistics =====

    pub async fn site_stats(&self, site_id: i64) -> Result<SiteStats> {
        Ok(SiteStats {
            page_count: self.count_pages(Some(site_id)).await?,
            lemma_count: self.count_lemmas(Some(site_id)).await?,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) async fn setup_test_db() -> (SearchDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = SearchDb::new(&tmp.path().join("test.db")).await.unwrap();
        (db, tmp)
    }

    #[tokio::test]
    async fn test_site_lifecycle() {
        let (db, _tmp) = setup_test_db().await;

        let site = db
            .insert_site("https://example.com/", "Example", SiteStatus::Indexing)
            .await
            .unwrap();
        assert_eq!(site.status().unwrap(), SiteStatus::Indexing);

        db.set_site_status(site.id, SiteStatus::Failed, Some("boom"))
            .await
            .unwrap();
        let loaded = db.find_site_by_url("https://example.com/").await.unwrap().unwrap();
        assert_eq!(loaded.status().unwrap(), SiteStatus::Failed);
        assert_eq!(loaded.last_error.as_deref(), Some("boom"));

        db.reset_sites().await.unwrap();
        assert!(db.all_sites().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_page_upsert_overwrites_in_place() {
        let (db, _tmp) = setup_test_db().await;
        let site = db
            .insert_site("https://example.com/", "Example", SiteStatus::Indexing)
            .await
            .unwrap();

        let first = db.upsert_page(site.id, "/a", 200, "old").await.unwrap();
        let second = db.upsert_page(site.id, "/a", 404, "").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.response_code, 404);
        assert_eq!(db.count_pages(Some(site.id)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lemma_upsert_increments() {
        let (db, _tmp) = setup_test_db().await;
        let site = db
            .insert_site("https://example.com/", "Example", SiteStatus::Indexing)
            .await
            .unwrap();

        let id1 = db.upsert_lemma(site.id, "лес", 3).await.unwrap();
        let id2 = db.upsert_lemma(site.id, "лес", 2).await.unwrap();
        assert_eq!(id1, id2);

        let lemma = db.get_lemma(id1).await.unwrap().unwrap();
        assert_eq!(lemma.frequency, 5);

        db.decrement_lemma(id1, 3).await.unwrap();
        let lemma = db.get_lemma(id1).await.unwrap().unwrap();
        assert_eq!(lemma.frequency, 2);
    }

    #[tokio::test]
    async fn test_page_lemma_rank_and_cascade() {
        let (db, _tmp) = setup_test_db().await;
        let site = db
            .insert_site("https://example.com/", "Example", SiteStatus::Indexing)
            .await
            .unwrap();
        let page = db.upsert_page(site.id, "/a", 200, "x").await.unwrap();
        let lemma_id = db.upsert_lemma(site.id, "лес", 2).await.unwrap();

        db.upsert_page_lemma(page.id, lemma_id, 2).await.unwrap();
        let rows = db.find_page_lemmas(page.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rank, 2);

        // deleting the site cascades through pages and associations
        db.reset_sites().await.unwrap();
        assert!(db.find_page_lemmas(page.id).await.unwrap().is_empty());
        assert!(db.get_lemma(lemma_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_frequency_sum_scoping() {
        let (db, _tmp) = setup_test_db().await;
        let a = db
            .insert_site("https://a.com/", "A", SiteStatus::Indexed)
            .await
            .unwrap();
        let b = db
            .insert_site("https://b.com/", "B", SiteStatus::Indexed)
            .await
            .unwrap();
        db.upsert_lemma(a.id, "лес", 4).await.unwrap();
        db.upsert_lemma(b.id, "лес", 6).await.unwrap();

        assert_eq!(db.sum_lemma_frequency("лес", None).await.unwrap(), 10);
        assert_eq!(db.sum_lemma_frequency("лес", Some(a.id)).await.unwrap(), 4);
        assert_eq!(db.sum_lemma_frequency("поле", None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pages_with_lemma_and_rank_sum() {
        let (db, _tmp) = setup_test_db().await;
        let site = db
            .insert_site("https://a.com/", "A", SiteStatus::Indexed)
            .await
            .unwrap();
        let p1 = db.upsert_page(site.id, "/1", 200, "x").await.unwrap();
        let p2 = db.upsert_page(site.id, "/2", 200, "x").await.unwrap();
        let l1 = db.upsert_lemma(site.id, "лес", 3).await.unwrap();
        let l2 = db.upsert_lemma(site.id, "поле", 1).await.unwrap();
        db.upsert_page_lemma(p1.id, l1, 2).await.unwrap();
        db.upsert_page_lemma(p1.id, l2, 1).await.unwrap();
        db.upsert_page_lemma(p2.id, l1, 1).await.unwrap();

        let mut pages = db.pages_with_lemma("лес", Some(site.id)).await.unwrap();
        pages.sort();
        assert_eq!(pages, vec![p1.id, p2.id]);

        let sum = db
            .page_rank_sum(p1.id, &["лес".to_string(), "поле".to_string()])
            .await
            .unwrap();
        assert_eq!(sum, 3);
    }
}
