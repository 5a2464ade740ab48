//! Page indexing: lemma frequency counters and page/lemma rank entries
//!
//! Each indexed page contributes its per-page occurrence count (rank) to the
//! site-scoped lemma frequency. Refreshing a page reverses its previous
//! contribution before reapplying the new one, so frequencies always reflect
//! current content only.

use crate::error::Result;
use crate::lemma::Lemmatizer;
use crate::store::{Page, SearchDb};
use std::sync::Arc;
use tracing::debug;

pub struct Indexer {
    store: SearchDb,
    lemmatizer: Arc<Lemmatizer>,
}

impl Indexer {
    pub fn new(store: SearchDb, lemmatizer: Arc<Lemmatizer>) -> Self {
        Self { store, lemmatizer }
    }

    /// Index a freshly persisted page: upsert every lemma's frequency and
    /// the (page, lemma) rank entry.
    pub async fn index_page(&self, page: &Page) -> Result<()> {
        let lemmas = self.lemmatizer.lemmas_from_html(&page.content);
        debug!(
            "Indexing page {} ({} distinct lemmas)",
            page.path,
            lemmas.len()
        );
        for (lemma, count) in lemmas {
            let lemma_id = self.store.upsert_lemma(page.site_id, &lemma, count).await?;
            self.store
                .upsert_page_lemma(page.id, lemma_id, count)
                .await?;
        }
        Ok(())
    }

    /// Re-index a page whose content was overwritten in place.
    ///
    /// The previous contribution is reversed first: each associated lemma's
    /// frequency is decremented by the prior rank and the page's rank rows
    /// are deleted, then the fresh content is indexed as usual.
    pub async fn refresh_index(&self, page: &Page) -> Result<()> {
        let prior = self.store.find_page_lemmas(page.id).await?;
        debug!(
            "Refreshing page {} (reversing {} rank entries)",
            page.path,
            prior.len()
        );
        for entry in &prior {
            self.store
                .decrement_lemma(entry.lemma_id, entry.rank)
                .await?;
        }
        self.store.delete_page_lemmas(page.id).await?;
        self.index_page(page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::morph::Passthrough;
    use crate::store::tests::setup_test_db;
    use crate::store::SiteStatus;
    use std::collections::HashMap;

    async fn setup() -> (SearchDb, Indexer, i64, tempfile::TempDir) {
        let (db, tmp) = setup_test_db().await;
        let site = db
            .insert_site("https://example.com/", "Example", SiteStatus::Indexing)
            .await
            .unwrap();
        let indexer = Indexer::new(
            db.clone(),
            Arc::new(Lemmatizer::new(Arc::new(Passthrough))),
        );
        (db, indexer, site.id, tmp)
    }

    #[tokio::test]
    async fn test_index_page_records_ranks_and_frequencies() {
        let (db, indexer, site_id, _tmp) = setup().await;
        let page = db
            .upsert_page(site_id, "/a", 200, "<html><body>лес лес поле</body></html>")
            .await
            .unwrap();
        indexer.index_page(&page).await.unwrap();

        assert_eq!(db.sum_lemma_frequency("лес", Some(site_id)).await.unwrap(), 2);
        assert_eq!(db.sum_lemma_frequency("поле", Some(site_id)).await.unwrap(), 1);
        assert_eq!(db.find_page_lemmas(page.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_frequency_accumulates_across_pages() {
        let (db, indexer, site_id, _tmp) = setup().await;
        let p1 = db
            .upsert_page(site_id, "/1", 200, "<html><body>лес лес</body></html>")
            .await
            .unwrap();
        let p2 = db
            .upsert_page(site_id, "/2", 200, "<html><body>лес</body></html>")
            .await
            .unwrap();
        indexer.index_page(&p1).await.unwrap();
        indexer.index_page(&p2).await.unwrap();

        assert_eq!(db.sum_lemma_frequency("лес", Some(site_id)).await.unwrap(), 3);
        // rank sum over the lemma's pages equals the frequency at quiescence
        let sum = db.page_rank_sum(p1.id, &["лес".to_string()]).await.unwrap()
            + db.page_rank_sum(p2.id, &["лес".to_string()]).await.unwrap();
        assert_eq!(sum, 3);
    }

    #[tokio::test]
    async fn test_refresh_with_identical_content_is_a_noop() {
        let (db, indexer, site_id, _tmp) = setup().await;
        let content = "<html><body>лес лес поле</body></html>";
        let page = db.upsert_page(site_id, "/a", 200, content).await.unwrap();
        indexer.index_page(&page).await.unwrap();

        let before: HashMap<String, i64> = snapshot(&db, site_id).await;

        let page = db.upsert_page(site_id, "/a", 200, content).await.unwrap();
        indexer.refresh_index(&page).await.unwrap();
        let page = db.upsert_page(site_id, "/a", 200, content).await.unwrap();
        indexer.refresh_index(&page).await.unwrap();

        assert_eq!(snapshot(&db, site_id).await, before);
    }

    #[tokio::test]
    async fn test_refresh_reverses_old_contribution() {
        let (db, indexer, site_id, _tmp) = setup().await;
        let page = db
            .upsert_page(site_id, "/a", 200, "<html><body>лес лес лес</body></html>")
            .await
            .unwrap();
        indexer.index_page(&page).await.unwrap();
        assert_eq!(db.sum_lemma_frequency("лес", Some(site_id)).await.unwrap(), 3);

        let page = db
            .upsert_page(site_id, "/a", 200, "<html><body>поле</body></html>")
            .await
            .unwrap();
        indexer.refresh_index(&page).await.unwrap();

        assert_eq!(db.sum_lemma_frequency("лес", Some(site_id)).await.unwrap(), 0);
        assert_eq!(db.sum_lemma_frequency("поле", Some(site_id)).await.unwrap(), 1);
        assert_eq!(db.page_rank_sum(page.id, &["лес".to_string()]).await.unwrap(), 0);
    }

    async fn snapshot(db: &SearchDb, site_id: i64) -> HashMap<String, i64> {
        let mut map = HashMap::new();
        for lemma in ["лес", "поле"] {
            map.insert(
                lemma.to_string(),
                db.sum_lemma_frequency(lemma, Some(site_id)).await.unwrap(),
            );
        }
        map
    }
}
