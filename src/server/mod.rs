//! REST API server
//!
//! Exposes indexing control, single-page refresh, ranked search and index
//! statistics over HTTP.

mod handlers;
mod routes;

pub use routes::create_router;

use crate::config::Config;
use crate::crawl::{Crawler, IndexingFlag};
use crate::lemma::Lemmatizer;
use crate::morph::AnalyzerHandle;
use crate::search::SearchEngine;
use crate::store::SearchDb;
use std::net::SocketAddr;
use std::sync::Arc;

/// Shared state for the API server.
#[derive(Clone)]
pub struct AppState {
    pub store: SearchDb,
    pub config: Arc<Config>,
    pub crawler: Arc<Crawler>,
    pub engine: Arc<SearchEngine>,
    pub flag: Arc<IndexingFlag>,
}

impl AppState {
    pub async fn new(config: Arc<Config>, analyzer: AnalyzerHandle) -> anyhow::Result<Self> {
        let store = SearchDb::new(&config.database_path).await?;
        let lemmatizer = Arc::new(Lemmatizer::new(analyzer));
        let flag = IndexingFlag::new();
        let indexer = Arc::new(crate::index::Indexer::new(store.clone(), lemmatizer.clone()));
        let crawler = Arc::new(Crawler::new(
            store.clone(),
            config.clone(),
            indexer,
            flag.clone(),
        ));
        let engine = Arc::new(SearchEngine::new(store.clone(), lemmatizer));

        Ok(Self {
            store,
            config,
            crawler,
            engine,
            flag,
        })
    }
}

/// Start the API server.
pub async fn serve(config: Arc<Config>, analyzer: AnalyzerHandle) -> anyhow::Result<()> {
    let addr: SocketAddr =
        format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = AppState::new(config, analyzer).await?;
    let app = create_router(state);

    tracing::info!("Starting API server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
