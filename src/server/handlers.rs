//! API endpoint handlers.

use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use super::AppState;
use crate::error::Error;
use crate::search::SearchResult;

/// Error payload: HTTP status plus a message rendered as
/// `{"result": false, "error": ...}`
pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "result": false, "error": self.1 }));
        (self.0, body).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::EmptyQuery
            | Error::IndexNotReady
            | Error::UrlOutsideSites(_)
            | Error::SiteNotFound(_)
            | Error::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            Error::IndexingAlreadyRunning => StatusCode::CONFLICT,
            Error::IndexingNotRunning => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(status, err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct TotalStatistics {
    sites: usize,
    pages: i64,
    lemmas: i64,
    indexing: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SiteStatistics {
    url: String,
    name: String,
    status: String,
    status_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    pages: i64,
    lemmas: i64,
}

#[derive(Debug, Serialize)]
struct Statistics {
    total: TotalStatistics,
    detailed: Vec<SiteStatistics>,
}

/// GET /api/statistics
///
/// Index totals plus one detailed row per site. Configured sites that have
/// never been crawled appear with the WAIT pseudo-status and zero counts.
pub async fn statistics(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let sites = state.store.all_sites().await?;

    let mut detailed = Vec::new();
    let mut total_pages = 0;
    let mut total_lemmas = 0;
    for site in &sites {
        let stats = state.store.site_stats(site.id).await?;
        total_pages += stats.page_count;
        total_lemmas += stats.lemma_count;
        detailed.push(SiteStatistics {
            url: site.url.clone(),
            name: site.name.clone(),
            status: site.status.clone(),
            status_time: site.status_time.clone(),
            error: site.last_error.clone(),
            pages: stats.page_count,
            lemmas: stats.lemma_count,
        });
    }
    for entry in &state.config.sites {
        if sites.iter().any(|s| s.url == entry.url) {
            continue;
        }
        detailed.push(SiteStatistics {
            url: entry.url.clone(),
            name: entry.name.clone(),
            status: "WAIT".to_string(),
            status_time: Utc::now().to_rfc3339(),
            error: None,
            pages: 0,
            lemmas: 0,
        });
    }

    let statistics = Statistics {
        total: TotalStatistics {
            sites: detailed.len(),
            pages: total_pages,
            lemmas: total_lemmas,
            indexing: state.flag.is_active(),
        },
        detailed,
    };
    Ok(Json(json!({ "result": true, "statistics": statistics })))
}

/// GET /api/startIndexing
///
/// Kick off a full indexing run in the background. A second call while a run
/// is active is rejected.
pub async fn start_indexing(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.flag.begin() {
        return Err(Error::IndexingAlreadyRunning.into());
    }
    info!("Indexing run requested");
    let crawler = state.crawler.clone();
    tokio::spawn(async move {
        if let Err(e) = crawler.run().await {
            error!("Indexing run failed: {}", e);
        }
    });
    Ok(Json(json!({ "result": true })))
}

/// GET /api/stopIndexing
///
/// Request cancellation of the active run. Rejected when nothing is running.
pub async fn stop_indexing(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.flag.stop() {
        return Err(Error::IndexingNotRunning.into());
    }
    info!("Indexing cancellation requested");
    Ok(Json(json!({ "result": true })))
}

#[derive(Debug, Deserialize)]
pub struct IndexPageRequest {
    pub url: String,
}

/// POST /api/indexPage
///
/// Re-fetch and re-index a single page. The URL must belong to one of the
/// configured sites.
pub async fn index_page(
    State(state): State<AppState>,
    Form(request): Form<IndexPageRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.crawler.refresh_page(&request.url).await?;
    Ok(Json(json!({ "result": true })))
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
    pub site: Option<String>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub result: bool,
    pub count: usize,
    pub data: Vec<SearchResult>,
}

/// GET /api/search
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let outcome = state
        .engine
        .search(
            &params.query,
            params.site.as_deref(),
            params.offset,
            params.limit,
        )
        .await?;
    Ok(Json(SearchResponse {
        result: true,
        count: outcome.count,
        data: outcome.data,
    }))
}
