//! HTTP surface consumed by the presentation layer.
//!
//! # Routes
//!
//! - `GET /api/pages` - published pages as returned by the source
//! - `GET /api/sections` - pages grouped into category sections of cards
//! - `GET /api/page-content/:id` - immediate child blocks of a page
//! - `GET /api/page-content/:id/html` - the same blocks rendered to HTML
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::{Config, Fields};
use crate::error::SourceError;
use crate::grouping::{group, GroupingConfig};
use crate::notion::model::{Block, Page};
use crate::notion::ContentSource;
use crate::render::{render_page, to_html};
use crate::view::{sections, Section};

pub mod cache;

use cache::ResponseCache;

const PAGES_KEY: &str = "pages";

/// Shared state handed to every handler. Configuration is read-only.
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn ContentSource>,
    pub fields: Arc<Fields>,
    pub pages: Arc<ResponseCache<Vec<Page>>>,
    pub blocks: Arc<ResponseCache<Vec<Block>>>,
}

impl AppState {
    pub fn new(source: Arc<dyn ContentSource>, cfg: &Config) -> Self {
        let ttl = Duration::from_secs(cfg.server.cache_ttl_seconds);
        Self {
            source,
            fields: Arc::new(cfg.notion.fields.clone()),
            pages: Arc::new(ResponseCache::new(ttl)),
            blocks: Arc::new(ResponseCache::new(ttl)),
        }
    }

    async fn published_pages(&self) -> Result<Vec<Page>, SourceError> {
        let source = Arc::clone(&self.source);
        self.pages
            .get_or_load(PAGES_KEY, move || async move {
                source.fetch_published_pages().await
            })
            .await
    }

    async fn page_blocks(&self, page_id: &str) -> Result<Vec<Block>, SourceError> {
        let source = Arc::clone(&self.source);
        let id = page_id.to_string();
        self.blocks
            .get_or_load(page_id, move || async move {
                source.fetch_page_blocks(&id).await
            })
            .await
    }
}

/// Generic message plus status; details stay in the logs.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    fn from_source(err: SourceError, message: &'static str) -> Self {
        // reqwest and axum sit on different `http` majors
        let status = StatusCode::from_u16(err.status_code().as_u16())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        error!(?err, %status, "{}", message);
        ApiError { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/pages", get(list_pages))
        .route("/api/sections", get(list_sections))
        .route("/api/page-content/:id", get(page_content))
        .route("/api/page-content/:id/html", get(page_content_html))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let addr: SocketAddr = bind.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "serving content API");
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

async fn list_pages(State(state): State<AppState>) -> Result<Json<Vec<Page>>, ApiError> {
    state
        .published_pages()
        .await
        .map(Json)
        .map_err(|err| ApiError::from_source(err, "failed to fetch pages"))
}

async fn list_sections(State(state): State<AppState>) -> Result<Json<Vec<Section>>, ApiError> {
    let pages = state
        .published_pages()
        .await
        .map_err(|err| ApiError::from_source(err, "failed to fetch pages"))?;
    let grouped = group(pages, &GroupingConfig::from(state.fields.as_ref()));
    Ok(Json(sections(&grouped, &state.fields)))
}

async fn page_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Block>>, ApiError> {
    state
        .page_blocks(&id)
        .await
        .map(Json)
        .map_err(|err| ApiError::from_source(err, "failed to fetch page content"))
}

async fn page_content_html(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, ApiError> {
    let blocks = state
        .page_blocks(&id)
        .await
        .map_err(|err| ApiError::from_source(err, "failed to fetch page content"))?;
    Ok(Html(to_html(&render_page(&blocks))))
}
