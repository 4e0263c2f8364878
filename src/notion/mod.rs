//! Notion-backed content source.
//!
//! Lists the published pages of one database and the immediate children of a
//! page. Every upstream failure is logged before it reaches the caller.
use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::error::SourceError;
use crate::fetch::{FetchClient, HttpTransport, RequestSpec, RetryPolicy, Transport};
use crate::notion::model::{Block, ListResponse, Page};

pub mod model;

const NOTION_API_BASE: &str = "https://api.notion.com/";

/// Content source consumed by the presentation layer.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Published pages in the order the database returns them.
    async fn fetch_published_pages(&self) -> Result<Vec<Page>, SourceError>;

    /// Immediate child blocks of `page_id`.
    async fn fetch_page_blocks(&self, page_id: &str) -> Result<Vec<Block>, SourceError>;
}

/// Filter selecting published pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedFilter {
    pub status_property: String,
    pub published_value: String,
}

#[derive(Clone)]
pub struct NotionSource {
    fetch: FetchClient,
    base_url: Url,
    token: Option<String>,
    version: String,
    database_id: Option<String>,
    filter: PublishedFilter,
}

impl fmt::Debug for NotionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionSource")
            .field("base_url", &self.base_url)
            .field("database_id", &self.database_id)
            .finish_non_exhaustive()
    }
}

impl NotionSource {
    /// Build a source talking to the public Notion API over reqwest.
    pub fn from_config(cfg: &Config) -> Result<Self, reqwest::Error> {
        let transport = Arc::new(HttpTransport::new()?);
        let base_url = Url::parse(NOTION_API_BASE).expect("valid default Notion URL");
        Ok(Self::with_transport(cfg, transport, base_url))
    }

    pub fn with_transport(cfg: &Config, transport: Arc<dyn Transport>, base_url: Url) -> Self {
        let fetch = FetchClient::new(transport, RetryPolicy::from(&cfg.fetch));
        Self {
            fetch,
            base_url,
            token: cfg.notion.token.clone().filter(|t| !t.trim().is_empty()),
            version: cfg.notion.version.clone(),
            database_id: cfg.notion.database_id.clone().filter(|d| !d.trim().is_empty()),
            filter: PublishedFilter {
                status_property: cfg.notion.fields.status.clone(),
                published_value: cfg.notion.fields.published.clone(),
            },
        }
    }

    fn token(&self) -> Result<&str, SourceError> {
        self.token
            .as_deref()
            .ok_or(SourceError::Configuration("notion.token / NOTION_API_KEY"))
    }

    /// Base URL with `segments` appended, each percent-encoded as one segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, SourceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::Configuration("notion base URL"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, method: Method, url: Url, token: &str) -> RequestSpec {
        RequestSpec::new(method, url)
            .header("Authorization", format!("Bearer {}", token))
            .header("Notion-Version", self.version.clone())
    }

    pub fn build_query_request(&self) -> Result<RequestSpec, SourceError> {
        let token = self.token()?;
        let database_id = self
            .database_id
            .as_deref()
            .ok_or(SourceError::Configuration("notion.database_id / NOTION_DATABASE_ID"))?;
        let url = self.endpoint(&["v1", "databases", database_id, "query"])?;
        Ok(self
            .authorized(Method::POST, url, token)
            .header("Content-Type", "application/json")
            .json(build_published_query(&self.filter)))
    }

    pub fn build_children_request(&self, page_id: &str) -> Result<RequestSpec, SourceError> {
        let token = self.token()?;
        if !is_notion_id(page_id) {
            return Err(SourceError::InvalidId(page_id.to_string()));
        }
        let url = self.endpoint(&["v1", "blocks", page_id, "children"])?;
        Ok(self.authorized(Method::GET, url, token))
    }

    async fn list<T: DeserializeOwned>(&self, request: RequestSpec) -> Result<Vec<T>, SourceError> {
        let res = match self.fetch.execute(&request).await {
            Ok(res) => res,
            Err(err) => {
                warn!(url = %request.url, error = ?err, "notion request failed after retries");
                return Err(err.into());
            }
        };

        if !res.status.is_success() {
            warn!(url = %request.url, status = %res.status, body = %res.body, "notion API error");
            return Err(SourceError::QueryFailed {
                status: res.status,
                body: res.body,
            });
        }

        let payload: ListResponse<T> = serde_json::from_str(&res.body).map_err(|err| {
            warn!(url = %request.url, ?err, body = %res.body, "invalid notion response");
            SourceError::Decode(err)
        })?;
        if payload.has_more {
            debug!(url = %request.url, "notion reported more results; only the first page is used");
        }
        Ok(payload.results)
    }
}

#[async_trait]
impl ContentSource for NotionSource {
    #[instrument(skip_all)]
    async fn fetch_published_pages(&self) -> Result<Vec<Page>, SourceError> {
        let request = self.build_query_request()?;
        let pages: Vec<Page> = self.list(request).await?;
        debug!(count = pages.len(), "fetched published pages");
        Ok(pages)
    }

    #[instrument(skip(self))]
    async fn fetch_page_blocks(&self, page_id: &str) -> Result<Vec<Block>, SourceError> {
        let request = self.build_children_request(page_id)?;
        let blocks: Vec<Block> = self.list(request).await?;
        debug!(count = blocks.len(), "fetched page blocks");
        Ok(blocks)
    }
}

/// 32 hex digits, optionally broken up by dashes as in a UUID.
pub fn is_notion_id(id: &str) -> bool {
    let mut digits = 0;
    for c in id.chars() {
        match c {
            '-' => {}
            c if c.is_ascii_hexdigit() => digits += 1,
            _ => return false,
        }
    }
    digits == 32
}

pub fn build_published_query(filter: &PublishedFilter) -> Value {
    json!({
        "filter": {
            "property": filter.status_property,
            "status": {
                "equals": filter.published_value,
            }
        }
    })
}
