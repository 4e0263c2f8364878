use notion_showcase::config::{self, Config};
use notion_showcase::error::SourceError;
use notion_showcase::fetch::HttpTransport;
use notion_showcase::notion::model::BlockContent;
use notion_showcase::notion::{ContentSource, NotionSource};
use notion_showcase::render::{render_page, RenderNode};
use reqwest::{StatusCode, Url};
use serde_json::json;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing_subscriber::fmt::MakeWriter;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE_ID: &str = "a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d";

fn test_config() -> Config {
    let mut cfg: Config = serde_yaml::from_str(config::example()).unwrap();
    cfg.notion.token = Some("secret".into());
    cfg.notion.database_id = Some("db-1".into());
    cfg.fetch.attempts = 3;
    cfg.fetch.backoff_ms = 100;
    cfg.fetch.timeout_ms = 5_000;
    cfg
}

fn source_for(server: &MockServer, cfg: &Config) -> NotionSource {
    let base = Url::parse(&format!("{}/", server.uri())).unwrap();
    NotionSource::with_transport(cfg, Arc::new(HttpTransport::new().unwrap()), base)
}

/// Collects formatted log output for assertions.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn page_json(id: &str) -> serde_json::Value {
    json!({
        "object": "page",
        "id": id,
        "last_edited_time": "2024-04-01T09:30:00.000Z",
        "properties": {
            "タイトル": { "id": "title", "type": "title", "title": [{ "plain_text": id }] },
            "コンテンツタイプ": { "id": "ct", "type": "select", "select": { "id": "s", "name": "論文", "color": "green" } }
        }
    })
}

#[tokio::test]
async fn query_sends_published_filter_and_preserves_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/databases/db-1/query"))
        .and(header("Authorization", "Bearer secret"))
        .and(header("Notion-Version", "2022-06-28"))
        .and(body_json(json!({
            "filter": { "property": "公開状態", "status": { "equals": "公開済み" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "results": [page_json("b"), page_json("a")],
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = source_for(&server, &test_config());
    let pages = source.fetch_published_pages().await.unwrap();
    let ids: Vec<&str> = pages.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(pages[0].option_name("コンテンツタイプ"), Some("論文"));
}

#[tokio::test]
async fn recovers_from_server_errors_with_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/databases/db-1/query"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/databases/db-1/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [page_json("a")] })))
        .expect(1)
        .mount(&server)
        .await;

    let source = source_for(&server, &test_config());
    let started = Instant::now();
    let pages = source.fetch_published_pages().await.unwrap();
    assert_eq!(pages.len(), 1);
    // 100ms + 200ms of backoff
    assert!(started.elapsed().as_millis() >= 300);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn client_error_is_surfaced_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/blocks/0f0e0d0c0b0a09080706050403020100/children"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "object": "error", "status": 404, "code": "object_not_found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let source = source_for(&server, &test_config());
    let err = source.fetch_page_blocks("0f0e0d0c0b0a09080706050403020100").await.unwrap_err();
    match err {
        SourceError::QueryFailed { status, body } => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert!(body.contains("object_not_found"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn exhausted_server_errors_are_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/blocks/{}/children", PAGE_ID)))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let mut cfg = test_config();
    cfg.fetch.attempts = 2;
    let source = source_for(&server, &cfg);
    let err = source.fetch_page_blocks(PAGE_ID).await.unwrap_err();
    assert!(matches!(err, SourceError::Transient(_)));
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn blocks_decode_and_render_with_fallbacks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/blocks/{}/children", PAGE_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "id": "1", "type": "heading_1", "heading_1": { "rich_text": [{ "plain_text": "Intro" }] } },
                { "id": "2", "type": "image", "image": {
                    "type": "file", "file": { "url": "https://s3/fig.png", "expiry_time": "2024-01-01T00:00:00Z" },
                    "caption": [{ "plain_text": "Fig. 1" }]
                } },
                { "id": "3", "type": "table", "table": { "table_width": 2 } },
                { "id": "4", "type": "paragraph", "paragraph": { "rich_text": null } },
                { "id": "5", "type": "divider", "divider": {} }
            ],
            "has_more": true
        })))
        .mount(&server)
        .await;

    let source = source_for(&server, &test_config());
    let blocks = source.fetch_page_blocks(PAGE_ID).await.unwrap();
    assert_eq!(blocks.len(), 5);
    assert!(matches!(blocks[0].content, BlockContent::Heading1(_)));

    let nodes = render_page(&blocks);
    assert!(matches!(nodes[0], RenderNode::Heading { level: 1, .. }));
    assert_eq!(
        nodes[1],
        RenderNode::Image {
            src: "https://s3/fig.png".into(),
            alt: "Fig. 1".into(),
            caption: Some("Fig. 1".into()),
        }
    );
    assert_eq!(nodes[2], RenderNode::Unsupported { type_tag: "table".into() });
    assert_eq!(nodes[3], RenderNode::Unsupported { type_tag: "paragraph".into() });
    assert_eq!(nodes[4], RenderNode::Divider);
}

#[tokio::test]
async fn undecodable_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/blocks/{}/children", PAGE_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let source = source_for(&server, &test_config());
    let err = source.fetch_page_blocks(PAGE_ID).await.unwrap_err();
    assert!(matches!(err, SourceError::Decode(_)));
}

#[tokio::test]
async fn client_error_is_logged_with_status_and_body() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/databases/db-1/query"))
        .respond_with(ResponseTemplate::new(404).set_body_string("database_not_shared"))
        .mount(&server)
        .await;

    let source = source_for(&server, &test_config());
    source.fetch_published_pages().await.unwrap_err();

    let out = logs.contents();
    let line = out
        .lines()
        .find(|l| l.contains("notion API error"))
        .unwrap_or_else(|| panic!("no diagnostic in {out:?}"));
    assert!(line.contains("404"));
    assert!(line.contains("database_not_shared"));
}

#[tokio::test]
async fn exhausted_retries_are_logged_with_last_status_and_body() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1/blocks/{}/children", PAGE_ID)))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let mut cfg = test_config();
    cfg.fetch.attempts = 2;
    let source = source_for(&server, &cfg);
    source.fetch_page_blocks(PAGE_ID).await.unwrap_err();

    let out = logs.contents();
    let line = out
        .lines()
        .find(|l| l.contains("notion request failed after retries"))
        .unwrap_or_else(|| panic!("no diagnostic in {out:?}"));
    assert!(line.contains("503"));
    assert!(line.contains("upstream down"));
}

#[tokio::test]
async fn non_notion_page_id_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let source = source_for(&server, &test_config());
    for id in ["../../users", "x?filter=1#y"] {
        let err = source.fetch_page_blocks(id).await.unwrap_err();
        assert!(matches!(err, SourceError::InvalidId(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
