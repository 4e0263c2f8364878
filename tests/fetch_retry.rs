use async_trait::async_trait;
use notion_showcase::config;
use notion_showcase::error::{SourceError, TransientError};
use notion_showcase::fetch::{FetchClient, FetchResponse, RequestSpec, RetryPolicy, Transport};
use notion_showcase::notion::{ContentSource, NotionSource};
use reqwest::{Method, StatusCode, Url};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

enum Step {
    Status(u16),
    Fail,
    Hang,
}

/// Replays a fixed script of outcomes and records when each attempt started.
#[derive(Clone, Default)]
struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Step>>>,
    fallback: Option<u16>,
    calls: Arc<Mutex<Vec<Instant>>>,
}

impl ScriptedTransport {
    fn with_script(steps: Vec<Step>) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::from(steps))),
            ..Default::default()
        }
    }

    fn always(status: u16) -> Self {
        Self {
            fallback: Some(status),
            ..Default::default()
        }
    }

    async fn calls(&self) -> Vec<Instant> {
        self.calls.lock().await.clone()
    }

    async fn gaps(&self) -> Vec<Duration> {
        let calls = self.calls().await;
        calls.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, _request: &RequestSpec) -> Result<FetchResponse, TransientError> {
        self.calls.lock().await.push(Instant::now());
        let step = self.script.lock().await.pop_front();
        let step = step.unwrap_or(Step::Status(self.fallback.unwrap_or(200)));
        match step {
            Step::Status(code) => Ok(FetchResponse::new(
                StatusCode::from_u16(code).unwrap(),
                r#"{"results":[]}"#,
            )),
            Step::Fail => Err(TransientError::Transport("connection reset".into())),
            Step::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

fn request() -> RequestSpec {
    RequestSpec::new(
        Method::GET,
        Url::parse("https://notion.test/v1/blocks/p/children").unwrap(),
    )
}

fn client(transport: &ScriptedTransport, attempts: u32, backoff_ms: u64) -> FetchClient {
    FetchClient::new(
        Arc::new(transport.clone()),
        RetryPolicy::new(
            attempts,
            Duration::from_millis(backoff_ms),
            Duration::from_millis(15_000),
        ),
    )
}

#[tokio::test(start_paused = true)]
async fn server_errors_consume_the_whole_budget() {
    for attempts in 1..=5 {
        let transport = ScriptedTransport::always(503);
        let err = client(&transport, attempts, 100)
            .execute(&request())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransientError::Status { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE
        ));
        assert_eq!(transport.calls().await.len(), attempts as usize);
    }
}

#[tokio::test(start_paused = true)]
async fn client_errors_are_not_retried() {
    let transport = ScriptedTransport::always(404);
    let res = client(&transport, 3, 100).execute(&request()).await.unwrap();
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(transport.calls().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_between_attempts() {
    let transport = ScriptedTransport::always(500);
    let started = Instant::now();
    let _ = client(&transport, 4, 250).execute(&request()).await;
    assert_eq!(
        transport.gaps().await,
        vec![
            Duration::from_millis(250),
            Duration::from_millis(500),
            Duration::from_millis(1000),
        ]
    );
    // no sleep after the final attempt
    assert_eq!(started.elapsed(), Duration::from_millis(1750));
}

#[tokio::test(start_paused = true)]
async fn recovers_after_two_server_errors() {
    let transport =
        ScriptedTransport::with_script(vec![Step::Status(500), Step::Status(500), Step::Status(200)]);
    let res = client(&transport, 3, 100).execute(&request()).await.unwrap();
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(transport.calls().await.len(), 3);
    assert_eq!(
        transport.gaps().await,
        vec![Duration::from_millis(100), Duration::from_millis(200)]
    );
}

#[tokio::test(start_paused = true)]
async fn transport_failures_are_retried() {
    let transport = ScriptedTransport::with_script(vec![Step::Fail, Step::Status(200)]);
    let res = client(&transport, 3, 100).execute(&request()).await.unwrap();
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(transport.calls().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn hung_attempt_times_out_and_is_retried() {
    let transport = ScriptedTransport::with_script(vec![Step::Hang, Step::Status(200)]);
    let fetch = FetchClient::new(
        Arc::new(transport.clone()),
        RetryPolicy::new(2, Duration::from_millis(100), Duration::from_millis(1000)),
    );
    let res = fetch.execute(&request()).await.unwrap();
    assert_eq!(res.status, StatusCode::OK);
    // 1000ms deadline + 100ms backoff
    assert_eq!(transport.gaps().await, vec![Duration::from_millis(1100)]);
}

#[tokio::test(start_paused = true)]
async fn last_transient_failure_is_reported() {
    let transport = ScriptedTransport::with_script(vec![Step::Status(502), Step::Hang]);
    let fetch = FetchClient::new(
        Arc::new(transport.clone()),
        RetryPolicy::new(2, Duration::from_millis(100), Duration::from_millis(1000)),
    );
    let err = fetch.execute(&request()).await.unwrap_err();
    assert!(matches!(err, TransientError::Timeout(d) if d == Duration::from_millis(1000)));
}

#[tokio::test(start_paused = true)]
async fn missing_credentials_make_no_network_calls() {
    let transport = ScriptedTransport::always(200);
    let mut cfg: config::Config = serde_yaml::from_str(config::example()).unwrap();
    cfg.notion.token = None;
    let source = NotionSource::with_transport(
        &cfg,
        Arc::new(transport.clone()),
        Url::parse("https://notion.test/").unwrap(),
    );

    let err = source.fetch_published_pages().await.unwrap_err();
    assert!(matches!(err, SourceError::Configuration(_)));
    let err = source.fetch_page_blocks("p1").await.unwrap_err();
    assert!(matches!(err, SourceError::Configuration(_)));
    assert!(transport.calls().await.is_empty());
}
