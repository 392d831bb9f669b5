use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use foodie::{
    config::LlmConfig,
    core::{ModelCallError, ModelClient, ModelDelta, ModelRequest, OpenAiClient},
};
use futures::StreamExt;
use serde_json::Value;
use tokio::net::TcpListener;

#[derive(Clone)]
struct Upstream {
    hits: Arc<AtomicUsize>,
    /// Requests answered with 503 before the stream succeeds.
    failures: usize,
    failure_status: StatusCode,
    last_body: Arc<std::sync::Mutex<Option<Value>>>,
}

const SSE_BODY: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"thinking\"}}]}\n\n",
    ": keep-alive\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"[A]Dumpl\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"ings[/A]\"}}]}\n\n",
    "data: [DONE]\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
);

async fn completions(State(upstream): State<Upstream>, Json(body): Json<Value>) -> Response {
    *upstream.last_body.lock().unwrap() = Some(body);
    let hit = upstream.hits.fetch_add(1, Ordering::SeqCst);
    if hit < upstream.failures {
        return (upstream.failure_status, "upstream unavailable").into_response();
    }
    ([(header::CONTENT_TYPE, "text/event-stream")], SSE_BODY).into_response()
}

async fn spawn_upstream(failures: usize, failure_status: StatusCode) -> (String, Upstream) {
    let upstream = Upstream {
        hits: Arc::new(AtomicUsize::new(0)),
        failures,
        failure_status,
        last_body: Arc::new(std::sync::Mutex::new(None)),
    };
    let app = Router::new()
        .route("/v1/chat/completions", post(completions))
        .with_state(upstream.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/v1"), upstream)
}

fn client(api_base: String, max_retries: u32) -> OpenAiClient {
    let config = LlmConfig {
        api_base,
        api_key: Some("sk-test".into()),
        model: "test-model".into(),
        max_retries,
        ..LlmConfig::default()
    };
    OpenAiClient::new(Arc::new(config))
        .unwrap()
        .with_retry_interval(Duration::from_millis(5))
}

#[tokio::test]
async fn test_stream_call_decodes_deltas_until_done() {
    let (base, upstream) = spawn_upstream(0, StatusCode::OK).await;
    let client = client(base, 0);

    let stream = client
        .stream_call(ModelRequest::text("sys", "what is this"))
        .await
        .unwrap();
    let deltas: Vec<ModelDelta> = stream.map(|d| d.unwrap()).collect().await;

    assert_eq!(
        deltas,
        vec![
            ModelDelta::Reasoning("thinking".into()),
            ModelDelta::Content("[A]Dumpl".into()),
            ModelDelta::Content("ings[/A]".into()),
        ]
    );

    let body = upstream.last_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["stream"], true);
    assert_eq!(body["messages"][1]["content"], "what is this");
}

#[tokio::test]
async fn test_complete_collects_content_only() {
    let (base, _upstream) = spawn_upstream(0, StatusCode::OK).await;
    let text = client(base, 0)
        .complete(ModelRequest::text("sys", "hi"))
        .await
        .unwrap();
    assert_eq!(text, "[A]Dumplings[/A]");
}

#[tokio::test]
async fn test_connection_retried_on_server_errors() {
    let (base, upstream) = spawn_upstream(2, StatusCode::SERVICE_UNAVAILABLE).await;
    let text = client(base, 3)
        .complete(ModelRequest::text("sys", "hi"))
        .await
        .unwrap();
    assert_eq!(text, "[A]Dumplings[/A]");
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let (base, upstream) = spawn_upstream(10, StatusCode::SERVICE_UNAVAILABLE).await;
    let err = client(base, 1)
        .complete(ModelRequest::text("sys", "hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, ModelCallError::Status { status: 503, .. }));
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (base, upstream) = spawn_upstream(10, StatusCode::BAD_REQUEST).await;
    let err = client(base, 3)
        .complete(ModelRequest::text("sys", "hi"))
        .await
        .unwrap_err();
    match err {
        ModelCallError::Status { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body, "upstream unavailable");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
}
