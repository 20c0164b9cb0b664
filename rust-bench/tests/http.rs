mod common;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use common::RecordingSink;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use streambench_rs::{
    completions_url, run_batch, CancellationToken, HttpConnector, HttpTransport, PayloadTemplate,
    RunConfig, Suite, SuiteConfig, SEED_RANGE,
};

#[derive(Clone, Default)]
struct MockServer {
    bodies: Arc<Mutex<Vec<Value>>>,
}

async fn completions(State(server): State<MockServer>, Json(body): Json<Value>) -> Response {
    let model = body["model"].as_str().unwrap_or_default().to_string();
    server.bodies.lock().unwrap().push(body);

    if model == "broken" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "model crashed").into_response();
    }

    let tokens = stream::iter(0..3).then(|index| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok::<_, Infallible>(format!("data: {{\"choices\": [{{\"index\": {index}}}]}}\n\n"))
    });
    let done = stream::once(async { Ok::<_, Infallible>("data: [DONE]\n\n".to_string()) });
    Body::from_stream(tokens.chain(done)).into_response()
}

async fn spawn_server() -> (SocketAddr, MockServer) {
    let server = MockServer::default();
    let app = Router::new()
        .route("/v1/completions", post(completions))
        .with_state(server.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, server)
}

fn config(port: u16, model: &str, concurrency: usize) -> RunConfig {
    RunConfig::try_new(
        completions_url("127.0.0.1", port, "/v1/completions").unwrap(),
        PayloadTemplate::new(model, "100 word story about balloons"),
        concurrency,
        concurrency,
    )
    .unwrap()
    .with_request_timeout(Some(Duration::from_secs(10)))
}

#[tokio::test]
async fn streams_are_timed_over_http() {
    let (addr, server) = spawn_server().await;
    let config = config(addr.port(), "mock-model", 3);
    let transport = Arc::new(HttpTransport::new(&config).unwrap());

    let batch = run_batch(transport, &config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(batch.len(), 3);
    for record in batch.records() {
        assert_eq!(record.chunk_count(), 4);
        assert!(record.time_to_first_chunk() >= Duration::from_millis(10));
        assert!(record.total_duration() >= Duration::from_millis(30));
        assert!(record.time_to_first_chunk() <= record.total_duration());
        assert!(record.throughput() > 0.0);
    }

    let bodies = server.bodies.lock().unwrap().clone();
    assert_eq!(bodies.len(), 3);
    for body in bodies {
        assert_eq!(body["model"], "mock-model");
        assert_eq!(body["prompt"], "100 word story about balloons");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["stream"], true);
        let seed = body["seed"].as_u64().unwrap();
        assert!(SEED_RANGE.contains(&seed));
    }
}

#[tokio::test]
async fn error_status_discards_requests() {
    let (addr, server) = spawn_server().await;
    let config = config(addr.port(), "broken", 2);
    let transport = Arc::new(HttpTransport::new(&config).unwrap());

    let batch = run_batch(transport, &config, &CancellationToken::new())
        .await
        .unwrap();

    assert!(batch.is_empty());
    assert_eq!(batch.discarded(), 2);
    assert_eq!(server.bodies.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn refused_connections_are_discarded() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = config(port, "mock-model", 2);
    let transport = Arc::new(HttpTransport::new(&config).unwrap());

    let batch = run_batch(transport, &config, &CancellationToken::new())
        .await
        .unwrap();

    assert!(batch.is_empty());
}

#[tokio::test]
async fn suite_sweeps_a_live_server() {
    let (addr, server) = spawn_server().await;
    let config = SuiteConfig::try_new(
        completions_url("127.0.0.1", addr.port(), "/v1/completions").unwrap(),
        PayloadTemplate::new("mock-model", "hi"),
        vec![1, 2],
        2,
    )
    .unwrap();
    let suite = Suite::new(config, HttpConnector);
    let mut sink = RecordingSink::default();

    let outcome = suite
        .run(&mut sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(sink.runs.len(), 4);
    assert_eq!(sink.levels.len(), 2);
    assert_eq!(sink.levels[1].summary.successful_requests(), 4);
    assert_eq!(outcome.levels[0].records.len(), 2);
    assert_eq!(server.bodies.lock().unwrap().len(), 6);
}
