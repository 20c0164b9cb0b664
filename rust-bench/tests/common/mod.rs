#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;
use streambench_rs::{
    completions_url, ChunkStream, CompletionRequest, Connector, LevelReport, PayloadTemplate,
    ReportSink, RunConfig, RunReport, SuiteConfig, Transport, TransportError,
};
use tokio::time::{sleep_until, Instant};

/// What the mock server does for one request.
#[derive(Debug, Clone)]
pub enum Script {
    /// Emit each chunk at the given offset from the moment the request was opened.
    Chunks(Vec<(u64, &'static str)>),
    /// Wait, then answer with a non-success status.
    Status(u64, StatusCode),
    /// Emit the chunks, then break the stream.
    BreakAfter(Vec<(u64, &'static str)>),
    Panic,
}

pub fn sse(offsets: &[u64]) -> Script {
    Script::Chunks(offsets.iter().map(|&at| (at, "data: {\"text\": \"x\"}\n\n")).collect())
}

type ScriptFn = dyn Fn(usize) -> Script + Send + Sync;

#[derive(Default)]
struct Counters {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    opened: AtomicUsize,
}

struct InFlight(Arc<Counters>);

impl InFlight {
    fn enter(counters: &Arc<Counters>) -> Self {
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak.fetch_max(now, Ordering::SeqCst);
        counters.opened.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counters))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-process transport that replays a per-request script on tokio time.
#[derive(Clone)]
pub struct MockTransport {
    script: Arc<ScriptFn>,
    counters: Arc<Counters>,
    requests: Arc<Mutex<Vec<(usize, CompletionRequest)>>>,
}

impl MockTransport {
    pub fn new(script: impl Fn(usize) -> Script + Send + Sync + 'static) -> Self {
        Self {
            script: Arc::new(script),
            counters: Arc::default(),
            requests: Arc::default(),
        }
    }

    pub fn peak_in_flight(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(usize, CompletionRequest)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(
        &self,
        request_id: usize,
        request: &CompletionRequest,
    ) -> Result<ChunkStream, TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push((request_id, request.clone()));
        let guard = InFlight::enter(&self.counters);
        let opened_at = Instant::now();

        let (chunks, broken) = match (self.script)(request_id) {
            Script::Chunks(chunks) => (chunks, false),
            Script::BreakAfter(chunks) => (chunks, true),
            Script::Status(after, status) => {
                sleep_until(opened_at + Duration::from_millis(after)).await;
                return Err(TransportError::Status(status));
            }
            Script::Panic => panic!("scripted panic for request {}", request_id),
        };

        let chunks = stream::iter(chunks).then(move |(at, body)| async move {
            sleep_until(opened_at + Duration::from_millis(at)).await;
            Ok::<_, TransportError>(Bytes::from_static(body.as_bytes()))
        });
        let tail = stream::iter(broken.then(|| {
            Err(TransportError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset mid-stream",
            )))
        }));

        // The guard lives as long as the stream, so "in flight" covers the body.
        Ok(chunks
            .chain(tail)
            .map(move |item| {
                let _guard = &guard;
                item
            })
            .boxed())
    }
}

impl Connector for MockTransport {
    type Transport = MockTransport;

    fn connect(&self, _config: &RunConfig) -> Result<MockTransport> {
        Ok(self.clone())
    }
}

pub fn run_config(concurrency: usize, request_count: usize) -> RunConfig {
    RunConfig::try_new(
        completions_url("127.0.0.1", 8000, "/v1/completions").unwrap(),
        PayloadTemplate::new("mock-model", "100 word story about balloons"),
        concurrency,
        request_count,
    )
    .unwrap()
}

pub fn suite_config(levels: Vec<usize>, runs: usize) -> SuiteConfig {
    SuiteConfig::try_new(
        completions_url("127.0.0.1", 8000, "/v1/completions").unwrap(),
        PayloadTemplate::new("mock-model", "100 word story about balloons"),
        levels,
        runs,
    )
    .unwrap()
}

#[derive(Debug, PartialEq)]
pub enum Event {
    LevelStarted(usize),
    Run { concurrency: usize, run: usize, successes: usize },
    Level { concurrency: usize, successes: usize },
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<Event>,
    pub runs: Vec<RunReport>,
    pub levels: Vec<LevelReport>,
}

impl ReportSink for RecordingSink {
    fn level_started(&mut self, concurrency: usize) {
        self.events.push(Event::LevelStarted(concurrency));
    }

    fn run_completed(&mut self, report: &RunReport) {
        self.events.push(Event::Run {
            concurrency: report.concurrency,
            run: report.run,
            successes: report.summary.successful_requests(),
        });
        self.runs.push(report.clone());
    }

    fn level_completed(&mut self, report: &LevelReport) {
        self.events.push(Event::Level {
            concurrency: report.concurrency,
            successes: report.summary.successful_requests(),
        });
        self.levels.push(report.clone());
    }
}

pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} ± {tolerance}, got {actual}"
    );
}
