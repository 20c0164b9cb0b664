mod config;
mod discovery;
mod error;
mod executor;
mod limiter;
mod record;
mod report;
mod runner;
mod stats;
mod suite;
mod transport;

pub use config::{
    completions_url, parse_concurrency_levels, CompletionRequest, PayloadTemplate, RunConfig,
    SuiteConfig, DEFAULT_CONCURRENCY_LEVELS, DEFAULT_PROMPT, SEED_RANGE,
};
pub use discovery::{parse_process_table, ProcessTableDiscovery, ServerCandidate, ServerDiscovery};
pub use error::{BatchCancelled, Cancelled, SuiteError};
pub use executor::execute_request;
pub use limiter::{ConcurrencyLimiter, Permit};
pub use record::{BatchResult, DiscardReason, MetricRecord, RequestOutcome};
pub use report::{BatchStats, LevelReport, ReportSink, RunReport, Summary};
pub use runner::run_batch;
pub use stats::{percentiles, summarize, Dimension, Percentiles};
pub use suite::{LevelResult, Suite, SuiteOutcome};
pub use transport::{ChunkStream, Connector, HttpConnector, HttpTransport, Transport, TransportError};
pub use tokio_util::sync::CancellationToken;
