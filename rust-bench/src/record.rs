use std::time::{Duration, SystemTime};

use crate::transport::TransportError;

/// Timing outcome of one completed streaming request.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    request_id: usize,
    start_time: SystemTime,
    time_to_first_chunk: Duration,
    total_duration: Duration,
    chunk_count: u64,
    throughput: f64,
}

impl MetricRecord {
    pub fn new(
        request_id: usize,
        start_time: SystemTime,
        time_to_first_chunk: Duration,
        total_duration: Duration,
        chunk_count: u64,
    ) -> Self {
        let time_to_first_chunk = if chunk_count == 0 {
            Duration::ZERO
        } else {
            time_to_first_chunk.min(total_duration)
        };
        let secs = total_duration.as_secs_f64();
        let throughput = if secs > 0.0 {
            chunk_count as f64 / secs
        } else {
            0.0
        };

        Self {
            request_id,
            start_time,
            time_to_first_chunk,
            total_duration,
            chunk_count,
            throughput,
        }
    }

    pub fn request_id(&self) -> usize {
        self.request_id
    }

    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    pub fn time_to_first_chunk(&self) -> Duration {
        self.time_to_first_chunk
    }

    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    /// Chunks per second over the whole request.
    pub fn throughput(&self) -> f64 {
        self.throughput
    }
}

#[derive(Debug)]
pub enum DiscardReason {
    /// No usable response: connection failure or non-200 status.
    Request(TransportError),
    /// The response started but the body failed before the stream ended.
    Stream(TransportError),
}

#[derive(Debug)]
pub enum RequestOutcome {
    Record(MetricRecord),
    Discard(DiscardReason),
}

impl RequestOutcome {
    pub fn into_record(self) -> Option<MetricRecord> {
        match self {
            RequestOutcome::Record(record) => Some(record),
            RequestOutcome::Discard(_) => None,
        }
    }
}

/// Records collected from one batch. `requested - len()` requests were discarded.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    requested: usize,
    records: Vec<MetricRecord>,
}

impl BatchResult {
    pub(crate) fn new(requested: usize, mut records: Vec<MetricRecord>) -> Self {
        records.sort_by_key(MetricRecord::request_id);
        Self { requested, records }
    }

    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<MetricRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn discarded(&self) -> usize {
        self.requested.saturating_sub(self.records.len())
    }
}
