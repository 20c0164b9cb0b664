use std::time::Duration;

use crate::record::MetricRecord;
use crate::stats::{summarize, Dimension, Percentiles};

#[derive(Debug, Clone, PartialEq)]
pub struct BatchStats {
    pub successful_requests: usize,
    pub time_to_first_chunk: Percentiles,
    pub total_duration: Percentiles,
    pub throughput: Percentiles,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Summary {
    /// Every request was discarded.
    NoData,
    Stats(BatchStats),
}

impl Summary {
    pub fn from_records(records: &[MetricRecord]) -> Self {
        let (Some(time_to_first_chunk), Some(total_duration), Some(throughput)) = (
            summarize(records, Dimension::TimeToFirstChunk),
            summarize(records, Dimension::TotalDuration),
            summarize(records, Dimension::Throughput),
        ) else {
            return Summary::NoData;
        };

        Summary::Stats(BatchStats {
            successful_requests: records.len(),
            time_to_first_chunk,
            total_duration,
            throughput,
        })
    }

    pub fn successful_requests(&self) -> usize {
        match self {
            Summary::NoData => 0,
            Summary::Stats(stats) => stats.successful_requests,
        }
    }

    pub fn stats(&self) -> Option<&BatchStats> {
        match self {
            Summary::NoData => None,
            Summary::Stats(stats) => Some(stats),
        }
    }
}

/// One run at a concurrency level.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub concurrency: usize,
    pub run: usize,
    pub runs_per_level: usize,
    pub batch_elapsed: Duration,
    pub summary: Summary,
}

/// Every run at a concurrency level, pooled.
#[derive(Debug, Clone)]
pub struct LevelReport {
    pub concurrency: usize,
    pub runs: usize,
    pub summary: Summary,
}

/// Receives results as the suite produces them.
pub trait ReportSink {
    fn level_started(&mut self, _concurrency: usize) {}

    fn run_completed(&mut self, report: &RunReport);

    fn level_completed(&mut self, report: &LevelReport);
}
