use crate::record::MetricRecord;

/// Per-request quantity the aggregator can summarize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    /// Seconds until the first non-empty chunk.
    TimeToFirstChunk,
    /// Seconds until the stream ended.
    TotalDuration,
    /// Chunks per second.
    Throughput,
}

impl Dimension {
    pub fn value(self, record: &MetricRecord) -> f64 {
        match self {
            Dimension::TimeToFirstChunk => record.time_to_first_chunk().as_secs_f64(),
            Dimension::TotalDuration => record.total_duration().as_secs_f64(),
            Dimension::Throughput => record.throughput(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percentiles {
    pub p50: f64,
    pub p95: f64,
    pub min: f64,
    pub max: f64,
}

/// Summarizes one dimension of `records`; `None` when there is nothing to summarize.
pub fn summarize(records: &[MetricRecord], dimension: Dimension) -> Option<Percentiles> {
    let values: Vec<f64> = records.iter().map(|record| dimension.value(record)).collect();
    percentiles(&values)
}

/// Median, 95th percentile, min and max of `values`, independent of their order.
///
/// The 95th percentile is the 19th of the 20-quantile cut points using the exclusive
/// method: rank `19 * (n + 1) / 20`, clamped to `[1, n - 1]` and linearly interpolated.
/// For fewer than 20 samples the clamp can push it past the maximum.
pub fn percentiles(values: &[f64]) -> Option<Percentiles> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let p95 = if sorted.len() > 1 {
        exclusive_quantile(&sorted, 19, 20)
    } else {
        min
    };

    Some(Percentiles {
        p50: median(&sorted),
        p95,
        min,
        max,
    })
}

fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// Cut point `i` of `n` equal-probability groups. Requires `sorted.len() >= 2`.
fn exclusive_quantile(sorted: &[f64], i: usize, n: usize) -> f64 {
    let len = sorted.len();
    let m = len + 1;
    let j = (i * m / n).clamp(1, len - 1);
    let delta = (i * m) as f64 - (j * n) as f64;
    let n = n as f64;
    (sorted[j - 1] * (n - delta) + sorted[j] * delta) / n
}
