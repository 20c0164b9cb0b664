use std::mem;
use std::time::SystemTime;

use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::CompletionRequest;
use crate::error::Cancelled;
use crate::limiter::Permit;
use crate::record::{DiscardReason, MetricRecord, RequestOutcome};
use crate::transport::Transport;

/// Runs one streaming request to completion and measures it. `_permit` is held
/// until the request has finished or been cancelled.
///
/// Request-level failures come back as `RequestOutcome::Discard`. Cancellation of
/// `cancel` is returned as `Err(Cancelled)` instead, so callers can tell the two apart.
pub async fn execute_request<T: Transport + ?Sized>(
    transport: &T,
    request_id: usize,
    request: &CompletionRequest,
    cancel: &CancellationToken,
    _permit: Permit,
) -> Result<RequestOutcome, Cancelled> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled),
        outcome = measure(transport, request_id, request) => Ok(outcome),
    }
}

async fn measure<T: Transport + ?Sized>(
    transport: &T,
    request_id: usize,
    request: &CompletionRequest,
) -> RequestOutcome {
    let start_time = SystemTime::now();
    let start = Instant::now();

    let mut stream = match transport.open(request_id, request).await {
        Ok(stream) => stream,
        Err(err) => {
            warn!(request_id, error = %err, "request failed");
            return RequestOutcome::Discard(DiscardReason::Request(err));
        }
    };

    let mut lines = LineCounter::default();
    let mut first_chunk_at = None;
    let mut chunk_count = 0u64;

    while let Some(item) = stream.next().await {
        let bytes = match item {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(request_id, error = %err, "stream failed");
                return RequestOutcome::Discard(DiscardReason::Stream(err));
            }
        };

        let completed = lines.feed(&bytes);
        if completed > 0 {
            first_chunk_at.get_or_insert_with(Instant::now);
            chunk_count += completed;
        }
    }

    if lines.finish() {
        first_chunk_at.get_or_insert_with(Instant::now);
        chunk_count += 1;
    }

    let total_duration = start.elapsed();
    let time_to_first_chunk = first_chunk_at
        .map(|at| at.duration_since(start))
        .unwrap_or_default();

    RequestOutcome::Record(MetricRecord::new(
        request_id,
        start_time,
        time_to_first_chunk,
        total_duration,
        chunk_count,
    ))
}

/// Counts newline-delimited lines that hold something other than whitespace.
#[derive(Debug, Default)]
struct LineCounter {
    pending_content: bool,
}

impl LineCounter {
    fn feed(&mut self, bytes: &[u8]) -> u64 {
        let mut completed = 0;
        for &byte in bytes {
            if byte == b'\n' {
                if mem::take(&mut self.pending_content) {
                    completed += 1;
                }
            } else if !byte.is_ascii_whitespace() {
                self.pending_content = true;
            }
        }
        completed
    }

    /// Flushes an unterminated trailing line.
    fn finish(&mut self) -> bool {
        mem::take(&mut self.pending_content)
    }
}
