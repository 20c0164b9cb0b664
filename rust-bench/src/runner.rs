use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{CompletionRequest, RunConfig};
use crate::error::{BatchCancelled, Cancelled};
use crate::executor::execute_request;
use crate::limiter::ConcurrencyLimiter;
use crate::record::{BatchResult, MetricRecord, RequestOutcome};
use crate::transport::Transport;

/// Dispatches `config.request_count` requests at once, at most `config.concurrency`
/// in flight, and collects the records of the ones that completed.
///
/// A failing or panicking request only loses its own record. If `cancel` fires, the
/// remaining requests are aborted and the records gathered so far are returned in
/// the error.
pub async fn run_batch<T: Transport + 'static>(
    transport: Arc<T>,
    config: &RunConfig,
    cancel: &CancellationToken,
) -> Result<BatchResult, BatchCancelled> {
    let request_count = config.request_count;
    let limiter = ConcurrencyLimiter::new(config.concurrency);

    let requests: Vec<CompletionRequest> = {
        let mut rng = rand::thread_rng();
        (0..request_count)
            .map(|_| config.payload.instantiate(&mut rng))
            .collect()
    };

    let mut join_set = JoinSet::new();
    for (request_id, request) in requests.into_iter().enumerate() {
        let transport = Arc::clone(&transport);
        let limiter = limiter.clone();
        let cancel = cancel.clone();
        join_set.spawn(async move {
            let permit = limiter.acquire().await?;
            execute_request(transport.as_ref(), request_id, &request, &cancel, permit).await
        });
    }

    let mut records: Vec<MetricRecord> = Vec::with_capacity(request_count);
    loop {
        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            joined = join_set.join_next() => match joined {
                Some(joined) => Some(joined),
                None => break,
            },
        };

        match joined {
            Some(Ok(Ok(RequestOutcome::Record(record)))) => records.push(record),
            Some(Ok(Ok(RequestOutcome::Discard(reason)))) => {
                debug!(?reason, "request discarded");
            }
            Some(Err(err)) if err.is_panic() => {
                warn!(error = %err, "request task panicked");
            }
            Some(Err(err)) => {
                debug!(error = %err, "request task aborted");
            }
            None | Some(Ok(Err(Cancelled))) => {
                limiter.close();
                join_set.abort_all();
                info!(
                    completed = records.len(),
                    requested = request_count,
                    "batch cancelled"
                );
                return Err(BatchCancelled {
                    partial: BatchResult::new(request_count, records),
                });
            }
        }
    }

    Ok(BatchResult::new(request_count, records))
}
