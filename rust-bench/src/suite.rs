use std::future::Future;
use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::SuiteConfig;
use crate::error::SuiteError;
use crate::record::MetricRecord;
use crate::report::{LevelReport, ReportSink, RunReport, Summary};
use crate::runner::run_batch;
use crate::transport::Connector;

/// Records pooled from every run at one concurrency level.
#[derive(Debug, Clone)]
pub struct LevelResult {
    pub concurrency: usize,
    pub records: Vec<MetricRecord>,
}

#[derive(Debug, Clone)]
pub struct SuiteOutcome {
    pub levels: Vec<LevelResult>,
}

pub struct Suite<C> {
    config: SuiteConfig,
    connector: C,
}

impl<C: Connector> Suite<C> {
    pub fn new(config: SuiteConfig, connector: C) -> Self {
        Self { config, connector }
    }

    /// Sweeps every configured concurrency level in order, one level at a time.
    pub async fn run<S: ReportSink>(
        &self,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<SuiteOutcome, SuiteError> {
        let runs_per_level = self.config.runs_per_level;
        let mut levels = Vec::with_capacity(self.config.concurrency_levels.len());

        for &concurrency in &self.config.concurrency_levels {
            sink.level_started(concurrency);
            let run_config = self.config.run_config(concurrency)?;
            let mut pooled = Vec::new();

            for run in 1..=runs_per_level {
                let transport = Arc::new(self.connector.connect(&run_config)?);

                let started = Instant::now();
                let batch = match run_batch(transport, &run_config, cancel).await {
                    Ok(batch) => batch,
                    Err(cancelled) => {
                        info!(concurrency, run, "{}", cancelled);
                        pooled.extend(cancelled.partial.into_records());
                        return Err(SuiteError::Cancelled {
                            concurrency,
                            completed: levels,
                            partial: LevelResult {
                                concurrency,
                                records: pooled,
                            },
                        });
                    }
                };
                let batch_elapsed = started.elapsed();

                sink.run_completed(&RunReport {
                    concurrency,
                    run,
                    runs_per_level,
                    batch_elapsed,
                    summary: Summary::from_records(batch.records()),
                });
                pooled.extend(batch.into_records());
            }

            sink.level_completed(&LevelReport {
                concurrency,
                runs: runs_per_level,
                summary: Summary::from_records(&pooled),
            });

            levels.push(LevelResult {
                concurrency,
                records: pooled,
            });
        }

        Ok(SuiteOutcome { levels })
    }

    /// Repeats the sweep until `keep_going` answers `false` or `cancel` fires.
    /// Returns the number of completed sweeps.
    pub async fn run_continuous<S, F, Fut>(
        &self,
        sink: &mut S,
        cancel: &CancellationToken,
        mut keep_going: F,
    ) -> Result<usize, SuiteError>
    where
        S: ReportSink,
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut iterations = 0;
        loop {
            self.run(sink, cancel).await?;
            iterations += 1;
            if cancel.is_cancelled() || !keep_going().await || cancel.is_cancelled() {
                return Ok(iterations);
            }
        }
    }
}
