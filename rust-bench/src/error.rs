use thiserror::Error;

use crate::record::BatchResult;
use crate::suite::LevelResult;

/// The surrounding run was cancelled while a request was pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("request cancelled")]
pub struct Cancelled;

/// A batch stopped early because of cancellation. Holds whatever had completed.
#[derive(Debug, Error)]
#[error("batch cancelled after {} of {} requests completed", .partial.len(), .partial.requested())]
pub struct BatchCancelled {
    pub partial: BatchResult,
}

#[derive(Debug, Error)]
pub enum SuiteError {
    #[error("benchmark cancelled during concurrency level {concurrency}")]
    Cancelled {
        concurrency: usize,
        completed: Vec<LevelResult>,
        /// Records from the interrupted level, including the cancelled batch.
        partial: LevelResult,
    },
    #[error(transparent)]
    Config(#[from] anyhow::Error),
}
