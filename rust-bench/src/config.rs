use std::ops::RangeInclusive;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rand::Rng;
use reqwest::Url;
use serde::Serialize;

pub const DEFAULT_PROMPT: &str = "100 word story about balloons";
pub const DEFAULT_CONCURRENCY_LEVELS: [usize; 4] = [1, 5, 10, 20];

/// Range the per-request sampling seed is drawn from.
pub const SEED_RANGE: RangeInclusive<u64> = 1..=1_000_000;

/// Builds the completions URL for a server listening on `host:port`.
pub fn completions_url(host: &str, port: u16, path: &str) -> Result<Url> {
    let raw = format!(
        "http://{}:{}/{}",
        host.trim_end_matches('/'),
        port,
        path.trim_start_matches('/')
    );
    Url::parse(&raw).with_context(|| format!("invalid endpoint URL: {}", raw))
}

/// Parses a comma separated list of concurrency levels such as `1,5,10`.
pub fn parse_concurrency_levels(raw: &str) -> Result<Vec<usize>> {
    let levels = raw
        .split(',')
        .map(|part| {
            let part = part.trim();
            let level: usize = part
                .parse()
                .with_context(|| format!("invalid concurrency level `{}`", part))?;
            if level == 0 {
                return Err(anyhow!("concurrency levels must be greater than zero"));
            }
            Ok(level)
        })
        .collect::<Result<Vec<_>>>()?;

    if levels.is_empty() {
        return Err(anyhow!("at least one concurrency level is required"));
    }
    Ok(levels)
}

/// Body of one streaming completion request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f64,
    pub stream: bool,
    pub seed: u64,
}

#[derive(Clone, Debug)]
pub struct PayloadTemplate {
    pub model: String,
    pub prompt: String,
}

impl PayloadTemplate {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
        }
    }

    /// Produces a request body with greedy decoding and a fresh seed.
    pub fn instantiate<R: Rng + ?Sized>(&self, rng: &mut R) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            prompt: self.prompt.clone(),
            temperature: 0.0,
            stream: true,
            seed: rng.gen_range(SEED_RANGE),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub endpoint: Url,
    pub concurrency: usize,
    pub request_count: usize,
    pub payload: PayloadTemplate,
    pub request_timeout: Option<Duration>,
}

impl RunConfig {
    pub fn try_new(
        endpoint: Url,
        payload: PayloadTemplate,
        concurrency: usize,
        request_count: usize,
    ) -> Result<Self> {
        if concurrency == 0 {
            return Err(anyhow!("concurrency must be greater than zero"));
        }

        Ok(Self {
            endpoint,
            concurrency,
            request_count,
            payload,
            request_timeout: None,
        })
    }

    /// Caps each request's total duration. A zero timeout is ignored.
    pub fn with_request_timeout(mut self, request_timeout: Option<Duration>) -> Self {
        self.request_timeout = request_timeout.filter(|timeout| !timeout.is_zero());
        self
    }
}

#[derive(Clone, Debug)]
pub struct SuiteConfig {
    pub endpoint: Url,
    pub payload: PayloadTemplate,
    pub concurrency_levels: Vec<usize>,
    pub runs_per_level: usize,
    pub request_timeout: Option<Duration>,
}

impl SuiteConfig {
    pub fn try_new(
        endpoint: Url,
        payload: PayloadTemplate,
        concurrency_levels: Vec<usize>,
        runs_per_level: usize,
    ) -> Result<Self> {
        if concurrency_levels.is_empty() {
            return Err(anyhow!("at least one concurrency level is required"));
        }
        if concurrency_levels.contains(&0) {
            return Err(anyhow!("concurrency levels must be greater than zero"));
        }
        if runs_per_level == 0 {
            return Err(anyhow!("runs_per_level must be greater than zero"));
        }

        Ok(Self {
            endpoint,
            payload,
            concurrency_levels,
            runs_per_level,
            request_timeout: None,
        })
    }

    pub fn with_request_timeout(mut self, request_timeout: Option<Duration>) -> Self {
        self.request_timeout = request_timeout.filter(|timeout| !timeout.is_zero());
        self
    }

    /// Run configuration for one saturating batch: as many requests as permits.
    pub fn run_config(&self, concurrency: usize) -> Result<RunConfig> {
        Ok(RunConfig::try_new(
            self.endpoint.clone(),
            self.payload.clone(),
            concurrency,
            concurrency,
        )?
        .with_request_timeout(self.request_timeout))
    }
}
