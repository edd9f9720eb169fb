//! Single-URL retrieval with capped exponential backoff.
//!
//! The [`Backoff`] counter belongs to the caller and is threaded through
//! consecutive fetches, so a run of failures across different URLs keeps
//! growing the delay instead of starting over at the base.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use reqwest::blocking::Client;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::http_client::{REQUEST_TIMEOUT_SECS, build_http_client};

pub const DEFAULT_BASE_DELAY_SECS: u64 = 2;
pub const DEFAULT_MAX_DELAY_SECS: u64 = 60;
pub const DEFAULT_PACING_SECS: u64 = 3;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// `None` retries until the request succeeds.
    pub max_attempts: Option<u32>,
    /// Minimum gap between two consecutive requests, successful or not.
    pub pacing: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(DEFAULT_BASE_DELAY_SECS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            max_attempts: None,
            pacing: Duration::from_secs(DEFAULT_PACING_SECS),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            current: base.min(max),
            max,
        }
    }

    pub fn from_policy(policy: &RetryPolicy) -> Self {
        Self::new(policy.base_delay, policy.max_delay)
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Delay to wait after the failure that just happened; doubles the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }
}

pub trait PageFetcher {
    fn fetch(&mut self, url: &str, backoff: &mut Backoff) -> Result<String, PipelineError>;
}

/// Runs `attempt` until it succeeds, sleeping `backoff.next_delay()` between failures.
pub fn retry_with_backoff<T>(
    url: &str,
    policy: &RetryPolicy,
    backoff: &mut Backoff,
    mut attempt: impl FnMut() -> Result<T, PipelineError>,
    mut sleep: impl FnMut(Duration),
) -> Result<T, PipelineError> {
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let err = match attempt() {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if let Some(max) = policy.max_attempts
            && attempts >= max.max(1)
        {
            warn!(url = %url, attempts, error = %err, "giving up");
            return Err(PipelineError::RetriesExhausted {
                url: url.to_string(),
                attempts,
            });
        }
        let delay = backoff.next_delay();
        warn!(
            url = %url,
            attempt = attempts,
            delay_secs = delay.as_secs(),
            error = %err,
            "fetch failed, backing off"
        );
        sleep(delay);
    }
}

/// Remaining gap before the next request may go out; `None` when it can go now.
pub fn pacing_wait(last: Option<Instant>, now: Instant, pacing: Duration) -> Option<Duration> {
    let elapsed = now.saturating_duration_since(last?);
    pacing.checked_sub(elapsed).filter(|wait| !wait.is_zero())
}

pub struct FetchClient {
    client: Client,
    policy: RetryPolicy,
    last_request: Option<Instant>,
}

impl FetchClient {
    pub fn new(policy: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: build_http_client(policy.timeout)?,
            policy,
            last_request: None,
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn pace(&mut self) {
        if let Some(wait) = pacing_wait(self.last_request, Instant::now(), self.policy.pacing) {
            debug!(wait_ms = wait.as_millis() as u64, "pacing");
            thread::sleep(wait);
        }
        self.last_request = Some(Instant::now());
    }

    fn get_once(&self, url: &str) -> Result<String, PipelineError> {
        debug!(url = %url, "GET");
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|err| PipelineError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().map_err(|err| PipelineError::Transport {
            url: url.to_string(),
            message: format!("failed reading body: {err}"),
        })
    }
}

impl PageFetcher for FetchClient {
    fn fetch(&mut self, url: &str, backoff: &mut Backoff) -> Result<String, PipelineError> {
        let policy = self.policy;
        retry_with_backoff(
            url,
            &policy,
            backoff,
            || {
                self.pace();
                self.get_once(url)
            },
            thread::sleep,
        )
    }
}
