//! Bounded-concurrency file fetching with a per-file retry budget.

use std::future::Future;
use std::time::Duration;

use futures::{StreamExt, stream};
use serde::Deserialize;
use tokio::time::sleep;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Backoff {
    #[default]
    Fixed,
    Exponential,
}

/// Attempts and delays for one fetch.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay_ms: u64,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay_ms: u64, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay_ms,
            backoff,
        }
    }

    fn next_delay(&self, attempt: usize) -> Duration {
        let millis = match self.backoff {
            Backoff::Fixed => self.delay_ms,
            Backoff::Exponential => self
                .delay_ms
                .saturating_mul(2_u64.saturating_pow(attempt as u32)),
        };
        Duration::from_millis(millis)
    }

    /// Runs `op` until it succeeds or the attempts are spent; returns the
    /// last error in that case.
    pub async fn retry_async<F, Fut, T, E>(&self, op: F) -> Result<T, E>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.retry_async_if(op, |_| true).await
    }

    /// Like [`retry_async`](Self::retry_async), but gives up at once on an
    /// error `retryable` rejects.
    pub async fn retry_async_if<F, Fut, T, E>(
        &self,
        mut op: F,
        retryable: impl Fn(&E) -> bool,
    ) -> Result<T, E>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(val) => return Ok(val),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts || !retryable(&err) {
                        return Err(err);
                    }
                    sleep(self.next_delay(attempt - 1)).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    /// Three attempts, three seconds apart.
    fn default() -> Self {
        Self::new(3, 3_000, Backoff::Fixed)
    }
}

/// Result of one file fetch. Exhaustion is kept apart from an empty file,
/// and both apart from a file that was read but could not be decoded.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    Fetched(T),
    /// Transient failures outlasted the retry budget.
    Exhausted { key: String, error: Error },
    /// A non-transient failure; not retried.
    Rejected { key: String, error: Error },
}

/// Fetched contents of a batch, in key order, plus what could not be fetched.
#[derive(Debug)]
pub struct FetchBatch<T> {
    pub items: Vec<(String, T)>,
    pub exhausted: Vec<String>,
    pub rejected: Vec<(String, Error)>,
}

impl<T> FetchBatch<T> {
    pub fn into_values(self) -> impl Iterator<Item = T> {
        self.items.into_iter().map(|(_, v)| v)
    }
}

#[derive(Debug, Clone)]
pub struct FetchScheduler {
    concurrency: usize,
    retry: RetryPolicy,
}

impl FetchScheduler {
    pub fn new(concurrency: usize, retry: RetryPolicy) -> Self {
        Self {
            concurrency: concurrency.max(1),
            retry,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetches one key under the retry policy. Only transient errors are
    /// retried.
    pub async fn fetch_one<T, F, Fut>(&self, key: String, fetch: F) -> FetchOutcome<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let result = self
            .retry
            .retry_async_if(
                |attempt| {
                    if attempt > 0 {
                        tracing::debug!(file = %key, attempt, "retrying fetch");
                    }
                    fetch(key.clone())
                },
                Error::is_transient,
            )
            .await;
        match result {
            Ok(value) => FetchOutcome::Fetched(value),
            Err(error) if !error.is_transient() => {
                tracing::warn!(file = %key, error = %error, "file could not be decoded");
                FetchOutcome::Rejected { key, error }
            }
            Err(error) => {
                tracing::warn!(file = %key, error = %error, attempts = self.retry.max_attempts, "fetch exhausted, file skipped");
                FetchOutcome::Exhausted { key, error }
            }
        }
    }

    /// Fetches every key with at most `concurrency` in flight. Completion
    /// order is arbitrary; the batch is re-sorted by key.
    pub async fn fetch_all<T, F, Fut>(&self, keys: Vec<String>, fetch: F) -> FetchBatch<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let outcomes: Vec<(String, FetchOutcome<T>)> = stream::iter(keys)
            .map(|key| {
                let fetch = &fetch;
                async move { (key.clone(), self.fetch_one(key, fetch).await) }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut batch = FetchBatch {
            items: Vec::with_capacity(outcomes.len()),
            exhausted: Vec::new(),
            rejected: Vec::new(),
        };
        for (key, outcome) in outcomes {
            match outcome {
                FetchOutcome::Fetched(value) => batch.items.push((key, value)),
                FetchOutcome::Exhausted { key, .. } => batch.exhausted.push(key),
                FetchOutcome::Rejected { key, error } => batch.rejected.push((key, error)),
            }
        }
        batch.items.sort_by(|a, b| a.0.cmp(&b.0));
        batch.exhausted.sort();
        batch.rejected.sort_by(|a, b| a.0.cmp(&b.0));
        batch
    }
}

impl Default for FetchScheduler {
    fn default() -> Self {
        Self::new(5, RetryPolicy::default())
    }
}
