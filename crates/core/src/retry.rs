use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use backoff::ExponentialBackoff;
use jungle_quest_model::{ModelProviderError, ModelRequest};

use crate::model_client::{DeltaFn, ModelClient, SendRequestResult};

/// How failed model requests are retried.
///
/// The default policy never retries: a failed request fails the turn.
/// With [`RetryPolicy::exponential`], transient failures (rate limits,
/// network errors) are retried with exponentially growing, jittered
/// waits. Moderation and authentication failures are never retried, and
/// neither is a request that fails after reply text has been streamed to
/// the delta callback.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_interval: Duration,
    max_interval: Duration,
    multiplier: f64,
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// A policy that sends every request exactly once.
    #[inline]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(8),
            multiplier: 2.0,
        }
    }

    /// A policy that retries transient failures up to `max_retries` times.
    #[inline]
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::none()
        }
    }

    /// Sets the wait before the first retry.
    #[inline]
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Sets the upper bound of a single wait.
    #[inline]
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Returns how many times a request may be retried.
    #[inline]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_interval,
            initial_interval: self.initial_interval,
            max_interval: self.max_interval.max(self.initial_interval),
            multiplier: self.multiplier,
            // Attempts are bounded by `max_retries` instead.
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }

    /// Sends `req` through `client`, retrying as this policy allows.
    pub(crate) async fn send(
        &self,
        client: &ModelClient,
        req: ModelRequest,
        on_delta: Option<DeltaFn>,
    ) -> SendRequestResult {
        if self.max_retries == 0 {
            return client.send_request(req, on_delta).await;
        }

        let max_retries = self.max_retries;
        let mut attempt = 0;
        let operation = || {
            attempt += 1;
            let attempt = attempt;
            let client = client.clone();
            let req = req.clone();
            // Text already handed to the callback cannot be taken back, so
            // an attempt that streamed anything is not retried.
            let streamed = Arc::new(AtomicBool::new(false));
            let on_delta = on_delta.clone().map(|on_delta| -> DeltaFn {
                let streamed = Arc::clone(&streamed);
                Arc::new(move |delta: &str| {
                    streamed.store(true, Ordering::Relaxed);
                    on_delta(delta);
                })
            });
            async move {
                client.send_request(req, on_delta).await.map_err(|err| {
                    if attempt <= max_retries
                        && err.kind().is_transient()
                        && !streamed.load(Ordering::Relaxed)
                    {
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
            }
        };
        let notify = |err: Box<dyn ModelProviderError>, wait: Duration| {
            warn!("model request failed ({err}), retrying in {wait:?}");
        };
        backoff::future::retry_notify(self.backoff(), operation, notify).await
    }
}
