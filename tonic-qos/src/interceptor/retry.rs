//! Retry interceptor.
//!
//! Re-invokes the rest of the chain once per attempt. Attempts after the
//! first wait out an exponential backoff; each attempt gets its own deadline
//! when a per-retry timeout is set.

use std::sync::Arc;
use std::time::Duration;

use tonic::{Code, Status};

use crate::config::{
    BackoffPolicy, CallOption, CallOptionKind, filter_call_options, fold_call_options,
};
use crate::error::CallError;

use super::{Interceptor, UnaryFunc, UnaryRequest};

/// Status codes retried when the call does not say otherwise.
const DEFAULT_CODES: [Code; 2] = [Code::ResourceExhausted, Code::Unavailable];

/// Retry configuration of a single call.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Total number of attempts. Zero and one both mean a single attempt.
    pub max: u32,
    /// Timeout of each attempt. Zero means no per-attempt timeout.
    pub per_retry_timeout: Duration,
    /// Status codes worth another attempt.
    pub codes: Vec<Code>,
    /// Delay between attempts.
    pub backoff: BackoffPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max: 0,
            per_retry_timeout: Duration::ZERO,
            codes: DEFAULT_CODES.to_vec(),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Call option consumed by the retry interceptor.
#[derive(Clone, Debug, PartialEq)]
pub enum RetryCallOption {
    /// Total number of attempts.
    Max(u32),
    /// Timeout of each attempt.
    PerRetryTimeout(Duration),
    /// Retryable status codes.
    Codes(Vec<Code>),
    /// Delay between attempts.
    Backoff(BackoffPolicy),
}

impl CallOptionKind for RetryCallOption {
    type Config = RetryConfig;

    fn select(option: CallOption) -> Result<Self, CallOption> {
        match option {
            CallOption::Retry(option) => Ok(option),
            other => Err(other),
        }
    }

    fn apply(&self, config: &mut RetryConfig) {
        match self {
            RetryCallOption::Max(max) => config.max = *max,
            RetryCallOption::PerRetryTimeout(timeout) => config.per_retry_timeout = *timeout,
            RetryCallOption::Codes(codes) => config.codes = codes.clone(),
            RetryCallOption::Backoff(policy) => config.backoff = policy.clone(),
        }
    }
}

/// Make at most `max` attempts.
pub fn with_max(max: u32) -> CallOption {
    CallOption::Retry(RetryCallOption::Max(max))
}

/// Bound every attempt by `timeout`.
pub fn with_per_retry_timeout(timeout: Duration) -> CallOption {
    CallOption::Retry(RetryCallOption::PerRetryTimeout(timeout))
}

/// Retry only errors with one of `codes`.
pub fn with_codes(codes: impl IntoIterator<Item = Code>) -> CallOption {
    CallOption::Retry(RetryCallOption::Codes(codes.into_iter().collect()))
}

/// Wait according to `policy` between attempts.
pub fn with_backoff(policy: BackoffPolicy) -> CallOption {
    CallOption::Retry(RetryCallOption::Backoff(policy))
}

/// Interceptor retrying failed attempts.
#[derive(Clone, Copy, Debug, Default)]
pub struct RetryInterceptor;

impl Interceptor for RetryInterceptor {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        Arc::new(move |mut request: UnaryRequest| {
            let (options, retry) =
                filter_call_options::<RetryCallOption>(std::mem::take(&mut request.options));
            request.options = options;

            let config = fold_call_options(&retry);
            if config.max == 0 {
                return next(request);
            }
            if let Err(err) = config.backoff.validate() {
                return Box::pin(async move {
                    Err(CallError::Status(Status::invalid_argument(err.to_string())))
                });
            }

            let next = next.clone();
            Box::pin(async move {
                let parent = request.context.clone();
                let mut backoff = config.backoff.backoff();
                let mut attempt = 0;

                loop {
                    if attempt > 0 {
                        let delay = backoff.next_delay();
                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            procedure = %request.procedure,
                            attempt,
                            delay_ms = delay.as_millis(),
                            "retrying call"
                        );
                        tokio::select! {
                            biased;
                            err = parent.done() => return Err(err),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }

                    let mut attempt_request = request.clone();
                    let cancel = if config.per_retry_timeout.is_zero() {
                        None
                    } else {
                        let (ctx, cancel) = parent.with_timeout(config.per_retry_timeout);
                        attempt_request.context = ctx;
                        Some(cancel)
                    };

                    let result = next(attempt_request).await;
                    if let Some(cancel) = cancel {
                        cancel.cancel();
                    }
                    attempt += 1;

                    let err = match result {
                        Ok(response) => return Ok(response),
                        Err(err) => err,
                    };

                    if attempt >= config.max || parent.err().is_some() {
                        return Err(err);
                    }

                    let code = err.code();
                    let attempt_expired = !config.per_retry_timeout.is_zero()
                        && matches!(code, Code::DeadlineExceeded | Code::Cancelled);
                    if !attempt_expired && !config.codes.contains(&code) {
                        return Err(err);
                    }

                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        procedure = %request.procedure,
                        attempt,
                        error = %err,
                        "attempt failed"
                    );
                }
            })
        })
    }
}
