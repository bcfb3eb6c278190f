//! Circuit breaker interceptor.
//!
//! Gating is opt-in per call. A call carrying [`with_circuit_breaker_enabled`]
//! asks the [`Allower`] for admission before it is dispatched; a refused call
//! fails with [`CallError::NotAllowed`] and never reaches the next step. An
//! admitted call reports its outcome to the gate exactly once, with
//! cancellation counted as success.

use std::sync::Arc;

use crate::config::{CallOption, CallOptionKind, filter_call_options, fold_call_options};
use crate::error::{CallError, is_success_call};
use crate::gate::{Allower, Permit};

use super::{Interceptor, UnaryFunc, UnaryRequest};

/// Circuit breaker configuration of a single call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Gate the call through the breaker.
    pub enabled: bool,
}

/// Call option consumed by the circuit breaker interceptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CircuitBreakerCallOption {
    enabled: bool,
}

impl CallOptionKind for CircuitBreakerCallOption {
    type Config = CircuitBreakerConfig;

    fn select(option: CallOption) -> Result<Self, CallOption> {
        match option {
            CallOption::CircuitBreaker(option) => Ok(option),
            other => Err(other),
        }
    }

    fn apply(&self, config: &mut CircuitBreakerConfig) {
        config.enabled = self.enabled;
    }
}

/// Gate the call through the circuit breaker.
pub fn with_circuit_breaker_enabled() -> CallOption {
    with_circuit_breaker(true)
}

/// Turn circuit breaker gating on or off for the call.
pub fn with_circuit_breaker(enabled: bool) -> CallOption {
    CallOption::CircuitBreaker(CircuitBreakerCallOption { enabled })
}

/// The circuit breaker interceptor for `allower`.
///
/// Without an allower every call is dispatched ungated; breaker options are
/// still consumed so they never reach the transport.
pub fn circuit_breaker_interceptor(allower: Option<Arc<dyn Allower>>) -> Arc<dyn Interceptor> {
    match allower {
        Some(allower) => Arc::new(CircuitBreakerInterceptor::new(allower)),
        None => Arc::new(CircuitBreakerInterceptor::ungated()),
    }
}

/// Interceptor gating opted-in calls through an [`Allower`].
#[derive(Clone)]
pub struct CircuitBreakerInterceptor {
    allower: Option<Arc<dyn Allower>>,
}

impl std::fmt::Debug for CircuitBreakerInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerInterceptor")
            .field("gated", &self.allower.is_some())
            .finish()
    }
}

impl CircuitBreakerInterceptor {
    /// Create an interceptor consulting `allower`.
    pub fn new(allower: Arc<dyn Allower>) -> Self {
        Self {
            allower: Some(allower),
        }
    }

    /// Create an interceptor that strips breaker options and gates nothing.
    pub fn ungated() -> Self {
        Self { allower: None }
    }
}

impl Interceptor for CircuitBreakerInterceptor {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let allower = self.allower.clone();
        Arc::new(move |mut request: UnaryRequest| {
            let (options, breaker) =
                filter_call_options::<CircuitBreakerCallOption>(std::mem::take(&mut request.options));
            request.options = options;

            let allower = match &allower {
                Some(allower) if fold_call_options(&breaker).enabled => allower,
                _ => return next(request),
            };

            let permit = match allower.allow() {
                Ok(done) => Permit::new(done),
                Err(reason) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        procedure = %request.procedure,
                        reason = %reason,
                        "circuit breaker refused call"
                    );
                    return Box::pin(async move { Err(CallError::NotAllowed(reason)) });
                }
            };

            let call = next(request);
            Box::pin(async move {
                let result = call.await;
                permit.report(is_success_call(&result));
                result
            })
        })
    }
}
