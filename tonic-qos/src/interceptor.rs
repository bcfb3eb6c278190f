//! Interceptors for tonic unary clients.
//!
//! An interceptor wraps the "next" [`UnaryFunc`] of the chain and returns a
//! new one. The chain built by [`unary_client_interceptor`] is:
//!
//! ```text
//! retry -> circuit breaker -> request metadata -> transport
//! ```
//!
//! Retries re-run everything inside them, so every attempt asks the breaker
//! for admission and gets fresh timestamps. The breaker sits before metadata
//! stamping, so a refused call never reaches the wire.
//!
//! # Example
//!
//! ```ignore
//! use tonic_qos::interceptor::{UnaryClientInterceptorConfig, unary_client_interceptor};
//!
//! let chain = unary_client_interceptor(
//!     UnaryClientInterceptorConfig::default().with_circuit_breaker_interceptor(breaker),
//! );
//! let call = chain.wrap_unary(tonic_qos::transport::unary_func(channel));
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use tonic::metadata::MetadataMap;

use crate::config::CallOption;
use crate::context::CallContext;
use crate::error::CallError;
use crate::gate::Allower;

mod breaker;
mod meta;
mod retry;

pub use breaker::{
    CircuitBreakerCallOption, CircuitBreakerConfig, CircuitBreakerInterceptor,
    circuit_breaker_interceptor, with_circuit_breaker, with_circuit_breaker_enabled,
};
pub use meta::{
    MetaCallOption, MetaConfig, MetaInterceptor, NowFn, REQUEST_EXPIRY_INSTANT,
    REQUEST_START_INSTANT, with_meta_now_fn, with_meta_request_expiry,
};
pub use retry::{
    RetryCallOption, RetryConfig, RetryInterceptor, with_backoff, with_codes, with_max,
    with_per_retry_timeout,
};

/// Type alias for a boxed future returning a result.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A unary RPC request with its context, metadata, body and call options.
///
/// This is a type-erased request that interceptors can modify before
/// it's sent to the server.
#[derive(Debug, Clone)]
pub struct UnaryRequest {
    /// Deadline and cancellation scope of the call.
    pub context: CallContext,
    /// The method path being called (e.g., "/package.Service/Method").
    pub procedure: String,
    /// Outgoing request metadata.
    pub metadata: MetadataMap,
    /// Request body (encoded message).
    pub body: Bytes,
    /// Call options not yet consumed by an interceptor.
    pub options: Vec<CallOption>,
}

impl UnaryRequest {
    /// Create a new unary request with empty metadata and no options.
    pub fn new(context: CallContext, procedure: impl Into<String>, body: Bytes) -> Self {
        Self {
            context,
            procedure: procedure.into(),
            metadata: MetadataMap::new(),
            body,
            options: Vec::new(),
        }
    }

    /// Append call options to the request.
    pub fn with_options(mut self, options: impl IntoIterator<Item = CallOption>) -> Self {
        self.options.extend(options);
        self
    }

    /// Get a mutable reference to the metadata.
    pub fn metadata_mut(&mut self) -> &mut MetadataMap {
        &mut self.metadata
    }
}

/// A unary RPC response with metadata and body.
#[derive(Debug, Clone)]
pub struct UnaryResponse {
    /// Response metadata.
    pub metadata: MetadataMap,
    /// Response body (encoded message).
    pub body: Bytes,
}

impl UnaryResponse {
    /// Create a new unary response.
    pub fn new(metadata: MetadataMap, body: Bytes) -> Self {
        Self { metadata, body }
    }
}

/// The signature of a unary RPC call.
///
/// Interceptors wrap this function to add logic before and after the call.
pub type UnaryFunc =
    Arc<dyn Fn(UnaryRequest) -> BoxFuture<'static, Result<UnaryResponse, CallError>> + Send + Sync>;

/// An interceptor that can wrap unary RPC calls.
pub trait Interceptor: Send + Sync {
    /// Wrap a unary RPC call.
    ///
    /// The default implementation passes through to the next function unchanged.
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        next
    }
}

/// Interceptor that does nothing.
///
/// Installed in place of the circuit breaker when no gate is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopInterceptor;

impl Interceptor for NoopInterceptor {}

/// A chain of interceptors that are applied in order.
#[derive(Clone)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("count", &self.interceptors.len())
            .finish()
    }
}

impl InterceptorChain {
    /// Create a new empty interceptor chain.
    pub fn new() -> Self {
        Self {
            interceptors: Vec::new(),
        }
    }

    /// Add an interceptor to the chain.
    pub fn push(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Check if the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Get the number of interceptors in the chain.
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Wrap a unary function with all interceptors in the chain.
    ///
    /// Interceptors are applied in reverse order so that the first interceptor
    /// added is the first to process the request.
    pub fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        let mut wrapped = next;
        for interceptor in self.interceptors.iter().rev() {
            wrapped = interceptor.wrap_unary(wrapped);
        }
        wrapped
    }
}

impl Default for InterceptorChain {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor for InterceptorChain {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        InterceptorChain::wrap_unary(self, next)
    }
}

/// Configuration of the composed unary client interceptor.
#[derive(Clone, Default)]
pub struct UnaryClientInterceptorConfig {
    allower: Option<Arc<dyn Allower>>,
}

impl std::fmt::Debug for UnaryClientInterceptorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnaryClientInterceptorConfig")
            .field("circuit_breaker", &self.allower.is_some())
            .finish()
    }
}

impl UnaryClientInterceptorConfig {
    /// Gate calls that opt in with [`with_circuit_breaker_enabled`] through
    /// `allower`.
    pub fn with_circuit_breaker_interceptor<A>(mut self, allower: A) -> Self
    where
        A: Allower + 'static,
    {
        self.allower = Some(Arc::new(allower));
        self
    }
}

/// Build the unary client interceptor: retry, then circuit breaker, then
/// request metadata.
pub fn unary_client_interceptor(config: UnaryClientInterceptorConfig) -> InterceptorChain {
    let mut chain = InterceptorChain::new();
    chain.push(Arc::new(RetryInterceptor));
    chain.push(circuit_breaker_interceptor(config.allower));
    chain.push(Arc::new(MetaInterceptor));
    chain
}
