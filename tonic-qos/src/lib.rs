//! Quality-of-service interceptors for tonic unary clients.
//!
//! This crate wraps every outgoing unary gRPC call in a chain of interceptors
//! adding cross-cutting policies without touching call sites:
//!
//! - Retries with exponential backoff and per-attempt timeouts
//! - Circuit breaking through an externally supplied gate ([`Allower`])
//! - Request start and expiry metadata
//! - Request compression
//!
//! Every policy is configured per call through [`CallOption`]s. Each
//! interceptor consumes its own options and forwards the rest, so only
//! transport-native options reach tonic.
//!
//! ## Example
//!
//! ```ignore
//! use tonic::transport::Channel;
//! use tonic_qos::{CallContext, QosClient, Qos};
//!
//! let channel = Channel::from_static("http://127.0.0.1:50051").connect().await?;
//! let client = QosClient::builder(channel)
//!     .circuit_breaker(breaker)
//!     .build();
//!
//! let qos = Qos {
//!     timeout: Duration::from_millis(300),
//!     retry_attempts: 3,
//!     circuit_breaker_enabled: true,
//!     gzip_enabled: false,
//! };
//!
//! let (ctx, cancel) = qos.context(&CallContext::new());
//! let response = client
//!     .call_unary::<MyRequest, MyResponse>(&ctx, "/my.package.MyService/MyMethod", &request, qos.call_options())
//!     .await;
//! cancel.cancel();
//!
//! match response {
//!     Ok(response) => println!("Response: {:?}", response.into_inner()),
//!     Err(err) if err.is_not_allowed() => println!("breaker is open"),
//!     Err(err) => println!("call failed: {err}"),
//! }
//! ```
//!
//! ## Interceptor Order
//!
//! ```text
//! retry -> circuit breaker -> request metadata -> [extra interceptors] -> transport
//! ```
//!
//! Every retry attempt is admitted by the breaker and stamped with fresh
//! metadata. A call refused by the breaker fails with
//! [`CallError::NotAllowed`], which is never retried.
//!
//! ## Circuit Breaker Outcomes
//!
//! An admitted call reports exactly one outcome to its gate. Success and
//! cancellation are reported as success; every other error, including
//! deadline expiry, is a failure.
//!
//! ## Feature Flags
//!
//! | Feature | Description | Dependencies |
//! |---------|-------------|--------------|
//! | `tracing` (default) | Tracing spans and debug events for RPC calls | `tracing` |
//!
//! When enabled, each typed call creates an `rpc.call` span with:
//! - `rpc.method`: Full method path (e.g., "/package.Service/Method")
//! - `rpc.type`: "unary"
//! - `otel.kind`: "client"

mod builder;
mod client;
pub mod config;
mod context;
mod error;
mod gate;
pub mod interceptor;
pub mod transport;

pub use builder::ClientBuilder;
pub use client::QosClient;
pub use context::{CallContext, CancelFn};
pub use error::{BoxError, CallError, is_success_call};
pub use gate::{Allower, Done};

// Re-export from config module
pub use config::{
    BackoffPolicy, CallOption, CallOptionKind, ExponentialBackoff, GrpcCallOption, InvalidBackoff, Qos,
    RETRYABLE_CODES, filter_call_options, fold_call_options, use_compressor, with_header,
};

// Re-export from interceptor module
pub use interceptor::{
    BoxFuture, Interceptor, InterceptorChain, NoopInterceptor, REQUEST_EXPIRY_INSTANT,
    REQUEST_START_INSTANT, UnaryClientInterceptorConfig, UnaryFunc, UnaryRequest, UnaryResponse,
    unary_client_interceptor, with_backoff, with_circuit_breaker, with_circuit_breaker_enabled,
    with_codes, with_max, with_meta_now_fn, with_meta_request_expiry, with_per_retry_timeout,
};

// Re-export types callers need to build requests
pub use bytes::Bytes;
pub use tonic::Code;
