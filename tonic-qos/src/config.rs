//! Configuration modules for the interceptor chain.
//!
//! This module contains call-level configuration:
//! - [`CallOption`]: Per-call options and their filtering
//! - [`BackoffPolicy`]: Delay between retry attempts
//! - [`Qos`]: Timeout, retry, breaker and compression policy

mod backoff;
mod options;
mod qos;

pub use backoff::{BackoffPolicy, ExponentialBackoff, InvalidBackoff, defaults};
pub use options::{
    CallOption, CallOptionKind, GrpcCallOption, filter_call_options, fold_call_options,
    use_compressor, with_header,
};
pub use qos::{Qos, RETRYABLE_CODES};
