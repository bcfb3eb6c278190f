//! Quality-of-service policy for a client or a single call.
//!
//! A [`Qos`] is the source of truth for timeouts, retries, circuit breaking and
//! compression. It is turned into concrete [`CallOption`]s and a call context
//! for every outgoing call:
//!
//! ```ignore
//! use tonic_qos::{CallContext, Qos};
//! use std::time::Duration;
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
//!     .call_unary::<Req, Res>(&ctx, "/pkg.Service/Method", &request, qos.call_options())
//!     .await;
//! cancel.cancel();
//! ```
//!
//! `Qos` also deserializes from configuration, with the timeout given in
//! milliseconds:
//!
//! ```json
//! { "timeout_ms": 300, "retry_attempts": 3, "circuit_breaker_enabled": true }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tonic::Code;
use tonic::codec::CompressionEncoding;

use crate::config::{CallOption, use_compressor};
use crate::context::{CallContext, CancelFn};
use crate::interceptor::{
    with_circuit_breaker_enabled, with_codes, with_max, with_meta_request_expiry,
    with_per_retry_timeout,
};

/// Status codes retried on behalf of a [`Qos`] policy.
pub const RETRYABLE_CODES: [Code; 4] = [
    Code::ResourceExhausted,
    Code::Unavailable,
    Code::Aborted,
    Code::DeadlineExceeded,
];

/// A client's quality-of-service configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Qos {
    /// Timeout for a single attempt. Zero means no timeout.
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
    /// Number of request attempts. Zero and one both mean no extra attempts.
    pub retry_attempts: u32,
    /// Gate calls through the circuit breaker.
    pub circuit_breaker_enabled: bool,
    /// Compress requests with gzip.
    pub gzip_enabled: bool,
}

impl Qos {
    /// Call options implementing this policy.
    pub fn call_options(&self) -> Vec<CallOption> {
        let mut options = vec![
            with_per_retry_timeout(self.timeout),
            with_max(self.retry_attempts),
            with_codes(RETRYABLE_CODES),
            with_meta_request_expiry(self.timeout),
        ];

        if self.circuit_breaker_enabled {
            options.push(with_circuit_breaker_enabled());
        }

        if self.gzip_enabled {
            options.push(use_compressor(CompressionEncoding::Gzip));
        }

        options
    }

    /// Per-call context derived from `parent`.
    ///
    /// Without retries the timeout bounds the whole call. With retries each
    /// attempt is bounded by the retry interceptor instead, so the parent is
    /// returned as is.
    pub fn context(&self, parent: &CallContext) -> (CallContext, CancelFn) {
        if self.retry_attempts == 0 && !self.timeout.is_zero() {
            return parent.with_timeout(self.timeout);
        }

        (parent.clone(), CancelFn::noop())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
