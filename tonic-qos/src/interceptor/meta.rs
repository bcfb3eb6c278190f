//! Request metadata interceptor.
//!
//! Stamps every dispatched attempt with its start instant and, when an expiry
//! is configured, the instant past which the result is no longer useful. Both
//! values are Unix milliseconds in base-10 text.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tonic::metadata::MetadataValue;

use crate::config::{CallOption, CallOptionKind, filter_call_options, fold_call_options};

use super::{Interceptor, UnaryFunc, UnaryRequest};

/// Metadata key carrying the request start instant.
///
/// This is the wire form of `Request-Start-Instant`; HTTP/2 header names are
/// lowercase.
pub const REQUEST_START_INSTANT: &str = "request-start-instant";

/// Metadata key carrying the request expiry instant.
///
/// This is the wire form of `Request-Expiry-Instant`.
pub const REQUEST_EXPIRY_INSTANT: &str = "request-expiry-instant";

/// Clock override used in place of [`SystemTime::now`].
pub type NowFn = Arc<dyn Fn() -> SystemTime + Send + Sync>;

/// Request metadata configuration of a single call.
#[derive(Clone, Default)]
pub struct MetaConfig {
    /// Clock override; the system clock when unset.
    pub now_fn: Option<NowFn>,
    /// Expiry relative to the start instant. Zero means no expiry metadata.
    pub expiry: Duration,
}

impl std::fmt::Debug for MetaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaConfig")
            .field("now_fn", &self.now_fn.is_some())
            .field("expiry", &self.expiry)
            .finish()
    }
}

impl MetaConfig {
    fn now(&self) -> SystemTime {
        match &self.now_fn {
            Some(now) => now(),
            None => SystemTime::now(),
        }
    }
}

/// Call option consumed by the request metadata interceptor.
#[derive(Clone)]
pub enum MetaCallOption {
    /// Override the clock.
    NowFn(NowFn),
    /// Set the request expiry.
    RequestExpiry(Duration),
}

impl std::fmt::Debug for MetaCallOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetaCallOption::NowFn(_) => f.write_str("NowFn(..)"),
            MetaCallOption::RequestExpiry(expiry) => {
                f.debug_tuple("RequestExpiry").field(expiry).finish()
            }
        }
    }
}

impl CallOptionKind for MetaCallOption {
    type Config = MetaConfig;

    fn select(option: CallOption) -> Result<Self, CallOption> {
        match option {
            CallOption::Meta(option) => Ok(option),
            other => Err(other),
        }
    }

    fn apply(&self, config: &mut MetaConfig) {
        match self {
            MetaCallOption::NowFn(now) => config.now_fn = Some(now.clone()),
            MetaCallOption::RequestExpiry(expiry) => config.expiry = *expiry,
        }
    }
}

/// Take the request start instant from `now` instead of the system clock.
pub fn with_meta_now_fn<F>(now: F) -> CallOption
where
    F: Fn() -> SystemTime + Send + Sync + 'static,
{
    CallOption::Meta(MetaCallOption::NowFn(Arc::new(now)))
}

/// Stamp the request with an expiry `expiry` after its start.
pub fn with_meta_request_expiry(expiry: Duration) -> CallOption {
    CallOption::Meta(MetaCallOption::RequestExpiry(expiry))
}

/// Interceptor stamping request start and expiry metadata.
#[derive(Clone, Copy, Debug, Default)]
pub struct MetaInterceptor;

impl Interceptor for MetaInterceptor {
    fn wrap_unary(&self, next: UnaryFunc) -> UnaryFunc {
        Arc::new(move |mut request: UnaryRequest| {
            let (options, meta) =
                filter_call_options::<MetaCallOption>(std::mem::take(&mut request.options));
            request.options = options;

            let config = fold_call_options(&meta);
            let now = config.now();

            request
                .metadata
                .append(REQUEST_START_INSTANT, MetadataValue::from(unix_millis(now)));

            if !config.expiry.is_zero() {
                let expiry = now
                    .checked_add(config.expiry)
                    .map_or(i64::MAX, unix_millis);
                request
                    .metadata
                    .append(REQUEST_EXPIRY_INSTANT, MetadataValue::from(expiry));
            }

            next(request)
        })
    }
}

/// Milliseconds since the Unix epoch, negative before it.
fn unix_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => i64::try_from(since.as_millis()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_millis())
            .map(|millis| -millis)
            .unwrap_or(i64::MIN),
    }
}
