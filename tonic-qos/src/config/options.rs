//! Call options for per-call configuration.
//!
//! Every call carries a list of [`CallOption`]s. The list mixes options the
//! transport understands ([`GrpcCallOption`]) with extension options that only
//! one interceptor understands (retry, circuit breaker, request metadata).
//!
//! Each interceptor pulls its own options out of the list with
//! [`filter_call_options`], folds them into a fresh configuration with
//! [`fold_call_options`], and forwards the rest untouched:
//!
//! ```ignore
//! use tonic_qos::{CallOption, filter_call_options, fold_call_options};
//! use tonic_qos::interceptor::CircuitBreakerCallOption;
//!
//! let (grpc, breaker) = filter_call_options::<CircuitBreakerCallOption>(options);
//! let config = fold_call_options(&breaker);
//! ```

use tonic::codec::CompressionEncoding;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue};

use crate::interceptor::{CircuitBreakerCallOption, MetaCallOption, RetryCallOption};

/// A single per-call option.
///
/// The set of variants is closed: transport-native options plus one variant
/// per extension kind. Extension options are consumed by the interceptor that
/// owns their kind and never reach the transport when that interceptor is
/// installed.
#[derive(Clone, Debug)]
pub enum CallOption {
    /// Option understood by the gRPC transport.
    Grpc(GrpcCallOption),
    /// Option consumed by the retry interceptor.
    Retry(RetryCallOption),
    /// Option consumed by the circuit breaker interceptor.
    CircuitBreaker(CircuitBreakerCallOption),
    /// Option consumed by the request metadata interceptor.
    Meta(MetaCallOption),
}

/// Transport-native call options.
#[derive(Clone, Debug, PartialEq)]
pub enum GrpcCallOption {
    /// Compress the request message with the given encoding.
    Compression(CompressionEncoding),
    /// Append an extra ASCII metadata entry to the request.
    Header(AsciiMetadataKey, AsciiMetadataValue),
    /// Limit the decoded response message size in bytes.
    MaxDecodingMessageSize(usize),
    /// Limit the encoded request message size in bytes.
    MaxEncodingMessageSize(usize),
}

impl From<GrpcCallOption> for CallOption {
    fn from(option: GrpcCallOption) -> Self {
        CallOption::Grpc(option)
    }
}

/// Compress the request message with `encoding`.
///
/// The server must accept the encoding, otherwise it answers `Unimplemented`.
pub fn use_compressor(encoding: CompressionEncoding) -> CallOption {
    CallOption::Grpc(GrpcCallOption::Compression(encoding))
}

/// Append a metadata entry to the outgoing request.
pub fn with_header(key: AsciiMetadataKey, value: AsciiMetadataValue) -> CallOption {
    CallOption::Grpc(GrpcCallOption::Header(key, value))
}

/// A kind of extension option, with the configuration it folds into.
///
/// `select` is the discriminator: it hands back options of another kind
/// unchanged so they can be forwarded.
pub trait CallOptionKind: Sized {
    /// Configuration built fresh for every call.
    type Config: Default;

    /// Take the option if it belongs to this kind.
    fn select(option: CallOption) -> Result<Self, CallOption>;

    /// Apply this option to the configuration.
    fn apply(&self, config: &mut Self::Config);
}

/// Split `options` into options of other kinds and options of kind `K`.
///
/// Both lists keep their input order. Running the filter on
/// its own first output yields the same list and no `K` options.
pub fn filter_call_options<K: CallOptionKind>(
    options: Vec<CallOption>,
) -> (Vec<CallOption>, Vec<K>) {
    let mut rest = Vec::with_capacity(options.len());
    let mut selected = Vec::new();

    for option in options {
        match K::select(option) {
            Ok(option) => selected.push(option),
            Err(option) => rest.push(option),
        }
    }

    (rest, selected)
}

/// Fold options of kind `K` over a default configuration, in order.
///
/// Later options win over earlier ones for the same field.
pub fn fold_call_options<K: CallOptionKind>(options: &[K]) -> K::Config {
    let mut config = K::Config::default();
    for option in options {
        option.apply(&mut config);
    }
    config
}
