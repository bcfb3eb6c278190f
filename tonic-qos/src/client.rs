//! Unary gRPC client running every call through the interceptor chain.
//!
//! This module provides the [`QosClient`] type for making RPC calls.

use bytes::Bytes;
use prost::Message;
#[cfg(feature = "tracing")]
use tracing::{Instrument, info_span};

use crate::builder::ClientBuilder;
use crate::config::CallOption;
use crate::context::CallContext;
use crate::error::CallError;
use crate::interceptor::{UnaryFunc, UnaryRequest, UnaryResponse};

/// Unary gRPC client with retry, circuit breaking and request metadata.
///
/// Cloning is cheap: clones share the channel and the interceptor chain.
///
/// Use [`ClientBuilder`] or [`QosClient::builder`] to create an instance.
///
/// # Example
///
/// ```ignore
/// use tonic_qos::{CallContext, QosClient, Qos};
///
/// let client = QosClient::builder(channel)
///     .circuit_breaker(breaker)
///     .build();
///
/// let qos = Qos { retry_attempts: 3, circuit_breaker_enabled: true, ..Default::default() };
/// let (ctx, cancel) = qos.context(&CallContext::new());
/// let response = client
///     .call_unary::<GetUserRequest, GetUserResponse>(
///         &ctx,
///         "/users.v1.UserService/GetUser",
///         &GetUserRequest { id: "123".to_string() },
///         qos.call_options(),
///     )
///     .await?;
/// cancel.cancel();
/// ```
#[derive(Clone)]
pub struct QosClient {
    call: UnaryFunc,
    default_options: Vec<CallOption>,
}

impl std::fmt::Debug for QosClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QosClient")
            .field("default_options", &self.default_options)
            .finish_non_exhaustive()
    }
}

impl QosClient {
    /// Create a builder for a client over `channel`.
    pub fn builder(channel: tonic::transport::Channel) -> ClientBuilder {
        ClientBuilder::new(channel)
    }

    pub(crate) fn new(call: UnaryFunc, default_options: Vec<CallOption>) -> Self {
        Self {
            call,
            default_options,
        }
    }

    /// Call options applied to every call before the per-call ones.
    pub fn default_options(&self) -> &[CallOption] {
        &self.default_options
    }

    /// Run an encoded request through the interceptor chain.
    ///
    /// The client's default options are placed before the request's own, so
    /// per-call options win.
    pub async fn call(&self, mut request: UnaryRequest) -> Result<UnaryResponse, CallError> {
        if !self.default_options.is_empty() {
            let mut options = self.default_options.clone();
            options.append(&mut request.options);
            request.options = options;
        }
        (self.call)(request).await
    }

    /// Make a unary RPC call.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Deadline and cancellation scope of the call
    /// * `procedure` - The full method path (e.g., "/my.package.MyService/MyMethod")
    /// * `request` - The request message
    /// * `options` - Per-call options
    ///
    /// # Errors
    ///
    /// Returns a [`CallError`] if:
    /// - The circuit breaker refuses the call
    /// - The context is cancelled or its deadline passes
    /// - The server returns an error status
    /// - The response cannot be decoded
    pub async fn call_unary<Req, Res>(
        &self,
        ctx: &CallContext,
        procedure: &str,
        request: &Req,
        options: impl IntoIterator<Item = CallOption>,
    ) -> Result<tonic::Response<Res>, CallError>
    where
        Req: Message,
        Res: Message + Default,
    {
        let request = UnaryRequest::new(ctx.clone(), procedure, Bytes::from(request.encode_to_vec()))
            .with_options(options);

        let call = self.call(request);
        #[cfg(feature = "tracing")]
        let call = call.instrument(info_span!(
            "rpc.call",
            rpc.method = %procedure,
            rpc.type = "unary",
            otel.kind = "client",
        ));
        let response = call.await?;

        let message = Res::decode(response.body)
            .map_err(|e| CallError::Decode(format!("protobuf decoding failed: {}", e)))?;
        let mut decoded = tonic::Response::new(message);
        *decoded.metadata_mut() = response.metadata;
        Ok(decoded)
    }
}
