//! tonic transport at the end of the interceptor chain.
//!
//! [`unary_func`] turns a [`Channel`] into the innermost [`UnaryFunc`]. It
//! consumes the transport-native call options, forwards the remaining time
//! of the call context as the gRPC timeout, and abandons the call once the
//! context is cancelled or its deadline passes.
//!
//! # Example
//!
//! ```ignore
//! use tonic::transport::Channel;
//! use tonic_qos::transport::unary_func;
//!
//! let channel = Channel::from_static("http://127.0.0.1:50051").connect().await?;
//! let call = chain.wrap_unary(unary_func(channel));
//! ```

mod codec;

pub use codec::{BytesCodec, BytesDecoder, BytesEncoder};

use std::sync::Arc;

use bytes::Bytes;
use http::uri::PathAndQuery;
use tonic::Status;
use tonic::client::Grpc;
use tonic::codec::CompressionEncoding;
use tonic::transport::Channel;

use crate::config::{CallOption, GrpcCallOption};
use crate::error::CallError;
use crate::interceptor::{UnaryFunc, UnaryRequest, UnaryResponse};

/// The innermost [`UnaryFunc`], dispatching requests over `channel`.
pub fn unary_func(channel: Channel) -> UnaryFunc {
    Arc::new(move |request: UnaryRequest| {
        let channel = channel.clone();
        Box::pin(async move {
            let context = request.context.clone();
            context.run(invoke(channel, request)).await
        })
    })
}

async fn invoke(channel: Channel, request: UnaryRequest) -> Result<UnaryResponse, CallError> {
    let UnaryRequest {
        context,
        procedure,
        mut metadata,
        body,
        options,
    } = request;

    let path = PathAndQuery::try_from(procedure)
        .map_err(|err| Status::invalid_argument(format!("invalid procedure path: {err}")))?;

    let mut grpc = Grpc::new(channel).accept_compressed(CompressionEncoding::Gzip);
    for option in options {
        match option {
            CallOption::Grpc(GrpcCallOption::Compression(encoding)) => {
                grpc = grpc.send_compressed(encoding);
            }
            CallOption::Grpc(GrpcCallOption::Header(key, value)) => {
                metadata.append(key, value);
            }
            CallOption::Grpc(GrpcCallOption::MaxDecodingMessageSize(limit)) => {
                grpc = grpc.max_decoding_message_size(limit);
            }
            CallOption::Grpc(GrpcCallOption::MaxEncodingMessageSize(limit)) => {
                grpc = grpc.max_encoding_message_size(limit);
            }
            #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
            other => {
                #[cfg(feature = "tracing")]
                tracing::debug!(option = ?other, "ignoring call option without interceptor");
            }
        }
    }

    grpc.ready()
        .await
        .map_err(|err| Status::unavailable(format!("service was not ready: {err}")))?;

    let mut outgoing = tonic::Request::new(body);
    *outgoing.metadata_mut() = metadata;
    if let Some(remaining) = context.remaining() {
        outgoing.set_timeout(remaining);
    }

    let response = grpc.unary::<Bytes, Bytes, _>(outgoing, path, BytesCodec).await?;
    let (metadata, body, _) = response.into_parts();
    Ok(UnaryResponse::new(metadata, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CallContext;
    use std::time::Duration;

    fn lazy_channel() -> Channel {
        Channel::from_static("http://127.0.0.1:1").connect_lazy()
    }

    #[tokio::test]
    async fn test_invalid_procedure_path() {
        let call = unary_func(lazy_channel());
        let request = UnaryRequest::new(CallContext::new(), "not a path", Bytes::new());

        let err = call(request).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_cancelled_context_is_not_dispatched() {
        let call = unary_func(lazy_channel());
        let (ctx, cancel) = CallContext::new().with_cancel();
        cancel.cancel();

        let err = call(UnaryRequest::new(ctx, "/test.Service/Method", Bytes::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_context_is_not_dispatched() {
        let call = unary_func(lazy_channel());
        let (ctx, _cancel) = CallContext::new().with_timeout(Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(20)).await;

        let err = call(UnaryRequest::new(ctx, "/test.Service/Method", Bytes::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::DeadlineExceeded));
    }
}
