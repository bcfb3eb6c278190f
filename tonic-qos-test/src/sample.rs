//! The `qos.test.Sample` service: one unary method answering through a
//! caller-supplied handler.

use std::future::Future;
use std::sync::Arc;

use tonic::codec::CompressionEncoding;
use tonic::{Request, Response, Status};
use tonic_qos::BoxFuture;

mod proto {
    tonic::include_proto!("qos.test");
}

pub use proto::sample_server::{Sample, SampleServer};
pub use proto::{SampleRequest, SampleResponse};

/// Fully qualified service name.
pub const SERVICE_NAME: &str = "qos.test.Sample";

/// Method path of `Sample.GetResponse`.
pub const GET_RESPONSE: &str = "/qos.test.Sample/GetResponse";

/// Handler answering `GetResponse`.
pub type Handler = Arc<
    dyn Fn(Request<SampleRequest>) -> BoxFuture<'static, Result<SampleResponse, Status>>
        + Send
        + Sync,
>;

/// Mock implementation of the sample service.
///
/// Without a handler every call answers `Unimplemented`.
#[derive(Clone, Default)]
pub struct MockSampleServer {
    handler: Option<Handler>,
}

impl MockSampleServer {
    /// Answer `GetResponse` with `handler`.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(Request<SampleRequest>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<SampleResponse, Status>> + Send + 'static,
    {
        let handler: Handler = Arc::new(
            move |request: Request<SampleRequest>| -> BoxFuture<'static, Result<SampleResponse, Status>> {
                Box::pin(handler(request))
            },
        );
        Self {
            handler: Some(handler),
        }
    }

    /// Wrap into the generated server, accepting and sending gzip.
    pub fn into_server(self) -> SampleServer<Self> {
        SampleServer::new(self)
            .accept_compressed(CompressionEncoding::Gzip)
            .send_compressed(CompressionEncoding::Gzip)
    }
}

#[tonic::async_trait]
impl Sample for MockSampleServer {
    async fn get_response(
        &self,
        request: Request<SampleRequest>,
    ) -> Result<Response<SampleResponse>, Status> {
        let Some(handler) = &self.handler else {
            return Err(Status::unimplemented("GetResponse has no handler"));
        };
        handler(request).await.map(Response::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::server::NamedService;

    #[test]
    fn test_paths_match_generated_service() {
        assert_eq!(<SampleServer<MockSampleServer> as NamedService>::NAME, SERVICE_NAME);
        assert_eq!(GET_RESPONSE, format!("/{SERVICE_NAME}/GetResponse"));
    }

    #[tokio::test]
    async fn test_without_handler_is_unimplemented() {
        let status = MockSampleServer::default()
            .get_response(Request::new(SampleRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unimplemented);
    }
}
