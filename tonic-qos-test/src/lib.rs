//! Test tooling for `tonic-qos`.
//!
//! Provides the `qos.test.Sample` mock service, generated from
//! `proto/sample.proto` at build time, and [`TestServer`], an
//! in-process tonic server it runs on. End-to-end tests live under `tests/`.
//!
//! ```ignore
//! use tonic_qos_test::{MockSampleServer, SampleResponse, TestServer};
//!
//! let server = TestServer::start(MockSampleServer::new(|req| async move {
//!     Ok(SampleResponse { id: req.into_inner().id })
//! }))
//! .await?;
//!
//! let channel = server.channel().await?;
//! // ...
//! server.close().await?;
//! ```

mod sample;
mod server;

pub use sample::{
    GET_RESPONSE, Handler, MockSampleServer, SERVICE_NAME, Sample, SampleRequest, SampleResponse,
    SampleServer,
};
pub use server::TestServer;
