#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tonic::Status;
use tonic_qos::{Allower, BoxError, Done};
use tonic_qos_test::{MockSampleServer, SampleResponse};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Opens for good after the first reported failure.
#[derive(Clone, Default)]
pub struct CloseAfterFailAllower {
    failed: Arc<AtomicBool>,
}

impl Allower for CloseAfterFailAllower {
    fn allow(&self) -> Result<Done, BoxError> {
        if self.failed.load(Ordering::SeqCst) {
            return Err("closed indefinitely".into());
        }
        let failed = self.failed.clone();
        Ok(Box::new(move |success| {
            if !success {
                failed.store(true, Ordering::SeqCst);
            }
        }))
    }
}

/// Admits everything and records every reported outcome.
#[derive(Clone, Default)]
pub struct RecordingAllower {
    pub reports: Arc<Mutex<Vec<bool>>>,
}

impl Allower for RecordingAllower {
    fn allow(&self) -> Result<Done, BoxError> {
        let reports = self.reports.clone();
        Ok(Box::new(move |success| reports.lock().unwrap().push(success)))
    }
}

/// A service answering every call with `status` and counting calls.
pub fn failing_server(calls: Arc<AtomicUsize>, status: Status) -> MockSampleServer {
    MockSampleServer::new(move |_req| {
        let calls = calls.clone();
        let status = status.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<SampleResponse, _>(status)
        }
    })
}

/// A service whose first `slow_calls` calls take `delay`, echoing the id.
pub fn slow_server(calls: Arc<AtomicUsize>, slow_calls: usize, delay: Duration) -> MockSampleServer {
    MockSampleServer::new(move |req| {
        let calls = calls.clone();
        async move {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            if call < slow_calls {
                tokio::time::sleep(delay).await;
            }
            Ok(SampleResponse {
                id: req.into_inner().id,
            })
        }
    })
}
