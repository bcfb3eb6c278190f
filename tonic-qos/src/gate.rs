//! Circuit breaker gate abstraction.
//!
//! The interceptor does not implement a breaker. It talks to one through
//! [`Allower`]: ask for admission, dispatch, report the outcome once.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use tonic_qos::{Allower, BoxError, Done};
//!
//! /// Opens for good after the first reported failure.
//! #[derive(Default)]
//! struct OpenAfterFailure {
//!     failed: Arc<AtomicBool>,
//! }
//!
//! impl Allower for OpenAfterFailure {
//!     fn allow(&self) -> Result<Done, BoxError> {
//!         if self.failed.load(Ordering::SeqCst) {
//!             return Err("closed indefinitely".into());
//!         }
//!         let failed = self.failed.clone();
//!         Ok(Box::new(move |success| {
//!             if !success {
//!                 failed.store(true, Ordering::SeqCst);
//!             }
//!         }))
//!     }
//! }
//! ```

use crate::error::BoxError;

/// Outcome callback handed out with an admission; `true` reports success.
pub type Done = Box<dyn FnOnce(bool) + Send + 'static>;

/// A circuit breaker that only decides admission and expects the caller to
/// report the outcome in a separate step.
///
/// Implementations are shared across concurrent calls and must synchronize
/// internally.
pub trait Allower: Send + Sync {
    /// Check that a request can proceed.
    ///
    /// On admission returns the callback reporting the outcome; it must be
    /// invoked exactly once. On refusal returns the reason.
    fn allow(&self) -> Result<Done, BoxError>;
}

impl<F> Allower for F
where
    F: Fn() -> Result<Done, BoxError> + Send + Sync,
{
    fn allow(&self) -> Result<Done, BoxError> {
        self()
    }
}

/// One pending admission, resolved exactly once.
///
/// [`Permit::report`] resolves it with the classified outcome. A permit
/// dropped unresolved reports on its own: success when the call future was
/// abandoned by its caller, failure when unwinding from a panic.
pub(crate) struct Permit {
    done: Option<Done>,
}

impl Permit {
    pub(crate) fn new(done: Done) -> Self {
        Self { done: Some(done) }
    }

    pub(crate) fn report(mut self, success: bool) {
        if let Some(done) = self.done.take() {
            done(success);
        }
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(done) = self.done.take() {
            done(!std::thread::panicking());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording() -> (Done, Arc<Mutex<Vec<bool>>>) {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = reports.clone();
        let done: Done = Box::new(move |success| sink.lock().unwrap().push(success));
        (done, reports)
    }

    #[test]
    fn test_permit_reports_once() {
        let (done, reports) = recording();
        Permit::new(done).report(false);
        assert_eq!(*reports.lock().unwrap(), vec![false]);
    }

    #[test]
    fn test_permit_dropped_reports_success() {
        let (done, reports) = recording();
        drop(Permit::new(done));
        assert_eq!(*reports.lock().unwrap(), vec![true]);
    }

    #[test]
    fn test_permit_reports_failure_on_panic() {
        let (done, reports) = recording();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _permit = Permit::new(done);
            panic!("downstream panicked");
        }));
        assert!(result.is_err());
        assert_eq!(*reports.lock().unwrap(), vec![false]);
    }

    #[test]
    fn test_closure_allower() {
        let deny = || -> Result<Done, BoxError> { Err("open".into()) };
        let err = match deny.allow() {
            Ok(_) => panic!("expected refusal"),
            Err(err) => err,
        };
        assert_eq!(err.to_string(), "open");

        let shared: Arc<dyn Allower> = Arc::new(|| -> Result<Done, BoxError> {
            Ok(Box::new(|_| {}))
        });
        assert!(shared.allow().is_ok());
    }
}
