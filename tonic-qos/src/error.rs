//! Client-side call error types.
//!
//! This module provides [`CallError`], the error type returned by every
//! interceptor in the chain and by the transport at its end.

use tonic::{Code, Status};

/// Boxed error produced by a circuit breaker gate when it refuses a call.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error variants for a single unary call.
///
/// [`CallError::NotAllowed`] is produced only by the circuit breaker
/// interceptor and never reaches the wire; every other variant describes the
/// outcome of an attempt that was dispatched.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The circuit breaker gate refused to admit the call.
    #[error("request is not allowed: {0}")]
    NotAllowed(#[source] BoxError),

    /// A status returned by the server or produced by the transport.
    #[error(transparent)]
    Status(#[from] Status),

    /// The call context was cancelled before the call completed.
    #[error("context canceled")]
    Cancelled,

    /// The call context deadline passed before the call completed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Request message encoding error.
    #[error("encode error: {0}")]
    Encode(String),

    /// Response message decoding error.
    #[error("decode error: {0}")]
    Decode(String),
}

impl CallError {
    /// Get the gRPC code describing this error.
    ///
    /// - `Status`: the status code
    /// - `Cancelled`: `Cancelled`
    /// - `DeadlineExceeded`: `DeadlineExceeded`
    /// - `NotAllowed`: `Unknown`, so a refused call is never retried
    /// - `Encode`/`Decode`: `Internal`
    pub fn code(&self) -> Code {
        match self {
            CallError::Status(status) => status.code(),
            CallError::Cancelled => Code::Cancelled,
            CallError::DeadlineExceeded => Code::DeadlineExceeded,
            CallError::NotAllowed(_) => Code::Unknown,
            CallError::Encode(_) | CallError::Decode(_) => Code::Internal,
        }
    }

    /// Returns true if the circuit breaker refused the call.
    pub fn is_not_allowed(&self) -> bool {
        matches!(self, CallError::NotAllowed(_))
    }

    /// Returns true if the call was cancelled, either by its context or by
    /// a `Cancelled` status.
    pub fn is_cancelled(&self) -> bool {
        match self {
            CallError::Cancelled => true,
            CallError::Status(status) => status.code() == Code::Cancelled,
            _ => false,
        }
    }
}

/// Classify the outcome of a single attempt for circuit breaker reporting.
///
/// Success and cancellation count as success: a caller giving up says nothing
/// about the health of the dependency. Every other error is a failure.
pub fn is_success_call<T>(result: &Result<T, CallError>) -> bool {
    match result {
        Ok(_) => true,
        Err(err) => err.is_cancelled(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_error_codes() {
        assert_eq!(
            CallError::from(Status::unavailable("down")).code(),
            Code::Unavailable
        );
        assert_eq!(CallError::Cancelled.code(), Code::Cancelled);
        assert_eq!(CallError::DeadlineExceeded.code(), Code::DeadlineExceeded);
        assert_eq!(CallError::NotAllowed("open".into()).code(), Code::Unknown);
        assert_eq!(CallError::Encode("bad".into()).code(), Code::Internal);
        assert_eq!(CallError::Decode("bad".into()).code(), Code::Internal);
    }

    #[test]
    fn test_not_allowed_message_and_source() {
        let err = CallError::NotAllowed("breaker is open".into());
        assert!(err.is_not_allowed());
        assert_eq!(err.to_string(), "request is not allowed: breaker is open");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_is_success_call() {
        assert!(is_success_call(&Ok::<_, CallError>(())));
        assert!(is_success_call::<()>(&Err(CallError::Cancelled)));
        assert!(is_success_call::<()>(&Err(Status::cancelled("gone").into())));

        assert!(!is_success_call::<()>(&Err(CallError::DeadlineExceeded)));
        assert!(!is_success_call::<()>(&Err(
            Status::deadline_exceeded("slow").into()
        )));
        assert!(!is_success_call::<()>(&Err(Status::unavailable("down").into())));
        assert!(!is_success_call::<()>(&Err(
            Status::resource_exhausted("quota").into()
        )));
        assert!(!is_success_call::<()>(&Err(CallError::Decode("bad".into()))));
    }
}
