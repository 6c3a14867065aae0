use thiserror::Error;

/// Errors returned by [`CircuitBreaker::execute`](crate::CircuitBreaker::execute).
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open (or all half-open probe slots are taken);
    /// the call was not attempted.
    #[error("circuit is open; call not permitted")]
    Open,

    /// The call did not settle within the configured call timeout.
    ///
    /// The underlying operation is abandoned, not aborted: its eventual
    /// result is discarded, but the work itself keeps running.
    #[error("call timed out")]
    Timeout,

    /// An error returned by the wrapped operation.
    #[error("operation error: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the error indicates the circuit is open.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open)
    }

    /// Returns true if the error indicates a call timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CircuitBreakerError::Timeout)
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}
