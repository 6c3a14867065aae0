use crate::CircuitState;
use orderflow_core::FlowEvent;
use std::time::{Duration, Instant};

/// Events emitted by the circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// A call was permitted through the circuit breaker.
    CallPermitted {
        source: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was rejected because the circuit is open or no probe slot
    /// was available.
    CallRejected { source: String, timestamp: Instant },
    /// The circuit breaker transitioned between states.
    StateTransition {
        source: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A successful call was recorded.
    SuccessRecorded {
        source: String,
        timestamp: Instant,
        state: CircuitState,
        duration: Duration,
    },
    /// A failed call was recorded.
    FailureRecorded {
        source: String,
        timestamp: Instant,
        state: CircuitState,
        duration: Duration,
    },
    /// A call did not settle within the call timeout.
    CallTimedOut {
        source: String,
        timestamp: Instant,
        limit: Duration,
    },
}

impl FlowEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
            CircuitBreakerEvent::CallTimedOut { .. } => "call_timed_out",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. }
            | CircuitBreakerEvent::CallTimedOut { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            CircuitBreakerEvent::CallPermitted { source, .. }
            | CircuitBreakerEvent::CallRejected { source, .. }
            | CircuitBreakerEvent::StateTransition { source, .. }
            | CircuitBreakerEvent::SuccessRecorded { source, .. }
            | CircuitBreakerEvent::FailureRecorded { source, .. }
            | CircuitBreakerEvent::CallTimedOut { source, .. } => source,
        }
    }
}
