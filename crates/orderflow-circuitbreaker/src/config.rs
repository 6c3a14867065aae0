use crate::events::CircuitBreakerEvent;
use crate::CircuitState;
use orderflow_core::{EventListeners, FnListener};
use std::time::Duration;

/// Configuration for a circuit breaker instance.
///
/// Construct via [`CircuitBreakerConfig::builder`]. All values are
/// caller-supplied at construction; the breaker never reads the
/// environment or any file.
pub struct CircuitBreakerConfig {
    pub(crate) name: String,
    pub(crate) failure_threshold: u32,
    pub(crate) recovery_timeout: Duration,
    pub(crate) call_timeout: Duration,
    pub(crate) half_open_max_probes: u32,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }
}

/// Builder for [`CircuitBreakerConfig`].
pub struct CircuitBreakerConfigBuilder {
    name: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    call_timeout: Duration,
    half_open_max_probes: u32,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            call_timeout: Duration::from_secs(10),
            half_open_max_probes: 1,
            event_listeners: EventListeners::new(),
        }
    }

    /// Give this breaker a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Sets the number of consecutive failures that opens the circuit.
    ///
    /// Values below 1 are clamped to 1 in [`build`](Self::build).
    ///
    /// Default: 5
    pub fn failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n;
        self
    }

    /// Sets the base duration the circuit remains open before a recovery
    /// probe is admitted.
    ///
    /// The effective wait widens exponentially with consecutive failed
    /// probes: `recovery_timeout * 2^min(consecutive_recovery_failures, 5)`.
    ///
    /// Default: 30 seconds
    pub fn recovery_timeout(mut self, duration: Duration) -> Self {
        self.recovery_timeout = duration;
        self
    }

    /// Sets the per-call timeout every attempted call races against.
    ///
    /// A call that does not settle within this duration is counted as a
    /// failure; the underlying operation is abandoned, not aborted.
    ///
    /// Default: 10 seconds
    pub fn call_timeout(mut self, duration: Duration) -> Self {
        self.call_timeout = duration;
        self
    }

    /// Sets the maximum number of concurrent probe calls admitted while
    /// testing recovery.
    ///
    /// Values below 1 are clamped to 1 in [`build`](Self::build).
    ///
    /// Default: 1
    pub fn half_open_max_probes(mut self, n: u32) -> Self {
        self.half_open_max_probes = n;
        self
    }

    /// Registers a callback when the circuit transitions between states.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Registers a callback when a call is rejected without being attempted.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if matches!(event, CircuitBreakerEvent::CallRejected { .. }) {
                    f();
                }
            }));
        self
    }

    /// Registers a callback when a call times out.
    pub fn on_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallTimedOut { limit, .. } = event {
                    f(*limit);
                }
            }));
        self
    }

    /// Adds a listener receiving every circuit breaker event.
    pub fn event_listener<L>(mut self, listener: L) -> Self
    where
        L: orderflow_core::EventListener<CircuitBreakerEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Builds the configuration, clamping out-of-range values.
    pub fn build(self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            name: self.name,
            failure_threshold: self.failure_threshold.max(1),
            recovery_timeout: self.recovery_timeout,
            call_timeout: self.call_timeout,
            half_open_max_probes: self.half_open_max_probes.max(1),
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
