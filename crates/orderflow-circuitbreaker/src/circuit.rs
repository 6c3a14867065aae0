use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge, histogram};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cap for the recovery backoff exponent, limiting the effective open
/// duration to `recovery_timeout * 32`.
pub(crate) const MAX_BACKOFF_EXPONENT: u32 = 5;

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum CircuitState {
    /// The circuit is closed and calls are allowed.
    Closed = 0,
    /// The circuit is open and calls are rejected.
    Open = 1,
    /// The circuit is half-open and a limited number of probe calls are allowed.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed, // Default to Closed for safety
        }
    }

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

/// Snapshot of circuit breaker metrics for observability.
///
/// All fields represent a consistent view taken while holding the circuit
/// lock; counters are cumulative over the life of the breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CircuitMetrics {
    /// Current state of the circuit breaker.
    pub state: CircuitState,
    /// Consecutive failures observed while closed (resets on any success).
    pub failure_count: u32,
    /// Consecutive failed recovery probes (drives the backoff exponent).
    pub consecutive_recovery_failures: u32,
    /// Total number of `execute` calls, including rejected ones.
    pub total_calls: u64,
    /// Number of calls that completed successfully.
    pub success_calls: u64,
    /// Number of calls that failed or timed out.
    pub failed_calls: u64,
    /// Number of calls rejected without being attempted.
    pub rejected_calls: u64,
}

/// Marker handed out by [`Circuit::try_acquire`] for an admitted call,
/// recording whether the call was admitted as a half-open probe.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CallPermit {
    pub(crate) probe: bool,
}

pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    consecutive_recovery_failures: u32,
    half_open_probes: u32,
    total_calls: u64,
    success_calls: u64,
    failed_calls: u64,
    rejected_calls: u64,
}

impl Circuit {
    pub(crate) fn new_with_atomic(state_atomic: Arc<AtomicU8>) -> Self {
        Self {
            state: CircuitState::Closed,
            state_atomic,
            failure_count: 0,
            last_failure_time: None,
            consecutive_recovery_failures: 0,
            half_open_probes: 0,
            total_calls: 0,
            success_calls: 0,
            failed_calls: 0,
            rejected_calls: 0,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn metrics(&self) -> CircuitMetrics {
        CircuitMetrics {
            state: self.state,
            failure_count: self.failure_count,
            consecutive_recovery_failures: self.consecutive_recovery_failures,
            total_calls: self.total_calls,
            success_calls: self.success_calls,
            failed_calls: self.failed_calls,
            rejected_calls: self.rejected_calls,
        }
    }

    /// The effective open duration: the base recovery timeout widened
    /// exponentially by consecutive failed probes, capped at 32x.
    fn effective_recovery_timeout(&self, config: &CircuitBreakerConfig) -> Duration {
        let exponent = self.consecutive_recovery_failures.min(MAX_BACKOFF_EXPONENT);
        config.recovery_timeout.saturating_mul(1u32 << exponent)
    }

    /// Decides whether a call may be attempted.
    ///
    /// Returns a permit for admitted calls; `None` means the call must be
    /// rejected (fallback or `CircuitBreakerError::Open`).
    pub(crate) fn try_acquire(&mut self, config: &CircuitBreakerConfig) -> Option<CallPermit> {
        self.total_calls += 1;

        match self.state {
            CircuitState::Closed => {
                self.emit_permitted(config);
                Some(CallPermit { probe: false })
            }
            CircuitState::Open => {
                let elapsed = self
                    .last_failure_time
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= self.effective_recovery_timeout(config)
                    && self.half_open_probes < config.half_open_max_probes
                {
                    self.half_open_probes += 1;
                    self.transition_to(CircuitState::HalfOpen, config);
                    self.emit_permitted(config);
                    Some(CallPermit { probe: true })
                } else {
                    self.reject(config);
                    None
                }
            }
            CircuitState::HalfOpen => {
                if self.half_open_probes < config.half_open_max_probes {
                    self.half_open_probes += 1;
                    self.emit_permitted(config);
                    Some(CallPermit { probe: true })
                } else {
                    self.reject(config);
                    None
                }
            }
        }
    }

    pub(crate) fn record_success(
        &mut self,
        config: &CircuitBreakerConfig,
        permit: CallPermit,
        duration: Duration,
    ) {
        self.success_calls += 1;
        self.failure_count = 0;

        if permit.probe {
            self.half_open_probes = self.half_open_probes.saturating_sub(1);
            self.consecutive_recovery_failures = 0;
            self.transition_to(CircuitState::Closed, config);
        }

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::SuccessRecorded {
                source: config.name.clone(),
                timestamp: Instant::now(),
                state: self.state,
                duration,
            });

        #[cfg(feature = "metrics")]
        {
            counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "success").increment(1);
            histogram!("circuitbreaker_call_duration_seconds", "circuitbreaker" => config.name.clone())
                .record(duration.as_secs_f64());
        }
    }

    pub(crate) fn record_failure(
        &mut self,
        config: &CircuitBreakerConfig,
        permit: CallPermit,
        duration: Duration,
    ) {
        self.failed_calls += 1;
        self.last_failure_time = Some(Instant::now());

        if permit.probe {
            self.half_open_probes = self.half_open_probes.saturating_sub(1);
            self.consecutive_recovery_failures =
                self.consecutive_recovery_failures.saturating_add(1);
            self.transition_to(CircuitState::Open, config);
        } else {
            self.failure_count = self.failure_count.saturating_add(1);
            if self.failure_count >= config.failure_threshold {
                self.transition_to(CircuitState::Open, config);
            }
        }

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::FailureRecorded {
                source: config.name.clone(),
                timestamp: Instant::now(),
                state: self.state,
                duration,
            });

        #[cfg(feature = "metrics")]
        {
            counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "failure").increment(1);
            histogram!("circuitbreaker_call_duration_seconds", "circuitbreaker" => config.name.clone())
                .record(duration.as_secs_f64());
        }
    }

    pub(crate) fn force_open(&mut self, config: &CircuitBreakerConfig) {
        self.last_failure_time = Some(Instant::now());
        self.transition_to(CircuitState::Open, config);
    }

    pub(crate) fn force_closed(&mut self, config: &CircuitBreakerConfig) {
        self.failure_count = 0;
        self.consecutive_recovery_failures = 0;
        self.half_open_probes = 0;
        self.transition_to(CircuitState::Closed, config);
    }

    pub(crate) fn reset(&mut self, config: &CircuitBreakerConfig) {
        self.force_closed(config);
    }

    fn reject(&mut self, config: &CircuitBreakerConfig) {
        self.rejected_calls += 1;
        config.event_listeners.emit(&CircuitBreakerEvent::CallRejected {
            source: config.name.clone(),
            timestamp: Instant::now(),
        });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "rejected").increment(1);
    }

    fn emit_permitted(&self, config: &CircuitBreakerConfig) {
        config
            .event_listeners
            .emit(&CircuitBreakerEvent::CallPermitted {
                source: config.name.clone(),
                timestamp: Instant::now(),
                state: self.state,
            });
    }

    fn transition_to(&mut self, state: CircuitState, config: &CircuitBreakerConfig) {
        if self.state == state {
            return;
        }

        let from_state = self.state;

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                source: config.name.clone(),
                timestamp: Instant::now(),
                from_state,
                to_state: state,
            });

        #[cfg(feature = "tracing")]
        tracing::info!(breaker = %config.name, from = ?from_state, to = ?state, "Circuit state transition");

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => config.name.clone(),
                "from" => from_state.as_str(),
                "to" => state.as_str()
            )
            .increment(1);

            gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone(), "state" => state.as_str())
                .set(1.0);
        }

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
    }
}
