//! Per-dependency circuit breaker for protecting calls to slow or
//! unreliable external services.
//!
//! A circuit breaker tracks the health of one named dependency and
//! fast-fails calls to it once too many consecutive failures are observed,
//! so a degrading backing store manifests as fallback data instead of
//! cascading request failures.
//!
//! ## States
//! - **Closed**: normal operation, every call is attempted
//! - **Open**: the circuit is tripped, calls are rejected immediately
//! - **HalfOpen**: a bounded number of probe calls test whether the
//!   dependency has recovered
//!
//! While open, the wait before probes are admitted widens exponentially
//! with each failed recovery attempt (`recovery_timeout * 2^n`, capped at
//! 32x), so a herd of callers observing the timeout elapsing at once
//! cannot hammer a still-degraded dependency.
//!
//! ## Usage
//!
//! One breaker instance is constructed per dependency and shared by every
//! caller of that dependency (see `orderflow_core::Registry`):
//!
//! ```rust
//! use orderflow_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::new(
//!     CircuitBreakerConfig::builder()
//!         .name("supplier-db")
//!         .failure_threshold(3)
//!         .recovery_timeout(Duration::from_millis(500))
//!         .call_timeout(Duration::from_millis(200))
//!         .build(),
//! );
//!
//! let result: Result<Vec<String>, _> = breaker
//!     .execute(|| async { query_suppliers().await })
//!     .await;
//! # }
//! # async fn query_suppliers() -> Result<Vec<String>, std::io::Error> { Ok(vec![]) }
//! ```
//!
//! ## Fallbacks
//!
//! A fallback is preferred over raising at every failure point: dependency
//! failure, timeout, open circuit, and rejected probe all produce the
//! fallback value instead of an error:
//!
//! ```rust
//! # use orderflow_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
//! # async fn example() {
//! # let breaker = CircuitBreaker::new(CircuitBreakerConfig::builder().build());
//! let suppliers = breaker
//!     .execute_with_fallback(
//!         || async { query_suppliers().await },
//!         Vec::new, // stale-but-served beats failing
//!     )
//!     .await;
//! # }
//! # async fn query_suppliers() -> Result<Vec<String>, std::io::Error> { Ok(vec![]) }
//! ```
//!
//! ## Timeouts
//!
//! Every attempted call races against `call_timeout`. Exactly one of the
//! two outcomes is recorded; on timeout the operation is **abandoned, not
//! aborted**: its eventual result is discarded, but the work itself keeps
//! running. Callers must treat a timeout as "result discarded", not
//! "operation stopped".
//!
//! ## Tower integration
//!
//! Request-handling stacks can drive the same shared breaker through
//! [`CircuitBreakerLayer`]:
//!
//! ```rust
//! use orderflow_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerLayer};
//! use tower::{Layer, ServiceBuilder, service_fn};
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::new(CircuitBreakerConfig::builder().name("api").build());
//!
//! let service = ServiceBuilder::new()
//!     .layer(CircuitBreakerLayer::new(breaker.clone()))
//!     .service(service_fn(|req: String| async move {
//!         Ok::<String, std::io::Error>(req)
//!     }));
//! # }
//! ```
//!
//! ## Feature Flags
//! - `metrics`: enables metrics collection using the `metrics` crate
//! - `tracing`: enables logging via the `tracing` crate
//! - `serde`: enables `Serialize` for `CircuitState` and `CircuitMetrics`

use crate::circuit::{CallPermit, Circuit};
use crate::events::CircuitBreakerEvent as Event;
#[cfg(feature = "metrics")]
use metrics::{describe_counter, describe_gauge, describe_histogram};
use std::future::Future;
use std::sync::atomic::AtomicU8;
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Instant;
use tokio::sync::Mutex;

pub use circuit::{CircuitMetrics, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use layer::{CircuitBreakerLayer, CircuitBreakerService};

mod circuit;
mod config;
mod error;
mod events;
mod layer;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// A shared handle to one named circuit breaker.
///
/// Cloning is cheap and every clone drives the same underlying circuit;
/// construct one instance per dependency and reuse it for all callers.
pub struct CircuitBreaker {
    circuit: Arc<Mutex<Circuit>>,
    state_atomic: Arc<AtomicU8>,
    config: Arc<CircuitBreakerConfig>,
}

impl CircuitBreaker {
    /// Creates a new circuit breaker in the closed state.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "circuitbreaker_calls_total",
                "Total number of calls through the circuit breaker"
            );
            describe_counter!(
                "circuitbreaker_transitions_total",
                "Total number of circuit breaker state transitions"
            );
            describe_gauge!(
                "circuitbreaker_state",
                "Current state of the circuit breaker"
            );
            describe_histogram!(
                "circuitbreaker_call_duration_seconds",
                "Duration of calls through the circuit breaker"
            );
        });

        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        Self {
            circuit: Arc::new(Mutex::new(Circuit::new_with_atomic(Arc::clone(
                &state_atomic,
            )))),
            state_atomic,
            config: Arc::new(config),
        }
    }

    /// Returns the name of this breaker.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Executes `operation` through the circuit breaker.
    ///
    /// The operation is attempted only when the circuit admits the call
    /// (closed, or open-and-elapsed with a free probe slot) and races
    /// against the configured call timeout. The lock is never held across
    /// the operation's await.
    ///
    /// # Errors
    ///
    /// - [`CircuitBreakerError::Open`] when the call was rejected without
    ///   being attempted
    /// - [`CircuitBreakerError::Timeout`] when the call did not settle in
    ///   time (the operation keeps running; its result is discarded)
    /// - [`CircuitBreakerError::Inner`] when the operation itself failed
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let permit = {
            let mut circuit = self.circuit.lock().await;
            circuit.try_acquire(&self.config)
        };
        let Some(permit) = permit else {
            #[cfg(feature = "tracing")]
            tracing::debug!(breaker = %self.config.name, "call rejected (circuit open)");
            return Err(CircuitBreakerError::Open);
        };

        let start = Instant::now();
        // The operation runs as its own task so a timeout abandons it
        // rather than cancelling it.
        let handle = tokio::spawn(operation());
        let outcome = tokio::time::timeout(self.config.call_timeout, handle).await;
        let duration = start.elapsed();

        match outcome {
            Ok(Ok(Ok(value))) => {
                self.record_success(permit, duration).await;
                Ok(value)
            }
            Ok(Ok(Err(err))) => {
                self.record_failure(permit, duration).await;
                Err(CircuitBreakerError::Inner(err))
            }
            Ok(Err(join_err)) => {
                if join_err.is_panic() {
                    std::panic::resume_unwind(join_err.into_panic());
                }
                // Join failure without a panic means the runtime is shutting
                // down; the result is gone either way.
                self.record_failure(permit, duration).await;
                Err(CircuitBreakerError::Timeout)
            }
            Err(_elapsed) => {
                // Dropping the join handle detaches the task: abandoned,
                // not aborted.
                self.config.event_listeners.emit(&Event::CallTimedOut {
                    source: self.config.name.clone(),
                    timestamp: Instant::now(),
                    limit: self.config.call_timeout,
                });

                #[cfg(feature = "tracing")]
                tracing::warn!(
                    breaker = %self.config.name,
                    limit = ?self.config.call_timeout,
                    "call timed out"
                );

                self.record_failure(permit, duration).await;
                Err(CircuitBreakerError::Timeout)
            }
        }
    }

    /// Executes `operation`, producing `fallback()` instead of an error at
    /// every failure point: dependency failure, timeout, open circuit, and
    /// rejected probe.
    pub async fn execute_with_fallback<F, Fut, T, E, FB>(&self, operation: F, fallback: FB) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
        FB: FnOnce() -> T,
    {
        match self.execute(operation).await {
            Ok(value) => value,
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(breaker = %self.config.name, "serving fallback");
                fallback()
            }
        }
    }

    /// Returns the current state without requiring async context.
    ///
    /// Safe to call from sync code (health checks, metrics collection).
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(std::sync::atomic::Ordering::Acquire))
    }

    /// Returns whether the circuit is currently open.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Returns a snapshot of the breaker's cumulative metrics.
    pub async fn metrics(&self) -> CircuitMetrics {
        let circuit = self.circuit.lock().await;
        circuit.metrics()
    }

    /// Forces the circuit into the open state.
    pub async fn force_open(&self) {
        let mut circuit = self.circuit.lock().await;
        circuit.force_open(&self.config);
    }

    /// Forces the circuit into the closed state.
    pub async fn force_closed(&self) {
        let mut circuit = self.circuit.lock().await;
        circuit.force_closed(&self.config);
    }

    /// Resets the circuit to closed and clears failure bookkeeping.
    pub async fn reset(&self) {
        let mut circuit = self.circuit.lock().await;
        circuit.reset(&self.config);
    }

    async fn record_success(&self, permit: CallPermit, duration: std::time::Duration) {
        let mut circuit = self.circuit.lock().await;
        circuit.record_success(&self.config, permit, duration);
    }

    async fn record_failure(&self, permit: CallPermit, duration: std::time::Duration) {
        let mut circuit = self.circuit.lock().await;
        circuit.record_failure(&self.config, permit, duration);
    }
}

impl Clone for CircuitBreaker {
    fn clone(&self) -> Self {
        Self {
            circuit: Arc::clone(&self.circuit),
            state_atomic: Arc::clone(&self.state_atomic),
            config: Arc::clone(&self.config),
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.config.name)
            .field("state", &self.state())
            .finish()
    }
}
