//! Tower integration for the circuit breaker.

use crate::{CircuitBreaker, CircuitBreakerError};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// A Tower [`Layer`] that routes calls to an inner service through a
/// shared [`CircuitBreaker`].
///
/// Every service produced by this layer drives the same breaker instance,
/// so one tripped dependency trips every consumer of it.
///
/// # Example
///
/// ```rust
/// use orderflow_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerLayer};
/// use tower::{ServiceBuilder, service_fn};
///
/// # async fn example() {
/// let breaker = CircuitBreaker::new(CircuitBreakerConfig::builder().name("db").build());
///
/// let service = ServiceBuilder::new()
///     .layer(CircuitBreakerLayer::new(breaker))
///     .service(service_fn(|req: u64| async move { Ok::<u64, std::io::Error>(req) }));
/// # }
/// ```
#[derive(Clone)]
pub struct CircuitBreakerLayer {
    breaker: CircuitBreaker,
}

impl CircuitBreakerLayer {
    /// Creates a layer driving the given breaker.
    pub fn new(breaker: CircuitBreaker) -> Self {
        Self { breaker }
    }

    /// Returns a handle to the underlying breaker.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl<S> Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreakerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CircuitBreakerService {
            inner,
            breaker: self.breaker.clone(),
        }
    }
}

/// A Tower service applying circuit breaker logic to an inner service.
#[derive(Clone)]
pub struct CircuitBreakerService<S> {
    inner: S,
    breaker: CircuitBreaker,
}

impl<S> CircuitBreakerService<S> {
    /// Returns a handle to the underlying breaker.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl<S, Req> Service<Req> for CircuitBreakerService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = CircuitBreakerError<S::Error>;
    type Future = BoxFuture<'static, Result<S::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(CircuitBreakerError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let breaker = self.breaker.clone();
        // Take the service that was polled ready; leave the clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move { breaker.execute(move || inner.call(req)).await })
    }
}
