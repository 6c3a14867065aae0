use orderflow_circuitbreaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

fn breaker(threshold: u32, recovery: Duration) -> CircuitBreaker {
    CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("state-machine")
            .failure_threshold(threshold)
            .recovery_timeout(recovery)
            .call_timeout(Duration::from_secs(5))
            .build(),
    )
}

/// Three consecutive failures with a threshold of 3 open the circuit, and
/// subsequent calls are rejected without invoking the operation.
#[tokio::test]
async fn opens_after_threshold_and_stops_invoking() {
    let breaker = breaker(3, Duration::from_secs(60));
    let invocations = Arc::new(AtomicUsize::new(0));

    for _ in 0..5 {
        let counter = Arc::clone(&invocations);
        let result: Result<(), _> = breaker
            .execute(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), &str>("store down")
            })
            .await;
        assert!(result.is_err());
    }

    // Calls 4 and 5 were rejected before reaching the operation.
    assert_eq!(invocations.load(Ordering::SeqCst), 3);
    assert_eq!(breaker.state(), CircuitState::Open);

    let metrics = breaker.metrics().await;
    assert_eq!(metrics.total_calls, 5);
    assert_eq!(metrics.failed_calls, 3);
    assert_eq!(metrics.rejected_calls, 2);
}

#[tokio::test]
async fn rejected_call_returns_open_error() {
    let breaker = breaker(1, Duration::from_secs(60));

    let _ = breaker
        .execute(|| async { Err::<(), &str>("boom") })
        .await;
    assert_eq!(breaker.state(), CircuitState::Open);

    let err = breaker
        .execute(|| async { Ok::<_, &str>(1) })
        .await
        .unwrap_err();
    assert!(err.is_circuit_open());
    assert!(matches!(err, CircuitBreakerError::Open));
}

#[tokio::test]
async fn success_resets_the_failure_streak() {
    let breaker = breaker(3, Duration::from_secs(60));

    for _ in 0..2 {
        let _ = breaker.execute(|| async { Err::<(), &str>("e") }).await;
    }
    let _ = breaker.execute(|| async { Ok::<_, &str>(()) }).await;
    for _ in 0..2 {
        let _ = breaker.execute(|| async { Err::<(), &str>("e") }).await;
    }

    // 2 failures, a success, 2 more failures: the streak never hit 3.
    assert_eq!(breaker.state(), CircuitState::Closed);
}

/// After the recovery timeout elapses a probe is admitted; a successful
/// probe closes the circuit and normal traffic resumes.
#[tokio::test]
async fn recovers_through_half_open_probe() {
    let breaker = breaker(3, Duration::from_millis(500));
    let invocations = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let _ = breaker.execute(|| async { Err::<(), &str>("down") }).await;
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    // Still inside the recovery window.
    let err = breaker
        .execute(|| async { Ok::<_, &str>(()) })
        .await
        .unwrap_err();
    assert!(err.is_circuit_open());

    sleep(Duration::from_millis(600)).await;

    let counter = Arc::clone(&invocations);
    let result = breaker
        .execute(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, &str>("recovered")
        })
        .await;

    assert_eq!(result.unwrap(), "recovered");
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert_eq!(breaker.state(), CircuitState::Closed);

    // Traffic flows normally again.
    let ok = breaker.execute(|| async { Ok::<_, &str>(42) }).await;
    assert_eq!(ok.unwrap(), 42);
}

#[tokio::test]
async fn failed_probe_reopens_the_circuit() {
    let breaker = breaker(1, Duration::from_millis(100));

    let _ = breaker.execute(|| async { Err::<(), &str>("down") }).await;
    assert_eq!(breaker.state(), CircuitState::Open);

    sleep(Duration::from_millis(150)).await;

    let _ = breaker
        .execute(|| async { Err::<(), &str>("still down") })
        .await;
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test]
async fn state_transitions_are_observable() {
    let transitions: Arc<Mutex<Vec<(CircuitState, CircuitState)>>> =
        Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&transitions);

    let breaker = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("observable")
            .failure_threshold(1)
            .recovery_timeout(Duration::from_millis(100))
            .on_state_transition(move |from, to| {
                sink.lock().unwrap().push((from, to));
            })
            .build(),
    );

    let _ = breaker.execute(|| async { Err::<(), &str>("e") }).await;
    sleep(Duration::from_millis(150)).await;
    let _ = breaker.execute(|| async { Ok::<_, &str>(()) }).await;

    let seen = transitions.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            (CircuitState::Closed, CircuitState::Open),
            (CircuitState::Open, CircuitState::HalfOpen),
            (CircuitState::HalfOpen, CircuitState::Closed),
        ]
    );
}

#[tokio::test]
async fn force_open_rejects_and_reset_restores() {
    let breaker = breaker(5, Duration::from_secs(60));

    breaker.force_open().await;
    assert_eq!(breaker.state(), CircuitState::Open);
    assert!(breaker
        .execute(|| async { Ok::<_, &str>(()) })
        .await
        .unwrap_err()
        .is_circuit_open());

    breaker.reset().await;
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert!(breaker
        .execute(|| async { Ok::<_, &str>(()) })
        .await
        .is_ok());
}

#[tokio::test]
async fn rejection_listener_fires() {
    let rejected = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&rejected);

    let breaker = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("rejections")
            .failure_threshold(1)
            .recovery_timeout(Duration::from_secs(60))
            .on_call_rejected(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build(),
    );

    let _ = breaker.execute(|| async { Err::<(), &str>("e") }).await;
    for _ in 0..3 {
        let _ = breaker.execute(|| async { Ok::<_, &str>(()) }).await;
    }

    assert_eq!(rejected.load(Ordering::SeqCst), 3);
}
