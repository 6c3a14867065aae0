use orderflow_circuitbreaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn breaker(call_timeout: Duration, threshold: u32) -> CircuitBreaker {
    CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("timeout")
            .failure_threshold(threshold)
            .recovery_timeout(Duration::from_secs(60))
            .call_timeout(call_timeout)
            .build(),
    )
}

#[tokio::test]
async fn slow_call_times_out_and_counts_as_failure() {
    let breaker = breaker(Duration::from_millis(50), 5);

    let err = breaker
        .execute(|| async {
            sleep(Duration::from_millis(500)).await;
            Ok::<_, &str>(())
        })
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(matches!(err, CircuitBreakerError::Timeout));

    let metrics = breaker.metrics().await;
    assert_eq!(metrics.failed_calls, 1);
    assert_eq!(metrics.success_calls, 0);
}

/// A timed-out operation is abandoned, not aborted: the work keeps
/// running to completion after the caller has already received the error.
#[tokio::test]
async fn timed_out_operation_keeps_running() {
    let breaker = breaker(Duration::from_millis(50), 5);
    let completed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&completed);

    let err = breaker
        .execute(move || async move {
            sleep(Duration::from_millis(200)).await;
            flag.store(true, Ordering::SeqCst);
            Ok::<_, &str>(())
        })
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(!completed.load(Ordering::SeqCst));

    // The abandoned task finishes on its own.
    sleep(Duration::from_millis(300)).await;
    assert!(completed.load(Ordering::SeqCst));
}

/// The timeout already settled the call as a failure; a late success from
/// the abandoned operation must not be double-counted.
#[tokio::test]
async fn late_result_is_discarded() {
    let breaker = breaker(Duration::from_millis(50), 5);

    let _ = breaker
        .execute(|| async {
            sleep(Duration::from_millis(150)).await;
            Ok::<_, &str>("late")
        })
        .await;

    sleep(Duration::from_millis(250)).await;

    let metrics = breaker.metrics().await;
    assert_eq!(metrics.failed_calls, 1);
    assert_eq!(metrics.success_calls, 0);
}

#[tokio::test]
async fn timeouts_open_the_circuit() {
    let breaker = breaker(Duration::from_millis(30), 2);
    let invocations = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let counter = Arc::clone(&invocations);
        let _ = breaker
            .execute(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(200)).await;
                Ok::<_, &str>(())
            })
            .await;
    }

    // The third call was rejected by the now-open circuit.
    assert_eq!(invocations.load(Ordering::SeqCst), 2);
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test]
async fn fast_calls_do_not_time_out() {
    let breaker = breaker(Duration::from_millis(100), 5);

    let result = breaker
        .execute(|| async {
            sleep(Duration::from_millis(10)).await;
            Ok::<_, &str>(7)
        })
        .await;
    assert_eq!(result.unwrap(), 7);
}

#[tokio::test]
async fn timeout_listener_reports_the_limit() {
    let observed = Arc::new(std::sync::Mutex::new(None));
    let sink = Arc::clone(&observed);

    let breaker = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("timeout-listener")
            .call_timeout(Duration::from_millis(40))
            .on_timeout(move |limit| {
                *sink.lock().unwrap() = Some(limit);
            })
            .build(),
    );

    let _ = breaker
        .execute(|| async {
            sleep(Duration::from_millis(200)).await;
            Ok::<_, &str>(())
        })
        .await;

    assert_eq!(
        *observed.lock().unwrap(),
        Some(Duration::from_millis(40))
    );
}
