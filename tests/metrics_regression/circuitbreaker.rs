//! Circuit breaker metrics regression tests

use super::helpers::*;
use orderflow_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
use serial_test::serial;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn circuitbreaker_metrics_exist() {
    init_recorder();

    let breaker = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("test_cb")
            .failure_threshold(2)
            .recovery_timeout(Duration::from_millis(50))
            .call_timeout(Duration::from_secs(1))
            .build(),
    );

    // Mixed outcomes to exercise every label: successes, failures up to
    // the threshold, and a rejection from the open circuit.
    let _ = breaker.execute(|| async { Ok::<_, &str>(()) }).await;
    for _ in 0..2 {
        let _ = breaker.execute(|| async { Err::<(), &str>("down") }).await;
    }
    let _ = breaker.execute(|| async { Ok::<_, &str>(()) }).await;

    // Verify call counter with outcome labels
    assert_counter_exists("circuitbreaker_calls_total");
    assert_metric_has_label("circuitbreaker_calls_total", "circuitbreaker", "test_cb");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "success");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "failure");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "rejected");

    // Verify transition counter
    assert_counter_exists("circuitbreaker_transitions_total");
    assert_metric_has_label(
        "circuitbreaker_transitions_total",
        "circuitbreaker",
        "test_cb",
    );
    assert_metric_has_label("circuitbreaker_transitions_total", "from", "Closed");
    assert_metric_has_label("circuitbreaker_transitions_total", "to", "Open");

    // Verify state gauge
    assert_gauge_exists("circuitbreaker_state");
    assert_metric_has_label("circuitbreaker_state", "circuitbreaker", "test_cb");

    // Verify duration histogram
    assert_histogram_exists("circuitbreaker_call_duration_seconds");
    assert_metric_has_label(
        "circuitbreaker_call_duration_seconds",
        "circuitbreaker",
        "test_cb",
    );
}
