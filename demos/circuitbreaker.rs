//! Circuit breaker walkthrough: tripping, fallbacks, and recovery.
//!
//! Simulates a flaky supplier store and shows the circuit opening after
//! consecutive failures, serving fallbacks while open, and recovering
//! through a half-open probe.
//!
//! Run with: cargo run --example circuitbreaker

use orderflow_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Simulated backing store that can be toggled up/down.
#[derive(Clone)]
struct SupplierStore {
    available: Arc<AtomicBool>,
}

impl SupplierStore {
    fn new() -> Self {
        Self {
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    fn set_available(&self, up: bool) {
        self.available.store(up, Ordering::SeqCst);
    }

    async fn query(&self) -> Result<Vec<&'static str>, &'static str> {
        sleep(Duration::from_millis(20)).await;
        if self.available.load(Ordering::SeqCst) {
            Ok(vec!["supplier-a", "supplier-b"])
        } else {
            Err("connection refused")
        }
    }
}

#[tokio::main]
async fn main() {
    println!("Circuit Breaker Example");
    println!("=======================\n");

    let store = SupplierStore::new();
    let breaker = CircuitBreaker::new(
        CircuitBreakerConfig::builder()
            .name("supplier-store")
            .failure_threshold(3)
            .recovery_timeout(Duration::from_millis(500))
            .call_timeout(Duration::from_millis(200))
            .on_state_transition(|from, to| println!("  [event] circuit: {from:?} -> {to:?}"))
            .build(),
    );

    println!("Store healthy, calls flow normally:");
    for i in 1..=2 {
        let s = store.clone();
        let result = breaker.execute(move || async move { s.query().await }).await;
        println!("  call {i}: {result:?}");
    }

    println!("\nStore goes down; three failures trip the circuit:");
    store.set_available(false);
    for i in 1..=5 {
        let s = store.clone();
        let suppliers = breaker
            .execute_with_fallback(move || async move { s.query().await }, Vec::new)
            .await;
        println!(
            "  call {i}: {} suppliers (state: {:?})",
            suppliers.len(),
            breaker.state()
        );
    }

    let metrics = breaker.metrics().await;
    println!(
        "\nWhile open, the store was spared: {} calls attempted, {} rejected",
        metrics.success_calls + metrics.failed_calls,
        metrics.rejected_calls
    );

    println!("\nStore recovers; after the recovery window a probe closes the circuit:");
    store.set_available(true);
    sleep(Duration::from_millis(600)).await;

    let s = store.clone();
    let result = breaker.execute(move || async move { s.query().await }).await;
    println!("  probe: {result:?}");
    println!("  state: {:?}", breaker.state());
}
