//! Write-behind queueing: absorbing a store outage with batched retries.
//!
//! Writes are accepted immediately into a bounded buffer and flushed in
//! batches. While the store is down, failed batches are retried; once it
//! recovers, the backlog drains. Items that exhaust their retries land in
//! the dead-letter list for inspection.
//!
//! Run with: cargo run --example write_behind

use orderflow_core::BoxError;
use orderflow_writequeue::{WriteQueue, WriteQueueConfig};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    println!("Write-Behind Queue Example");
    println!("==========================\n");

    let store_up = Arc::new(AtomicBool::new(true));
    let persisted = Arc::new(AtomicUsize::new(0));

    let queue: WriteQueue<String> = WriteQueue::new(
        WriteQueueConfig::builder()
            .name("order-writes")
            .max_size(100)
            .batch_size(5)
            .flush_interval(Duration::from_millis(100))
            .max_retries(10)
            .on_dead_letter(|retries| println!("  [event] dead-lettered after {retries} retries"))
            .build(),
    );

    let up = Arc::clone(&store_up);
    let count = Arc::clone(&persisted);
    queue.on_process(move |batch: Vec<String>| {
        let up = Arc::clone(&up);
        let count = Arc::clone(&count);
        async move {
            if !up.load(Ordering::SeqCst) {
                return Err::<(), BoxError>("store unavailable".into());
            }
            count.fetch_add(batch.len(), Ordering::SeqCst);
            println!("  persisted batch of {}: {:?}", batch.len(), batch);
            Ok(())
        }
    });

    println!("Enqueueing 5 orders; the batch size triggers an immediate flush:");
    for i in 1..=5 {
        queue.enqueue(format!("order-{i}"));
    }
    sleep(Duration::from_millis(200)).await;

    println!("\nStore goes down; writes keep being accepted:");
    store_up.store(false, Ordering::SeqCst);
    for i in 6..=9 {
        let accepted = queue.enqueue(format!("order-{i}"));
        println!("  enqueue order-{i}: accepted={accepted}");
    }
    sleep(Duration::from_millis(400)).await;
    println!(
        "  depth={} persisted={} (batches failing, items retrying)",
        queue.depth(),
        persisted.load(Ordering::SeqCst)
    );

    println!("\nStore recovers; the backlog drains:");
    store_up.store(true, Ordering::SeqCst);
    sleep(Duration::from_millis(400)).await;

    let metrics = queue.metrics();
    println!(
        "  enqueued={} processed={} dead-lettered={} depth={}",
        metrics.enqueued, metrics.processed, metrics.failed, metrics.depth
    );

    queue.stop();
}
