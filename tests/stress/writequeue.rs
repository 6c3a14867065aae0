//! Write queue stress tests

use orderflow_core::BoxError;
use orderflow_writequeue::{WriteQueue, WriteQueueConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Sustained producer pressure against a fast consumer: everything
/// accepted is eventually processed exactly once.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn stress_sustained_throughput() {
    let queue: WriteQueue<u64> = WriteQueue::new(
        WriteQueueConfig::builder()
            .name("throughput")
            .max_size(10_000)
            .batch_size(500)
            .flush_interval(Duration::from_millis(5))
            .build(),
    );

    let processed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&processed);
    queue.on_process(move |batch: Vec<u64>| {
        counter.fetch_add(batch.len(), Ordering::Relaxed);
        async move { Ok::<(), BoxError>(()) }
    });

    let accepted = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();
    let mut handles = Vec::new();
    for task in 0..16u64 {
        let queue = queue.clone();
        let accepted = Arc::clone(&accepted);
        handles.push(tokio::spawn(async move {
            for i in 0..10_000u64 {
                if queue.enqueue(task * 1_000_000 + i) {
                    accepted.fetch_add(1, Ordering::Relaxed);
                } else {
                    // Backpressure: yield and move on, as a caller would.
                    tokio::task::yield_now().await;
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Drain the tail.
    for _ in 0..200 {
        if queue.depth() == 0 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    let elapsed = start.elapsed();

    let accepted = accepted.load(Ordering::Relaxed);
    println!("accepted {accepted} items in {elapsed:?}");
    assert_eq!(processed.load(Ordering::Relaxed), accepted);
    assert_eq!(queue.metrics().processed, accepted as u64);
    assert_eq!(queue.depth(), 0);
    queue.stop();
}

/// A consumer that fails in waves: retried items never duplicate and the
/// bound holds throughout.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn stress_flaky_consumer_conserves_items() {
    let queue: WriteQueue<u64> = WriteQueue::new(
        WriteQueueConfig::builder()
            .name("flaky")
            .max_size(5_000)
            .batch_size(100)
            .flush_interval(Duration::from_millis(5))
            .max_retries(50)
            .build(),
    );

    let seen: Arc<std::sync::Mutex<Vec<u64>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let attempts = Arc::new(AtomicUsize::new(0));
    let gate = Arc::clone(&attempts);
    queue.on_process(move |batch: Vec<u64>| {
        let sink = Arc::clone(&sink);
        let attempt = gate.fetch_add(1, Ordering::Relaxed);
        async move {
            if attempt % 3 == 0 {
                Err::<(), BoxError>("wave".into())
            } else {
                sink.lock().unwrap().extend(batch);
                Ok(())
            }
        }
    });

    let mut accepted = 0usize;
    for i in 0..20_000u64 {
        if queue.enqueue(i) {
            accepted += 1;
        } else {
            sleep(Duration::from_millis(1)).await;
        }
    }

    for _ in 0..400 {
        if queue.depth() == 0 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }

    let mut processed = seen.lock().unwrap().clone();
    assert_eq!(processed.len(), accepted);
    processed.sort();
    processed.dedup();
    assert_eq!(processed.len(), accepted, "an item was processed twice");
    assert_eq!(queue.dead_letter_size(), 0);
    queue.stop();
}
