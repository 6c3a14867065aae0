use orderflow_core::BoxError;
use orderflow_writequeue::{WriteQueue, WriteQueueConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn queue(max_retries: u32) -> WriteQueue<String> {
    WriteQueue::new(
        WriteQueueConfig::builder()
            .name("retry")
            .max_size(100)
            .batch_size(10)
            .flush_interval(Duration::from_secs(30))
            .max_retries(max_retries)
            .build(),
    )
}

/// With maxRetries = 2 the processor sees an item three times (the
/// initial attempt plus two retries) before it is dead-lettered, and the
/// dead-lettered item records retries == 2.
#[tokio::test]
async fn exhausted_retries_move_the_item_to_dead_letter() {
    let queue = queue(2);
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);

    queue.on_process(move |_batch: Vec<String>| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { Err::<(), BoxError>("store down".into()) }
    });
    queue.stop(); // drive flushes manually

    queue.enqueue("doomed".into());
    for _ in 0..5 {
        queue.flush().await;
    }

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(queue.depth(), 0);

    let dead = queue.drain_dead_letter();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].data, "doomed");
    assert_eq!(dead[0].retries, 2);
    assert_eq!(queue.metrics().failed, 1);
}

/// An item that fails transiently is re-appended and succeeds on a later
/// flush without touching the dead-letter list.
#[tokio::test]
async fn transient_failures_recover() {
    let queue = queue(3);
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);

    queue.on_process(move |_batch: Vec<String>| {
        let attempt = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if attempt < 2 {
                Err::<(), BoxError>("flaky".into())
            } else {
                Ok(())
            }
        }
    });
    queue.stop();

    queue.enqueue("persistent".into());
    for _ in 0..3 {
        queue.flush().await;
    }

    assert_eq!(queue.depth(), 0);
    assert_eq!(queue.dead_letter_size(), 0);
    assert_eq!(queue.metrics().processed, 1);
}

/// A failed batch re-appends to the tail, so retried items queue up
/// behind writes that arrived during the flush.
#[tokio::test]
async fn retried_items_requeue_at_the_tail() {
    let queue = WriteQueue::new(
        WriteQueueConfig::builder()
            .name("tail")
            .max_size(100)
            .batch_size(1)
            .flush_interval(Duration::from_secs(30))
            .max_retries(5)
            .build(),
    );

    let batches: Arc<std::sync::Mutex<Vec<String>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&batches);
    let fail_first = Arc::new(AtomicUsize::new(0));
    let gate = Arc::clone(&fail_first);

    queue.on_process(move |batch: Vec<String>| {
        let sink = Arc::clone(&sink);
        let first = gate.fetch_add(1, Ordering::SeqCst) == 0;
        async move {
            if first {
                Err::<(), BoxError>("once".into())
            } else {
                sink.lock().unwrap().extend(batch);
                Ok(())
            }
        }
    });
    queue.stop();

    queue.enqueue("first".into());
    queue.enqueue("second".into());

    // Flush 1 fails "first" and re-appends it behind "second".
    queue.flush().await;
    queue.flush().await;
    queue.flush().await;

    assert_eq!(*batches.lock().unwrap(), vec!["second", "first"]);
}

/// Items in one failed batch carry independent retry counts.
#[tokio::test]
async fn retry_counts_are_tracked_per_item() {
    let queue = queue(1);

    queue.on_process(|_batch: Vec<String>| async move {
        Err::<(), BoxError>("down".into())
    });
    queue.stop();

    queue.enqueue("a".into());
    queue.enqueue("b".into());

    // One failed flush: both items now carry one retry.
    queue.flush().await;
    assert_eq!(queue.depth(), 2);
    assert_eq!(queue.dead_letter_size(), 0);

    // Second failure exhausts both at once.
    queue.flush().await;
    let dead = queue.drain_dead_letter();
    assert_eq!(dead.len(), 2);
    assert!(dead.iter().all(|item| item.retries == 1));
}

/// With max_retries = 0 a single failure dead-letters immediately.
#[tokio::test]
async fn zero_retries_dead_letters_on_first_failure() {
    let queue = WriteQueue::new(
        WriteQueueConfig::builder()
            .name("zero")
            .batch_size(10)
            .flush_interval(Duration::from_secs(30))
            .max_retries(0)
            .build(),
    );

    queue.on_process(|_batch: Vec<String>| async move {
        Err::<(), BoxError>("down".into())
    });
    queue.stop();

    queue.enqueue("one-shot".into());
    queue.flush().await;

    let dead = queue.drain_dead_letter();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].retries, 0);
}

/// Dead-lettering is observable through the configured listener.
#[tokio::test]
async fn dead_letter_listener_fires() {
    let observed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&observed);

    let queue: WriteQueue<String> = WriteQueue::new(
        WriteQueueConfig::builder()
            .name("listener")
            .batch_size(10)
            .flush_interval(Duration::from_millis(50))
            .max_retries(0)
            .on_dead_letter(move |_retries| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build(),
    );

    queue.on_process(|_batch: Vec<String>| async move {
        Err::<(), BoxError>("down".into())
    });

    queue.enqueue("x".into());
    sleep(Duration::from_millis(200)).await;

    assert_eq!(observed.load(Ordering::SeqCst), 1);
    queue.stop();
}
