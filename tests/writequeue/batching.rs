use orderflow_core::BoxError;
use orderflow_writequeue::{WriteQueue, WriteQueueConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

type BatchLog = Arc<Mutex<Vec<Vec<String>>>>;

fn recording_queue(
    max_size: usize,
    batch_size: usize,
    flush_interval: Duration,
) -> (WriteQueue<String>, BatchLog) {
    let queue = WriteQueue::new(
        WriteQueueConfig::builder()
            .name("batching")
            .max_size(max_size)
            .batch_size(batch_size)
            .flush_interval(flush_interval)
            .max_retries(0)
            .build(),
    );

    let log: BatchLog = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    queue.on_process(move |batch: Vec<String>| {
        let sink = Arc::clone(&sink);
        async move {
            sink.lock().unwrap().push(batch);
            Ok::<(), BoxError>(())
        }
    });

    (queue, log)
}

/// Reaching the batch size flushes immediately, well before the timer,
/// and the batch preserves enqueue order.
#[tokio::test]
async fn reaching_batch_size_flushes_immediately() {
    let (queue, log) = recording_queue(100, 3, Duration::from_secs(30));

    assert!(queue.enqueue("a".into()));
    assert!(queue.enqueue("b".into()));
    assert!(queue.enqueue("c".into()));

    sleep(Duration::from_millis(100)).await;

    let batches = log.lock().unwrap().clone();
    assert_eq!(batches, vec![vec!["a", "b", "c"]]);
    assert_eq!(queue.depth(), 0);
    queue.stop();
}

/// Below the batch size, the periodic timer drains the buffer.
#[tokio::test]
async fn timer_flushes_partial_batches() {
    let (queue, log) = recording_queue(100, 50, Duration::from_millis(100));

    queue.enqueue("x".into());
    queue.enqueue("y".into());

    sleep(Duration::from_millis(300)).await;

    let batches = log.lock().unwrap().clone();
    assert_eq!(batches, vec![vec!["x", "y"]]);
    assert_eq!(queue.metrics().processed, 2);
    queue.stop();
}

/// A backlog deeper than one batch drains across consecutive flushes,
/// batch_size items at a time.
#[tokio::test]
async fn deep_backlog_drains_in_batch_sized_chunks() {
    let (queue, log) = recording_queue(100, 4, Duration::from_secs(30));
    queue.stop(); // drive flushes manually

    for i in 0..10 {
        queue.enqueue(format!("item-{i}"));
    }

    queue.flush().await;
    queue.flush().await;
    queue.flush().await;

    let batches = log.lock().unwrap().clone();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0].len(), 4);
    assert_eq!(batches[1].len(), 4);
    assert_eq!(batches[2].len(), 2);
    assert_eq!(batches[0][0], "item-0");
    assert_eq!(batches[2][1], "item-9");
    assert_eq!(queue.depth(), 0);
}

#[tokio::test]
async fn flush_on_empty_buffer_is_a_noop() {
    let (queue, log) = recording_queue(100, 3, Duration::from_secs(30));
    queue.stop();

    queue.flush().await;
    assert!(log.lock().unwrap().is_empty());
}

/// Enqueues from many tasks all land in some batch exactly once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_enqueues_are_all_processed() {
    let (queue, log) = recording_queue(1000, 25, Duration::from_millis(50));

    let mut handles = Vec::new();
    for task in 0..8 {
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..25 {
                assert!(queue.enqueue(format!("{task}-{i}")));
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Allow the flusher to drain everything.
    for _ in 0..40 {
        if queue.depth() == 0 {
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }

    let mut seen: Vec<String> = log.lock().unwrap().iter().flatten().cloned().collect();
    assert_eq!(seen.len(), 200);
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 200, "an item was flushed twice");
    assert_eq!(queue.metrics().processed, 200);
    queue.stop();
}
